//! 結果の表示

use crate::workflow::ParseOutput;
use smart_paste_common::{ConfidenceTier, DiffEntry, DiffStatus, DiffSummary, FieldMatch, ParseResult, SpecCatalog};
use std::fmt::Write;

/// 1製品ぶんの結果を表形式で整形
pub fn format_result(result: &ParseResult, catalog: &SpecCatalog) -> String {
    let mut out = String::new();

    let name = if result.name.is_empty() { "(名称なし)" } else { &result.name };
    let _ = writeln!(out, "📦 {}", name);
    write_attribute(&mut out, "ブランド", result.brand.as_deref());
    write_attribute(&mut out, "カテゴリ", result.category.as_deref());
    write_attribute(&mut out, "型番", result.model_number.as_deref());
    write_attribute(&mut out, "シリアル", result.serial_number.as_deref());
    if let Some(price) = result.purchase_price {
        let note = result
            .price_note
            .as_deref()
            .map(|n| format!(" ({})", n))
            .unwrap_or_default();
        let _ = writeln!(out, "  価格: {:.2}{}", price, note);
    }

    if result.fields.is_empty() {
        let _ = writeln!(out, "  (一致した項目なし)");
    } else {
        let width = result
            .fields
            .keys()
            .map(|k| k.chars().count())
            .max()
            .unwrap_or(0);
        let _ = writeln!(out, "---");
        for field in result.fields.values() {
            let _ = writeln!(out, "{}", format_field(field, width));
        }
    }

    let missing = result.missing_required(catalog);
    if !missing.is_empty() {
        let _ = writeln!(out, "⚠ 必須項目が未入力: {}", missing.join(", "));
    }
    if !result.unmatched_pairs.is_empty() {
        let keys: Vec<&str> = result.unmatched_pairs.iter().map(|p| p.key.as_str()).collect();
        let _ = writeln!(out, "未割り当て: {}", keys.join(", "));
    }

    out
}

fn write_attribute(out: &mut String, label: &str, value: Option<&str>) {
    if let Some(value) = value {
        let _ = writeln!(out, "  {}: {}", label, value);
    }
}

/// 1項目を1行（+補足行）に整形
pub fn format_field(field: &FieldMatch, width: usize) -> String {
    let marker = match field.confidence_tier() {
        ConfidenceTier::Direct => "✔",
        ConfidenceTier::Likely => "~",
        ConfidenceTier::Fuzzy => "?",
    };
    let padding = width.saturating_sub(field.spec_name.chars().count());

    let mut line = format!(
        "{} {}{}  {}  [{}% {}]",
        marker,
        field.spec_name,
        " ".repeat(padding),
        field.value,
        field.confidence,
        field.confidence_tier()
    );

    if field.source_key != field.spec_name {
        let _ = write!(line, " ← {}", field.source_key);
    }
    if let Some(count) = field.merged_count {
        let _ = write!(line, " ({}行を結合)", count);
    }
    if let Some(unit) = &field.unit_info {
        let _ = write!(line, "\n    換算: {}", unit.normalized);
    }
    if let Some(coercion) = &field.coerced {
        let _ = write!(line, "\n    変換: {}", coercion.coerced);
    }
    if field.has_conflict {
        let others: Vec<&str> = field.alternatives.iter().map(|a| a.value.as_str()).collect();
        let _ = write!(line, "\n    ⚠ 競合: {}", others.join(" / "));
    }
    if let Some(warning) = &field.validation_warning {
        let _ = write!(line, "\n    ⚠ {}", warning);
    }
    line
}

/// 解析結果全体を整形（複数製品は区間ごと）
pub fn format_output(output: &ParseOutput, catalog: &SpecCatalog) -> String {
    match output {
        ParseOutput::Single(result) => format_result(result, catalog),
        ParseOutput::Batch(items) => {
            let mut out = format!("{}件の製品を検出\n", items.len());
            for item in items {
                let _ = writeln!(
                    out,
                    "\n=== {} (行 {}-{}) ===",
                    item.segment.name,
                    item.segment.start_line + 1,
                    item.segment.end_line + 1
                );
                out.push_str(&format_result(&item.result, catalog));
            }
            out
        }
    }
}

/// 差分を整形
pub fn format_diff(entries: &[DiffEntry]) -> String {
    let mut out = String::new();

    for entry in entries {
        let marker = match entry.status {
            DiffStatus::Unchanged => " ",
            DiffStatus::Changed => "~",
            DiffStatus::Added => "+",
            DiffStatus::Removed => "-",
        };
        let old = entry.old_value.as_deref().unwrap_or("");
        let new = entry.new_value.as_deref().unwrap_or("");

        let detail = match entry.status {
            DiffStatus::Changed => format!("{} → {}", old, new),
            DiffStatus::Removed => old.to_string(),
            DiffStatus::Unchanged | DiffStatus::Added => new.to_string(),
        };
        let _ = writeln!(out, "{} {} [{}] {}", marker, entry.spec_name, entry.status, detail);
    }

    let _ = writeln!(out, "---\n{}", DiffSummary::from_entries(entries));
    out
}
