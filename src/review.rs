//! 対話式の抽出結果確認
//!
//! 項目ごとに「採用 / 候補を選択 / 換算値・変換値を採用 / 手入力 / クリア」を選び、
//! 選択内容を上書きとして積み上げてから登録用ペイロードを作る。
//! 抽出結果そのものは変更しない。

use crate::error::{PasteError, Result};
use crate::workflow::ParseOutput;
use dialoguer::{Input, Select};
use smart_paste_common::types::DIRECT_MIN;
use smart_paste_common::{build_apply_payload, AliasStore, ApplyPayload, FieldMatch, Overrides, ParseResult, SpecCatalog};
use std::path::Path;

/// 項目ごとの操作
#[derive(Debug, Clone, PartialEq)]
pub enum ReviewChoice {
    /// 抽出値をそのまま採用
    Accept,
    /// 代替候補を採用（alternatives のインデックス）
    Alternative(usize),
    /// 型変換後の値を採用
    Coerced,
    /// 単位換算後の値を採用
    Converted,
    /// 手入力
    Override(String),
    /// 値を登録しない
    Clear,
    /// 残りをすべて採用して終了
    Quit,
}

/// 項目に対して提示する選択肢（表示ラベル付き）
pub fn review_choices(field: &FieldMatch) -> Vec<(ReviewChoice, String)> {
    let mut choices = vec![(
        ReviewChoice::Accept,
        format!("採用: {} ({}% {})", field.value, field.confidence, field.confidence_tier()),
    )];

    for (i, alt) in field.alternatives.iter().enumerate() {
        choices.push((
            ReviewChoice::Alternative(i),
            format!("候補: {} ({}%, {} 行{})", alt.value, alt.confidence, alt.source_key, alt.line_index + 1),
        ));
    }

    if let Some(coercion) = &field.coerced {
        choices.push((ReviewChoice::Coerced, format!("変換値: {}", coercion.coerced)));
    }

    if let Some(unit) = &field.unit_info {
        choices.push((ReviewChoice::Converted, format!("換算値: {}", unit.normalized)));
    }

    choices.push((ReviewChoice::Override(String::new()), "手入力".to_string()));
    choices.push((ReviewChoice::Clear, "クリア（登録しない）".to_string()));
    choices.push((ReviewChoice::Quit, "残りをすべて採用して終了".to_string()));
    choices
}

/// 選択を上書きとエイリアスに反映（Quit なら false）
///
/// 「確実」未満の対応を利用者が採用した場合は、元キーをエイリアスとして記録する
pub fn apply_choice(
    overrides: &mut Overrides,
    aliases: &mut AliasStore,
    field: &FieldMatch,
    choice: &ReviewChoice,
) -> bool {
    match choice {
        ReviewChoice::Accept => {
            overrides.reset(&field.spec_name);
            learn_alias(aliases, &field.source_key, field.confidence, &field.spec_name);
        }
        ReviewChoice::Alternative(i) => {
            if let Some(alt) = field.alternatives.get(*i) {
                overrides.select(field.spec_name.clone(), alt.value.clone());
                learn_alias(aliases, &alt.source_key, alt.confidence, &field.spec_name);
            }
        }
        ReviewChoice::Coerced => {
            if let Some(coercion) = &field.coerced {
                overrides.select(field.spec_name.clone(), coercion.coerced.clone());
            }
        }
        ReviewChoice::Converted => {
            if let Some(unit) = &field.unit_info {
                overrides.select(field.spec_name.clone(), unit.normalized.clone());
            }
        }
        ReviewChoice::Override(value) => overrides.select(field.spec_name.clone(), value.trim()),
        ReviewChoice::Clear => overrides.clear(field.spec_name.clone()),
        ReviewChoice::Quit => return false,
    }
    true
}

fn learn_alias(aliases: &mut AliasStore, source_key: &str, confidence: u8, spec_name: &str) {
    if confidence < DIRECT_MIN {
        aliases.record_alias(source_key, spec_name);
    }
}

/// 対話式で確認してペイロードを作成（複数製品なら製品ごと）
pub fn run_interactive_review(
    input_path: &Path,
    output_path: Option<&Path>,
    catalog: &SpecCatalog,
    aliases: &mut AliasStore,
) -> Result<Vec<ApplyPayload>> {
    // JSONファイル読み込み
    let content = std::fs::read_to_string(input_path)?;
    let output: ParseOutput = serde_json::from_str(&content)?;

    let mut payloads = Vec::new();
    for result in output.results() {
        payloads.push(review_result(result, catalog, aliases)?);
    }

    let json = match payloads.as_slice() {
        [single] => serde_json::to_string_pretty(single)?,
        many => serde_json::to_string_pretty(many)?,
    };

    match output_path {
        Some(path) => {
            std::fs::write(path, &json)?;
            println!("\n✓ 保存しました: {}", path.display());
        }
        None => println!("{}", json),
    }

    Ok(payloads)
}

/// 1製品ぶんの確認
fn review_result(result: &ParseResult, catalog: &SpecCatalog, aliases: &mut AliasStore) -> Result<ApplyPayload> {
    println!("📋 {}", if result.name.is_empty() { "(名称なし)" } else { &result.name });
    if let Some(category) = &result.category {
        println!("  カテゴリ: {}", category);
    }
    println!("  項目: {}件", result.fields.len());
    println!("---\n");

    let mut overrides = Overrides::new();

    for (count, field) in result.fields.values().enumerate() {
        println!("[{}/{}] {}", count + 1, result.fields.len(), field.spec_name);
        if field.has_conflict {
            println!("  ⚠ 値が競合しています。選択してください");
        }
        if let Some(warning) = &field.validation_warning {
            println!("  ⚠ {}", warning);
        }

        let choice = prompt_choice(field)?;
        if !apply_choice(&mut overrides, aliases, field, &choice) {
            println!("残りは抽出値のまま採用します...");
            break;
        }
        println!();
    }

    let missing = result.missing_required(catalog);
    if !missing.is_empty() {
        println!("⚠ 必須項目が未入力: {}", missing.join(", "));
    }

    Ok(build_apply_payload(result, &overrides))
}

/// 操作選択プロンプト
fn prompt_choice(field: &FieldMatch) -> Result<ReviewChoice> {
    let choices = review_choices(field);
    let labels: Vec<&str> = choices.iter().map(|(_, label)| label.as_str()).collect();

    let index = Select::new()
        .with_prompt(format!("{} (元キー: {})", field.spec_name, field.source_key))
        .items(&labels)
        .default(0)
        .interact()
        .map_err(|e| PasteError::Interaction(e.to_string()))?;

    match &choices[index].0 {
        ReviewChoice::Override(_) => {
            let value: String = Input::new()
                .with_prompt("値")
                .with_initial_text(field.value.clone())
                .allow_empty(true)
                .interact_text()
                .map_err(|e| PasteError::Interaction(e.to_string()))?;

            if value.trim().is_empty() {
                Ok(ReviewChoice::Clear)
            } else {
                Ok(ReviewChoice::Override(value))
            }
        }
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smart_paste_common::{Alternative, Coercion, FieldType, MatchTier, UnitSuggestion};

    fn field(confidence: u8) -> FieldMatch {
        FieldMatch {
            spec_name: "Weight (kg)".into(),
            value: "1.4 lbs".into(),
            confidence,
            tier: MatchTier::Synonym,
            source_key: "Net Wt".into(),
            line_index: 2,
            alternatives: vec![Alternative {
                value: "1.6 lbs".into(),
                confidence: 70,
                source_key: "Shipping Weight".into(),
                line_index: 5,
            }],
            has_conflict: true,
            merged_count: None,
            validation_warning: None,
            unit_info: Some(UnitSuggestion {
                normalized: "0.635 kg".into(),
                value: 0.635,
                unit: smart_paste_common::Unit::Kg,
            }),
            coerced: Some(Coercion {
                coerced: "1.4".into(),
                field_type: FieldType::Number,
            }),
        }
    }

    #[test]
    fn test_review_choices() {
        let choices = review_choices(&field(75));
        let kinds: Vec<&ReviewChoice> = choices.iter().map(|(c, _)| c).collect();

        assert_eq!(kinds[0], &ReviewChoice::Accept);
        assert_eq!(kinds[1], &ReviewChoice::Alternative(0));
        assert_eq!(kinds[2], &ReviewChoice::Coerced);
        assert_eq!(kinds[3], &ReviewChoice::Converted);
        assert_eq!(kinds.last(), Some(&&ReviewChoice::Quit));
        assert!(choices[3].1.contains("0.635 kg"));
    }

    #[test]
    fn test_accept_likely_records_alias() {
        let mut overrides = Overrides::new();
        let mut aliases = AliasStore::new();

        assert!(apply_choice(&mut overrides, &mut aliases, &field(75), &ReviewChoice::Accept));
        assert!(overrides.is_empty());
        assert_eq!(aliases.lookup("Net Wt"), Some("Weight (kg)"));
    }

    #[test]
    fn test_accept_direct_does_not_record_alias() {
        let mut overrides = Overrides::new();
        let mut aliases = AliasStore::new();

        apply_choice(&mut overrides, &mut aliases, &field(95), &ReviewChoice::Accept);
        assert!(aliases.is_empty());
    }

    #[test]
    fn test_alternative_and_conversions() {
        let mut overrides = Overrides::new();
        let mut aliases = AliasStore::new();
        let f = field(90);

        apply_choice(&mut overrides, &mut aliases, &f, &ReviewChoice::Alternative(0));
        assert_eq!(overrides.fields.get("Weight (kg)").map(String::as_str), Some("1.6 lbs"));
        assert_eq!(aliases.lookup("shipping weight"), Some("Weight (kg)"));

        apply_choice(&mut overrides, &mut aliases, &f, &ReviewChoice::Converted);
        assert_eq!(overrides.fields.get("Weight (kg)").map(String::as_str), Some("0.635 kg"));

        apply_choice(&mut overrides, &mut aliases, &f, &ReviewChoice::Coerced);
        assert_eq!(overrides.fields.get("Weight (kg)").map(String::as_str), Some("1.4"));
    }

    #[test]
    fn test_override_clear_and_quit() {
        let mut overrides = Overrides::new();
        let mut aliases = AliasStore::new();
        let f = field(90);

        apply_choice(&mut overrides, &mut aliases, &f, &ReviewChoice::Override(" 640 g ".into()));
        assert_eq!(overrides.fields.get("Weight (kg)").map(String::as_str), Some("640 g"));

        apply_choice(&mut overrides, &mut aliases, &f, &ReviewChoice::Clear);
        assert_eq!(overrides.fields.get("Weight (kg)").map(String::as_str), Some(""));

        assert!(!apply_choice(&mut overrides, &mut aliases, &f, &ReviewChoice::Quit));
    }
}
