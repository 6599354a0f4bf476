//! 同一項目に複数候補がある場合の統合と競合判定
//!
//! ## 処理フロー
//! 1. 項目ごとに候補を行順にまとめる
//! 2. 隣接行の断片（"10 in W" / "5 in H"、"10 x" / "5 x 3 in"）を1つの値に統合
//! 3. 信頼度の降順に並べ、先頭を採用値、残りを代替候補にする
//! 4. 採用値と異なる値が同じ信頼度ランクにあれば競合

use crate::matcher::Candidate;
use crate::text;
use crate::types::{Alternative, ConfidenceTier, FieldMatch, MatchTier};
use regex::Regex;
use std::collections::BTreeMap;

lazy_static::lazy_static! {
    static ref TRAILING_CONNECTOR_RE: Regex =
        Regex::new(r"(?i)(?:\s(?:x|and)|[×,+&])\s*$").unwrap();
    static ref LEADING_CONNECTOR_RE: Regex =
        Regex::new(r"(?i)^\s*(?:(?:x|and)\s|[×,+&])").unwrap();
    static ref AXIS_RE: Regex =
        Regex::new(r"(?i)(?:^|[\s(\[])(w|h|d|l|width|height|depth|length)(?:$|[\s)\]:])").unwrap();
}

/// 統合後の1候補
#[derive(Debug, Clone)]
struct Merged {
    value: String,
    confidence: u8,
    tier: MatchTier,
    source_key: String,
    line_index: usize,
    fragments: usize,
}

/// 候補を項目ごとの割り当てに解決
pub fn resolve(candidates: &[Candidate]) -> BTreeMap<String, FieldMatch> {
    let mut groups: Vec<(String, Vec<&Candidate>)> = Vec::new();
    for candidate in candidates {
        match groups.iter_mut().find(|(name, _)| *name == candidate.spec_name) {
            Some((_, group)) => group.push(candidate),
            None => groups.push((candidate.spec_name.clone(), vec![candidate])),
        }
    }

    groups
        .into_iter()
        .filter_map(|(name, mut group)| {
            group.sort_by_key(|c| c.pair.line_index);
            let field = resolve_group(&name, merge_fragments(&group))?;
            Some((name, field))
        })
        .collect()
}

/// 隣接行の断片を統合
fn merge_fragments(group: &[&Candidate]) -> Vec<Merged> {
    let mut merged: Vec<Merged> = Vec::new();
    let mut last_line: Option<usize> = None;
    let mut last_value = String::new();
    let mut last_axis: Option<String> = None;

    for candidate in group {
        let axis = axis_label(candidate);
        let adjacent = last_line.is_some_and(|line| line + 1 == candidate.pair.line_index);

        let join = if adjacent {
            continuation(&last_value, last_axis.as_deref(), &candidate.pair.value, axis.as_deref())
        } else {
            None
        };

        match (join, merged.last_mut()) {
            (Some(separator), Some(current)) => {
                current.value = format!("{}{}{}", current.value, separator, candidate.pair.value.trim());
                current.fragments += 1;
                if candidate.confidence > current.confidence {
                    current.confidence = candidate.confidence;
                    current.tier = candidate.tier;
                }
            }
            _ => merged.push(Merged {
                value: candidate.pair.value.trim().to_string(),
                confidence: candidate.confidence,
                tier: candidate.tier,
                source_key: candidate.pair.key.clone(),
                line_index: candidate.pair.line_index,
                fragments: 1,
            }),
        }

        last_line = Some(candidate.pair.line_index);
        last_value = candidate.pair.value.clone();
        last_axis = axis;
    }

    merged
}

/// 直前の断片に続く値なら、連結に使う区切りを返す
fn continuation(
    previous: &str,
    previous_axis: Option<&str>,
    next: &str,
    next_axis: Option<&str>,
) -> Option<&'static str> {
    if let (Some(a), Some(b)) = (previous_axis, next_axis) {
        if a != b {
            return Some(" x ");
        }
    }
    if TRAILING_CONNECTOR_RE.is_match(previous) || LEADING_CONNECTOR_RE.is_match(next) {
        return Some(" ");
    }
    None
}

/// キーまたは値に含まれる軸ラベル（幅・高さ・奥行・長さ）
fn axis_label(candidate: &Candidate) -> Option<String> {
    [&candidate.pair.key, &candidate.pair.value]
        .iter()
        .find_map(|part| AXIS_RE.captures(part))
        .map(|cap| match cap[1].to_lowercase().as_str() {
            "w" | "width" => "w".to_string(),
            "h" | "height" => "h".to_string(),
            "d" | "depth" => "d".to_string(),
            _ => "l".to_string(),
        })
}

fn resolve_group(name: &str, mut entries: Vec<Merged>) -> Option<FieldMatch> {
    // 安定ソート: 同点は行順
    entries.sort_by(|a, b| b.confidence.cmp(&a.confidence));

    let mut iter = entries.into_iter();
    let selected = iter.next()?;

    let alternatives: Vec<Alternative> = iter
        .map(|m| Alternative {
            value: m.value,
            confidence: m.confidence,
            source_key: m.source_key,
            line_index: m.line_index,
        })
        .collect();

    let selected_tier = ConfidenceTier::from_confidence(selected.confidence);
    let has_conflict = alternatives.iter().any(|alt| {
        !text::materially_equal(&alt.value, &selected.value)
            && ConfidenceTier::from_confidence(alt.confidence) == selected_tier
    });

    if has_conflict {
        tracing::debug!(field = name, candidates = alternatives.len() + 1, "値が競合");
    }

    Some(FieldMatch {
        spec_name: name.to_string(),
        value: selected.value,
        confidence: selected.confidence,
        tier: selected.tier,
        source_key: selected.source_key,
        line_index: selected.line_index,
        alternatives,
        has_conflict,
        merged_count: (selected.fragments > 1).then_some(selected.fragments),
        validation_warning: None,
        unit_info: None,
        coerced: None,
    })
}
