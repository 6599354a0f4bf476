//! 既存レコードとの差分
//!
//! 既存のスペック値と新しい抽出結果を項目ごとに比較し、
//! 変更なし / 変更 / 追加 / 削除 に分類する。
//! 順序は既存の項目順、その後に新規のみの項目（項目名順）。

use crate::text;
use crate::types::{DiffEntry, DiffStatus, FieldMatch};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// 既存スペックと抽出結果を比較
///
/// 既存側の空の値は「値なし」として扱う
pub fn diff_specs(existing: &[(String, String)], fresh: &BTreeMap<String, FieldMatch>) -> Vec<DiffEntry> {
    let mut entries = Vec::new();
    let mut seen = HashSet::new();

    for (name, old_value) in existing {
        if !seen.insert(name.as_str()) {
            continue;
        }

        let old = Some(old_value.trim()).filter(|v| !v.is_empty());
        let new = fresh.get(name).map(|m| m.value.trim());

        let status = match (old, new) {
            (Some(old), Some(new)) if text::materially_equal(old, new) => DiffStatus::Unchanged,
            (Some(_), Some(_)) => DiffStatus::Changed,
            (Some(_), None) => DiffStatus::Removed,
            (None, Some(_)) => DiffStatus::Added,
            (None, None) => continue,
        };

        entries.push(DiffEntry {
            spec_name: name.clone(),
            status,
            old_value: old.map(str::to_string),
            new_value: new.map(str::to_string),
        });
    }

    for (name, field_match) in fresh {
        if seen.contains(name.as_str()) {
            continue;
        }
        entries.push(DiffEntry {
            spec_name: name.clone(),
            status: DiffStatus::Added,
            old_value: None,
            new_value: Some(field_match.value.trim().to_string()),
        });
    }

    tracing::debug!(entries = entries.len(), "差分を計算");
    entries
}

/// 差分の集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    pub unchanged: usize,
    pub changed: usize,
    pub added: usize,
    pub removed: usize,
}

impl DiffSummary {
    pub fn from_entries(entries: &[DiffEntry]) -> Self {
        let mut summary = Self::default();
        for entry in entries {
            match entry.status {
                DiffStatus::Unchanged => summary.unchanged += 1,
                DiffStatus::Changed => summary.changed += 1,
                DiffStatus::Added => summary.added += 1,
                DiffStatus::Removed => summary.removed += 1,
            }
        }
        summary
    }

    pub fn has_changes(&self) -> bool {
        self.changed + self.added + self.removed > 0
    }
}

impl std::fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "変更なし {} / 変更 {} / 追加 {} / 削除 {}",
            self.unchanged, self.changed, self.added, self.removed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MatchTier;

    fn field(name: &str, value: &str) -> (String, FieldMatch) {
        (
            name.to_string(),
            FieldMatch {
                spec_name: name.to_string(),
                value: value.to_string(),
                confidence: 100,
                tier: MatchTier::Exact,
                source_key: name.to_string(),
                line_index: 0,
                alternatives: vec![],
                has_conflict: false,
                merged_count: None,
                validation_warning: None,
                unit_info: None,
                coerced: None,
            },
        )
    }

    fn existing(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_all_statuses_and_order() {
        let old = existing(&[("Weight (kg)", "0.7"), ("Color", "Black"), ("Mount", "EF"), ("Battery", "")]);
        let fresh: BTreeMap<_, _> = [
            field("Color", "black"),
            field("Weight (kg)", "0.738"),
            field("Battery", "LP-E6NH"),
            field("Aperture", "f/2.8"),
        ]
        .into_iter()
        .collect();

        let entries = diff_specs(&old, &fresh);
        let statuses: Vec<(&str, DiffStatus)> = entries
            .iter()
            .map(|e| (e.spec_name.as_str(), e.status))
            .collect();

        assert_eq!(
            statuses,
            vec![
                ("Weight (kg)", DiffStatus::Changed),
                ("Color", DiffStatus::Unchanged),
                ("Mount", DiffStatus::Removed),
                ("Battery", DiffStatus::Added),
                ("Aperture", DiffStatus::Added),
            ]
        );
        assert_eq!(entries[0].old_value.as_deref(), Some("0.7"));
        assert_eq!(entries[0].new_value.as_deref(), Some("0.738"));
        assert_eq!(entries[2].new_value, None);
    }

    #[test]
    fn test_diff_against_itself_is_unchanged() {
        let fresh: BTreeMap<_, _> = [field("Color", "Black"), field("Mount", "RF")].into_iter().collect();
        let old: Vec<(String, String)> = fresh
            .iter()
            .map(|(k, m)| (k.clone(), m.value.clone()))
            .collect();

        let entries = diff_specs(&old, &fresh);
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.status == DiffStatus::Unchanged));
        assert!(!DiffSummary::from_entries(&entries).has_changes());
    }

    #[test]
    fn test_empty_inputs() {
        assert!(diff_specs(&[], &BTreeMap::new()).is_empty());
        let only_blank = existing(&[("Color", " ")]);
        assert!(diff_specs(&only_blank, &BTreeMap::new()).is_empty());
    }

    #[test]
    fn test_duplicate_existing_names_use_first() {
        let old = existing(&[("Color", "Black"), ("Color", "White")]);
        let fresh: BTreeMap<_, _> = [field("Color", "Black")].into_iter().collect();
        let entries = diff_specs(&old, &fresh);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].status, DiffStatus::Unchanged);
    }

    #[test]
    fn test_summary() {
        let old = existing(&[("A", "1"), ("B", "2")]);
        let fresh: BTreeMap<_, _> = [field("A", "1"), field("C", "3")].into_iter().collect();
        let summary = DiffSummary::from_entries(&diff_specs(&old, &fresh));

        assert_eq!(summary, DiffSummary { unchanged: 1, changed: 0, added: 1, removed: 1 });
        assert!(summary.has_changes());
        assert_eq!(summary.to_string(), "変更なし 1 / 変更 0 / 追加 1 / 削除 1");
    }
}
