//! 抽出結果の型定義
//!
//! パイプラインの各段で受け渡される型:
//! - RawPair: 行から取り出した key/value 候補
//! - FieldMatch: スペック項目への割り当て結果（信頼度・代替候補・競合情報つき）
//! - ParseResult: 1製品ぶんの不変な抽出結果

use crate::units::{self, Unit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 「確実」とみなす信頼度の下限
pub const DIRECT_MIN: u8 = 85;
/// 「有力」とみなす信頼度の下限
pub const LIKELY_MIN: u8 = 60;

/// 入力の出どころ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    #[default]
    Paste,
    File,
    Url,
}

/// 正規化済みテキスト（1行 = 抽出単位）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedText {
    pub lines: Vec<String>,
}

impl NormalizedText {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn is_blank(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }
}

/// フィールドが期待する値の型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Integer,
    Boolean,
    Currency,
}

/// スペック項目の定義
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecFieldDef {
    pub name: String,

    #[serde(default)]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_unit: Option<Unit>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_type: Option<FieldType>,
}

impl SpecFieldDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: false,
            expected_unit: None,
            expected_type: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.expected_unit = Some(unit);
        self
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.expected_type = Some(field_type);
        self
    }

    /// 期待単位（未指定ならフィールド名の単位表記から推定）
    pub fn effective_unit(&self) -> Option<Unit> {
        self.expected_unit
            .or_else(|| units::unit_from_field_name(&self.name))
    }

    pub fn effective_type(&self) -> FieldType {
        self.expected_type.unwrap_or_default()
    }
}

/// 行から抽出した key/value 候補（発見順を保持）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPair {
    pub key: String,
    pub value: String,
    pub line_index: usize,
}

impl RawPair {
    pub fn new(key: impl Into<String>, value: impl Into<String>, line_index: usize) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            line_index,
        }
    }
}

/// どの照合方式で割り当てたか
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Alias,
    Exact,
    Synonym,
    Fuzzy,
}

/// 画面に出す信頼度ラベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    Direct,
    Likely,
    Fuzzy,
}

impl ConfidenceTier {
    pub fn from_confidence(confidence: u8) -> Self {
        if confidence >= DIRECT_MIN {
            ConfidenceTier::Direct
        } else if confidence >= LIKELY_MIN {
            ConfidenceTier::Likely
        } else {
            ConfidenceTier::Fuzzy
        }
    }
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceTier::Direct => write!(f, "確実"),
            ConfidenceTier::Likely => write!(f, "有力"),
            ConfidenceTier::Fuzzy => write!(f, "推定"),
        }
    }
}

/// 単位換算の提案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSuggestion {
    /// 換算後の表記（例: "0.635 kg"）
    pub normalized: String,
    pub value: f64,
    pub unit: Unit,
}

/// 型変換の提案
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coercion {
    pub coerced: String,
    pub field_type: FieldType,
}

/// 採用されなかった（または同点の）候補
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alternative {
    pub value: String,
    pub confidence: u8,
    pub source_key: String,
    pub line_index: usize,
}

/// スペック項目への割り当て結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMatch {
    pub spec_name: String,
    pub value: String,
    /// 0..=100
    pub confidence: u8,
    pub tier: MatchTier,
    pub source_key: String,
    pub line_index: usize,
    /// 信頼度の降順
    #[serde(default)]
    pub alternatives: Vec<Alternative>,
    #[serde(default)]
    pub has_conflict: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_warning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_info: Option<UnitSuggestion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coerced: Option<Coercion>,
}

impl FieldMatch {
    pub fn confidence_tier(&self) -> ConfidenceTier {
        ConfidenceTier::from_confidence(self.confidence)
    }

    /// 選択中の値と代替候補の値（重複除去なし、表示順）
    pub fn candidate_values(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.value.as_str())
            .chain(self.alternatives.iter().map(|a| a.value.as_str()))
    }
}

/// 1製品ぶんの抽出結果
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseResult {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub source_kind: SourceKind,
    /// 判定カテゴリで絞り込んだ割り当て
    #[serde(default)]
    pub fields: BTreeMap<String, FieldMatch>,
    /// カテゴリに依存しない全割り当て（カテゴリ変更時の再絞り込み用）
    #[serde(default)]
    pub catalog_matches: BTreeMap<String, FieldMatch>,
    #[serde(default)]
    pub raw_extracted: Vec<RawPair>,
    #[serde(default)]
    pub unmatched_pairs: Vec<RawPair>,
    #[serde(default)]
    pub source_lines: Vec<String>,
}

/// 複数製品入力の区間（行番号は0始まり・両端含む）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub name: String,
    pub start_line: usize,
    pub end_line: usize,
}

/// 区間ごとの抽出結果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    pub segment: Segment,
    pub result: ParseResult,
}

/// 差分の種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffStatus {
    Unchanged,
    Changed,
    Added,
    Removed,
}

impl std::fmt::Display for DiffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffStatus::Unchanged => write!(f, "変更なし"),
            DiffStatus::Changed => write!(f, "変更"),
            DiffStatus::Added => write!(f, "追加"),
            DiffStatus::Removed => write!(f, "削除"),
        }
    }
}

/// 項目ごとの差分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffEntry {
    pub spec_name: String,
    pub status: DiffStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
}

/// 学習済みエイリアス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasRecord {
    /// 正規化済みの元キー
    pub source_key: String,
    pub spec_name: String,
    pub confirmed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_tier_boundaries() {
        assert_eq!(ConfidenceTier::from_confidence(100), ConfidenceTier::Direct);
        assert_eq!(ConfidenceTier::from_confidence(85), ConfidenceTier::Direct);
        assert_eq!(ConfidenceTier::from_confidence(84), ConfidenceTier::Likely);
        assert_eq!(ConfidenceTier::from_confidence(60), ConfidenceTier::Likely);
        assert_eq!(ConfidenceTier::from_confidence(59), ConfidenceTier::Fuzzy);
        assert_eq!(ConfidenceTier::from_confidence(0), ConfidenceTier::Fuzzy);
    }

    #[test]
    fn test_spec_field_effective_unit() {
        let field = SpecFieldDef::new("Weight (kg)");
        assert_eq!(field.effective_unit(), Some(Unit::Kg));

        let explicit = SpecFieldDef::new("Weight").with_unit(Unit::Lb);
        assert_eq!(explicit.effective_unit(), Some(Unit::Lb));

        assert_eq!(SpecFieldDef::new("Color").effective_unit(), None);
        assert_eq!(SpecFieldDef::new("Color").effective_type(), FieldType::Text);
    }

    #[test]
    fn test_spec_field_deserialize() {
        let json = r#"{"name": "Price", "required": true, "expectedType": "currency"}"#;
        let field: SpecFieldDef = serde_json::from_str(json).expect("デシリアライズ失敗");
        assert_eq!(field.name, "Price");
        assert!(field.required);
        assert_eq!(field.expected_type, Some(FieldType::Currency));
        assert_eq!(field.expected_unit, None);
    }

    #[test]
    fn test_field_match_serialize_camel_case() {
        let field = FieldMatch {
            spec_name: "Weight (kg)".to_string(),
            value: "1.4 lbs".to_string(),
            confidence: 84,
            tier: MatchTier::Synonym,
            source_key: "Weight".to_string(),
            line_index: 2,
            alternatives: vec![],
            has_conflict: false,
            merged_count: None,
            validation_warning: None,
            unit_info: Some(UnitSuggestion {
                normalized: "0.635 kg".to_string(),
                value: 0.635,
                unit: Unit::Kg,
            }),
            coerced: None,
        };

        let json = serde_json::to_string(&field).expect("シリアライズ失敗");
        assert!(json.contains("\"specName\":\"Weight (kg)\""));
        assert!(json.contains("\"hasConflict\":false"));
        assert!(json.contains("\"unitInfo\":{\"normalized\":\"0.635 kg\""));
        assert!(json.contains("\"unit\":\"kg\""));
        assert!(!json.contains("mergedCount"));
    }

    #[test]
    fn test_parse_result_deserialize_minimal() {
        let json = r#"{"name": "EOS R5"}"#;
        let result: ParseResult = serde_json::from_str(json).expect("デシリアライズ失敗");
        assert_eq!(result.name, "EOS R5");
        assert!(result.fields.is_empty());
        assert_eq!(result.source_kind, SourceKind::Paste);
    }

    #[test]
    fn test_normalized_text_is_blank() {
        assert!(NormalizedText::new(vec!["".into(), "  ".into()]).is_blank());
        assert!(!NormalizedText::new(vec!["Brand: Canon".into()]).is_blank());
    }
}
