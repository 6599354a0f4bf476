//! 登録用ペイロードの組み立て
//!
//! 抽出結果そのものは変更せず、利用者の選択（上書き・クリア）を
//! `Overrides` として別に持ち、最後に合成する。

use crate::attributes;
use crate::types::ParseResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 利用者による上書き
///
/// 値が空文字列の場合はクリア（項目は出力しない / 属性は空にする）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Overrides {
    pub fields: BTreeMap<String, String>,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub purchase_price: Option<String>,
    pub model_number: Option<String>,
    pub serial_number: Option<String>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// 項目の値を選択（候補の採用・手入力）
    pub fn select(&mut self, spec_name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(spec_name.into(), value.into());
    }

    /// 項目をクリア
    pub fn clear(&mut self, spec_name: impl Into<String>) {
        self.fields.insert(spec_name.into(), String::new());
    }

    /// 上書きを取り消して抽出値に戻す
    pub fn reset(&mut self, spec_name: &str) {
        self.fields.remove(spec_name);
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// 機材レコードへ書き込む内容
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyPayload {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    pub specs: BTreeMap<String, String>,
}

/// 抽出結果と上書きからペイロードを作る（純粋関数）
pub fn build_apply_payload(result: &ParseResult, overrides: &Overrides) -> ApplyPayload {
    let specs = result
        .fields
        .iter()
        .filter_map(|(name, field_match)| {
            let value = overrides
                .fields
                .get(name)
                .map(|v| v.trim())
                .unwrap_or_else(|| field_match.value.trim());
            (!value.is_empty()).then(|| (name.clone(), value.to_string()))
        })
        .collect();

    let purchase_price = match overrides.purchase_price.as_deref().map(str::trim) {
        None => result.purchase_price,
        Some("") => None,
        // 数値にならない入力は元の価格を維持
        Some(text) => attributes::parse_price(text).or(result.purchase_price),
    };

    ApplyPayload {
        name: overrides
            .name
            .as_deref()
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|| result.name.clone()),
        brand: apply_attribute(&result.brand, &overrides.brand),
        category: apply_attribute(&result.category, &overrides.category),
        purchase_price,
        model_number: apply_attribute(&result.model_number, &overrides.model_number),
        serial_number: apply_attribute(&result.serial_number, &overrides.serial_number),
        specs,
    }
}

fn apply_attribute(original: &Option<String>, override_value: &Option<String>) -> Option<String> {
    match override_value.as_deref().map(str::trim) {
        None => original.clone(),
        Some("") => None,
        Some(value) => Some(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasStore;
    use crate::catalog::SpecCatalog;
    use crate::pipeline::parse_text;

    fn sample() -> ParseResult {
        let catalog = SpecCatalog::from_preset("gear").unwrap();
        let aliases = AliasStore::new();
        parse_text(
            "Canon RF 24-70mm F2.8 L IS USM\nBrand: Canon\nPrice: $2,399\nFocal Length: 24-70mm\nAperture: f/2.8\nLens Mount: Canon RF\nFilter Size: 82 mm",
            &catalog,
            &aliases,
        )
        .unwrap()
    }

    #[test]
    fn test_payload_without_overrides() {
        let result = sample();
        let payload = build_apply_payload(&result, &Overrides::new());

        assert_eq!(payload.name, result.name);
        assert_eq!(payload.brand.as_deref(), Some("Canon"));
        assert_eq!(payload.purchase_price, Some(2399.0));
        assert_eq!(payload.specs.len(), result.fields.len());
        for (name, field_match) in &result.fields {
            assert_eq!(payload.specs.get(name), Some(&field_match.value), "{} の値", name);
        }
    }

    #[test]
    fn test_field_override_and_clear() {
        let result = sample();
        let mut overrides = Overrides::new();
        overrides.select("Aperture", "f/2.8 - f/22");
        overrides.clear("Lens Mount");
        overrides.select("Not A Field", "ignored");

        let payload = build_apply_payload(&result, &overrides);
        assert_eq!(payload.specs.get("Aperture").map(String::as_str), Some("f/2.8 - f/22"));
        assert!(!payload.specs.contains_key("Lens Mount"), "クリアした項目は出力しない");
        assert!(!payload.specs.contains_key("Not A Field"));

        overrides.reset("Lens Mount");
        let payload = build_apply_payload(&result, &overrides);
        assert!(payload.specs.contains_key("Lens Mount"));
    }

    #[test]
    fn test_top_level_overrides() {
        let result = sample();
        let overrides = Overrides {
            brand: Some(String::new()),
            category: Some("Camera".to_string()),
            serial_number: Some(" 12345 ".to_string()),
            ..Overrides::default()
        };

        let payload = build_apply_payload(&result, &overrides);
        assert_eq!(payload.brand, None);
        assert_eq!(payload.category.as_deref(), Some("Camera"));
        assert_eq!(payload.serial_number.as_deref(), Some("12345"));
        assert_eq!(payload.model_number, result.model_number);
    }

    #[test]
    fn test_price_override() {
        let result = sample();

        let mut overrides = Overrides {
            purchase_price: Some("$1,999.50".to_string()),
            ..Overrides::default()
        };
        assert_eq!(build_apply_payload(&result, &overrides).purchase_price, Some(1999.5));

        overrides.purchase_price = Some("unknown".to_string());
        assert_eq!(build_apply_payload(&result, &overrides).purchase_price, Some(2399.0));

        overrides.purchase_price = Some(String::new());
        assert_eq!(build_apply_payload(&result, &overrides).purchase_price, None);
    }

    #[test]
    fn test_payload_is_pure() {
        let result = sample();
        let mut overrides = Overrides::new();
        overrides.select("Filter Size (mm)", "82");

        let first = build_apply_payload(&result, &overrides);
        let second = build_apply_payload(&result, &overrides);
        assert_eq!(first, second);
        assert_eq!(result, sample(), "抽出結果は変更されない");
    }

    #[test]
    fn test_overrides_serde_and_empty() {
        assert!(Overrides::new().is_empty());

        let overrides: Overrides =
            serde_json::from_str(r#"{"fields":{"Color":"Black"},"purchasePrice":"100"}"#).unwrap();
        assert!(!overrides.is_empty());
        assert_eq!(overrides.fields.get("Color").map(String::as_str), Some("Black"));
        assert_eq!(overrides.purchase_price.as_deref(), Some("100"));
    }
}
