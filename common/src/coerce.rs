//! 型変換・単位換算・値の検証（いずれも提案のみ）
//!
//! 抽出した値そのものは書き換えず、FieldMatch に提案を添えるだけ。
//! 解釈できない値は「提案なし」とし、エラーにはしない。

use crate::types::{Coercion, FieldMatch, FieldType, SpecFieldDef, UnitSuggestion};
use crate::units::{self, Dimension};
use regex::Regex;

lazy_static::lazy_static! {
    static ref NUMBER_RE: Regex =
        Regex::new(r"-?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?").unwrap();
}

const TRUE_WORDS: &[&str] = &["yes", "y", "included", "available", "✓", "✔", "supported", "on"];
const FALSE_WORDS: &[&str] = &["no", "n", "none", "not included", "n/a", "na", "unavailable", "off", "✗"];

/// 項目の期待型に合わない値の変換候補
///
/// 値がすでに期待型として読める場合、または救済できない場合はNone
pub fn coerce_field_value(field: &SpecFieldDef, value: &str) -> Option<Coercion> {
    let field_type = field.effective_type();
    let literal = value.trim();
    if literal.is_empty() {
        return None;
    }

    let coerced = match field_type {
        FieldType::Text => return None,
        FieldType::Number => {
            if literal.parse::<f64>().is_ok() {
                return None;
            }
            units::format_number(first_number(literal)?)
        }
        FieldType::Integer => {
            if literal.parse::<i64>().is_ok() {
                return None;
            }
            let number = first_number(literal)?;
            if number.fract() != 0.0 {
                return None;
            }
            format!("{}", number as i64)
        }
        FieldType::Currency => {
            if literal.parse::<f64>().is_ok() {
                return None;
            }
            format!("{:.2}", first_number(literal)?)
        }
        FieldType::Boolean => {
            let lowered = literal.to_lowercase();
            if lowered == "true" || lowered == "false" {
                return None;
            }
            if TRUE_WORDS.contains(&lowered.as_str()) {
                "true".to_string()
            } else if FALSE_WORDS.contains(&lowered.as_str()) {
                "false".to_string()
            } else {
                return None;
            }
        }
    };

    Some(Coercion {
        coerced,
        field_type,
    })
}

/// 単位換算の候補（期待単位があればその単位へ、なければ優先単位系へ）
pub fn unit_suggestion(field: &SpecFieldDef, value: &str, prefer_metric: bool) -> Option<UnitSuggestion> {
    match field.effective_unit() {
        Some(target) => units::convert_to_unit(value, target),
        None => units::normalize_units(value, prefer_metric),
    }
}

/// 項目の定義と矛盾する値への警告
pub fn validate_value(field: &SpecFieldDef, value: &str) -> Option<String> {
    let numeric = matches!(
        field.effective_type(),
        FieldType::Number | FieldType::Integer | FieldType::Currency
    );
    if numeric && !value.chars().any(|c| c.is_ascii_digit()) {
        return Some(format!("{} は数値項目ですが、値に数値が含まれていません", field.name));
    }

    let expected = field.effective_unit()?;
    let (_, found) = units::first_quantity(value)?;
    if found.dimension() != expected.dimension() && expected.dimension() != Dimension::Other {
        return Some(format!(
            "{} の単位 {} は期待単位 {} と種類が異なります",
            field.name, found, expected
        ));
    }
    None
}

/// 割り当て結果に提案と警告を付加
pub fn annotate(field: &SpecFieldDef, field_match: &mut FieldMatch, prefer_metric: bool) {
    field_match.unit_info = unit_suggestion(field, &field_match.value, prefer_metric);
    field_match.coerced = coerce_field_value(field, &field_match.value);
    field_match.validation_warning = validate_value(field, &field_match.value);
}

fn first_number(text: &str) -> Option<f64> {
    NUMBER_RE
        .find_iter(text)
        .find_map(|m| units::parse_number(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MatchTier;
    use crate::units::Unit;

    fn typed(name: &str, field_type: FieldType) -> SpecFieldDef {
        SpecFieldDef::new(name).with_type(field_type)
    }

    fn coerced(field: &SpecFieldDef, value: &str) -> Option<String> {
        coerce_field_value(field, value).map(|c| c.coerced)
    }

    #[test]
    fn test_coerce_number() {
        let field = typed("CRI", FieldType::Number);
        assert_eq!(coerced(&field, "95+"), Some("95".to_string()));
        assert_eq!(coerced(&field, "approx. 1,200.5 units"), Some("1200.5".to_string()));
        assert_eq!(coerced(&field, "96"), None);
        assert_eq!(coerced(&field, "high"), None);
    }

    #[test]
    fn test_coerce_integer() {
        let field = typed("Channels", FieldType::Integer);
        assert_eq!(coerced(&field, "2 ch"), Some("2".to_string()));
        assert_eq!(coerced(&field, "24.0"), Some("24".to_string()));
        assert_eq!(coerced(&field, "2.5"), None);
        assert_eq!(coerced(&field, "8"), None);
    }

    #[test]
    fn test_coerce_currency() {
        let field = typed("Price", FieldType::Currency);
        let coercion = coerce_field_value(&field, "$3,899").unwrap();
        assert_eq!(coercion.coerced, "3899.00");
        assert_eq!(coercion.field_type, FieldType::Currency);
        assert_eq!(coerced(&field, "3899.99"), None);
    }

    #[test]
    fn test_coerce_boolean() {
        let field = typed("Phantom Power", FieldType::Boolean);
        assert_eq!(coerced(&field, "Yes"), Some("true".to_string()));
        assert_eq!(coerced(&field, "Not included"), Some("false".to_string()));
        assert_eq!(coerced(&field, "N/A"), Some("false".to_string()));
        assert_eq!(coerced(&field, "true"), None);
        assert_eq!(coerced(&field, "48V only"), None);
    }

    #[test]
    fn test_coerce_text_never_suggests() {
        let field = SpecFieldDef::new("Color");
        assert_eq!(coerced(&field, "$5"), None);
        assert_eq!(coerced(&field, ""), None);
    }

    #[test]
    fn test_unit_suggestion_uses_field_unit() {
        let field = SpecFieldDef::new("Weight (kg)");
        let suggestion = unit_suggestion(&field, "1.4 lbs", false).unwrap();
        assert_eq!(suggestion.normalized, "0.635 kg");
        assert_eq!(suggestion.unit, Unit::Kg);
    }

    #[test]
    fn test_unit_suggestion_preferred_system() {
        let field = SpecFieldDef::new("Dimensions");
        let suggestion = unit_suggestion(&field, "10 x 5 x 3 in", true).unwrap();
        assert_eq!(suggestion.normalized, "25.4 x 12.7 x 7.62 cm");
        assert!(unit_suggestion(&field, "Black", true).is_none());
    }

    #[test]
    fn test_validate_value() {
        let weight = SpecFieldDef::new("Weight (kg)");
        assert!(validate_value(&weight, "1.4 lbs").is_none());
        let warning = validate_value(&weight, "12 cm").unwrap();
        assert!(warning.contains("cm"));

        let cri = typed("CRI", FieldType::Number);
        assert!(validate_value(&cri, "high").is_some());
        assert!(validate_value(&cri, "95").is_none());
    }

    #[test]
    fn test_annotate() {
        let field = SpecFieldDef::new("Weight (kg)");
        let mut field_match = FieldMatch {
            spec_name: field.name.clone(),
            value: "1.4 lbs".to_string(),
            confidence: 84,
            tier: MatchTier::Synonym,
            source_key: "Weight".to_string(),
            line_index: 2,
            alternatives: vec![],
            has_conflict: false,
            merged_count: None,
            validation_warning: None,
            unit_info: None,
            coerced: None,
        };
        annotate(&field, &mut field_match, true);

        assert_eq!(field_match.value, "1.4 lbs", "元の値は変更しない");
        assert!(field_match.unit_info.is_some());
        assert!(field_match.coerced.is_none());
        assert!(field_match.validation_warning.is_none());
    }
}
