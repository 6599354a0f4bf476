//! 単位の検出と換算
//!
//! 値に含まれる「数値+単位」を検出し、優先する単位系（メートル法/ヤード・ポンド法）
//! またはフィールドが期待する単位へ換算した候補を返す。
//! 換算はあくまで提案であり、抽出した生の値は書き換えない。

use crate::types::UnitSuggestion;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// 物理量の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Length,
    Mass,
    Volume,
    Temperature,
    /// 換算対象外（電力量・電圧など）
    Other,
}

/// 単位系
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitSystem {
    Metric,
    Imperial,
    Neutral,
}

/// 認識できる単位
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Unit {
    #[serde(rename = "mm")]
    Mm,
    #[serde(rename = "cm")]
    Cm,
    #[serde(rename = "m")]
    M,
    #[serde(rename = "km")]
    Km,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "ft")]
    Ft,
    #[serde(rename = "yd")]
    Yd,
    #[serde(rename = "mi")]
    Mi,
    #[serde(rename = "g")]
    G,
    #[serde(rename = "kg")]
    Kg,
    #[serde(rename = "oz")]
    Oz,
    #[serde(rename = "lb")]
    Lb,
    #[serde(rename = "ml")]
    Ml,
    #[serde(rename = "L")]
    L,
    #[serde(rename = "fl oz")]
    FlOz,
    #[serde(rename = "gal")]
    Gal,
    #[serde(rename = "°C")]
    Celsius,
    #[serde(rename = "°F")]
    Fahrenheit,
    #[serde(rename = "Wh")]
    Wh,
    #[serde(rename = "mAh")]
    MAh,
    #[serde(rename = "W")]
    W,
    #[serde(rename = "V")]
    V,
}

impl Unit {
    /// 表記ゆれを含む単位トークンを解釈
    pub fn parse(token: &str) -> Option<Self> {
        let t: String = token
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '.')
            .collect();

        let unit = match t.as_str() {
            "mm" | "millimeter" | "millimeters" | "millimetre" | "millimetres" => Unit::Mm,
            "cm" | "centimeter" | "centimeters" | "centimetre" | "centimetres" => Unit::Cm,
            "m" | "meter" | "meters" | "metre" | "metres" => Unit::M,
            "km" | "kilometer" | "kilometers" | "kilometre" | "kilometres" => Unit::Km,
            "in" | "inch" | "inches" | "\"" | "″" => Unit::In,
            "ft" | "foot" | "feet" => Unit::Ft,
            "yd" | "yard" | "yards" => Unit::Yd,
            "mi" | "mile" | "miles" => Unit::Mi,
            "g" | "gram" | "grams" => Unit::G,
            "kg" | "kgs" | "kilogram" | "kilograms" => Unit::Kg,
            "oz" | "ounce" | "ounces" => Unit::Oz,
            "lb" | "lbs" | "pound" | "pounds" => Unit::Lb,
            "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => Unit::Ml,
            "l" | "liter" | "liters" | "litre" | "litres" => Unit::L,
            "floz" => Unit::FlOz,
            "gal" | "gallon" | "gallons" => Unit::Gal,
            "°c" | "℃" | "celsius" => Unit::Celsius,
            "°f" | "℉" | "fahrenheit" => Unit::Fahrenheit,
            "wh" => Unit::Wh,
            "mah" => Unit::MAh,
            "w" | "watt" | "watts" => Unit::W,
            "v" | "volt" | "volts" => Unit::V,
            _ => return None,
        };
        Some(unit)
    }

    /// 表示用の記号
    pub fn symbol(&self) -> &'static str {
        match self {
            Unit::Mm => "mm",
            Unit::Cm => "cm",
            Unit::M => "m",
            Unit::Km => "km",
            Unit::In => "in",
            Unit::Ft => "ft",
            Unit::Yd => "yd",
            Unit::Mi => "mi",
            Unit::G => "g",
            Unit::Kg => "kg",
            Unit::Oz => "oz",
            Unit::Lb => "lb",
            Unit::Ml => "ml",
            Unit::L => "L",
            Unit::FlOz => "fl oz",
            Unit::Gal => "gal",
            Unit::Celsius => "°C",
            Unit::Fahrenheit => "°F",
            Unit::Wh => "Wh",
            Unit::MAh => "mAh",
            Unit::W => "W",
            Unit::V => "V",
        }
    }

    pub fn dimension(&self) -> Dimension {
        match self {
            Unit::Mm | Unit::Cm | Unit::M | Unit::Km | Unit::In | Unit::Ft | Unit::Yd | Unit::Mi => {
                Dimension::Length
            }
            Unit::G | Unit::Kg | Unit::Oz | Unit::Lb => Dimension::Mass,
            Unit::Ml | Unit::L | Unit::FlOz | Unit::Gal => Dimension::Volume,
            Unit::Celsius | Unit::Fahrenheit => Dimension::Temperature,
            Unit::Wh | Unit::MAh | Unit::W | Unit::V => Dimension::Other,
        }
    }

    pub fn system(&self) -> UnitSystem {
        match self {
            Unit::Mm | Unit::Cm | Unit::M | Unit::Km | Unit::G | Unit::Kg | Unit::Ml | Unit::L
            | Unit::Celsius => UnitSystem::Metric,
            Unit::In | Unit::Ft | Unit::Yd | Unit::Mi | Unit::Oz | Unit::Lb | Unit::FlOz
            | Unit::Gal | Unit::Fahrenheit => UnitSystem::Imperial,
            Unit::Wh | Unit::MAh | Unit::W | Unit::V => UnitSystem::Neutral,
        }
    }

    /// もう一方の単位系での標準的な換算先
    pub fn counterpart(&self) -> Option<Unit> {
        let unit = match self {
            Unit::Mm | Unit::Cm => Unit::In,
            Unit::M => Unit::Ft,
            Unit::Km => Unit::Mi,
            Unit::G => Unit::Oz,
            Unit::Kg => Unit::Lb,
            Unit::Ml => Unit::FlOz,
            Unit::L => Unit::Gal,
            Unit::Celsius => Unit::Fahrenheit,
            Unit::In => Unit::Cm,
            Unit::Ft | Unit::Yd => Unit::M,
            Unit::Mi => Unit::Km,
            Unit::Oz => Unit::G,
            Unit::Lb => Unit::Kg,
            Unit::FlOz => Unit::Ml,
            Unit::Gal => Unit::L,
            Unit::Fahrenheit => Unit::Celsius,
            Unit::Wh | Unit::MAh | Unit::W | Unit::V => return None,
        };
        Some(unit)
    }

    /// 基準単位（m / kg / L）への係数。温度と換算対象外はNone
    fn base_factor(&self) -> Option<f64> {
        let factor = match self {
            Unit::Mm => 0.001,
            Unit::Cm => 0.01,
            Unit::M => 1.0,
            Unit::Km => 1000.0,
            Unit::In => 0.0254,
            Unit::Ft => 0.3048,
            Unit::Yd => 0.9144,
            Unit::Mi => 1609.344,
            Unit::G => 0.001,
            Unit::Kg => 1.0,
            Unit::Oz => 0.028_349_523_125,
            Unit::Lb => 0.453_592_37,
            Unit::Ml => 0.001,
            Unit::L => 1.0,
            Unit::FlOz => 0.029_573_529_562_5,
            Unit::Gal => 3.785_411_784,
            _ => return None,
        };
        Some(factor)
    }
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// 数値を単位間で換算
pub fn convert(value: f64, from: Unit, to: Unit) -> Option<f64> {
    if from.dimension() != to.dimension() || from.dimension() == Dimension::Other {
        return None;
    }
    if from == to {
        return Some(value);
    }

    match (from, to) {
        (Unit::Celsius, Unit::Fahrenheit) => Some(value * 9.0 / 5.0 + 32.0),
        (Unit::Fahrenheit, Unit::Celsius) => Some((value - 32.0) * 5.0 / 9.0),
        _ => Some(value * from.base_factor()? / to.base_factor()?),
    }
}

lazy_static::lazy_static! {
    // 「10 x 5 x 3 in」のような寸法列にも対応（先行する数値は省略可）
    static ref QUANTITY_RE: Regex = Regex::new(concat!(
        r"(?i)(?:(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*(?:x|×|by)\s*)?",
        r"(?:(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*(?:x|×|by)\s*)?",
        r"(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)\s*",
        r"(°\s*[cf]\b|℃|℉|fl\.?\s*oz\b|mah\b|wh\b|kgs?\b|kilograms?\b|grams?\b|g\b|lbs?\b|pounds?\b|",
        r"oz\b|ounces?\b|mm\b|millimet(?:er|re)s?\b|cm\b|centimet(?:er|re)s?\b|km\b|kilomet(?:er|re)s?\b|",
        r#"met(?:er|re)s?\b|m\b|inch(?:es)?\b|in\b|"|ft\b|feet\b|foot\b|yd\b|yards?\b|miles?\b|mi\b|"#,
        r"ml\b|millilit(?:er|re)s?\b|lit(?:er|re)s?\b|l\b|gal(?:lons?)?\b|watts?\b|w\b|volts?\b|v\b)"
    ))
    .unwrap();

    // フィールド名末尾の単位表記 "Weight (kg)" / "Length [mm]"
    static ref FIELD_UNIT_RE: Regex = Regex::new(r"[(\[]\s*([^)\]]+?)\s*[)\]]\s*$").unwrap();
}

/// テキストから最初の「数値+単位」を取り出す
pub fn first_quantity(text: &str) -> Option<(f64, Unit)> {
    QUANTITY_RE.captures_iter(text).find_map(|cap| {
        let value = parse_number(&cap[3])?;
        let unit = Unit::parse(&cap[4])?;
        Some((value, unit))
    })
}

/// フィールド名の単位表記から期待単位を推定
pub fn unit_from_field_name(name: &str) -> Option<Unit> {
    FIELD_UNIT_RE
        .captures(name)
        .and_then(|cap| Unit::parse(&cap[1]))
}

/// 優先する単位系へ換算した候補を返す
///
/// 単位が見つからない、または既に優先単位系の場合はNone
pub fn normalize_units(value: &str, prefer_metric: bool) -> Option<UnitSuggestion> {
    let target_system = if prefer_metric {
        UnitSystem::Metric
    } else {
        UnitSystem::Imperial
    };

    rewrite_quantities(value, |unit| {
        if unit.system() == target_system || unit.system() == UnitSystem::Neutral {
            None
        } else {
            unit.counterpart()
        }
    })
}

/// 指定単位へ換算した候補を返す
///
/// 次元が異なる単位や、既に指定単位の値はNone
pub fn convert_to_unit(value: &str, target: Unit) -> Option<UnitSuggestion> {
    rewrite_quantities(value, |unit| {
        if unit != target
            && unit.dimension() == target.dimension()
            && target.dimension() != Dimension::Other
        {
            Some(target)
        } else {
            None
        }
    })
}

/// 値中の数量を書き換え、1つ以上換算できた場合のみ候補を返す
fn rewrite_quantities<F>(value: &str, pick_target: F) -> Option<UnitSuggestion>
where
    F: Fn(Unit) -> Option<Unit>,
{
    if value.trim().is_empty() {
        return None;
    }

    let mut primary: Option<(f64, Unit)> = None;

    let rewritten = QUANTITY_RE.replace_all(value, |cap: &Captures| {
        let original = cap[0].to_string();
        let Some(from) = Unit::parse(&cap[4]) else {
            return original;
        };
        let Some(to) = pick_target(from) else {
            return original;
        };

        let numbers: Vec<f64> = [cap.get(1), cap.get(2), cap.get(3)]
            .iter()
            .flatten()
            .filter_map(|m| parse_number(m.as_str()))
            .collect();
        let converted: Option<Vec<f64>> = numbers.iter().map(|&n| convert(n, from, to)).collect();
        let Some(converted) = converted else {
            return original;
        };

        if primary.is_none() {
            primary = converted.last().map(|&v| (v, to));
        }

        let joined = converted
            .iter()
            .map(|&v| format_number(v))
            .collect::<Vec<_>>()
            .join(" x ");
        format!("{} {}", joined, to.symbol())
    });

    let (value, unit) = primary?;
    Some(UnitSuggestion {
        normalized: rewritten.into_owned(),
        value,
        unit,
    })
}

/// 桁区切りを除いて数値化
pub fn parse_number(text: &str) -> Option<f64> {
    text.replace(',', "").parse::<f64>().ok()
}

/// 小数点以下3桁で丸め、末尾の0を除いて整形
pub fn format_number(value: f64) -> String {
    let rounded = format!("{:.3}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_parse_variants() {
        assert_eq!(Unit::parse("lbs"), Some(Unit::Lb));
        assert_eq!(Unit::parse("Pounds"), Some(Unit::Lb));
        assert_eq!(Unit::parse("fl. oz"), Some(Unit::FlOz));
        assert_eq!(Unit::parse("\""), Some(Unit::In));
        assert_eq!(Unit::parse("°F"), Some(Unit::Fahrenheit));
        assert_eq!(Unit::parse("mAh"), Some(Unit::MAh));
        assert_eq!(Unit::parse("stone"), None);
    }

    #[test]
    fn test_convert_mass() {
        let kg = convert(1.4, Unit::Lb, Unit::Kg).unwrap();
        assert!((kg - 0.635).abs() < 0.001);
        assert!(convert(1.0, Unit::Kg, Unit::Cm).is_none());
        assert!(convert(5.0, Unit::W, Unit::W).is_none());
    }

    #[test]
    fn test_convert_temperature() {
        assert!((convert(212.0, Unit::Fahrenheit, Unit::Celsius).unwrap() - 100.0).abs() < 1e-9);
        assert!((convert(0.0, Unit::Celsius, Unit::Fahrenheit).unwrap() - 32.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_units_imperial_to_metric() {
        let suggestion = normalize_units("1.4 lbs", true).unwrap();
        assert_eq!(suggestion.normalized, "0.635 kg");
        assert_eq!(suggestion.unit, Unit::Kg);
        assert!((suggestion.value - 0.635).abs() < 0.001);
    }

    #[test]
    fn test_normalize_units_already_preferred() {
        assert!(normalize_units("0.6 kg", true).is_none());
        assert!(normalize_units("3.2 lb", false).is_none());
    }

    #[test]
    fn test_normalize_units_no_unit() {
        assert!(normalize_units("Black", true).is_none());
        assert!(normalize_units("", true).is_none());
        assert!(normalize_units("24.2", true).is_none());
    }

    #[test]
    fn test_normalize_units_dimension_list() {
        let suggestion = normalize_units("10 x 5 x 3 in", true).unwrap();
        assert_eq!(suggestion.normalized, "25.4 x 12.7 x 7.62 cm");
    }

    #[test]
    fn test_normalize_units_keeps_surrounding_text() {
        let suggestion = normalize_units("approx. 2 lb (with battery)", true).unwrap();
        assert_eq!(suggestion.normalized, "approx. 0.907 kg (with battery)");
    }

    #[test]
    fn test_normalize_units_metric_to_imperial() {
        let suggestion = normalize_units("100 mm", false).unwrap();
        assert_eq!(suggestion.normalized, "3.937 in");
    }

    #[test]
    fn test_convert_to_unit() {
        let suggestion = convert_to_unit("738 g", Unit::Kg).unwrap();
        assert_eq!(suggestion.normalized, "0.738 kg");
        assert!(convert_to_unit("0.738 kg", Unit::Kg).is_none());
        assert!(convert_to_unit("12 cm", Unit::Kg).is_none());
    }

    #[test]
    fn test_unit_from_field_name() {
        assert_eq!(unit_from_field_name("Weight (kg)"), Some(Unit::Kg));
        assert_eq!(unit_from_field_name("Filter Size [mm]"), Some(Unit::Mm));
        assert_eq!(unit_from_field_name("Resolution (MP)"), None);
        assert_eq!(unit_from_field_name("Color"), None);
    }

    #[test]
    fn test_first_quantity() {
        assert_eq!(first_quantity("Battery: 2,000 mAh"), Some((2000.0, Unit::MAh)));
        assert_eq!(first_quantity("t=50mm"), Some((50.0, Unit::Mm)));
        assert_eq!(first_quantity("EOS R5"), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0.635029), "0.635");
        assert_eq!(format_number(25.4), "25.4");
        assert_eq!(format_number(3.0), "3");
    }
}
