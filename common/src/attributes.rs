//! 製品の基本属性（名前・ブランド・価格・型番・シリアル・カテゴリ）の抽出

use crate::catalog::SpecCatalog;
use crate::text;
use crate::types::RawPair;
use crate::units;
use regex::Regex;
use std::collections::HashSet;

const NAME_KEYS: &[&str] = &["name", "product name", "product", "title", "item", "item name"];
const BRAND_KEYS: &[&str] = &["brand", "brand name", "manufacturer", "make", "mfr", "mfg", "maker"];
/// 優先順
const PRICE_KEYS: &[&str] = &[
    "price",
    "sale price",
    "list price",
    "msrp",
    "cost",
    "our price",
    "retail price",
];
const MODEL_KEYS: &[&str] = &[
    "model",
    "model number",
    "model no",
    "model name",
    "item model number",
    "mpn",
    "part number",
];
const SERIAL_KEYS: &[&str] = &["serial", "serial number", "serial no", "s n", "sn"];
const CATEGORY_KEYS: &[&str] = &["category", "type", "product type", "item type"];

lazy_static::lazy_static! {
    static ref PRICE_RE: Regex =
        Regex::new(r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?").unwrap();
    static ref SEPARATOR_LINE_RE: Regex =
        Regex::new(r"^\s*(?:-{3,}|={3,}|\*{3,}|_{3,}|#{3,})\s*$").unwrap();
}

/// 基本属性
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    pub name: String,
    pub brand: Option<String>,
    /// `Category` / `Type` の値がカタログのカテゴリ名と一致した場合のみ
    pub category_hint: Option<String>,
    pub purchase_price: Option<f64>,
    pub price_note: Option<String>,
    pub model_number: Option<String>,
    pub serial_number: Option<String>,
}

/// 行とペアから基本属性を抽出
pub fn extract_attributes(lines: &[String], pairs: &[RawPair], catalog: &SpecCatalog) -> Attributes {
    let brand = first_value(pairs, BRAND_KEYS);
    let model_number = first_value(pairs, MODEL_KEYS);
    let (purchase_price, price_note) = extract_price(pairs);

    let name = first_value(pairs, NAME_KEYS)
        .or_else(|| title_line(lines, pairs))
        .or_else(|| match (&brand, &model_number) {
            (Some(brand), Some(model)) => Some(format!("{} {}", brand, model)),
            (None, Some(model)) => Some(model.clone()),
            _ => None,
        })
        .unwrap_or_default();

    let category_hint = pairs
        .iter()
        .filter(|p| is_key(&p.key, CATEGORY_KEYS))
        .find_map(|p| catalog.category(&p.value))
        .map(|c| c.name.clone());

    Attributes {
        name,
        brand,
        category_hint,
        purchase_price,
        price_note,
        model_number,
        serial_number: first_value(pairs, SERIAL_KEYS),
    }
}

/// 名前らしいキーか（セグメント分割でも使用）
pub fn is_name_key(key: &str) -> bool {
    is_key(key, NAME_KEYS)
}

/// 価格文字列を数値化（通貨記号・桁区切りを除去）
pub fn parse_price(text: &str) -> Option<f64> {
    PRICE_RE
        .find(text)
        .and_then(|m| units::parse_number(m.as_str()))
}

fn is_key(key: &str, names: &[&str]) -> bool {
    let normalized = text::normalize_key(key);
    names.contains(&normalized.as_str())
}

fn first_value(pairs: &[RawPair], names: &[&str]) -> Option<String> {
    pairs
        .iter()
        .find(|p| is_key(&p.key, names))
        .map(|p| p.value.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// ペアにならなかった最初の行（通販ページは商品名から始まる）
fn title_line(lines: &[String], pairs: &[RawPair]) -> Option<String> {
    let pair_lines: HashSet<usize> = pairs.iter().map(|p| p.line_index).collect();

    lines
        .iter()
        .enumerate()
        .filter(|(index, _)| !pair_lines.contains(index))
        .map(|(_, line)| line.trim())
        .filter(|line| !line.is_empty() && !SEPARATOR_LINE_RE.is_match(line))
        .map(|line| line.trim_start_matches('#').trim_matches('*').trim().to_string())
        .find(|line| !line.is_empty())
}

/// 優先順で最初の価格を採用し、補足（採用したキー、他の価格）を付ける
fn extract_price(pairs: &[RawPair]) -> (Option<f64>, Option<String>) {
    let priced: Vec<(usize, &RawPair, f64)> = pairs
        .iter()
        .filter_map(|p| {
            let normalized = text::normalize_key(&p.key);
            let rank = PRICE_KEYS.iter().position(|k| *k == normalized)?;
            Some((rank, p, parse_price(&p.value)?))
        })
        .collect();

    let Some(&(_, chosen, amount)) = priced.iter().min_by_key(|(rank, p, _)| (*rank, p.line_index)) else {
        return (None, None);
    };

    let mut notes = Vec::new();
    if text::normalize_key(&chosen.key) != "price" {
        notes.push(chosen.key.trim().to_string());
    }

    let mut seen = vec![amount];
    let others: Vec<String> = priced
        .iter()
        .filter(|(_, p, value)| {
            if std::ptr::eq(*p, chosen) || seen.iter().any(|s| (s - value).abs() < 0.005) {
                return false;
            }
            seen.push(*value);
            true
        })
        .map(|(_, p, _)| format!("{} {}", p.key.trim(), p.value.trim()))
        .collect();
    if !others.is_empty() {
        notes.push(format!("他の価格: {}", others.join(", ")));
    }

    let note = (!notes.is_empty()).then(|| notes.join("; "));
    (Some(amount), note)
}
