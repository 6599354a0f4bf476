//! 文字列の正規化と類似度
//!
//! - キーの正規化（大小文字・記号・空白の統一）
//! - 略語/同義語の展開
//! - トークン重なり（Dice係数）と編集距離による類似度

use crate::units::Unit;
use std::collections::{HashMap, HashSet};

lazy_static::lazy_static! {
    /// キー全体で置き換える同義語（正規化済みキー → 正規名）
    static ref PHRASES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("colour", "color");
        m.insert("finish", "color");
        m.insert("mfr", "brand");
        m.insert("mfg", "brand");
        m.insert("manufacturer", "brand");
        m.insert("make", "brand");
        m.insert("maker", "brand");
        m.insert("msrp", "price");
        m.insert("list price", "price");
        m.insert("retail price", "price");
        m.insert("our price", "price");
        m.insert("sale price", "price");
        m.insert("cost", "price");
        m.insert("sn", "serial number");
        m.insert("s n", "serial number");
        m.insert("serial", "serial number");
        m.insert("mpn", "model number");
        m.insert("model number", "model number");
        m.insert("part number", "model number");
        m.insert("pn", "model number");
        m.insert("dimensions", "dimensions");
        m.insert("size", "dimensions");
        m.insert("product dimensions", "dimensions");
        m.insert("item weight", "weight");
        m.insert("net weight", "weight");
        m.insert("body weight", "weight");
        m.insert("mount", "lens mount");
        m.insert("lens mount type", "lens mount");
        m.insert("effective pixels", "resolution");
        m.insert("megapixels", "resolution");
        m.insert("frame rate", "frame rate");
        m.insert("fps", "frame rate");
        m.insert("maximum aperture", "aperture");
        m.insert("focal length range", "focal length");
        m.insert("wattage", "power");
        m.insert("power output", "power");
        m.insert("output power", "power");
        m.insert("cct", "color temperature");
        m.insert("kelvin", "color temperature");
        m.insert("cpu", "processor");
        m.insert("ram", "memory");
        m.insert("capacity", "storage");
        m.insert("display size", "screen size");
        m.insert("maximum load", "max load");
        m.insert("load capacity", "max load");
        m.insert("payload", "max load");
        m
    };

    /// トークン単位の略語展開（空文字は削除）
    static ref TOKENS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("wt", "weight");
        m.insert("dim", "dimensions");
        m.insert("dims", "dimensions");
        m.insert("qty", "quantity");
        m.insert("max", "maximum");
        m.insert("min", "minimum");
        m.insert("temp", "temperature");
        m.insert("no", "number");
        m.insert("num", "number");
        m.insert("nr", "number");
        m.insert("colour", "color");
        m.insert("res", "resolution");
        m.insert("batt", "battery");
        m.insert("cap", "capacity");
        m.insert("freq", "frequency");
        m.insert("approx", "");
        m.insert("approximately", "");
        m
    };

    static ref STOP_WORDS: HashSet<&'static str> = [
        "the", "of", "and", "a", "an", "for", "with", "in", "per", "to", "at", "by", "or",
    ]
    .into_iter()
    .collect();
}

/// キーを比較用に正規化（小文字化、英数字以外は空白、連続空白は1つ）
pub fn normalize_key(key: &str) -> String {
    let replaced: String = key
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .to_lowercase();
    collapse_whitespace(&replaced)
}

/// 連続する空白を1つにまとめ、前後を除去
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 値が実質的に同じか（大小文字・空白の違いを無視）
pub fn materially_equal(a: &str, b: &str) -> bool {
    collapse_whitespace(a).to_lowercase() == collapse_whitespace(b).to_lowercase()
}

/// 略語・同義語を展開した正規形
pub fn canonical_phrase(key: &str) -> String {
    let normalized = normalize_key(key);
    if let Some(phrase) = PHRASES.get(normalized.as_str()) {
        return phrase.to_string();
    }

    let expanded = normalized
        .split(' ')
        .map(|token| TOKENS.get(token).copied().unwrap_or(token))
        .filter(|token| !token.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    match PHRASES.get(expanded.as_str()) {
        Some(phrase) => phrase.to_string(),
        None => expanded,
    }
}

/// あいまい照合用の有意トークン（略語展開後、ストップワードと単位を除く）
pub fn significant_tokens(key: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    canonical_phrase(key)
        .split(' ')
        .filter(|t| !t.is_empty())
        .filter(|t| !STOP_WORDS.contains(t))
        .filter(|t| Unit::parse(t).is_none())
        .filter(|t| seen.insert(t.to_string()))
        .map(|t| t.to_string())
        .collect()
}

/// トークン集合のDice係数（0.0〜1.0）
///
/// 5文字以上のトークンは編集距離の類似度0.8以上で一致とみなす（タイプミス対策）
pub fn token_overlap(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let mut used = vec![false; b.len()];
    let mut matched = 0usize;

    for token in a {
        let hit = b.iter().enumerate().position(|(j, other)| {
            !used[j] && (token == other || tokens_similar(token, other))
        });
        if let Some(j) = hit {
            used[j] = true;
            matched += 1;
        }
    }

    2.0 * matched as f64 / (a.len() + b.len()) as f64
}

fn tokens_similar(a: &str, b: &str) -> bool {
    a.chars().count() >= 5 && b.chars().count() >= 5 && similarity(a, b) >= 0.8
}

/// 類似度を計算（編集距離ベース）
pub fn similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let distance = levenshtein_distance(a, b);
    let max_len = a.chars().count().max(b.chars().count());

    1.0 - (distance as f64 / max_len as f64)
}

/// レーベンシュタイン距離を計算
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    // 1行ぶんのバッファで計算
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0; b_chars.len() + 1];

    for (i, ca) in a_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            current[j + 1] = (prev[j + 1] + 1).min(current[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut current);
    }

    prev[b_chars.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  Weight (kg) "), "weight kg");
        assert_eq!(normalize_key("S/N"), "s n");
        assert_eq!(normalize_key("Model #"), "model");
        assert_eq!(normalize_key("**Sensor   Size**"), "sensor size");
    }

    #[test]
    fn test_materially_equal() {
        assert!(materially_equal("Black", " black "));
        assert!(materially_equal("Full  Frame", "full frame"));
        assert!(!materially_equal("$100", "$150"));
    }

    #[test]
    fn test_canonical_phrase() {
        assert_eq!(canonical_phrase("Colour"), "color");
        assert_eq!(canonical_phrase("Mfr"), "brand");
        assert_eq!(canonical_phrase("S/N"), "serial number");
        assert_eq!(canonical_phrase("Max Wt"), "maximum weight");
        assert_eq!(canonical_phrase("Model No."), "model number");
        assert_eq!(canonical_phrase("Sensor Size"), "sensor size");
    }

    #[test]
    fn test_significant_tokens() {
        assert_eq!(significant_tokens("Weight of the Body (kg)"), vec!["weight", "body"]);
        assert_eq!(significant_tokens("Approx. Weight"), vec!["weight"]);
        assert!(significant_tokens("the").is_empty());
    }

    #[test]
    fn test_token_overlap() {
        let a = significant_tokens("Video Resolution");
        let b = significant_tokens("Resolution");
        assert!((token_overlap(&a, &b) - 2.0 / 3.0).abs() < 1e-9);

        let c = significant_tokens("Color");
        assert_eq!(token_overlap(&a, &c), 0.0);
        assert_eq!(token_overlap(&[], &c), 0.0);
    }

    #[test]
    fn test_token_overlap_typo() {
        let a = significant_tokens("Resoluton");
        let b = significant_tokens("Resolution");
        assert_eq!(token_overlap(&a, &b), 1.0);
    }

    #[test]
    fn test_similarity() {
        assert!((similarity("weight", "weight") - 1.0).abs() < 0.01);
        assert!(similarity("resolution", "resoluton") > 0.8);
        assert!(similarity("color", "brand") < 0.5);
    }

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("abc", "abc"), 0);
        assert_eq!(levenshtein_distance("abc", "abd"), 1);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
    }
}
