//! key/value ペアの抽出
//!
//! 区切り文字を優先順（タブ → `:` → `→` → `=` → `|`）に試し、最初に見つかったもので分割する。
//! 区切りがない行でも「Weight 1.4 lbs」のような形なら拾う。
//! 抽出順は常に行順（後段の同点判定が先勝ちに依存するため）

use crate::types::RawPair;
use crate::units::Unit;
use regex::Regex;

/// キーとして受け付ける最大文字数
const MAX_KEY_CHARS: usize = 60;
/// キーとして受け付ける最大語数
const MAX_KEY_WORDS: usize = 8;
/// 区切りなし行で値とみなす最大トークン数
const MAX_SHAPE_VALUE_TOKENS: usize = 3;

lazy_static::lazy_static! {
    static ref BULLET_RE: Regex = Regex::new(r"^\s*(?:[-*•·▪►✓]+|\d{1,2}[.)])\s+").unwrap();
    static ref TABLE_RULE_RE: Regex = Regex::new(r"^:?-{3,}:?$").unwrap();
}

/// 抽出結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub pairs: Vec<RawPair>,
    /// 空行以外のすべての行からペアが取れたか（自由文の行が無い入力）
    pub unmatched_as_pairs_only: bool,
}

/// 行リストからペアを抽出
pub fn extract(lines: &[String]) -> Extraction {
    let mut pairs = Vec::new();
    let mut content_lines = 0usize;

    for (index, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        content_lines += 1;

        if let Some((key, value)) = split_line(line) {
            pairs.push(RawPair::new(key, value, index));
        }
    }

    let unmatched_as_pairs_only = content_lines > 0 && pairs.len() == content_lines;
    tracing::debug!(lines = lines.len(), pairs = pairs.len(), "ペアを抽出");

    Extraction {
        pairs,
        unmatched_as_pairs_only,
    }
}

/// 1行を key/value に分割
pub fn split_line(line: &str) -> Option<(String, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    match split_by_separator(line) {
        Some((key, value)) => finish_pair(&key, &value),
        None => split_by_shape(line),
    }
}

fn split_by_separator(line: &str) -> Option<(String, String)> {
    if let Some((key, rest)) = line.split_once('\t') {
        let value = rest
            .split('\t')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        return Some((key.to_string(), value));
    }

    if let Some(pos) = find_colon(line) {
        let colon_len = line[pos..].chars().next().map(char::len_utf8).unwrap_or(1);
        return Some((line[..pos].to_string(), line[pos + colon_len..].to_string()));
    }

    // URLのクエリ "?id=5" やパス中の "|" は区切りとみなさない
    for separator in ['→', '='] {
        if let Some((key, value)) = line.split_once(separator) {
            if !key.contains("://") {
                return Some((key.to_string(), value.to_string()));
            }
        }
    }

    match line.split_once('|') {
        Some((key, _)) if !key.contains("://") => split_pipe_row(line),
        _ => None,
    }
}

/// URLの "://" と "16:9" のような数字間のコロンを除いた最初のコロン位置
fn find_colon(line: &str) -> Option<usize> {
    let chars: Vec<(usize, char)> = line.char_indices().collect();

    chars.iter().enumerate().find_map(|(i, &(pos, c))| {
        if c != ':' && c != '：' {
            return None;
        }
        if line[pos..].starts_with("://") {
            return None;
        }
        let prev_digit = i > 0 && chars[i - 1].1.is_ascii_digit();
        let next_digit = chars.get(i + 1).is_some_and(|(_, n)| n.is_ascii_digit());
        if prev_digit && next_digit {
            return None;
        }
        Some(pos)
    })
}

/// Markdown表の行 "| Weight | 1.4 lbs |"
fn split_pipe_row(line: &str) -> Option<(String, String)> {
    let inner = line.trim().trim_start_matches('|').trim_end_matches('|');
    let cells: Vec<&str> = inner.split('|').map(str::trim).collect();

    if cells.iter().all(|c| c.is_empty() || TABLE_RULE_RE.is_match(c)) {
        return None;
    }

    let (key, rest) = cells.split_first()?;
    let value = rest
        .iter()
        .filter(|c| !c.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    Some((key.to_string(), value))
}

/// 区切りがない行: 語の後に「数値（+単位）」だけが続く形（"Weight 1.4 lbs"）
fn split_by_shape(line: &str) -> Option<(String, String)> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let value_start = tokens.iter().position(|t| starts_with_number(t))?;
    if value_start == 0 {
        return None;
    }

    let (key_tokens, value_tokens) = tokens.split_at(value_start);
    if value_tokens.len() > MAX_SHAPE_VALUE_TOKENS
        || !key_tokens
            .iter()
            .all(|t| t.chars().next().is_some_and(char::is_alphabetic))
    {
        return None;
    }

    // 製品名（"Canon 50mm f/1.8"）を拾わないよう、値は数量表記に限る
    let (first, rest) = value_tokens.split_first()?;
    if !is_quantity_token(first) || !rest.iter().all(|t| Unit::parse(t).is_some()) {
        return None;
    }

    finish_pair(&key_tokens.join(" "), &value_tokens.join(" "))
}

fn strip_currency(token: &str) -> &str {
    token.trim_start_matches(['$', '€', '£', '¥', '~', '≈'])
}

fn starts_with_number(token: &str) -> bool {
    strip_currency(token)
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit())
}

/// "1.4" / "$3,899" / "600W" / "35%"
fn is_quantity_token(token: &str) -> bool {
    let token = strip_currency(token);
    let suffix = token.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ',');
    suffix.len() < token.len()
        && (suffix.is_empty() || suffix == "%" || Unit::parse(suffix).is_some())
}

fn finish_pair(key: &str, value: &str) -> Option<(String, String)> {
    let key = clean_key(key);
    let value = value.trim().trim_matches('*').trim().to_string();

    if value.is_empty() || !is_plausible_key(&key) {
        return None;
    }
    Some((key, value))
}

/// 箇条書き記号・強調記号・末尾の区切りを除去
pub fn clean_key(key: &str) -> String {
    let key = BULLET_RE.replace(key, "");
    key.trim()
        .trim_matches(|c| c == '*' || c == '_')
        .trim()
        .trim_end_matches([':', '：', '=', '→', '-'])
        .trim()
        .to_string()
}

fn is_plausible_key(key: &str) -> bool {
    !key.is_empty()
        && key.chars().any(char::is_alphabetic)
        && key.chars().count() <= MAX_KEY_CHARS
        && key.split_whitespace().count() <= MAX_KEY_WORDS
}
