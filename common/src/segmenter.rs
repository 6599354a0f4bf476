//! 複数製品の検出と一括解析
//!
//! 境界の判定順:
//! 1. 区切り行（`---` / `===` / `***` / `___` / `###`）
//! 2. 同じ名前キー（`Name:` など）の繰り返し
//! 3. 2行以上の空行（各ブロックに2組以上のペアがあり、先頭キーが共通の場合のみ）
//!
//! 各区間は前後の空行を除くため、単独で貼り付けた場合と同じ結果になる。

use crate::alias::AliasStore;
use crate::attributes;
use crate::catalog::SpecCatalog;
use crate::error::Result;
use crate::extractor;
use crate::normalizer;
use crate::pipeline::{ParseOptions, SmartPaste};
use crate::text;
use crate::types::{BatchItem, Segment, SourceKind};
use regex::Regex;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

lazy_static::lazy_static! {
    static ref SEPARATOR_RE: Regex =
        Regex::new(r"^\s*(?:-{3,}|={3,}|\*{3,}|_{3,}|#{3,})\s*$").unwrap();
}

/// 空行の連続がこの数以上なら区切り候補
const BLANK_RUN_MIN: usize = 2;
/// 空行区切りを採用するのに必要な、ブロックあたりのペア数
const BLOCK_PAIRS_MIN: usize = 2;

/// テキストから製品の区間を検出（行番号は正規化後の行、空入力なら空）
pub fn detect_product_boundaries(text: &str) -> Vec<Segment> {
    match normalizer::normalize(text, SourceKind::Paste) {
        Ok(normalized) => detect_boundaries_in_lines(&normalized.lines),
        Err(_) => Vec::new(),
    }
}

/// 正規化済みの行から製品の区間を検出（空入力なら空）
pub fn detect_boundaries_in_lines(lines: &[String]) -> Vec<Segment> {
    let ranges = split_by_separators(lines)
        .or_else(|| split_by_repeated_names(lines))
        .or_else(|| split_by_blank_runs(lines))
        .unwrap_or_else(|| vec![(0, lines.len())]);

    let ranges = merge_pairless(lines, trim_ranges(lines, ranges));

    ranges
        .into_iter()
        .enumerate()
        .map(|(i, (start, end))| Segment {
            name: segment_name(&lines[start..end], i + 1),
            start_line: start,
            end_line: end - 1,
        })
        .collect()
}

/// テキストを製品ごとに解析
pub fn parse_batch_products(
    text: &str,
    catalog: &SpecCatalog,
    aliases: &AliasStore,
    options: &ParseOptions,
) -> Result<Vec<BatchItem>> {
    SmartPaste::new(catalog, aliases)
        .with_options(options.clone())
        .parse_batch(text, SourceKind::Paste)
}

/// 正規化済みの行を区間ごとに解析（区間どうしは状態を共有しない）
pub(crate) fn parse_segments(
    engine: &SmartPaste<'_>,
    lines: &[String],
    kind: SourceKind,
) -> Result<Vec<BatchItem>> {
    let segments = detect_boundaries_in_lines(lines);
    tracing::info!(segments = segments.len(), "製品区間を検出");

    let parse_one = |segment: &Segment| -> Result<BatchItem> {
        let slice = &lines[segment.start_line..=segment.end_line];
        Ok(BatchItem {
            segment: segment.clone(),
            result: engine.parse_lines(slice, kind)?,
        })
    };

    #[cfg(feature = "parallel")]
    let items = segments.par_iter().map(parse_one).collect();

    #[cfg(not(feature = "parallel"))]
    let items = segments.iter().map(parse_one).collect();

    items
}

/// 区切り行で分割（区切り行自体は含めない）
fn split_by_separators(lines: &[String]) -> Option<Vec<(usize, usize)>> {
    let separators: Vec<usize> = lines
        .iter()
        .enumerate()
        .filter(|(_, l)| SEPARATOR_RE.is_match(l))
        .map(|(i, _)| i)
        .collect();
    if separators.is_empty() {
        return None;
    }

    let mut ranges = Vec::new();
    let mut start = 0;
    for sep in separators {
        ranges.push((start, sep));
        start = sep + 1;
    }
    ranges.push((start, lines.len()));
    Some(ranges)
}

/// 同じ名前キーが繰り返し現れる位置で分割
fn split_by_repeated_names(lines: &[String]) -> Option<Vec<(usize, usize)>> {
    let name_lines: Vec<(usize, String)> = lines
        .iter()
        .enumerate()
        .filter_map(|(i, line)| {
            let (key, _) = extractor::split_line(line)?;
            attributes::is_name_key(&key).then(|| (i, text::normalize_key(&key)))
        })
        .collect();

    let (_, first_key) = name_lines.first()?;
    let starts: Vec<usize> = name_lines
        .iter()
        .filter(|(_, key)| key == first_key)
        .map(|(i, _)| *i)
        .collect();
    if starts.len() < 2 {
        return None;
    }

    // 最初の名前行より前の行は1件目に含める
    let mut ranges = Vec::new();
    let mut start = 0;
    for &next in &starts[1..] {
        ranges.push((start, next));
        start = next;
    }
    ranges.push((start, lines.len()));
    Some(ranges)
}

/// 2行以上の空行で分割（各ブロックが同じ形の製品データである場合のみ）
fn split_by_blank_runs(lines: &[String]) -> Option<Vec<(usize, usize)>> {
    let mut ranges = Vec::new();
    let mut start = 0;
    let mut blank_run = 0;

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            blank_run += 1;
            continue;
        }
        if blank_run >= BLANK_RUN_MIN && i > blank_run {
            ranges.push((start, i - blank_run));
            start = i;
        }
        blank_run = 0;
    }
    ranges.push((start, lines.len()));

    if ranges.len() < 2 {
        return None;
    }

    let mut first_keys = Vec::with_capacity(ranges.len());
    for &(start, end) in &ranges {
        let pairs = extractor::extract(&lines[start..end]).pairs;
        if pairs.len() < BLOCK_PAIRS_MIN {
            return None;
        }
        first_keys.push(text::normalize_key(&pairs[0].key));
    }

    first_keys
        .windows(2)
        .all(|w| w[0] == w[1])
        .then_some(ranges)
}

/// 前後の空行を除き、空になった区間は捨てる
fn trim_ranges(lines: &[String], ranges: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    ranges
        .into_iter()
        .filter_map(|(mut start, mut end)| {
            while start < end && lines[start].trim().is_empty() {
                start += 1;
            }
            while end > start && lines[end - 1].trim().is_empty() {
                end -= 1;
            }
            (start < end).then_some((start, end))
        })
        .collect()
}

/// ペアを1つも含まない区間（見出しなど）は隣の区間に含める
///
/// 先頭なら次の区間へ、それ以外は直前の区間へ
fn merge_pairless(lines: &[String], ranges: Vec<(usize, usize)>) -> Vec<(usize, usize)> {
    let mut merged: Vec<(usize, usize)> = Vec::new();
    let mut pending_start: Option<usize> = None;

    for (start, end) in ranges {
        let has_pairs = lines[start..end]
            .iter()
            .any(|l| extractor::split_line(l).is_some());

        if has_pairs {
            merged.push((pending_start.take().unwrap_or(start), end));
        } else if let Some(last) = merged.last_mut() {
            last.1 = end;
        } else if pending_start.is_none() {
            pending_start = Some(start);
        }
    }

    if merged.is_empty() {
        // ペアが1つもない入力は全体で1区間
        let first = lines.iter().position(|l| !l.trim().is_empty());
        let last = lines.iter().rposition(|l| !l.trim().is_empty());
        return match (first, last) {
            (Some(first), Some(last)) => vec![(first, last + 1)],
            _ => Vec::new(),
        };
    }

    merged
}

/// 区間名: 名前キーの値 → 最初の行 → "Product N"
fn segment_name(lines: &[String], ordinal: usize) -> String {
    let from_key = lines.iter().find_map(|line| {
        let (key, value) = extractor::split_line(line)?;
        attributes::is_name_key(&key).then_some(value)
    });

    from_key
        .or_else(|| {
            lines
                .iter()
                .map(|l| l.trim().trim_start_matches('#').trim())
                .find(|l| !l.is_empty() && !SEPARATOR_RE.is_match(l))
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("Product {}", ordinal))
}
