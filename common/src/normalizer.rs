//! 入力テキストの正規化
//!
//! 貼り付け・ファイル・取得ページのいずれから来たテキストも、
//! 「1行 = 抽出単位」の行リストに整える。
//!
//! ## 処理フロー
//! 1. タグ・文字実体参照があればHTMLとして解析し、表構造を残してテキスト化（td/th → タブ、行要素 → 改行）
//! 2. プレーンテキスト版と比べ、列区切りのある行が多い方を採用（同数なら構造版）
//! 3. 空白の整理（3つ以上の連続空白は列区切りとみなしてタブに）

use crate::error::{Error, Result};
use crate::types::{NormalizedText, SourceKind};
use regex::Regex;
use scraper::{ElementRef, Html, Node};

lazy_static::lazy_static! {
    // 開き/閉じタグ・コメント（"<5 mm" のような比較記号は対象外）
    static ref TAG_RE: Regex = Regex::new(r"(?i)<(?:/?[a-z][a-z0-9-]*(?:\s[^<]*)?/?>|!--)").unwrap();
    static ref ENTITY_RE: Regex = Regex::new(r"(?i)&(?:#\d+|#x[0-9a-f]+|[a-z][a-z0-9]*);").unwrap();
    static ref WIDE_GAP_RE: Regex = Regex::new(r" {3,}").unwrap();
}

/// 中身ごと捨てる要素
const SKIPPED_TAGS: &[&str] = &["head", "script", "style", "noscript", "template", "iframe", "svg"];
/// 後ろに列区切り（タブ）を置く要素
const CELL_TAGS: &[&str] = &["td", "th", "dt"];
/// 前後で改行する要素
const LINE_TAGS: &[&str] = &[
    "tr", "p", "div", "li", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "dl", "table", "thead",
    "tbody", "tfoot", "caption", "section", "article", "header", "footer", "main", "nav", "aside",
    "blockquote", "pre", "form",
];
/// 空白だけのテキストノードを無視する要素（表・リストの整形用改行）
const STRUCTURAL_TAGS: &[&str] = &["table", "thead", "tbody", "tfoot", "tr", "dl", "ul", "ol"];

/// 生テキストを正規化（タグや文字実体参照が残っていればHTMLとして解釈）
pub fn normalize(raw: &str, kind: SourceKind) -> Result<NormalizedText> {
    if looks_like_markup(raw) {
        return normalize_rich(None, raw, kind);
    }

    let lines = clean_lines(raw);
    tracing::debug!(lines = lines.len(), ?kind, "プレーンテキストを正規化");
    finish(lines, kind)
}

/// プレーン版とマークアップ版の両方がある場合の正規化
///
/// 列区切り（タブまたは `|`）を含む行が多い方を採用する。同数ならマークアップ版
pub fn normalize_rich(plain: Option<&str>, markup: &str, kind: SourceKind) -> Result<NormalizedText> {
    let structured = clean_lines(&render_markup(markup));
    let structured_columns = count_column_lines(&structured);

    let chosen = match plain.map(plain_lines) {
        Some(plain_lines) => {
            let plain_columns = count_column_lines(&plain_lines);
            tracing::debug!(
                structured = structured_columns,
                plain = plain_columns,
                "列区切り行数を比較"
            );
            if structured.is_empty() || plain_columns > structured_columns {
                plain_lines
            } else {
                structured
            }
        }
        None => structured,
    };

    finish(chosen, kind)
}

/// タグまたは文字実体参照を含むか判定
pub fn looks_like_markup(text: &str) -> bool {
    TAG_RE.is_match(text) || ENTITY_RE.is_match(text)
}

/// プレーン版の行（残ったタグ・実体参照は取り除く）
fn plain_lines(plain: &str) -> Vec<String> {
    if looks_like_markup(plain) {
        clean_lines(&render_markup(plain))
    } else {
        clean_lines(plain)
    }
}

/// 表構造を保ったままマークアップをテキスト化
///
/// td/th/dt → タブ、行要素 → 改行。実体参照はパーサーがデコードする
pub fn render_markup(markup: &str) -> String {
    let document = Html::parse_document(markup);
    let mut out = String::new();
    render_element(document.root_element(), &mut out);
    out
}

/// 行頭でなければ改行（要素の開き/閉じで改行を重ねない）
fn break_line(out: &mut String) {
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
}

fn render_element(element: ElementRef<'_>, out: &mut String) {
    let name = element.value().name();
    if SKIPPED_TAGS.contains(&name) {
        return;
    }

    let line = LINE_TAGS.contains(&name);
    if line {
        break_line(out);
    } else if name == "br" {
        out.push('\n');
    }

    let structural = STRUCTURAL_TAGS.contains(&name);
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                // 整形用の空白（表の中・ブロック要素の間）は捨てる
                let layout = text.trim().is_empty() && (structural || out.is_empty() || out.ends_with('\n'));
                if !layout {
                    out.push_str(text);
                }
            }
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    render_element(child, out);
                }
            }
            _ => {}
        }
    }

    if CELL_TAGS.contains(&name) {
        out.push('\t');
    } else if line || name == "dd" {
        break_line(out);
    }
}

/// 行ごとに空白を整理（前後の空行は除去、途中の空行は区切りとして残す）
pub fn clean_lines(text: &str) -> Vec<String> {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");

    let mut lines: Vec<String> = unified.lines().map(clean_line).collect();

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    let leading = lines.iter().take_while(|l| l.is_empty()).count();
    lines.drain(..leading);

    lines
}

fn clean_line(line: &str) -> String {
    let line = line.replace(['\u{a0}', '\u{3000}'], " ");
    let line = WIDE_GAP_RE.replace_all(&line, "\t");

    line.split('\t')
        .map(|cell| cell.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|cell| !cell.is_empty())
        .collect::<Vec<_>>()
        .join("\t")
}

fn count_column_lines(lines: &[String]) -> usize {
    lines
        .iter()
        .filter(|l| l.contains('\t') || l.contains('|'))
        .count()
}

fn finish(lines: Vec<String>, kind: SourceKind) -> Result<NormalizedText> {
    let text = NormalizedText::new(lines);
    if text.is_blank() {
        let reason = match kind {
            SourceKind::Paste => "貼り付けテキストに文字がありません",
            SourceKind::File => "ファイルからテキストを取得できませんでした",
            SourceKind::Url => "ページからテキストを取得できませんでした",
        };
        return Err(Error::EmptyInput(reason.to_string()));
    }
    Ok(text)
}
