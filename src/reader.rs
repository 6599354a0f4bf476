//! 入力ファイルの読み込み
//!
//! 拡張子ごとにテキストへ変換する。PDFと表計算は変換が重いので
//! ブロッキングスレッドで実行する。

use crate::error::{PasteError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};

/// 対応する入力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Text,
    Rtf,
    Pdf,
    Spreadsheet,
    Html,
}

impl SourceFormat {
    /// 拡張子から判定（大文字小文字は区別しない）
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "txt" | "text" | "csv" | "tsv" | "md" | "markdown" => Some(Self::Text),
            "rtf" => Some(Self::Rtf),
            "pdf" => Some(Self::Pdf),
            "xlsx" | "xls" | "xlsm" | "ods" => Some(Self::Spreadsheet),
            "html" | "htm" => Some(Self::Html),
            _ => None,
        }
    }

    pub fn is_markup(&self) -> bool {
        matches!(self, Self::Html)
    }
}

/// 読み込んだ入力
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub path: PathBuf,
    pub format: SourceFormat,
    pub text: String,
}

lazy_static::lazy_static! {
    static ref RTF_DESTINATION_RE: Regex =
        Regex::new(r"\{\\(?:\*|fonttbl|colortbl|stylesheet|info|listtable|listoverridetable)(?:[^{}]|\{[^{}]*\})*\}").unwrap();
    static ref RTF_BREAK_RE: Regex = Regex::new(r"\\(?:par|line)\b ?").unwrap();
    static ref RTF_TAB_RE: Regex = Regex::new(r"\\tab\b ?").unwrap();
    static ref RTF_HEX_RE: Regex = Regex::new(r"\\'([0-9a-fA-F]{2})").unwrap();
    static ref RTF_UNICODE_RE: Regex = Regex::new(r"\\u(-?\d+) ?\??").unwrap();
    static ref RTF_CONTROL_RE: Regex = Regex::new(r"\\[a-zA-Z]+-?\d* ?").unwrap();
}

/// ファイルを読み込んでテキスト化
pub async fn read_source(path: &Path) -> Result<LoadedSource> {
    if !path.exists() {
        return Err(PasteError::FileNotFound(path.display().to_string()));
    }

    let format = SourceFormat::from_path(path)
        .ok_or_else(|| PasteError::UnsupportedFormat(path.display().to_string()))?;

    let text = match format {
        SourceFormat::Text | SourceFormat::Html => decode_text(&tokio::fs::read(path).await?),
        SourceFormat::Rtf => strip_rtf(&decode_text(&tokio::fs::read(path).await?)),
        SourceFormat::Pdf => {
            let bytes = tokio::fs::read(path).await?;
            let name = path.display().to_string();
            tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_from_mem(&bytes)
                    .map_err(|e| PasteError::FileRead(format!("{}: {}", name, e)))
            })
            .await
            .map_err(|e| PasteError::FileRead(e.to_string()))??
        }
        SourceFormat::Spreadsheet => {
            let owned = path.to_path_buf();
            tokio::task::spawn_blocking(move || read_spreadsheet(&owned))
                .await
                .map_err(|e| PasteError::FileRead(e.to_string()))??
        }
    };

    if text.trim().is_empty() {
        return Err(smart_paste_common::Error::EmptyInput(format!(
            "{} にテキストがありません",
            path.display()
        ))
        .into());
    }

    tracing::debug!(path = %path.display(), ?format, chars = text.len(), "入力を読み込み");

    Ok(LoadedSource {
        path: path.to_path_buf(),
        format,
        text,
    })
}

/// 標準入力を読み込み
pub async fn read_stdin() -> Result<String> {
    use tokio::io::AsyncReadExt;

    let mut buffer = Vec::new();
    tokio::io::stdin().read_to_end(&mut buffer).await?;
    Ok(decode_text(&buffer))
}

/// UTF-8として読む（BOM除去、不正なバイトは置換）
fn decode_text(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.trim_start_matches('\u{feff}').to_string()
}

/// 最初のシートをタブ区切りテキストにする
fn read_spreadsheet(path: &Path) -> Result<String> {
    use calamine::{open_workbook_auto, Reader};

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| PasteError::FileRead(format!("{}: {}", path.display(), e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PasteError::FileRead(format!("{}: シートがありません", path.display())))?
        .map_err(|e| PasteError::FileRead(format!("{}: {}", path.display(), e)))?;

    let lines: Vec<String> = range
        .rows()
        .map(|row| {
            row.iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect::<Vec<_>>()
                .join("\t")
        })
        .collect();

    Ok(lines.join("\n"))
}

/// RTFの制御語を除去してプレーンテキストにする
pub fn strip_rtf(rtf: &str) -> String {
    let text = RTF_DESTINATION_RE.replace_all(rtf, "");
    let text = RTF_BREAK_RE.replace_all(&text, "\n");
    let text = RTF_TAB_RE.replace_all(&text, "\t");
    let text = RTF_HEX_RE.replace_all(&text, |caps: &regex::Captures| {
        u8::from_str_radix(&caps[1], 16)
            .map(|b| char::from(b).to_string())
            .unwrap_or_default()
    });
    let text = RTF_UNICODE_RE.replace_all(&text, |caps: &regex::Captures| {
        caps[1]
            .parse::<i32>()
            .ok()
            .map(|n| if n < 0 { n + 65536 } else { n })
            .and_then(|n| char::from_u32(n as u32))
            .map(String::from)
            .unwrap_or_default()
    });

    let escaped = text
        .replace("\\\\", "\u{0}")
        .replace("\\{", "\u{1}")
        .replace("\\}", "\u{2}");
    let stripped = RTF_CONTROL_RE.replace_all(&escaped, "");

    stripped
        .replace(['{', '}'], "")
        .replace('\u{0}', "\\")
        .replace('\u{1}', "{")
        .replace('\u{2}', "}")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
