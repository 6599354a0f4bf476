//! 解析の準備と実行
//!
//! カタログ・エイリアスの読み込みと、入力を単一/複数製品として解析する処理。

use crate::config::Config;
use crate::error::Result;
use crate::reader::LoadedSource;
use serde::{Deserialize, Serialize};
use smart_paste_common::{
    normalize, normalize_rich, AliasStore, BatchItem, NormalizedText, ParseResult, SmartPaste, SourceKind,
    SpecCatalog,
};
use std::path::Path;

/// 組み込みカタログのプリセット名
pub const DEFAULT_CATALOG_PRESET: &str = "gear";

/// 解析結果（分割しなかった場合は1件）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParseOutput {
    Batch(Vec<BatchItem>),
    Single(ParseResult),
}

impl ParseOutput {
    pub fn results(&self) -> Vec<&ParseResult> {
        match self {
            ParseOutput::Batch(items) => items.iter().map(|i| &i.result).collect(),
            ParseOutput::Single(result) => vec![result],
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ParseOutput::Batch(items) => items.len(),
            ParseOutput::Single(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 解析に渡す入力
#[derive(Debug, Clone, Default)]
pub struct SourceInput {
    /// プレーンテキスト
    pub plain: Option<String>,
    /// 貼り付け時のHTML
    pub markup: Option<String>,
}

impl SourceInput {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            plain: Some(text.into()),
            markup: None,
        }
    }

    pub fn markup(html: impl Into<String>) -> Self {
        Self {
            plain: None,
            markup: Some(html.into()),
        }
    }

    /// 正規化（HTMLがあれば表形式の多い方を採用）
    pub fn normalize(&self, kind: SourceKind) -> smart_paste_common::Result<NormalizedText> {
        match (&self.plain, &self.markup) {
            (plain, Some(markup)) => normalize_rich(plain.as_deref(), markup, kind),
            (Some(plain), None) => normalize(plain, kind),
            (None, None) => normalize("", kind),
        }
    }
}

impl From<LoadedSource> for SourceInput {
    fn from(loaded: LoadedSource) -> Self {
        if loaded.format.is_markup() {
            Self::markup(loaded.text)
        } else {
            Self::plain(loaded.text)
        }
    }
}

/// カタログを読み込み（指定 > 設定 > 組み込みプリセット）
pub fn load_catalog(config: &Config, path: Option<&Path>) -> Result<SpecCatalog> {
    match path.or(config.catalog_path.as_deref()) {
        Some(path) => {
            tracing::debug!(path = %path.display(), "カタログを読み込み");
            Ok(SpecCatalog::from_file(path)?)
        }
        None => SpecCatalog::from_preset(DEFAULT_CATALOG_PRESET).ok_or_else(|| {
            crate::error::PasteError::Config(format!("プリセットがありません: {}", DEFAULT_CATALOG_PRESET))
        }),
    }
}

/// セッションのエイリアスを読み込み（未作成・破損時は空）
pub fn load_aliases(config: &Config) -> Result<AliasStore> {
    let path = config.session_path()?;
    if !path.exists() {
        return Ok(AliasStore::new());
    }

    match AliasStore::from_file(&path) {
        Ok(store) => Ok(store),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "エイリアスを読み込めません、空で開始します");
            Ok(AliasStore::new())
        }
    }
}

pub fn save_aliases(config: &Config, aliases: &AliasStore) -> Result<()> {
    aliases.save(&config.session_path()?)?;
    Ok(())
}

/// 入力を解析（single でなければ複数製品を自動分割）
pub fn parse_input(
    engine: &SmartPaste<'_>,
    input: &SourceInput,
    kind: SourceKind,
    single: bool,
) -> Result<ParseOutput> {
    let text = input.normalize(kind)?;

    if single {
        return Ok(ParseOutput::Single(engine.parse_normalized(&text, kind)?));
    }

    let mut items = engine.parse_batch_normalized(&text, kind)?;
    if items.len() == 1 {
        let item = items.remove(0);
        return Ok(ParseOutput::Single(item.result));
    }
    Ok(ParseOutput::Batch(items))
}
