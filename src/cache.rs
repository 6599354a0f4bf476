//! 解析結果キャッシュモジュール
//!
//! 正規化済みテキスト・カタログ・エイリアス・オプションのSHA-256をキーにして
//! 解析結果をキャッシュし、同じ入力の再解析をスキップする。

use crate::error::{PasteError, Result};
use crate::workflow::ParseOutput;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

const CACHE_FILE_NAME: &str = "results.json";

/// キャッシュファイルの構造
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultCache {
    /// バージョン（互換性チェック用）
    version: u32,
    /// 入力ハッシュ → 解析結果のマップ
    entries: HashMap<String, CacheEntry>,
}

/// キャッシュエントリ
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// 入力元（ファイルパス・URL・stdin）
    pub source: String,
    pub created_at: DateTime<Utc>,
    /// 解析結果
    pub output: ParseOutput,
}

impl ResultCache {
    const CURRENT_VERSION: u32 = 1;

    /// 既定の保存先（キャッシュディレクトリ）
    pub fn default_path() -> Result<PathBuf> {
        let cache = dirs::cache_dir()
            .ok_or_else(|| PasteError::Config("キャッシュディレクトリが見つかりません".into()))?;
        Ok(cache.join("smart-paste").join(CACHE_FILE_NAME))
    }

    /// キャッシュファイルを読み込み（存在しない・壊れている場合は空）
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "キャッシュを開けません");
                return Self::default();
            }
        };

        let reader = BufReader::new(file);
        match serde_json::from_reader::<_, ResultCache>(reader) {
            Ok(cache) => {
                // バージョンチェック
                if cache.version != Self::CURRENT_VERSION {
                    tracing::warn!(found = cache.version, "キャッシュバージョン不一致、再生成します");
                    return Self::default();
                }
                cache
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "キャッシュが壊れています、再生成します");
                Self::default()
            }
        }
    }

    /// キャッシュファイルを保存
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// キャッシュファイルを削除（存在しなければ false）
    pub fn clear(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(path)?;
        Ok(true)
    }

    /// キャッシュをルックアップ
    pub fn get(&self, key: &str) -> Option<&ParseOutput> {
        self.entries.get(key).map(|e| &e.output)
    }

    /// キャッシュに追加
    pub fn insert(&mut self, key: String, source: String, output: ParseOutput) {
        self.entries.insert(
            key,
            CacheEntry {
                source,
                created_at: Utc::now(),
                output,
            },
        );
    }

    /// キャッシュ件数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            entries: HashMap::new(),
        }
    }
}

/// キャッシュキーを計算（各要素を区切って SHA-256、16進文字列）
pub fn compute_cache_key(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}
