//! エイリアス学習モジュール
//!
//! ユーザーが確定した「元キー → スペック項目」の対応を記録し、
//! 以降の解析でそのキーを照合の最優先候補として扱う。
//! ストアはセッション単位で、永続化は呼び出し側の任意。

use crate::error::Result;
use crate::text;
use crate::types::AliasRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// エイリアスストア（正規化済みキー → 記録）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AliasStore {
    #[serde(default)]
    records: BTreeMap<String, AliasRecord>,
}

impl AliasStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 組み込みプリセットを取得
    pub fn from_preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "retail" | "通販" => Some(Self::retail_preset()),
            "rental" | "レンタル" => Some(Self::rental_preset()),
            _ => None,
        }
    }

    /// JSONファイルから読み込み（非WASM環境のみ）
    #[cfg(not(feature = "wasm"))]
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// JSONファイルへ保存（非WASM環境のみ）
    #[cfg(not(feature = "wasm"))]
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// JSON文字列から読み込み（キーは読み込み時に正規化し直す）
    pub fn from_json(json: &str) -> Result<Self> {
        let loaded: Self = serde_json::from_str(json)?;
        let mut store = Self::new();
        for record in loaded.records.into_values() {
            store.insert(record);
        }
        Ok(store)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// 通販サイトの表記用プリセット
    fn retail_preset() -> Self {
        let mut store = Self::new();
        let now = Utc::now();

        store.record_alias_at("Product Weight", "Weight (kg)", now);
        store.record_alias_at("Shipping Weight", "Weight (kg)", now);
        store.record_alias_at("Item Dimensions", "Dimensions (cm)", now);
        store.record_alias_at("Product Dimensions", "Dimensions (cm)", now);
        store.record_alias_at("Package Dimensions", "Dimensions (cm)", now);
        store.record_alias_at("Lens Mount Type", "Lens Mount", now);
        store.record_alias_at("Mount Type", "Lens Mount", now);
        store.record_alias_at("Megapixels", "Resolution (MP)", now);
        store.record_alias_at("Effective Megapixels", "Resolution (MP)", now);
        store.record_alias_at("Max Video Resolution", "Video Resolution", now);
        store.record_alias_at("Color Name", "Color", now);
        store.record_alias_at("Hard Drive Size", "Storage", now);
        store.record_alias_at("RAM Memory Installed Size", "Memory", now);
        store.record_alias_at("Standard Screen Size", "Screen Size (in)", now);

        store
    }

    /// 社内レンタル台帳の表記用プリセット
    fn rental_preset() -> Self {
        let mut store = Self::new();
        let now = Utc::now();

        store.record_alias_at("Body Wt", "Weight (kg)", now);
        store.record_alias_at("Mount", "Lens Mount", now);
        store.record_alias_at("Sensor", "Sensor Size", now);
        store.record_alias_at("Capacity", "Max Load (kg)", now);
        store.record_alias_at("Output", "Power (W)", now);
        store.record_alias_at("Pattern", "Polar Pattern", now);

        store
    }

    /// 確定した対応を記録（同じキーは上書き）
    ///
    /// 正規化後に空になるキーは記録しない
    pub fn record_alias(&mut self, source_key: &str, spec_name: &str) -> bool {
        self.record_alias_at(source_key, spec_name, Utc::now())
    }

    /// 時刻を指定して記録
    pub fn record_alias_at(&mut self, source_key: &str, spec_name: &str, confirmed_at: DateTime<Utc>) -> bool {
        let key = text::normalize_key(source_key);
        if key.is_empty() || spec_name.trim().is_empty() {
            return false;
        }

        tracing::debug!(source_key = %key, spec_name, "エイリアスを記録");
        self.records.insert(
            key.clone(),
            AliasRecord {
                source_key: key,
                spec_name: spec_name.trim().to_string(),
                confirmed_at,
            },
        );
        true
    }

    fn insert(&mut self, record: AliasRecord) {
        let key = text::normalize_key(&record.source_key);
        if key.is_empty() {
            return;
        }
        self.records.insert(
            key.clone(),
            AliasRecord {
                source_key: key,
                ..record
            },
        );
    }

    /// 元キーに対応する項目名
    pub fn lookup(&self, source_key: &str) -> Option<&str> {
        self.records
            .get(&text::normalize_key(source_key))
            .map(|r| r.spec_name.as_str())
    }

    pub fn get(&self, source_key: &str) -> Option<&AliasRecord> {
        self.records.get(&text::normalize_key(source_key))
    }

    pub fn remove(&mut self, source_key: &str) -> Option<AliasRecord> {
        self.records.remove(&text::normalize_key(source_key))
    }

    /// 記録一覧（キー順）
    pub fn records(&self) -> impl Iterator<Item = &AliasRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// ストアをマージ（同じキーは確定日時が新しい方を残す）
    pub fn merge(&mut self, other: &AliasStore) {
        for record in other.records.values() {
            let newer = self
                .records
                .get(&record.source_key)
                .map_or(true, |existing| record.confirmed_at >= existing.confirmed_at);
            if newer {
                self.insert(record.clone());
            }
        }
    }
}

/// プリセットと保存済みJSONからストアを構築
pub fn build_alias_store(preset: Option<&str>, alias_json: Option<&str>) -> Result<AliasStore> {
    let mut store = AliasStore::new();

    if let Some(preset_name) = preset {
        match AliasStore::from_preset(preset_name) {
            Some(preset_store) => store.merge(&preset_store),
            None => tracing::warn!(preset = preset_name, "不明なプリセット (retail/rental)"),
        }
    }

    // 保存済みの学習結果はプリセットより優先
    if let Some(json) = alias_json {
        let learned = AliasStore::from_json(json)?;
        for record in learned.records.into_values() {
            store.insert(record);
        }
    }

    Ok(store)
}
