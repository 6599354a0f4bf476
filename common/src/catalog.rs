//! スペック項目カタログ
//!
//! カテゴリ名 → 項目定義の並び。呼び出し側から渡され、1回の解析中は読み取り専用。
//! JSONは次のどちらの形でも読み込める:
//! - `{"Camera": ["Sensor Size", {"name": "Weight (kg)", "required": true}]}`
//! - `[{"name": "Camera", "fields": [...]}]`

use crate::error::{Error, Result};
use crate::types::{FieldMatch, FieldType, SpecFieldDef, DIRECT_MIN};
use crate::units::Unit;
use crate::text;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// 1カテゴリぶんの項目定義
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<SpecFieldDef>,
}

impl CategorySpec {
    pub fn new(name: impl Into<String>, fields: Vec<SpecFieldDef>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn has_field(&self, field_name: &str) -> bool {
        self.fields.iter().any(|f| f.name == field_name)
    }
}

/// JSON上の項目表記（名前だけ、または定義オブジェクト）
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldEntry {
    Name(String),
    Def(SpecFieldDef),
}

impl From<FieldEntry> for SpecFieldDef {
    fn from(entry: FieldEntry) -> Self {
        match entry {
            FieldEntry::Name(name) => SpecFieldDef::new(name),
            FieldEntry::Def(def) => def,
        }
    }
}

/// スペック項目カタログ
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecCatalog {
    categories: Vec<CategorySpec>,
}

impl SpecCatalog {
    pub fn new(categories: Vec<CategorySpec>) -> Self {
        Self { categories }
    }

    /// 組み込みプリセットを取得
    pub fn from_preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "gear" | "default" | "機材" => Some(Self::gear_preset()),
            "camera" | "カメラ" => Some(Self::gear_preset().only(&["Camera", "Lens"])),
            "av" | "audio" | "音響" => Some(Self::gear_preset().only(&["Audio", "Lighting"])),
            _ => None,
        }
    }

    /// JSONファイルから読み込み（非WASM環境のみ）
    #[cfg(not(feature = "wasm"))]
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// JSON文字列から読み込み
    pub fn from_json(json: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(json)?;

        let categories = match value {
            serde_json::Value::Object(map) => {
                let mut categories = Vec::with_capacity(map.len());
                for (name, fields) in map {
                    let entries: Vec<FieldEntry> = serde_json::from_value(fields)?;
                    categories.push(CategorySpec::new(
                        name,
                        entries.into_iter().map(SpecFieldDef::from).collect(),
                    ));
                }
                categories
            }
            serde_json::Value::Array(_) => serde_json::from_value(value)?,
            _ => {
                return Err(Error::Config(
                    "カタログはオブジェクトか配列で指定してください".into(),
                ))
            }
        };

        Ok(Self { categories })
    }

    /// カテゴリ名 → 項目定義の形でJSON化
    pub fn to_json(&self) -> Result<String> {
        let mut map = serde_json::Map::new();
        for category in &self.categories {
            map.insert(category.name.clone(), serde_json::to_value(&category.fields)?);
        }
        Ok(serde_json::to_string_pretty(&serde_json::Value::Object(map))?)
    }

    /// 機材台帳用プリセット
    fn gear_preset() -> Self {
        let weight = || SpecFieldDef::new("Weight (kg)").with_unit(Unit::Kg);

        Self::new(vec![
            CategorySpec::new(
                "Camera",
                vec![
                    SpecFieldDef::new("Sensor Size").required(),
                    SpecFieldDef::new("Resolution (MP)").with_type(FieldType::Number),
                    SpecFieldDef::new("Lens Mount").required(),
                    SpecFieldDef::new("ISO Range"),
                    SpecFieldDef::new("Video Resolution"),
                    SpecFieldDef::new("Frame Rate"),
                    SpecFieldDef::new("Battery"),
                    SpecFieldDef::new("Color"),
                    SpecFieldDef::new("Dimensions (cm)"),
                    weight(),
                ],
            ),
            CategorySpec::new(
                "Lens",
                vec![
                    SpecFieldDef::new("Focal Length").required(),
                    SpecFieldDef::new("Aperture").required(),
                    SpecFieldDef::new("Lens Mount").required(),
                    SpecFieldDef::new("Filter Size (mm)"),
                    SpecFieldDef::new("Image Stabilization").with_type(FieldType::Boolean),
                    SpecFieldDef::new("Dimensions (cm)"),
                    weight(),
                ],
            ),
            CategorySpec::new(
                "Audio",
                vec![
                    SpecFieldDef::new("Microphone Type").required(),
                    SpecFieldDef::new("Polar Pattern"),
                    SpecFieldDef::new("Frequency Response"),
                    SpecFieldDef::new("Connector"),
                    SpecFieldDef::new("Phantom Power").with_type(FieldType::Boolean),
                    SpecFieldDef::new("Channels").with_type(FieldType::Integer),
                    weight(),
                ],
            ),
            CategorySpec::new(
                "Lighting",
                vec![
                    SpecFieldDef::new("Power (W)").required(),
                    SpecFieldDef::new("Color Temperature"),
                    SpecFieldDef::new("CRI").with_type(FieldType::Number),
                    SpecFieldDef::new("Battery"),
                    SpecFieldDef::new("Wireless Control").with_type(FieldType::Boolean),
                    weight(),
                ],
            ),
            CategorySpec::new(
                "Computer",
                vec![
                    SpecFieldDef::new("Processor").required(),
                    SpecFieldDef::new("Memory").required(),
                    SpecFieldDef::new("Storage"),
                    SpecFieldDef::new("Screen Size (in)"),
                    SpecFieldDef::new("Battery Capacity (Wh)").with_type(FieldType::Number),
                    SpecFieldDef::new("Color"),
                    weight(),
                ],
            ),
            CategorySpec::new(
                "Grip",
                vec![
                    SpecFieldDef::new("Max Load (kg)").required(),
                    SpecFieldDef::new("Max Height (cm)"),
                    SpecFieldDef::new("Min Height (cm)"),
                    SpecFieldDef::new("Material"),
                    weight(),
                ],
            ),
        ])
    }

    /// 指定カテゴリのみに絞ったカタログを返す
    pub fn only(&self, names: &[&str]) -> Self {
        Self::new(
            self.categories
                .iter()
                .filter(|c| names.iter().any(|n| n.eq_ignore_ascii_case(&c.name)))
                .cloned()
                .collect(),
        )
    }

    /// カタログをマージ（同名カテゴリは後から追加した方の項目を末尾に足す）
    pub fn merge(&mut self, other: &SpecCatalog) {
        for incoming in &other.categories {
            match self
                .categories
                .iter_mut()
                .find(|c| c.name.eq_ignore_ascii_case(&incoming.name))
            {
                Some(existing) => {
                    for field in &incoming.fields {
                        if !existing.has_field(&field.name) {
                            existing.fields.push(field.clone());
                        }
                    }
                }
                None => self.categories.push(incoming.clone()),
            }
        }
    }

    pub fn categories(&self) -> &[CategorySpec] {
        &self.categories
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.categories.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.iter().all(|c| c.fields.is_empty())
    }

    /// カテゴリを名前で検索（大小文字・単複を無視）
    pub fn category(&self, name: &str) -> Option<&CategorySpec> {
        let wanted = text::normalize_key(name);
        self.categories
            .iter()
            .find(|c| same_name_ignoring_plural(&text::normalize_key(&c.name), &wanted))
    }

    /// カタログ全体の項目（名前で重複除去、カタログ順）
    pub fn all_fields(&self) -> Vec<&SpecFieldDef> {
        let mut seen = HashSet::new();
        self.categories
            .iter()
            .flat_map(|c| c.fields.iter())
            .filter(|f| seen.insert(f.name.as_str()))
            .collect()
    }

    /// 項目定義を名前で検索
    pub fn field(&self, name: &str) -> Option<&SpecFieldDef> {
        self.categories
            .iter()
            .flat_map(|c| c.fields.iter())
            .find(|f| f.name == name)
    }

    pub fn contains_field(&self, category: &str, field_name: &str) -> bool {
        self.category(category)
            .map(|c| c.has_field(field_name))
            .unwrap_or(false)
    }

    /// 割り当てられた項目からカテゴリを判定
    ///
    /// 各項目は「その項目を持つカテゴリ数」の逆数で加点する（共通項目ほど弱い）。
    /// 首位が同点の場合は判定不能としてNone
    pub fn detect_category<'a>(&self, matched: impl IntoIterator<Item = &'a str>) -> Option<String> {
        let matched: Vec<&str> = matched.into_iter().collect();
        if matched.is_empty() {
            return None;
        }

        let scores: Vec<(&str, f64)> = self
            .categories
            .iter()
            .map(|category| {
                let score = matched
                    .iter()
                    .filter(|name| category.has_field(name))
                    .map(|name| {
                        let holders = self.categories.iter().filter(|c| c.has_field(name)).count();
                        1.0 / holders.max(1) as f64
                    })
                    .sum::<f64>();
                (category.name.as_str(), score)
            })
            .collect();

        let best = scores.iter().map(|(_, s)| *s).fold(0.0_f64, f64::max);
        if best <= 0.0 {
            return None;
        }

        let leaders: Vec<&str> = scores
            .iter()
            .filter(|(_, s)| (best - s).abs() < 1e-9)
            .map(|(name, _)| *name)
            .collect();

        match leaders.as_slice() {
            [only] => Some(only.to_string()),
            _ => None,
        }
    }

    /// カテゴリ表示用に絞り込む
    ///
    /// カテゴリ外の項目は「確実」ランクの割り当てのみ残す。カテゴリ未判定なら全件
    pub fn filter_for_category(
        &self,
        matches: &BTreeMap<String, FieldMatch>,
        category: Option<&str>,
    ) -> BTreeMap<String, FieldMatch> {
        let Some(category) = category.and_then(|c| self.category(c)) else {
            return matches.clone();
        };

        matches
            .iter()
            .filter(|(name, m)| category.has_field(name) || m.confidence >= DIRECT_MIN)
            .map(|(name, m)| (name.clone(), m.clone()))
            .collect()
    }

    /// カテゴリ内の必須項目のうち、割り当てがないもの
    pub fn missing_required(
        &self,
        category: &str,
        fields: &BTreeMap<String, FieldMatch>,
    ) -> Vec<&str> {
        self.category(category)
            .map(|c| {
                c.fields
                    .iter()
                    .filter(|f| f.required && !fields.contains_key(&f.name))
                    .map(|f| f.name.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// 単数/複数の違いを無視して比較（"camera" = "cameras"、"lens" = "lenses"）
fn same_name_ignoring_plural(a: &str, b: &str) -> bool {
    let plural_of = |singular: &str, plural: &str| {
        plural
            .strip_prefix(singular)
            .is_some_and(|suffix| suffix == "s" || suffix == "es")
    };
    !a.is_empty() && (a == b || plural_of(a, b) || plural_of(b, a))
}
