//! 抽出パイプライン
//!
//! 正規化 → ペア抽出 → 項目照合 → 統合/競合判定 → 単位・型の提案 を同期的に実行し、
//! 1製品につき1つの不変な ParseResult を返す。

use crate::alias::AliasStore;
use crate::attributes;
use crate::catalog::SpecCatalog;
use crate::coerce;
use crate::error::{Error, Result};
use crate::extractor;
use crate::matcher::FieldMatcher;
use crate::normalizer;
use crate::resolver;
use crate::segmenter;
use crate::types::{BatchItem, NormalizedText, ParseResult, SourceKind};
use serde::{Deserialize, Serialize};

/// 解析オプション
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseOptions {
    /// 単位換算の提案をメートル法に寄せる
    #[serde(default = "default_prefer_metric")]
    pub prefer_metric: bool,
    /// あいまい一致とみなすトークン重なりの下限（0.0〜1.0）
    #[serde(default = "default_fuzzy_min_overlap")]
    pub fuzzy_min_overlap: f64,
    /// カテゴリを固定する（未指定なら自動判定）
    #[serde(default)]
    pub category: Option<String>,
}

fn default_prefer_metric() -> bool {
    true
}

fn default_fuzzy_min_overlap() -> f64 {
    0.5
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            prefer_metric: default_prefer_metric(),
            fuzzy_min_overlap: default_fuzzy_min_overlap(),
            category: None,
        }
    }
}

/// 抽出エンジン（カタログとエイリアスは解析中読み取り専用）
#[derive(Debug, Clone)]
pub struct SmartPaste<'a> {
    catalog: &'a SpecCatalog,
    aliases: &'a AliasStore,
    options: ParseOptions,
}

impl<'a> SmartPaste<'a> {
    pub fn new(catalog: &'a SpecCatalog, aliases: &'a AliasStore) -> Self {
        Self {
            catalog,
            aliases,
            options: ParseOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn catalog(&self) -> &SpecCatalog {
        self.catalog
    }

    /// 生テキストを1製品として解析
    pub fn parse(&self, raw: &str, kind: SourceKind) -> Result<ParseResult> {
        let text = normalizer::normalize(raw, kind)?;
        self.parse_normalized(&text, kind)
    }

    /// プレーン版とマークアップ版の両方がある貼り付けを解析
    pub fn parse_rich(&self, plain: Option<&str>, markup: &str, kind: SourceKind) -> Result<ParseResult> {
        let text = normalizer::normalize_rich(plain, markup, kind)?;
        self.parse_normalized(&text, kind)
    }

    pub fn parse_normalized(&self, text: &NormalizedText, kind: SourceKind) -> Result<ParseResult> {
        self.parse_lines(&text.lines, kind)
    }

    /// 正規化済みの行を解析
    pub fn parse_lines(&self, lines: &[String], kind: SourceKind) -> Result<ParseResult> {
        if lines.iter().all(|l| l.trim().is_empty()) {
            return Err(Error::EmptyInput("解析する行がありません".to_string()));
        }

        let extraction = extractor::extract(lines);
        let attrs = attributes::extract_attributes(lines, &extraction.pairs, self.catalog);

        let matcher = FieldMatcher::new(self.catalog, self.aliases, self.options.fuzzy_min_overlap);
        let outcome = matcher.match_pairs(&extraction.pairs);

        let mut catalog_matches = resolver::resolve(&outcome.candidates);
        for (name, field_match) in catalog_matches.iter_mut() {
            if let Some(field) = self.catalog.field(name) {
                coerce::annotate(field, field_match, self.options.prefer_metric);
            }
        }

        let category = match &self.options.category {
            Some(requested) => Some(
                self.catalog
                    .category(requested)
                    .map(|c| c.name.clone())
                    .ok_or_else(|| Error::UnknownCategory(requested.clone()))?,
            ),
            None => attrs.category_hint.clone().or_else(|| {
                self.catalog
                    .detect_category(catalog_matches.keys().map(String::as_str))
            }),
        };

        let fields = self
            .catalog
            .filter_for_category(&catalog_matches, category.as_deref());

        tracing::debug!(
            lines = lines.len(),
            pairs = extraction.pairs.len(),
            matched = catalog_matches.len(),
            shown = fields.len(),
            category = ?category,
            "解析完了"
        );

        Ok(ParseResult {
            name: attrs.name,
            brand: attrs.brand,
            category,
            purchase_price: attrs.purchase_price,
            price_note: attrs.price_note,
            model_number: attrs.model_number,
            serial_number: attrs.serial_number,
            source_kind: kind,
            fields,
            catalog_matches,
            raw_extracted: extraction.pairs,
            unmatched_pairs: outcome.unmatched,
            source_lines: lines.to_vec(),
        })
    }

    /// 複数製品を含む可能性のあるテキストを解析
    pub fn parse_batch(&self, raw: &str, kind: SourceKind) -> Result<Vec<BatchItem>> {
        let text = normalizer::normalize(raw, kind)?;
        self.parse_batch_normalized(&text, kind)
    }

    pub fn parse_batch_normalized(&self, text: &NormalizedText, kind: SourceKind) -> Result<Vec<BatchItem>> {
        segmenter::parse_segments(self, &text.lines, kind)
    }
}

/// 既定のオプションで1製品を解析
pub fn parse_text(raw: &str, catalog: &SpecCatalog, aliases: &AliasStore) -> Result<ParseResult> {
    SmartPaste::new(catalog, aliases).parse(raw, SourceKind::Paste)
}

impl ParseResult {
    /// 別カテゴリで表示用の項目を絞り直す（再解析はしない）
    pub fn recategorize(&self, catalog: &SpecCatalog, category: &str) -> Result<ParseResult> {
        let category = catalog
            .category(category)
            .ok_or_else(|| Error::UnknownCategory(category.to_string()))?;

        Ok(ParseResult {
            category: Some(category.name.clone()),
            fields: catalog.filter_for_category(&self.catalog_matches, Some(&category.name)),
            ..self.clone()
        })
    }

    /// 判定カテゴリの必須項目のうち、値がないもの
    pub fn missing_required<'c>(&self, catalog: &'c SpecCatalog) -> Vec<&'c str> {
        match &self.category {
            Some(category) => catalog.missing_required(category, &self.fields),
            None => Vec::new(),
        }
    }

    /// 競合している項目名
    pub fn conflicts(&self) -> impl Iterator<Item = &str> {
        self.fields
            .values()
            .filter(|m| m.has_conflict)
            .map(|m| m.spec_name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CategorySpec;
    use crate::types::{ConfidenceTier, MatchTier, SpecFieldDef};

    fn scenario_catalog() -> SpecCatalog {
        SpecCatalog::new(vec![CategorySpec::new(
            "Camera",
            vec![
                SpecFieldDef::new("Brand"),
                SpecFieldDef::new("Weight (kg)"),
                SpecFieldDef::new("Color"),
                SpecFieldDef::new("Price").with_type(crate::types::FieldType::Currency),
            ],
        )])
    }

    // ========================================
    // 基本シナリオ
    // ========================================

    #[test]
    fn test_weight_scenario() {
        let catalog = scenario_catalog();
        let aliases = AliasStore::new();
        let result = parse_text("Brand: Canon\nModel: EOS R5\nWeight: 1.4 lbs", &catalog, &aliases).unwrap();

        assert_eq!(result.brand.as_deref(), Some("Canon"));
        let weight = result.fields.get("Weight (kg)").expect("Weight (kg) が割り当てられるべき");
        assert_ne!(weight.confidence_tier(), ConfidenceTier::Fuzzy);
        let suggestion = weight.unit_info.as_ref().expect("単位換算の提案があるべき");
        assert_eq!(suggestion.normalized, "0.635 kg");
        assert_eq!(weight.value, "1.4 lbs");
    }

    #[test]
    fn test_color_scenario_equal_values() {
        let catalog = scenario_catalog();
        let aliases = AliasStore::new();
        let result = parse_text("Color: Black\nColour: Black", &catalog, &aliases).unwrap();

        let color = &result.fields["Color"];
        assert!(!color.has_conflict);
        assert_eq!(color.alternatives.len(), 1);
    }

    #[test]
    fn test_price_scenario_conflict() {
        let catalog = scenario_catalog();
        let aliases = AliasStore::new();
        let result = parse_text("Price: $100\nPrice: $150", &catalog, &aliases).unwrap();

        let price = &result.fields["Price"];
        assert!(price.has_conflict);
        let values: Vec<&str> = price.candidate_values().collect();
        assert!(values.contains(&"$100") && values.contains(&"$150"));
        assert_eq!(result.conflicts().collect::<Vec<_>>(), vec!["Price"]);
        assert_eq!(price.coerced.as_ref().map(|c| c.coerced.as_str()), Some("100.00"));
    }

    #[test]
    fn test_alias_scenario() {
        let catalog = scenario_catalog();
        let mut aliases = AliasStore::new();
        aliases.record_alias("Mfr", "Brand");

        let result = parse_text("Mfr: Sony", &catalog, &aliases).unwrap();
        let brand = &result.fields["Brand"];
        assert_eq!(brand.tier, MatchTier::Alias);
        assert_eq!(brand.confidence, 95);
        assert_eq!(result.brand.as_deref(), Some("Sony"));
    }

    #[test]
    fn test_inline_tags_do_not_reach_keys() {
        let catalog = scenario_catalog();
        let aliases = AliasStore::new();
        let result = parse_text("<strong>Brand:</strong> Canon\n<b>Color</b>: Black", &catalog, &aliases).unwrap();

        let color = &result.fields["Color"];
        assert_eq!(color.source_key, "Color");
        assert_eq!(color.confidence, 100);
        assert_eq!(result.brand.as_deref(), Some("Canon"));
    }

    #[test]
    fn test_empty_input_is_error() {
        let catalog = scenario_catalog();
        let aliases = AliasStore::new();
        assert!(matches!(parse_text("  \n ", &catalog, &aliases), Err(Error::EmptyInput(_))));

        let engine = SmartPaste::new(&catalog, &aliases);
        assert!(engine.parse_lines(&[], SourceKind::Paste).is_err());
    }

    #[test]
    fn test_no_pairs_still_returns_result() {
        let catalog = scenario_catalog();
        let aliases = AliasStore::new();
        let result = parse_text("Just a product description line", &catalog, &aliases).unwrap();
        assert!(result.fields.is_empty());
        assert_eq!(result.name, "Just a product description line");
    }

    // ========================================
    // 不変条件
    // ========================================

    #[test]
    fn test_line_index_matches_source_lines() {
        let catalog = SpecCatalog::from_preset("gear").unwrap();
        let aliases = AliasStore::new();
        let result = parse_text(
            "Canon EOS R5\n\nSensor Size: Full Frame\nWeight 738 g\n| Lens Mount | RF |",
            &catalog,
            &aliases,
        )
        .unwrap();

        assert_eq!(result.raw_extracted.len(), 3);
        for pair in &result.raw_extracted {
            assert!(result.source_lines[pair.line_index].contains(&pair.value));
        }
        let order: Vec<usize> = result.raw_extracted.iter().map(|p| p.line_index).collect();
        assert_eq!(order, vec![2, 3, 4]);
    }

    #[test]
    fn test_reparse_is_identical() {
        let catalog = SpecCatalog::from_preset("gear").unwrap();
        let aliases = AliasStore::new();
        let text = "Focal Length: 24-70 mm\nAperture: f/2.8\nMount: RF\nWeight: 2 lb";
        let a = parse_text(text, &catalog, &aliases).unwrap();
        let b = parse_text(text, &catalog, &aliases).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_fields_subset_of_catalog() {
        let catalog = SpecCatalog::from_preset("gear").unwrap();
        let aliases = AliasStore::new();
        let result = parse_text(
            "Sensor Size: APS-C\nPolar Pattern: Cardioid\nWt: 1 kg\nShipping: Free",
            &catalog,
            &aliases,
        )
        .unwrap();

        for (name, field_match) in &result.fields {
            assert!(catalog.field(name).is_some());
            assert!(field_match.confidence <= 100);
            let confidences: Vec<u8> = field_match.alternatives.iter().map(|a| a.confidence).collect();
            assert!(confidences.windows(2).all(|w| w[0] >= w[1]));
        }
        assert_eq!(result.unmatched_pairs.len(), 1);
    }

    // ========================================
    // カテゴリ
    // ========================================

    #[test]
    fn test_category_detection_and_filter() {
        let catalog = SpecCatalog::from_preset("gear").unwrap();
        let aliases = AliasStore::new();
        let result = parse_text(
            "Focal Length: 50 mm\nAperture: f/1.8\nLens Mount: RF\nProcessor Speed: 3 GHz",
            &catalog,
            &aliases,
        )
        .unwrap();

        assert_eq!(result.category.as_deref(), Some("Lens"));
        assert!(result.fields.contains_key("Focal Length"));
        assert!(!result.fields.contains_key("Processor"));
        assert!(result.catalog_matches.contains_key("Processor"));
    }

    #[test]
    fn test_recategorize_without_reparse() {
        let catalog = SpecCatalog::from_preset("gear").unwrap();
        let aliases = AliasStore::new();
        let result = parse_text(
            "Focal Length: 50 mm\nAperture: f/1.8\nProcessor Speed: 3 GHz",
            &catalog,
            &aliases,
        )
        .unwrap();

        let computer = result.recategorize(&catalog, "computers").unwrap();
        assert_eq!(computer.category.as_deref(), Some("Computer"));
        assert!(computer.fields.contains_key("Processor"));
        assert_eq!(computer.raw_extracted, result.raw_extracted);

        assert!(matches!(
            result.recategorize(&catalog, "Drones"),
            Err(Error::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_fixed_category_option() {
        let catalog = SpecCatalog::from_preset("gear").unwrap();
        let aliases = AliasStore::new();
        let options = ParseOptions {
            category: Some("grip".to_string()),
            ..Default::default()
        };
        let engine = SmartPaste::new(&catalog, &aliases).with_options(options);
        let result = engine.parse("Max Load: 8 kg", SourceKind::Paste).unwrap();
        assert_eq!(result.category.as_deref(), Some("Grip"));

        let bad = SmartPaste::new(&catalog, &aliases).with_options(ParseOptions {
            category: Some("Drones".to_string()),
            ..Default::default()
        });
        assert!(matches!(
            bad.parse("Max Load: 8 kg", SourceKind::Paste),
            Err(Error::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_missing_required() {
        let catalog = SpecCatalog::from_preset("gear").unwrap();
        let aliases = AliasStore::new();
        let result = parse_text("Focal Length: 50 mm\nAperture: f/1.8", &catalog, &aliases).unwrap();
        assert_eq!(result.category.as_deref(), Some("Lens"));
        assert_eq!(result.missing_required(&catalog), vec!["Lens Mount"]);
    }

    #[test]
    fn test_imperial_preference() {
        let catalog = SpecCatalog::new(vec![CategorySpec::new(
            "Grip",
            vec![SpecFieldDef::new("Max Height")],
        )]);
        let aliases = AliasStore::new();
        let engine = SmartPaste::new(&catalog, &aliases).with_options(ParseOptions {
            prefer_metric: false,
            ..Default::default()
        });
        let result = engine.parse("Max Height: 200 cm", SourceKind::Paste).unwrap();
        let suggestion = result.fields["Max Height"].unit_info.as_ref().unwrap();
        assert_eq!(suggestion.normalized, "78.74 in");
    }
}
