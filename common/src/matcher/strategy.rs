//! 照合方式（エイリアス → 完全一致 → 同義語 → あいまい）
//!
//! 各方式は1つの (ペア, 項目) について信頼度を返すか、対象外ならNoneを返す。

use crate::alias::AliasStore;
use crate::text;
use crate::types::{MatchTier, RawPair, SpecFieldDef};
use regex::Regex;

/// エイリアス一致の信頼度
pub const ALIAS_CONFIDENCE: u8 = 95;
/// あいまい一致の信頼度の範囲
pub const FUZZY_FLOOR: u8 = 40;
pub const FUZZY_CEILING: u8 = 59;

/// 1組の照合結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    /// 0..=100
    pub confidence: u8,
    pub tier: MatchTier,
}

impl Score {
    pub fn new(confidence: u8, tier: MatchTier) -> Self {
        Self {
            confidence: confidence.min(100),
            tier,
        }
    }
}

/// 照合方式の共通インターフェース
pub trait MatchStrategy: Send + Sync {
    /// この方式で得た一致に付ける種別
    fn tier(&self) -> MatchTier;

    fn try_match(&self, pair: &RawPair, field: &SpecFieldDef) -> Option<Score>;
}

/// 学習済みエイリアスによる一致
pub struct AliasStrategy<'a> {
    store: &'a AliasStore,
}

impl<'a> AliasStrategy<'a> {
    pub fn new(store: &'a AliasStore) -> Self {
        Self { store }
    }
}

impl MatchStrategy for AliasStrategy<'_> {
    fn tier(&self) -> MatchTier {
        MatchTier::Alias
    }

    fn try_match(&self, pair: &RawPair, field: &SpecFieldDef) -> Option<Score> {
        match self.store.lookup(&pair.key) {
            Some(spec_name) if spec_name == field.name => {
                Some(Score::new(ALIAS_CONFIDENCE, self.tier()))
            }
            _ => None,
        }
    }
}

/// 項目名との一致（完全 100 / 大小文字無視 95 / 記号・空白無視 90）
pub struct ExactStrategy;

impl MatchStrategy for ExactStrategy {
    fn tier(&self) -> MatchTier {
        MatchTier::Exact
    }

    fn try_match(&self, pair: &RawPair, field: &SpecFieldDef) -> Option<Score> {
        let key = pair.key.trim();
        let confidence = if key == field.name {
            100
        } else if key.to_lowercase() == field.name.trim().to_lowercase() {
            95
        } else if text::normalize_key(key) == text::normalize_key(&field.name) {
            90
        } else {
            return None;
        };
        Some(Score::new(confidence, self.tier()))
    }
}

/// 単位表記の除去・略語展開による一致
///
/// - 単位表記を除いた名前が一致: 84
/// - 略語/同義語を展開して一致: 75
/// - 展開後、単位表記を除いた名前と一致: 70
pub struct SynonymStrategy;

impl MatchStrategy for SynonymStrategy {
    fn tier(&self) -> MatchTier {
        MatchTier::Synonym
    }

    fn try_match(&self, pair: &RawPair, field: &SpecFieldDef) -> Option<Score> {
        let key_base = base_name(&pair.key);
        let field_base = base_name(&field.name);

        let confidence = if text::normalize_key(key_base) == text::normalize_key(field_base) {
            84
        } else {
            let key_canonical = text::canonical_phrase(key_base);
            if key_canonical.is_empty() {
                return None;
            }
            if key_canonical == text::canonical_phrase(&field.name) {
                75
            } else if key_canonical == text::canonical_phrase(field_base) {
                70
            } else {
                return None;
            }
        };
        Some(Score::new(confidence, self.tier()))
    }
}

/// 有意トークンの重なりによる一致（Dice係数）
///
/// 重なり `d` が `min_overlap` 以上のとき、40..=59 に線形に割り当てる
pub struct FuzzyStrategy {
    min_overlap: f64,
}

impl FuzzyStrategy {
    pub fn new(min_overlap: f64) -> Self {
        Self {
            min_overlap: min_overlap.clamp(0.05, 1.0),
        }
    }

    /// 重なり度合いを信頼度に変換（しきい値未満はNone）
    pub fn confidence_for(&self, overlap: f64) -> Option<u8> {
        if overlap < self.min_overlap || overlap <= 0.0 {
            return None;
        }
        let span = 1.0 - self.min_overlap;
        let ratio = if span <= f64::EPSILON {
            1.0
        } else {
            ((overlap - self.min_overlap) / span).clamp(0.0, 1.0)
        };
        let bonus = (f64::from(FUZZY_CEILING - FUZZY_FLOOR) * ratio).round() as u8;
        Some(FUZZY_FLOOR + bonus)
    }
}

impl Default for FuzzyStrategy {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl MatchStrategy for FuzzyStrategy {
    fn tier(&self) -> MatchTier {
        MatchTier::Fuzzy
    }

    fn try_match(&self, pair: &RawPair, field: &SpecFieldDef) -> Option<Score> {
        let key_tokens = text::significant_tokens(&pair.key);
        let field_tokens = text::significant_tokens(&field.name);
        let overlap = text::token_overlap(&key_tokens, &field_tokens);

        self.confidence_for(overlap)
            .map(|confidence| Score::new(confidence, self.tier()))
    }
}

lazy_static::lazy_static! {
    static ref TRAILING_GROUP_RE: Regex = Regex::new(r"\s*[(\[][^)\]]*[)\]]\s*$").unwrap();
}

/// 末尾の括弧書きを除いた名前 ("Weight (kg)" → "Weight", "Resolution (MP)" → "Resolution")
pub fn base_name(name: &str) -> &str {
    let trimmed = name.trim();
    match TRAILING_GROUP_RE.find(trimmed) {
        Some(m) if m.start() > 0 => trimmed[..m.start()].trim_end(),
        _ => trimmed,
    }
}
