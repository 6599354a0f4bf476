//! スペック項目への割り当て
//!
//! 各ペアをカタログ全体の項目（カテゴリに依存しない）と照合し、最も信頼度の高い項目へ割り当てる。
//! 同点はカタログ順で先の項目。どの方式でも一致しないペアは未割り当てとして残す。

pub mod strategy;

pub use strategy::{
    base_name, AliasStrategy, ExactStrategy, FuzzyStrategy, MatchStrategy, Score, SynonymStrategy,
    ALIAS_CONFIDENCE,
};

use crate::alias::AliasStore;
use crate::catalog::SpecCatalog;
use crate::types::{MatchTier, RawPair, SpecFieldDef};

/// 項目への割り当て候補（競合解決前）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub pair: RawPair,
    pub spec_name: String,
    pub confidence: u8,
    pub tier: MatchTier,
}

/// 照合結果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchOutcome {
    /// 行順
    pub candidates: Vec<Candidate>,
    pub unmatched: Vec<RawPair>,
}

/// 照合器
pub struct FieldMatcher<'a> {
    fields: Vec<&'a SpecFieldDef>,
    strategies: Vec<Box<dyn MatchStrategy + 'a>>,
}

impl<'a> FieldMatcher<'a> {
    /// 標準の方式（エイリアス → 完全一致 → 同義語 → あいまい）で照合器を作成
    pub fn new(catalog: &'a SpecCatalog, aliases: &'a AliasStore, fuzzy_min_overlap: f64) -> Self {
        Self::with_strategies(
            catalog.all_fields(),
            vec![
                Box::new(AliasStrategy::new(aliases)),
                Box::new(ExactStrategy),
                Box::new(SynonymStrategy),
                Box::new(FuzzyStrategy::new(fuzzy_min_overlap)),
            ],
        )
    }

    /// 方式を指定して作成（先頭から順に試す）
    pub fn with_strategies(
        fields: Vec<&'a SpecFieldDef>,
        strategies: Vec<Box<dyn MatchStrategy + 'a>>,
    ) -> Self {
        Self { fields, strategies }
    }

    /// 1組の (ペア, 項目) を採点。最初に結果を返した方式で決まる
    pub fn score(&self, pair: &RawPair, field: &SpecFieldDef) -> Option<Score> {
        self.strategies
            .iter()
            .find_map(|strategy| strategy.try_match(pair, field))
    }

    /// ペアに最も合う項目
    pub fn best_match(&self, pair: &RawPair) -> Option<Candidate> {
        let mut best: Option<(&SpecFieldDef, Score)> = None;

        for field in &self.fields {
            let Some(score) = self.score(pair, field) else {
                continue;
            };
            let better = best
                .as_ref()
                .map_or(true, |(_, current)| score.confidence > current.confidence);
            if better {
                best = Some((field, score));
            }
        }

        best.map(|(field, score)| Candidate {
            pair: pair.clone(),
            spec_name: field.name.clone(),
            confidence: score.confidence,
            tier: score.tier,
        })
    }

    /// 全ペアを照合
    pub fn match_pairs(&self, pairs: &[RawPair]) -> MatchOutcome {
        let mut outcome = MatchOutcome::default();

        for pair in pairs {
            match self.best_match(pair) {
                Some(candidate) => outcome.candidates.push(candidate),
                None => outcome.unmatched.push(pair.clone()),
            }
        }

        tracing::debug!(
            matched = outcome.candidates.len(),
            unmatched = outcome.unmatched.len(),
            "項目照合"
        );
        outcome
    }
}
