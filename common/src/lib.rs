//! Smart Paste Common Library
//!
//! 貼り付けテキストから機材スペックを抽出するエンジン。
//! CLIとWeb(WASM)で共有する（I/Oを持たない純粋な処理のみ）

pub mod error;
pub mod units;
pub mod types;
pub mod text;
pub mod catalog;
pub mod normalizer;
pub mod extractor;
pub mod matcher;
pub mod resolver;
pub mod coerce;
pub mod alias;
pub mod attributes;
pub mod pipeline;
pub mod segmenter;
pub mod diff;
pub mod payload;

pub use error::{Error, Result};
pub use types::{
    Alternative, AliasRecord, BatchItem, Coercion, ConfidenceTier, DiffEntry, DiffStatus, FieldMatch,
    FieldType, MatchTier, NormalizedText, ParseResult, RawPair, Segment, SourceKind, SpecFieldDef,
    UnitSuggestion,
};
pub use units::{normalize_units, Unit};
pub use catalog::{CategorySpec, SpecCatalog};
pub use normalizer::{normalize, normalize_rich};
pub use extractor::extract;
pub use matcher::{FieldMatcher, MatchStrategy};
pub use resolver::resolve;
pub use coerce::coerce_field_value;
pub use alias::{build_alias_store, AliasStore};
pub use pipeline::{parse_text, ParseOptions, SmartPaste};
pub use segmenter::{detect_product_boundaries, parse_batch_products};
pub use diff::{diff_specs, DiffSummary};
pub use payload::{build_apply_payload, ApplyPayload, Overrides};
