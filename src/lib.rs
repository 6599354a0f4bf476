//! smart-paste CLI
//!
//! 抽出エンジン（smart-paste-common）に、ファイル読み込み・ページ取得・
//! キャッシュ・対話確認などの周辺処理を付け加える。

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod reader;
pub mod report;
pub mod review;
pub mod scanner;
pub mod workflow;

pub use error::{PasteError, Result};
pub use workflow::{ParseOutput, SourceInput};
