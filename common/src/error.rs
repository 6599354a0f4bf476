//! エラー型定義
//!
//! 抽出パイプラインで致命的になるのは「空の入力」だけ。
//! 照合の曖昧さや単位変換の失敗はデータとして表現し、エラーにはしない。

use thiserror::Error;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("入力が空です: {0}")]
    EmptyInput(String),

    #[error("カテゴリがカタログにありません: {0}")]
    UnknownCategory(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;
