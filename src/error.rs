use thiserror::Error;

#[derive(Error, Debug)]
pub enum PasteError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("ファイルが見つかりません: {0}")]
    FileNotFound(String),

    #[error("フォルダが見つかりません: {0}")]
    FolderNotFound(String),

    #[error("未対応のファイル形式です: {0}（txt/csv/tsv/md/rtf/pdf/xlsx/xls/ods/html に対応）")]
    UnsupportedFormat(String),

    #[error("ファイル読み込みエラー: {0}")]
    FileRead(String),

    #[error("ページ取得エラー: {0}")]
    Fetch(String),

    #[error("対話入力エラー: {0}")]
    Interaction(String),

    #[error("JSON解析エラー: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] smart_paste_common::Error),
}

pub type Result<T> = std::result::Result<T, PasteError>;
