use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "smart-paste")]
#[command(about = "貼り付けテキストから機材スペックを抽出するツール", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// テキスト/ファイル/URLからスペックを抽出してJSONを出力
    Parse {
        /// 入力ファイル（省略時は標準入力）
        input: Option<PathBuf>,

        /// 製品ページのURL
        #[arg(long, conflicts_with_all = ["input", "html"])]
        url: Option<String>,

        /// 貼り付け時のHTML（入力ファイルと両方あれば表形式の多い方を採用）
        #[arg(long)]
        html: Option<PathBuf>,

        /// スペックカタログJSONファイル（省略時は設定または組み込みプリセット）
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// カテゴリを指定（自動判定を上書き）
        #[arg(short, long)]
        category: Option<String>,

        /// ヤード・ポンド法での表記を優先
        #[arg(long)]
        imperial: bool,

        /// 複数製品の自動分割を無効化
        #[arg(long)]
        single: bool,

        /// キャッシュを使用（同じ入力の再解析をスキップ）
        #[arg(long)]
        use_cache: bool,

        /// 出力JSONファイル（省略時は表示のみ）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// フォルダ内のファイルを一括解析
    Scan {
        /// 対象フォルダ
        #[arg(required = true)]
        folder: PathBuf,

        /// サブフォルダも再帰的にスキャン
        #[arg(short = 'r', long)]
        recursive: bool,

        /// スペックカタログJSONファイル
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// 出力JSONファイル（デフォルト: 対象フォルダ/smart-paste.json）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 既存レコードと抽出結果の差分を表示
    Diff {
        /// 既存スペックのJSON（{"項目名": "値", ...}）
        #[arg(required = true)]
        existing: PathBuf,

        /// 入力ファイル
        #[arg(required = true)]
        input: PathBuf,

        /// スペックカタログJSONファイル
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// カテゴリを指定
        #[arg(short, long)]
        category: Option<String>,
    },

    /// 抽出結果を対話的に確認して登録用JSONを作成
    Review {
        /// 抽出結果JSONファイル（parse --output の出力）
        #[arg(required = true)]
        input: PathBuf,

        /// 出力先（省略時は標準出力）
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// 学習済みエイリアスを管理
    Alias {
        /// エイリアスを追加（元キー=項目名）
        #[arg(long, value_name = "KEY=FIELD")]
        set: Option<String>,

        /// プリセットを取り込み (retail/rental)
        #[arg(long)]
        preset: Option<String>,

        /// 一覧を表示
        #[arg(long)]
        list: bool,

        /// すべて削除
        #[arg(long)]
        clear: bool,
    },

    /// 設定を表示/編集
    Config {
        /// 取得用プロキシURLを設定（空文字で解除）
        #[arg(long)]
        set_proxy: Option<String>,

        /// メートル法を優先するか
        #[arg(long)]
        prefer_metric: Option<bool>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },

    /// キャッシュ管理
    Cache {
        /// キャッシュを削除
        #[arg(long)]
        clear: bool,

        /// キャッシュ情報を表示
        #[arg(long)]
        info: bool,
    },
}

/// `KEY=FIELD` を分割
pub fn parse_alias_assignment(text: &str) -> Option<(String, String)> {
    let (key, field) = text.split_once('=')?;
    let (key, field) = (key.trim(), field.trim());
    if key.is_empty() || field.is_empty() {
        return None;
    }
    Some((key.to_string(), field.to_string()))
}
