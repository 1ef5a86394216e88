use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "photo-restore")]
#[command(about = "古い写真の一括AI修復ツール（切り抜き・補正・修復・カラー化）", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 写真を一括修復して保存
    Restore {
        /// 写真ファイルまたはフォルダ（複数可）
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// 保存先フォルダ（デフォルト: カレント）
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// サブフォルダも再帰的にスキャン
        #[arg(short = 'r', long)]
        recursive: bool,

        /// 修復エンドポイントURL
        #[arg(long)]
        endpoint: Option<String>,

        /// このときだけ使うAPIキー（保存はしない）
        #[arg(long)]
        api_key: Option<String>,

        /// 失敗したタスクを1件ずつ再試行
        #[arg(long)]
        retry_failed: bool,
    },

    /// 修復エンドポイントを起動
    Serve {
        /// 待ち受けアドレス（デフォルト: 設定値）
        #[arg(long)]
        addr: Option<String>,

        /// 使用するGeminiモデル
        #[arg(long)]
        model: Option<String>,
    },

    /// 設定を表示/編集
    Config {
        /// APIキーを設定
        #[arg(long)]
        set_api_key: Option<String>,

        /// APIキーを対話的に入力（入力は表示しない）
        #[arg(long)]
        prompt_api_key: bool,

        /// APIキーを削除
        #[arg(long)]
        clear_api_key: bool,

        /// 修復エンドポイントURLを設定
        #[arg(long)]
        set_endpoint: Option<String>,

        /// 設定を表示
        #[arg(long)]
        show: bool,
    },
}
