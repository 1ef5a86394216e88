//! エラー型定義
//!
//! - Error: 共通ライブラリ内部のエラー
//! - RestoreFailure: 1タスク分の修復失敗（タスクの errorDetail になる）

use thiserror::Error;

use crate::types::TaskStatus;

/// 共通エラー型
#[derive(Error, Debug)]
pub enum Error {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Data URLが不正です: {0}")]
    InvalidDataUrl(String),

    #[error("状態遷移が不正です: {from} -> {to}")]
    InvalidTransition { from: TaskStatus, to: TaskStatus },
}

/// Result型エイリアス
pub type Result<T> = std::result::Result<T, Error>;

/// 失敗の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 不正なリクエスト・非対応形式・サイズ超過
    Validation,
    /// APIキー不足・認証エラー
    Auth,
    /// 通信エラー・非2xxレスポンス
    TransientNetwork,
    /// モデルが画像を返さなかった
    ModelOutput,
}

/// 修復1件の失敗
///
/// `Display` はサーバーから返されたメッセージをそのまま使う。
/// サーバー側のメッセージがない場合のみ汎用メッセージを合成する。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RestoreFailure {
    /// 送信前またはエンドポイントでの入力検証エラー
    #[error("{0}")]
    Validation(String),

    /// 認証エラー（401/403、APIキー未設定）
    #[error("{0}")]
    Auth(String),

    /// fetchレベルの通信エラー
    #[error("通信エラー: {0}")]
    Network(String),

    /// 非2xxステータス
    #[error("{}", http_message(.status, .message))]
    Http { status: u16, message: Option<String> },

    /// 2xxだがボディに `error` が入っていた
    #[error("{0}")]
    Rejected(String),

    /// 2xxだが画像が含まれていなかった
    #[error("AIが修復画像を生成できませんでした")]
    MissingImage,
}

fn http_message(status: &u16, message: &Option<String>) -> String {
    match message.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => format!("リクエスト失敗 ({})", status),
    }
}

impl RestoreFailure {
    /// エラー分類
    pub fn kind(&self) -> FailureKind {
        match self {
            RestoreFailure::Validation(_) => FailureKind::Validation,
            RestoreFailure::Auth(_) => FailureKind::Auth,
            RestoreFailure::Network(_) | RestoreFailure::Http { .. } => {
                FailureKind::TransientNetwork
            }
            RestoreFailure::Rejected(_) | RestoreFailure::MissingImage => FailureKind::ModelOutput,
        }
    }

    /// 非2xxレスポンスをステータスコードで分類
    ///
    /// 400/413/415/422 は検証エラー、401/403 は認証エラー、それ以外は `Http`。
    pub fn from_status(status: u16, message: Option<String>) -> Self {
        let text = message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        match (status, text) {
            (400 | 413 | 415 | 422, Some(text)) => RestoreFailure::Validation(text),
            (401 | 403, Some(text)) => RestoreFailure::Auth(text),
            (401 | 403, None) => RestoreFailure::Auth(format!("認証に失敗しました ({})", status)),
            (status, message) => RestoreFailure::Http { status, message },
        }
    }
}
