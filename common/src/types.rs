//! 修復エンドポイントの通信型とタスク状態
//!
//! - RestoreRequest: `{ data, mimeType, apiKey? }`
//! - RestoreResponse: `{ image }` または `{ error }`
//! - TaskStatus: pending / processing / done / error

use serde::{Deserialize, Serialize};
use std::fmt;

/// タスクの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Done,
    Error,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Done => "done",
            TaskStatus::Error => "error",
        }
    }

    /// 画面表示用ラベル
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "待機中",
            TaskStatus::Processing => "処理中",
            TaskStatus::Done => "修復済み",
            TaskStatus::Error => "エラー",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 修復リクエスト
///
/// サーバー側では不正なボディも受け付けて検証エラーを返すため、全フィールドOption。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl RestoreRequest {
    /// クライアントからの送信用
    ///
    /// 空白のみのAPIキーは付与しない。
    pub fn new(data: String, mime_type: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            data: Some(data),
            mime_type: Some(mime_type.into()),
            api_key: api_key
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty()),
        }
    }
}

/// 修復レスポンス
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RestoreResponse {
    pub fn image(data_url: impl Into<String>) -> Self {
        Self {
            image: Some(data_url.into()),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            image: None,
            error: Some(message.into()),
        }
    }
}
