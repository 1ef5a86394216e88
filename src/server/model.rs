//! 画像生成モデルの境界

use async_trait::async_trait;
use thiserror::Error;

/// モデルが返した画像（Base64）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub mime_type: Option<String>,
    pub data: String,
}

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("モデルへのリクエストに失敗: {0}")]
    Request(#[from] reqwest::Error),

    #[error("モデルがエラーを返しました ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("モデルのレスポンスを解析できません: {0}")]
    Parse(String),
}

impl ModelError {
    /// モデル側のエラーメッセージ（`{"error":{"message":...}}`）
    pub fn upstream_message(&self) -> Option<String> {
        let ModelError::Status { body, .. } = self else {
            return None;
        };
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        value
            .pointer("/error/message")
            .and_then(|m| m.as_str())
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
    }

    /// APIキーが無効・権限不足による拒否か
    pub fn is_auth_rejection(&self) -> bool {
        match self {
            ModelError::Status { status: 401 | 403, .. } => true,
            ModelError::Status { status: 400, body } => {
                body.contains("API_KEY_INVALID") || body.contains("API key not valid")
            }
            _ => false,
        }
    }
}

#[async_trait]
pub trait ImageModel: Send + Sync {
    /// 元画像（Base64）を修復する。画像が返らなければ `Ok(None)`
    async fn restore_image(
        &self,
        api_key: &str,
        data: &str,
        mime_type: &str,
    ) -> Result<Option<GeneratedImage>, ModelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(status: u16, body: &str) -> ModelError {
        ModelError::Status {
            status,
            body: body.to_string(),
        }
    }

    #[test]
    fn test_upstream_message() {
        let err = status(
            400,
            r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#,
        );
        assert_eq!(
            err.upstream_message().as_deref(),
            Some("API key not valid. Please pass a valid API key.")
        );
        assert_eq!(status(500, "<html>").upstream_message(), None);
        assert_eq!(ModelError::Parse("x".into()).upstream_message(), None);
    }

    #[test]
    fn test_is_auth_rejection() {
        assert!(status(400, r#"{"error":{"details":[{"reason":"API_KEY_INVALID"}]}}"#).is_auth_rejection());
        assert!(status(401, "").is_auth_rejection());
        assert!(status(403, "PERMISSION_DENIED").is_auth_rejection());
        assert!(!status(400, r#"{"error":{"message":"Unable to process input image"}}"#).is_auth_rejection());
        assert!(!status(503, "").is_auth_rejection());
    }
}
