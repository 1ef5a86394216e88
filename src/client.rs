//! 修復エンドポイントのHTTPクライアント
//!
//! 1回の送信を `RetryPolicy` で包み、通信エラーと 5xx/408/429 だけを再試行する。
//! 2xx で返ってきたアプリケーションレベルの失敗は再試行しない。

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use photo_restore_common::validate::{check_payload_size, normalize_mime_type};
use photo_restore_common::{
    ApiKeySource, RestoreFailure, RestoreRequest, RestoreResponse, Restorer, RetryPolicy,
};
use tracing::debug;

use crate::error::Result;

pub struct HttpRestoreClient {
    http: reqwest::Client,
    endpoint: String,
    keys: Arc<dyn ApiKeySource>,
    policy: RetryPolicy,
}

impl HttpRestoreClient {
    pub fn new(
        endpoint: impl Into<String>,
        keys: Arc<dyn ApiKeySource>,
        policy: RetryPolicy,
        timeout: std::time::Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            keys,
            policy,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// 1回分の送信
    async fn send_once(&self, request: &RestoreRequest) -> std::result::Result<String, RestoreFailure> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| RestoreFailure::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| RestoreFailure::Network(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<RestoreResponse>(&body)
                .ok()
                .and_then(|r| r.error);
            return Err(RestoreFailure::from_status(status.as_u16(), message));
        }

        let parsed: RestoreResponse = serde_json::from_str(&body)
            .map_err(|e| RestoreFailure::Rejected(format!("レスポンスの解析に失敗しました: {}", e)))?;

        interpret_success(parsed)
    }
}

/// 2xx レスポンスの解釈
///
/// `error` があれば失敗、なければ `image` を返す。どちらもなければ画像なし。
pub fn interpret_success(response: RestoreResponse) -> std::result::Result<String, RestoreFailure> {
    if let Some(error) = response.error.filter(|e| !e.trim().is_empty()) {
        return Err(RestoreFailure::Rejected(error));
    }
    response
        .image
        .filter(|i| !i.is_empty())
        .ok_or(RestoreFailure::MissingImage)
}

#[async_trait]
impl Restorer for HttpRestoreClient {
    async fn restore(&self, bytes: &[u8], mime_type: &str) -> std::result::Result<String, RestoreFailure> {
        // 非対応形式・サイズ超過は送信しない
        let mime_type = normalize_mime_type(mime_type)?;
        let data = STANDARD.encode(bytes);
        check_payload_size(&data)?;

        let request = RestoreRequest::new(data, mime_type, self.keys.current_api_key());
        debug!(
            endpoint = %self.endpoint,
            bytes = bytes.len(),
            has_api_key = request.api_key.is_some(),
            "sending restore request"
        );

        let this = self;
        let request = &request;
        self.policy
            .run(move |_attempt| this.send_once(request), tokio::time::sleep)
            .await
    }
}
