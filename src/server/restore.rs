//! POST /api/restore ハンドラ
//!
//! 1. JSONとして読めなければ 400
//! 2. 画像データ・形式・サイズの検証に失敗したら 400
//! 3. APIキーがなければ 401
//! 4. モデルがAPIキーを拒否したら 401、その他の 4xx は 400（どちらも再試行しない）
//! 5. 429 はそのまま、5xx・通信エラーは 502（クライアントは再試行する）
//! 6. 画像が返らなければ 200 + error（再試行しない）

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use photo_restore_common::data_url::build_data_url;
use photo_restore_common::validate::{validate_request, MSG_MALFORMED_BODY};
use photo_restore_common::{RestoreRequest, RestoreResponse};
use tracing::{error, info, warn};

use super::model::ModelError;
use super::AppState;

pub const MSG_MISSING_API_KEY: &str = "先に設定で Gemini APIキーを登録してください";
pub const MSG_MODEL_FAILED: &str = "AI修復に失敗しました。ネットワークを確認するか、しばらくしてから再試行してください";
pub const MSG_NO_IMAGE: &str = "AIが修復画像を生成できませんでした。再試行してください";
pub const MSG_INVALID_API_KEY: &str = "Gemini APIキーが無効か、権限がありません";
pub const MSG_MODEL_REJECTED: &str = "AIがリクエストを受け付けませんでした";
pub const MSG_MODEL_BUSY: &str = "AIの利用上限に達しました。しばらくしてから再試行してください";

/// 出力画像のMIMEタイプが返らなかったとき
const DEFAULT_OUTPUT_MIME: &str = "image/png";

type Reply = (StatusCode, Json<RestoreResponse>);

fn reply_error(status: StatusCode, message: impl Into<String>) -> Reply {
    (status, Json(RestoreResponse::error(message)))
}

pub async fn restore(State(state): State<AppState>, body: Bytes) -> Reply {
    let request: RestoreRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "malformed restore request");
            return reply_error(StatusCode::BAD_REQUEST, MSG_MALFORMED_BODY);
        }
    };

    let validated = match validate_request(&request) {
        Ok(validated) => validated,
        Err(failure) => {
            warn!(error = %failure, "restore request rejected");
            return reply_error(StatusCode::BAD_REQUEST, failure.to_string());
        }
    };

    let api_key = match validated
        .api_key
        .map(str::to_string)
        .or_else(|| state.server_api_key.clone())
    {
        Some(key) => key,
        None => return reply_error(StatusCode::UNAUTHORIZED, MSG_MISSING_API_KEY),
    };

    let result = state
        .model
        .restore_image(&api_key, validated.data, &validated.mime_type)
        .await;

    match result {
        Ok(Some(image)) => {
            let mime_type = image.mime_type.as_deref().unwrap_or(DEFAULT_OUTPUT_MIME);
            info!(mime_type, "restored image generated");
            (
                StatusCode::OK,
                Json(RestoreResponse::image(build_data_url(mime_type, &image.data))),
            )
        }
        Ok(None) => {
            warn!("model returned no image part");
            reply_error(StatusCode::OK, MSG_NO_IMAGE)
        }
        Err(e) => {
            error!(error = %e, "model call failed");
            let (status, message) = classify_model_error(&e);
            reply_error(status, message)
        }
    }
}

/// モデル呼び出しの失敗をクライアント向けのステータスとメッセージに変換
///
/// モデル側のメッセージがあれば付け加える。
pub fn classify_model_error(err: &ModelError) -> (StatusCode, String) {
    let (status, base) = match err {
        _ if err.is_auth_rejection() => (StatusCode::UNAUTHORIZED, MSG_INVALID_API_KEY),
        ModelError::Status { status: 429, .. } => (StatusCode::TOO_MANY_REQUESTS, MSG_MODEL_BUSY),
        ModelError::Status { status, .. } if (400..500).contains(status) && *status != 408 => {
            (StatusCode::BAD_REQUEST, MSG_MODEL_REJECTED)
        }
        _ => return (StatusCode::BAD_GATEWAY, MSG_MODEL_FAILED.to_string()),
    };
    let message = match err.upstream_message() {
        Some(detail) => format!("{} ({})", base, detail),
        None => base.to_string(),
    };
    (status, message)
}
