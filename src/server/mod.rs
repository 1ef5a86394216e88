//! 修復エンドポイント（POST /api/restore）

pub mod gemini;
pub mod model;
pub mod restore;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::error::{PhotoRestoreError, Result};

pub use gemini::GeminiImageModel;
pub use model::{GeneratedImage, ImageModel, ModelError};

pub const RESTORE_PATH: &str = "/api/restore";

/// リクエストボディの上限（32MB）
///
/// 20MBの画像をBase64化すると約27MBになるため、サイズ超過は検証側で返す。
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<dyn ImageModel>,
    /// リクエストにAPIキーがないときに使うサーバー側のキー
    pub server_api_key: Option<String>,
}

impl AppState {
    pub fn new(model: Arc<dyn ImageModel>, server_api_key: Option<String>) -> Self {
        let server_api_key = server_api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty());
        Self {
            model,
            server_api_key,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        let model = GeminiImageModel::new(http, config.model.clone());
        Ok(Self::new(Arc::new(model), config.server_api_key()))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(RESTORE_PATH, post(restore::restore))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// サーバー起動（Ctrl+C で終了）
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| PhotoRestoreError::Server(format!("{}: {}", addr, e)))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| PhotoRestoreError::Server(format!("{}: {}", addr, e)))?;

    info!(%addr, has_server_key = state.server_api_key.is_some(), "restore endpoint listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
