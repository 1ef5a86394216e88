//! 結合テスト用のフェイク

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use axum::Router;
use photo_restore_rust::server::{GeneratedImage, ImageModel, ModelError};

/// フェイクモデルの応答
#[derive(Debug, Clone)]
pub enum Reply {
    Image { mime_type: Option<String>, data: String },
    NoImage,
    Fail,
    /// モデルAPIが指定ステータスで応答する
    Status { status: u16, body: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCall {
    pub api_key: String,
    pub data: String,
    pub mime_type: String,
}

pub struct FakeModel {
    reply: Reply,
    calls: Mutex<Vec<ModelCall>>,
    count: AtomicUsize,
}

impl FakeModel {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply,
            calls: Mutex::new(Vec::new()),
            count: AtomicUsize::new(0),
        }
    }

    pub fn image(mime_type: Option<&str>, data: &str) -> Self {
        Self::new(Reply::Image {
            mime_type: mime_type.map(str::to_string),
            data: data.to_string(),
        })
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self::new(Reply::Status {
            status,
            body: body.to_string(),
        })
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageModel for FakeModel {
    async fn restore_image(
        &self,
        api_key: &str,
        data: &str,
        mime_type: &str,
    ) -> Result<Option<GeneratedImage>, ModelError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().unwrap().push(ModelCall {
            api_key: api_key.to_string(),
            data: data.to_string(),
            mime_type: mime_type.to_string(),
        });
        match &self.reply {
            Reply::Image { mime_type, data } => Ok(Some(GeneratedImage {
                mime_type: mime_type.clone(),
                data: data.clone(),
            })),
            Reply::NoImage => Ok(None),
            Reply::Fail => Err(ModelError::Status {
                status: 500,
                body: "internal".to_string(),
            }),
            Reply::Status { status, body } => Err(ModelError::Status {
                status: *status,
                body: body.clone(),
            }),
        }
    }
}

/// Gemini が無効なAPIキーに返すボディ
pub const INVALID_KEY_BODY: &str = r#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT","details":[{"reason":"API_KEY_INVALID"}]}}"#;

/// ルーターを 127.0.0.1 の空きポートで起動し、修復エンドポイントのURLを返す
pub async fn spawn(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}{}", addr, photo_restore_rust::server::RESTORE_PATH)
}
