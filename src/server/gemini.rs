//! Gemini API連携（画像修復）
//!
//! 元画像を先頭、固定プロンプトを後ろに置いて generateContent を呼び、
//! レスポンス中で最初にインライン画像を持つパートを返す。

use async_trait::async_trait;
use photo_restore_common::RESTORE_PROMPT;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::{GeneratedImage, ImageModel, ModelError};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Gemini APIリクエスト
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

/// Gemini APIレスポンス
#[derive(Deserialize, Default)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    inline_data: Option<ResponseInlineData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseInlineData {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

fn build_request<'a>(data: &'a str, mime_type: &'a str) -> GeminiRequest<'a> {
    GeminiRequest {
        contents: vec![Content {
            parts: vec![
                Part::InlineData {
                    inline_data: InlineData { mime_type, data },
                },
                Part::Text { text: RESTORE_PROMPT },
            ],
        }],
        generation_config: GenerationConfig {
            response_modalities: vec!["IMAGE"],
        },
    }
}

/// 最初の候補から、データを持つ最初のインライン画像を取り出す
fn first_image(response: GeminiResponse) -> Option<GeneratedImage> {
    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .filter_map(|p| p.inline_data)
        .find_map(|inline| {
            let data = inline.data.filter(|d| !d.is_empty())?;
            Some(GeneratedImage {
                mime_type: inline.mime_type.filter(|m| !m.is_empty()),
                data,
            })
        })
}

pub struct GeminiImageModel {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl GeminiImageModel {
    pub fn new(http: reqwest::Client, model: impl Into<String>) -> Self {
        Self::with_base_url(http, GEMINI_API_BASE, model)
    }

    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url.trim_end_matches('/'), self.model)
    }
}

#[async_trait]
impl ImageModel for GeminiImageModel {
    async fn restore_image(
        &self,
        api_key: &str,
        data: &str,
        mime_type: &str,
    ) -> Result<Option<GeneratedImage>, ModelError> {
        let request = build_request(data, mime_type);
        debug!(model = %self.model, mime_type, "calling gemini generateContent");

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        let parsed: GeminiResponse =
            serde_json::from_str(&body).map_err(|e| ModelError::Parse(e.to_string()))?;

        Ok(first_image(parsed))
    }
}
