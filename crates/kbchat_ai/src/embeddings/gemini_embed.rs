use kbchat_core::config::MAX_CHUNK_CHARS;
use kbchat_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::client::{model_path, upstream_error, ServiceClient};

#[derive(Debug, Clone)]
pub struct GeminiEmbedder {
    client: ServiceClient,
}

impl GeminiEmbedder {
    pub fn new(client: ServiceClient) -> Self {
        Self { client }
    }
}

#[derive(Debug, Clone, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Clone, Serialize)]
struct EmbedContentRequest<'a> {
    model: String,
    content: Content<'a>,
}

#[derive(Debug, Clone, Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

/// Inputs over the limit are refused, never cut.
fn check_input_len(input: &str) -> Result<(), AppError> {
    let chars = input.chars().count();
    if chars > MAX_CHUNK_CHARS {
        return Err(AppError::new(
            codes::EMBEDDING_SERVICE_FAILED,
            "Text is too long to embed",
        )
        .with_details(format!("chars={chars}; max={MAX_CHUNK_CHARS}")));
    }
    Ok(())
}

pub(crate) fn decode_embedding(body: &str) -> Result<Vec<f32>, AppError> {
    let v: EmbedContentResponse = serde_json::from_str(body).map_err(|e| {
        AppError::new(
            codes::EMBEDDING_SERVICE_FAILED,
            "Failed to decode embeddings response",
        )
        .with_details(e.to_string())
    })?;
    if v.embedding.values.is_empty() {
        return Err(AppError::new(
            codes::EMBEDDING_SERVICE_FAILED,
            "Embeddings response was empty",
        ));
    }
    Ok(v.embedding.values)
}

impl Embedder for GeminiEmbedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        check_input_len(input)?;
        let model = model_path(model);
        let url = format!(
            "{}/v1beta/models/{}:embedContent",
            self.client.base_url(),
            model
        );
        let req = EmbedContentRequest {
            model: format!("models/{model}"),
            content: Content {
                parts: vec![Part { text: input }],
            },
        };

        let resp = self
            .client
            .post(&url)
            .send_json(serde_json::to_value(req).map_err(|e| {
                AppError::new(
                    codes::EMBEDDING_SERVICE_FAILED,
                    "Failed to encode embeddings request",
                )
                .with_details(e.to_string())
            })?)
            .map_err(|e| upstream_error(codes::EMBEDDING_SERVICE_FAILED, "embeddings", e))?;

        let body = resp.into_string().map_err(|e| {
            AppError::new(
                codes::EMBEDDING_SERVICE_FAILED,
                "Failed to read embeddings response",
            )
            .with_details(e.to_string())
            .with_retryable(true)
        })?;
        decode_embedding(&body)
    }
}
