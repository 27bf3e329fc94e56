use std::io::{BufRead, BufReader};

use kbchat_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};

use super::sse::SseEvents;
use super::{CompletionStream, Llm, StreamItem};
use crate::client::{model_path, upstream_error, ServiceClient};

#[derive(Debug, Clone)]
pub struct GeminiLlm {
    client: ServiceClient,
}

impl GeminiLlm {
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
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Clone, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
    #[serde(default)]
    error: Option<UpstreamError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct UpstreamError {
    #[serde(default)]
    message: String,
}

/// Turn one SSE payload into a stream item. `None` means "nothing to show".
pub(crate) fn decode_chunk(payload: &str) -> Option<StreamItem> {
    let chunk: GenerateChunk = match serde_json::from_str(payload) {
        Ok(c) => c,
        Err(e) => return Some(StreamItem::Error(format!("malformed stream payload: {e}"))),
    };
    if let Some(err) = chunk.error {
        return Some(StreamItem::Error(err.message));
    }
    if let Some(reason) = chunk.prompt_feedback.and_then(|f| f.block_reason) {
        return Some(StreamItem::Error(format!("prompt blocked: {reason}")));
    }

    let candidate = chunk.candidates.into_iter().next()?;
    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if !text.is_empty() {
        return Some(StreamItem::TextDelta(text));
    }
    match candidate.finish_reason.as_deref() {
        Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") | Some("PROHIBITED_CONTENT") => {
            Some(StreamItem::Error(format!(
                "response stopped: {}",
                candidate.finish_reason.unwrap_or_default()
            )))
        }
        _ => None,
    }
}

/// Completion stream over an SSE body. Stops after the first error item.
pub(crate) struct GeminiStream<R> {
    events: SseEvents<R>,
    finished: bool,
}

impl<R: BufRead> GeminiStream<R> {
    pub(crate) fn new(reader: R) -> Self {
        Self {
            events: SseEvents::new(reader),
            finished: false,
        }
    }
}

impl<R: BufRead> Iterator for GeminiStream<R> {
    type Item = StreamItem;

    fn next(&mut self) -> Option<StreamItem> {
        if self.finished {
            return None;
        }
        loop {
            let payload = match self.events.next()? {
                Ok(p) => p,
                Err(e) => {
                    self.finished = true;
                    return Some(StreamItem::Error(format!("stream interrupted: {e}")));
                }
            };
            match decode_chunk(&payload) {
                Some(StreamItem::Error(msg)) => {
                    self.finished = true;
                    return Some(StreamItem::Error(msg));
                }
                Some(item) => return Some(item),
                None => continue,
            }
        }
    }
}

impl Llm for GeminiLlm {
    fn stream(&self, model: &str, prompt: &str) -> Result<CompletionStream, AppError> {
        let url = format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.client.base_url(),
            model_path(model)
        );
        let req = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
        };

        let resp = self
            .client
            .post(&url)
            .send_json(serde_json::to_value(req).map_err(|e| {
                AppError::new(
                    codes::COMPLETION_SERVICE_FAILED,
                    "Failed to encode completion request",
                )
                .with_details(e.to_string())
            })?)
            .map_err(|e| upstream_error(codes::COMPLETION_SERVICE_FAILED, "completion", e))?;

        tracing::debug!(model, prompt_chars = prompt.len(), "completion stream opened");
        Ok(Box::new(GeminiStream::new(BufReader::new(resp.into_reader()))))
    }
}
