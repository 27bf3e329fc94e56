use kbchat_core::error::{codes, AppError};

pub mod gemini_llm;
mod sse;

pub use gemini_llm::GeminiLlm;

/// One item of a streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    TextDelta(String),
    /// Upstream reported a failure mid-stream. Terminal.
    Error(String),
}

/// Dropping the stream abandons the response; nothing is persisted.
pub type CompletionStream = Box<dyn Iterator<Item = StreamItem> + Send>;

pub trait Llm {
    fn stream(&self, model: &str, prompt: &str) -> Result<CompletionStream, AppError>;

    fn generate(&self, model: &str, prompt: &str) -> Result<String, AppError> {
        let stream = self.stream(model, prompt)?;
        drain_stream(stream, &mut |_| {})
    }
}

/// Forward every delta to `on_delta` and return the full text.
/// An `Error` item or an empty response ends the turn with `COMPLETION_SERVICE_FAILED`.
pub fn drain_stream(
    stream: CompletionStream,
    on_delta: &mut dyn FnMut(&str),
) -> Result<String, AppError> {
    let mut full = String::new();
    for item in stream {
        match item {
            StreamItem::TextDelta(t) => {
                on_delta(&t);
                full.push_str(&t);
            }
            StreamItem::Error(msg) => {
                tracing::warn!(streamed_chars = full.len(), "completion stream failed");
                return Err(AppError::new(
                    codes::COMPLETION_SERVICE_FAILED,
                    "Completion service error",
                )
                .with_details(msg));
            }
        }
    }
    if full.trim().is_empty() {
        return Err(AppError::new(
            codes::COMPLETION_SERVICE_FAILED,
            "Completion response was empty",
        ));
    }
    Ok(full)
}

/// Stands in for the completion service when it cannot be configured.
#[derive(Debug, Clone)]
pub struct DisabledLlm {
    reason: AppError,
}

impl DisabledLlm {
    pub fn new(reason: AppError) -> Self {
        Self { reason }
    }
}

impl Llm for DisabledLlm {
    fn stream(&self, _model: &str, _prompt: &str) -> Result<CompletionStream, AppError> {
        Err(self.reason.clone())
    }
}
