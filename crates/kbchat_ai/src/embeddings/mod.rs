use kbchat_core::error::AppError;

pub trait Embedder {
    fn embed(&self, model: &str, input: &str) -> Result<Vec<f32>, AppError>;
}

pub mod gemini_embed;

pub use gemini_embed::GeminiEmbedder;

/// Stands in for the embedding service when it cannot be configured.
/// Every call returns the configuration error, so only embedding-backed
/// operations fail.
#[derive(Debug, Clone)]
pub struct DisabledEmbedder {
    reason: AppError,
}

impl DisabledEmbedder {
    pub fn new(reason: AppError) -> Self {
        Self { reason }
    }
}

impl Embedder for DisabledEmbedder {
    fn embed(&self, _model: &str, _input: &str) -> Result<Vec<f32>, AppError> {
        Err(self.reason.clone())
    }
}
