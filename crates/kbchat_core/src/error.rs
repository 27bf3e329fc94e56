use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes shared by every layer. Callers match on these, never on messages.
pub mod codes {
    pub const CONFIG_MISSING_CREDENTIAL: &str = "CONFIG_MISSING_CREDENTIAL";
    pub const CONFIG_INVALID: &str = "CONFIG_INVALID";
    pub const CONFIG_READ_FAILED: &str = "CONFIG_READ_FAILED";

    pub const INGEST_EMPTY_INPUT: &str = "INGEST_EMPTY_INPUT";
    pub const INGEST_EMPTY_EXTRACTION: &str = "INGEST_EMPTY_EXTRACTION";
    pub const INGEST_READ_FAILED: &str = "INGEST_READ_FAILED";
    pub const INGEST_UNSUPPORTED_TYPE: &str = "INGEST_UNSUPPORTED_TYPE";

    pub const EMBEDDING_SERVICE_FAILED: &str = "EMBEDDING_SERVICE_FAILED";

    pub const INDEX_NOT_FOUND: &str = "INDEX_NOT_FOUND";
    pub const INDEX_EMPTY: &str = "INDEX_EMPTY";
    pub const INDEX_CORRUPT: &str = "INDEX_CORRUPT";
    pub const INDEX_BUILD_FAILED: &str = "INDEX_BUILD_FAILED";
    pub const INDEX_BUILD_IN_PROGRESS: &str = "INDEX_BUILD_IN_PROGRESS";
    pub const INDEX_MODEL_MISMATCH: &str = "INDEX_MODEL_MISMATCH";

    pub const RETRIEVAL_INVALID_QUERY: &str = "RETRIEVAL_INVALID_QUERY";
    pub const RETRIEVAL_DIMS_MISMATCH: &str = "RETRIEVAL_DIMS_MISMATCH";

    pub const COMPLETION_SERVICE_FAILED: &str = "COMPLETION_SERVICE_FAILED";

    pub const CHAT_EMPTY_INPUT: &str = "CHAT_EMPTY_INPUT";
}

/// Single structured error shape used across the core, AI and CLI layers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppError {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
    pub retryable: bool,
}

impl AppError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            retryable: false,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn is(&self, code: &str) -> bool {
        self.code == code
    }

    /// One-line rendering for terminal output, details included.
    pub fn user_message(&self) -> String {
        match self.details.as_deref() {
            Some(d) if !d.is_empty() => format!("[{}] {} ({})", self.code, self.message, d),
            _ => format!("[{}] {}", self.code, self.message),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {}
