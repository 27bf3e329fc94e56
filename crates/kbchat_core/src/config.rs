use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{codes, AppError};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Largest chunk the embedding service accepts, in characters.
pub const MAX_CHUNK_CHARS: usize = 8_000;

/// Credential value. Never rendered by `Debug`.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Blank values and unedited template placeholders ("YOUR_...") count as unset.
    fn is_usable(&self) -> bool {
        let v = self.0.trim();
        !v.is_empty() && !v.starts_with("YOUR")
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".kbchat")
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
    #[serde(default = "default_true")]
    pub prefer_boundaries: bool,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: default_chunk_overlap(),
            prefer_boundaries: true,
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_key: Option<Secret>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_embedding_model(),
            timeout_secs: default_embedding_timeout(),
            api_key: None,
        }
    }
}

fn default_base_url() -> String {
    DEFAULT_GEMINI_BASE_URL.to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}
fn default_embedding_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
    /// Number of prior chat entries replayed in plain mode.
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
    #[serde(default)]
    pub api_key: Option<Secret>,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_completion_model(),
            timeout_secs: default_completion_timeout(),
            history_turns: default_history_turns(),
            api_key: None,
        }
    }
}

fn default_completion_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_completion_timeout() -> u64 {
    60
}
fn default_history_turns() -> usize {
    5
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    SerpApi,
    DuckDuckGo,
    Disabled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: SearchProvider,
    #[serde(default = "default_search_max_results")]
    pub max_results: usize,
    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub api_key: Option<Secret>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            max_results: default_search_max_results(),
            timeout_secs: default_search_timeout(),
            api_key: None,
        }
    }
}

fn default_search_provider() -> SearchProvider {
    SearchProvider::SerpApi
}
fn default_search_max_results() -> usize {
    5
}
fn default_search_timeout() -> u64 {
    10
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            completion: CompletionConfig::default(),
            search: SearchConfig::default(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(raw: &str) -> Result<Self, AppError> {
        let settings: Settings = toml::from_str(raw).map_err(|e| {
            AppError::new(codes::CONFIG_INVALID, "Failed to parse config file")
                .with_details(e.to_string())
        })?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.chunking.size == 0 {
            return Err(AppError::new(
                codes::CONFIG_INVALID,
                "chunking.size must be > 0",
            ));
        }
        if self.chunking.size > MAX_CHUNK_CHARS {
            return Err(AppError::new(
                codes::CONFIG_INVALID,
                format!("chunking.size must be <= {MAX_CHUNK_CHARS}"),
            )
            .with_details(format!("size={}", self.chunking.size)));
        }
        if self.chunking.overlap >= self.chunking.size {
            return Err(AppError::new(
                codes::CONFIG_INVALID,
                "chunking.overlap must be smaller than chunking.size",
            )
            .with_details(format!(
                "size={}; overlap={}",
                self.chunking.size, self.chunking.overlap
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(AppError::new(
                codes::CONFIG_INVALID,
                "retrieval.top_k must be >= 1",
            ));
        }
        if self.embedding.model.trim().is_empty() || self.completion.model.trim().is_empty() {
            return Err(AppError::new(
                codes::CONFIG_INVALID,
                "embedding.model and completion.model must not be empty",
            ));
        }
        Ok(())
    }

    /// Fill unset credentials from the environment. Values from the file win.
    pub fn resolve_credentials<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = |names: &[&str]| -> Option<Secret> {
            names
                .iter()
                .filter_map(|n| lookup(n))
                .map(Secret::new)
                .find(|s| s.is_usable())
        };

        if !self.embedding.api_key.as_ref().is_some_and(Secret::is_usable) {
            self.embedding.api_key = first(&["KBCHAT_EMBEDDING_API_KEY", "GEMINI_API_KEY"]);
        }
        if !self.completion.api_key.as_ref().is_some_and(Secret::is_usable) {
            self.completion.api_key = first(&["KBCHAT_COMPLETION_API_KEY", "GEMINI_API_KEY"]);
        }
        if !self.search.api_key.as_ref().is_some_and(Secret::is_usable) {
            self.search.api_key = first(&["SERPAPI_KEY"]);
        }
    }

    pub fn require_embedding_key(&self) -> Result<&str, AppError> {
        require(self.embedding.api_key.as_ref(), "embedding.api_key", "KBCHAT_EMBEDDING_API_KEY")
    }

    pub fn require_completion_key(&self) -> Result<&str, AppError> {
        require(
            self.completion.api_key.as_ref(),
            "completion.api_key",
            "KBCHAT_COMPLETION_API_KEY",
        )
    }

    /// Search keys are optional: web search degrades instead of failing.
    pub fn search_key(&self) -> Option<&str> {
        self.search
            .api_key
            .as_ref()
            .filter(|s| s.is_usable())
            .map(Secret::expose)
    }

    pub fn index_dir(&self) -> PathBuf {
        self.storage.data_dir.join("knowledge_base")
    }
}

fn require<'a>(secret: Option<&'a Secret>, key: &str, env: &str) -> Result<&'a str, AppError> {
    match secret {
        Some(s) if s.is_usable() => Ok(s.expose()),
        _ => Err(AppError::new(
            codes::CONFIG_MISSING_CREDENTIAL,
            "Required credential is not configured",
        )
        .with_details(format!("set {key} in the config file or {env} in the environment"))),
    }
}

/// Load settings from `path`, falling back to defaults when the file does not exist,
/// then resolve credentials from the process environment.
pub fn load_config(path: &Path) -> Result<Settings, AppError> {
    let mut settings = if path.exists() {
        let raw = fs::read_to_string(path).map_err(|e| {
            AppError::new(codes::CONFIG_READ_FAILED, "Failed to read config file")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        Settings::from_toml_str(&raw)?
    } else {
        tracing::debug!("config file {} not found; using defaults", path.display());
        Settings::default()
    };
    settings.resolve_credentials(|name| std::env::var(name).ok());
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_configuration() {
        let s = Settings::default();
        assert_eq!(s.chunking.size, 1000);
        assert_eq!(s.chunking.overlap, 200);
        assert_eq!(s.retrieval.top_k, 4);
        assert_eq!(s.completion.history_turns, 5);
        assert_eq!(s.search.provider, SearchProvider::SerpApi);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        let err = Settings::from_toml_str("[chunking]\nsize = 100\noverlap = 100\n")
            .expect_err("should reject");
        assert_eq!(err.code, codes::CONFIG_INVALID);
    }

    #[test]
    fn rejects_chunk_size_above_embedding_limit() {
        let err = Settings::from_toml_str("[chunking]\nsize = 20000\noverlap = 100\n")
            .expect_err("should reject");
        assert_eq!(err.code, codes::CONFIG_INVALID);
        assert_eq!(err.details.as_deref(), Some("size=20000"));

        let at_limit = format!("[chunking]\nsize = {MAX_CHUNK_CHARS}\noverlap = 100\n");
        assert!(Settings::from_toml_str(&at_limit).is_ok());
    }

    #[test]
    fn rejects_zero_top_k_and_unknown_provider() {
        assert!(Settings::from_toml_str("[retrieval]\ntop_k = 0\n").is_err());
        assert!(Settings::from_toml_str("[search]\nprovider = \"bing\"\n").is_err());
    }

    #[test]
    fn file_credentials_win_over_environment() {
        let mut s = Settings::from_toml_str("[completion]\napi_key = \"from-file\"\n").expect("parse");
        let env: HashMap<&str, &str> = [("GEMINI_API_KEY", "from-env"), ("SERPAPI_KEY", "YOUR_KEY")]
            .into_iter()
            .collect();
        s.resolve_credentials(|n| env.get(n).map(|v| v.to_string()));

        assert_eq!(s.require_completion_key().expect("completion"), "from-file");
        assert_eq!(s.require_embedding_key().expect("embedding"), "from-env");
        // Placeholder values are treated as missing.
        assert_eq!(s.search_key(), None);
    }

    #[test]
    fn missing_credential_is_a_configuration_error() {
        let s = Settings::default();
        let err = s.require_embedding_key().expect_err("no key");
        assert_eq!(err.code, codes::CONFIG_MISSING_CREDENTIAL);
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let mut s = Settings::default();
        s.completion.api_key = Some(Secret::new("super-secret"));
        let rendered = format!("{s:?}");
        assert!(!rendered.contains("super-secret"));
    }
}
