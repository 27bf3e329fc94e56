use std::fmt;
use std::time::Duration;

use kbchat_core::error::{codes, AppError};

/// Connection details for a hosted model API (embeddings or completions).
#[derive(Clone)]
pub struct ServiceClient {
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl fmt::Debug for ServiceClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"***")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ServiceClient {
    /// Accepts `https://` endpoints, or plain `http://127.0.0.1[:port]` for local proxies.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, AppError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        validate_base_url(&base_url)?;
        if api_key.trim().is_empty() {
            return Err(AppError::new(
                codes::CONFIG_MISSING_CREDENTIAL,
                "Service API key is empty",
            )
            .with_details(format!("base_url={base_url}")));
        }
        Ok(Self {
            base_url,
            api_key: api_key.trim().to_string(),
            timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST a JSON body with the API key in a header, never in the URL.
    pub(crate) fn post(&self, url: &str) -> ureq::Request {
        ureq::post(url)
            .timeout(self.timeout)
            .set("x-goog-api-key", &self.api_key)
            .set("content-type", "application/json")
    }
}

fn validate_base_url(base_url: &str) -> Result<(), AppError> {
    let invalid = |why: &str| {
        AppError::new(codes::CONFIG_INVALID, "Service base URL is not allowed")
            .with_details(format!("base_url={base_url}; reason={why}"))
    };

    if let Some(rest) = base_url.strip_prefix("https://") {
        let host = rest.split('/').next().unwrap_or("");
        if host.is_empty() || host.contains('@') || rest.chars().any(char::is_whitespace) {
            return Err(invalid("malformed https host"));
        }
        return Ok(());
    }

    // Plain http only for loopback; reject prefix tricks like 127.0.0.1.evil.com.
    let rest = base_url
        .strip_prefix("http://")
        .ok_or_else(|| invalid("scheme must be https, or http for 127.0.0.1"))?;
    if rest == "127.0.0.1" {
        return Ok(());
    }
    let port = rest
        .strip_prefix("127.0.0.1:")
        .ok_or_else(|| invalid("plain http is only allowed for 127.0.0.1"))?;
    match port.parse::<u16>() {
        Ok(p) if p > 0 && port.chars().all(|c| c.is_ascii_digit()) => Ok(()),
        _ => Err(invalid("invalid port")),
    }
}

/// Map a ureq failure onto `code`, keeping the upstream error message when the body has one.
pub(crate) fn upstream_error(code: &str, what: &str, err: ureq::Error) -> AppError {
    match err {
        ureq::Error::Status(status, resp) => {
            let body = resp.into_string().unwrap_or_default();
            let upstream = upstream_message(&body).unwrap_or(body);
            AppError::new(code, format!("{what} request failed"))
                .with_details(format!("status={status}; upstream={}", upstream.trim()))
                .with_retryable(status == 429 || status >= 500)
        }
        ureq::Error::Transport(t) => AppError::new(code, format!("Failed to call {what} endpoint"))
            .with_details(t.to_string())
            .with_retryable(true),
    }
}

/// Extract `error.message` from a Google-style JSON error body.
pub(crate) fn upstream_message(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    v.get("error")?
        .get("message")?
        .as_str()
        .map(|s| s.to_string())
}

/// Accepts both `gemini-1.5-flash` and `models/gemini-1.5-flash`.
pub(crate) fn model_path(model: &str) -> &str {
    model.trim().trim_start_matches("models/")
}
