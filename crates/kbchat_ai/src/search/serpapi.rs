use std::time::Duration;

use serde_json::Value;

use super::{describe_failure, SearchOutcome, WebSearch};

const SERPAPI_ENDPOINT: &str = "https://serpapi.com/search.json";

/// Google results through SerpApi; returns `organic_results[*].snippet`.
#[derive(Clone)]
pub struct SerpApiSearch {
    api_key: Option<String>,
    max_results: usize,
    timeout: Duration,
}

impl std::fmt::Debug for SerpApiSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerpApiSearch")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("max_results", &self.max_results)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl SerpApiSearch {
    pub fn new(api_key: Option<String>, max_results: usize, timeout: Duration) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            max_results,
            timeout,
        }
    }
}

impl WebSearch for SerpApiSearch {
    fn search(&self, query: &str) -> SearchOutcome {
        let Some(key) = self.api_key.as_deref() else {
            return SearchOutcome::warning("SERPAPI_KEY not configured. Web search disabled.");
        };

        let resp = ureq::get(SERPAPI_ENDPOINT)
            .timeout(self.timeout)
            .query("q", query)
            .query("engine", "google")
            .query("api_key", key)
            .call();
        let body: Value = match resp {
            Ok(r) => match r.into_json() {
                Ok(v) => v,
                Err(e) => {
                    tracing::warn!(error = %e, "web search response unreadable");
                    return SearchOutcome::warning(format!("Web search failed: {e}"));
                }
            },
            Err(e) => {
                let why = describe_failure(&e);
                tracing::warn!(error = %why, "web search failed");
                return SearchOutcome::warning(format!("Web search failed: {why}"));
            }
        };

        let snippets = organic_snippets(&body, self.max_results);
        if snippets.is_empty() {
            return SearchOutcome::warning("No live results found.");
        }
        tracing::debug!(snippets = snippets.len(), "web search complete");
        SearchOutcome::Snippets(snippets)
    }
}

/// Non-empty snippets of the first `max` organic results.
pub fn organic_snippets(body: &Value, max: usize) -> Vec<String> {
    body.get("organic_results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .take(max)
                .filter_map(|r| r.get("snippet").and_then(Value::as_str))
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
