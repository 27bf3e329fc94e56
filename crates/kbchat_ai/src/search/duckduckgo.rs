use std::time::Duration;

use serde_json::Value;

use super::{describe_failure, SearchOutcome, WebSearch};

const DDG_ENDPOINT: &str = "https://api.duckduckgo.com/";
const DDG_MAX_RESULTS: usize = 3;

/// Keyless fallback using the DuckDuckGo instant-answer API.
#[derive(Debug, Clone)]
pub struct DuckDuckGoSearch {
    max_results: usize,
    timeout: Duration,
}

impl DuckDuckGoSearch {
    pub fn new(max_results: usize, timeout: Duration) -> Self {
        Self {
            max_results: max_results.min(DDG_MAX_RESULTS),
            timeout,
        }
    }
}

impl WebSearch for DuckDuckGoSearch {
    fn search(&self, query: &str) -> SearchOutcome {
        let resp = ureq::get(DDG_ENDPOINT)
            .timeout(self.timeout)
            .query("q", query)
            .query("format", "json")
            .query("no_html", "1")
            .query("skip_disambig", "1")
            .call();
        let body: Value = match resp.map_err(|e| describe_failure(&e)).and_then(|r| {
            r.into_json::<Value>().map_err(|e| e.to_string())
        }) {
            Ok(v) => v,
            Err(why) => {
                tracing::warn!(error = %why, "web search failed");
                return SearchOutcome::warning(format!("Web search failed: {why}"));
            }
        };

        let snippets = instant_answer_snippets(&body, self.max_results);
        if snippets.is_empty() {
            return SearchOutcome::warning("No results found.");
        }
        SearchOutcome::Snippets(snippets)
    }
}

/// `AbstractText` first, then `RelatedTopics[*].Text` (including grouped topics).
pub fn instant_answer_snippets(body: &Value, max: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    if let Some(text) = body.get("AbstractText").and_then(Value::as_str) {
        if !text.trim().is_empty() {
            out.push(text.to_string());
        }
    }

    let topics = body
        .get("RelatedTopics")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    for topic in topics {
        let nested = topic.get("Topics").and_then(Value::as_array);
        let items: Vec<&Value> = match nested {
            Some(group) => group.iter().collect(),
            None => vec![topic],
        };
        for item in items {
            if let Some(text) = item.get("Text").and_then(Value::as_str) {
                if !text.trim().is_empty() {
                    out.push(text.to_string());
                }
            }
        }
    }

    out.truncate(max);
    out
}
