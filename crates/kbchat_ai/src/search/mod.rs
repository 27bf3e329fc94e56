//! Live web search. Optional enrichment: every failure degrades to a
//! `SearchOutcome::Warning` that is shown to the user instead of an answer.

use std::time::Duration;

use kbchat_core::config::{SearchProvider, Settings};

pub mod duckduckgo;
pub mod serpapi;

pub use duckduckgo::DuckDuckGoSearch;
pub use serpapi::SerpApiSearch;

/// Prefix that marks a search result string as a warning rather than snippets.
pub const WARNING_MARKER: &str = "⚠️";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Snippets(Vec<String>),
    /// User-visible text starting with `WARNING_MARKER`.
    Warning(String),
}

impl SearchOutcome {
    pub fn warning(msg: impl AsRef<str>) -> Self {
        SearchOutcome::Warning(format!("{WARNING_MARKER} {}", msg.as_ref()))
    }

    /// Classify a raw result string by its marker.
    pub fn from_text(text: &str) -> Self {
        if text.starts_with(WARNING_MARKER) {
            SearchOutcome::Warning(text.to_string())
        } else {
            SearchOutcome::Snippets(
                text.split("\n\n")
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect(),
            )
        }
    }

    pub fn is_warning(&self) -> bool {
        matches!(self, SearchOutcome::Warning(_))
    }

    /// Snippets joined by blank lines, or the warning text.
    pub fn into_text(self) -> String {
        match self {
            SearchOutcome::Snippets(s) => s.join("\n\n"),
            SearchOutcome::Warning(w) => w,
        }
    }
}

pub trait WebSearch {
    fn search(&self, query: &str) -> SearchOutcome;
}

#[derive(Debug, Clone, Default)]
pub struct DisabledSearch;

impl WebSearch for DisabledSearch {
    fn search(&self, _query: &str) -> SearchOutcome {
        SearchOutcome::warning("Web search is disabled in the configuration.")
    }
}

pub fn search_from_settings(settings: &Settings) -> Box<dyn WebSearch> {
    let cfg = &settings.search;
    let timeout = Duration::from_secs(cfg.timeout_secs);
    match cfg.provider {
        SearchProvider::SerpApi => Box::new(SerpApiSearch::new(
            settings.search_key().map(str::to_string),
            cfg.max_results,
            timeout,
        )),
        SearchProvider::DuckDuckGo => Box::new(DuckDuckGoSearch::new(cfg.max_results, timeout)),
        SearchProvider::Disabled => Box::new(DisabledSearch),
    }
}

/// Describe a ureq failure without echoing the request URL (it may carry a key).
pub(crate) fn describe_failure(err: &ureq::Error) -> String {
    match err {
        ureq::Error::Status(status, _) => format!("HTTP status {status}"),
        ureq::Error::Transport(t) => t.kind().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_by_marker() {
        assert!(SearchOutcome::from_text("⚠️ No live results found.").is_warning());
        assert_eq!(
            SearchOutcome::from_text("one\n\ntwo"),
            SearchOutcome::Snippets(vec!["one".into(), "two".into()])
        );
    }

    #[test]
    fn warning_text_starts_with_marker() {
        let w = SearchOutcome::warning("x").into_text();
        assert!(w.starts_with(WARNING_MARKER));
        assert!(DisabledSearch.search("q").is_warning());
    }

    #[test]
    fn settings_select_provider() {
        let mut settings = Settings::default();
        settings.search.provider = SearchProvider::Disabled;
        assert!(search_from_settings(&settings).search("q").is_warning());
    }
}
