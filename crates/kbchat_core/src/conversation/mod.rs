use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{codes, AppError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Role {
    User,
    Ai,
}

impl Role {
    pub fn label(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Ai => "AI",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatEntry {
    pub role: Role,
    pub text: String,
    /// Local wall-clock time, `HH:MM`.
    pub ts: String,
}

/// Prompt strategy for a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    #[default]
    Plain,
    WebSearch,
    Retrieval,
}

impl ResponseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseMode::Plain => "plain",
            ResponseMode::WebSearch => "web",
            ResponseMode::Retrieval => "docs",
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" | "ai" => Ok(ResponseMode::Plain),
            "web" | "search" => Ok(ResponseMode::WebSearch),
            "docs" | "kb" | "retrieval" => Ok(ResponseMode::Retrieval),
            other => Err(AppError::new(codes::CONFIG_INVALID, "Unknown response mode")
                .with_details(format!("mode={other}; expected plain, web or docs"))),
        }
    }
}

/// Chat state for one session. Lives as long as the session; `clear` resets it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    entries: Vec<ChatEntry>,
    pub mode: ResponseMode,
}

impl Conversation {
    pub fn new(mode: ResponseMode) -> Self {
        Self {
            entries: Vec::new(),
            mode,
        }
    }

    pub fn entries(&self) -> &[ChatEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> &[ChatEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    pub fn push(&mut self, role: Role, text: impl Into<String>) -> &ChatEntry {
        self.entries.push(ChatEntry {
            role,
            text: text.into(),
            ts: clock_hh_mm(),
        });
        let last = self.entries.len() - 1;
        &self.entries[last]
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

fn clock_hh_mm() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format!("{:02}:{:02}", now.hour(), now.minute())
}
