use kbchat_core::config::Settings;
use kbchat_core::conversation::{Conversation, ResponseMode, Role};
use kbchat_core::error::{codes, AppError};

use crate::embeddings::Embedder;
use crate::knowledge_base::KnowledgeBaseState;
use crate::llm::{drain_stream, Llm};
use crate::prompts::{conversation_prompt, grounded_prompt, summarize_prompt};
use crate::retrieve::{retrieve_with_embedder, RetrievedChunk};
use crate::search::{SearchOutcome, WebSearch};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSettings {
    pub completion_model: String,
    pub embedding_model: String,
    pub top_k: usize,
    pub history_turns: usize,
}

impl TurnSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            completion_model: settings.completion.model.clone(),
            embedding_model: settings.embedding.model.clone(),
            top_k: settings.retrieval.top_k,
            history_turns: settings.completion.history_turns,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub mode: ResponseMode,
    pub answer: String,
    /// Chunks the answer was grounded on (retrieval mode only).
    pub sources: Vec<RetrievedChunk>,
    /// Set when web search degraded; the warning is the answer.
    pub search_warning: Option<String>,
}

pub struct Orchestrator<'a> {
    pub llm: &'a dyn Llm,
    pub embedder: &'a dyn Embedder,
    pub search: &'a dyn WebSearch,
    pub settings: TurnSettings,
}

impl Orchestrator<'_> {
    /// Run one chat turn in `conversation.mode`, streaming answer text to `on_delta`.
    ///
    /// The question is used verbatim; only an all-whitespace input is refused.
    /// The user entry is recorded once a prompt could be built, so a retrieval
    /// turn refused for a missing or mismatched index leaves history untouched.
    /// The AI entry is recorded only when an answer was produced; a failed turn
    /// never removes or rewrites earlier entries.
    pub fn turn(
        &self,
        conversation: &mut Conversation,
        kb: &KnowledgeBaseState,
        input: &str,
        on_delta: &mut dyn FnMut(&str),
    ) -> Result<TurnOutcome, AppError> {
        if input.trim().is_empty() {
            return Err(AppError::new(codes::CHAT_EMPTY_INPUT, "Type a question first"));
        }
        let mode = conversation.mode;

        let mut sources: Vec<RetrievedChunk> = Vec::new();
        let prompt = match mode {
            ResponseMode::Plain => {
                // Replays history recorded before this question.
                let p = conversation_prompt(conversation.recent(self.settings.history_turns), input);
                conversation.push(Role::User, input);
                p
            }
            ResponseMode::WebSearch => {
                conversation.push(Role::User, input);
                match self.search.search(input) {
                    SearchOutcome::Warning(w) => {
                        tracing::warn!(warning = %w, "web search degraded");
                        on_delta(&w);
                        conversation.push(Role::Ai, w.clone());
                        return Ok(TurnOutcome {
                            mode,
                            answer: w.clone(),
                            sources,
                            search_warning: Some(w),
                        });
                    }
                    outcome => summarize_prompt(input, &outcome.into_text()),
                }
            }
            ResponseMode::Retrieval => {
                sources = retrieve_with_embedder(
                    kb,
                    self.embedder,
                    &self.settings.embedding_model,
                    input,
                    self.settings.top_k,
                )?;
                tracing::info!(hits = sources.len(), "retrieved context");
                let p = grounded_prompt(&sources, input);
                conversation.push(Role::User, input);
                p
            }
        };
        tracing::debug!(mode = %mode, prompt_chars = prompt.len(), "prompt composed");

        let stream = self.llm.stream(&self.settings.completion_model, &prompt)?;
        let answer = drain_stream(stream, on_delta)?;
        conversation.push(Role::Ai, answer.clone());

        Ok(TurnOutcome {
            mode,
            answer,
            sources,
            search_warning: None,
        })
    }
}
