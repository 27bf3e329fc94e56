use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use kbchat_ai::chunking::Chunker;
use kbchat_ai::client::ServiceClient;
use kbchat_ai::embeddings::{DisabledEmbedder, Embedder, GeminiEmbedder};
use kbchat_ai::index::IndexStore;
use kbchat_ai::knowledge_base::{KnowledgeBase, KnowledgeBaseState};
use kbchat_ai::llm::{DisabledLlm, GeminiLlm, Llm};
use kbchat_ai::orchestrator::{Orchestrator, TurnOutcome, TurnSettings};
use kbchat_ai::search::{search_from_settings, WebSearch};
use kbchat_core::config::Settings;
use kbchat_core::conversation::{Conversation, ResponseMode};
use kbchat_core::error::AppError;
use kbchat_core::ingest::{load_documents, DefaultPageReader};

/// Clients for every external service. A missing credential only disables
/// the service that needs it.
struct Services {
    llm: Box<dyn Llm>,
    embedder: Box<dyn Embedder>,
    search: Box<dyn WebSearch>,
}

impl Services {
    fn from_settings(settings: &Settings) -> Self {
        let embedder: Box<dyn Embedder> = match settings.require_embedding_key().and_then(|key| {
            ServiceClient::new(
                &settings.embedding.base_url,
                key,
                Duration::from_secs(settings.embedding.timeout_secs),
            )
        }) {
            Ok(client) => Box::new(GeminiEmbedder::new(client)),
            Err(e) => {
                tracing::debug!(error = %e.user_message(), "embedding service disabled");
                Box::new(DisabledEmbedder::new(e))
            }
        };

        let llm: Box<dyn Llm> = match settings.require_completion_key().and_then(|key| {
            ServiceClient::new(
                &settings.completion.base_url,
                key,
                Duration::from_secs(settings.completion.timeout_secs),
            )
        }) {
            Ok(client) => Box::new(GeminiLlm::new(client)),
            Err(e) => {
                tracing::debug!(error = %e.user_message(), "completion service disabled");
                Box::new(DisabledLlm::new(e))
            }
        };

        Self {
            llm,
            embedder,
            search: search_from_settings(settings),
        }
    }

    fn orchestrator(&self, settings: &Settings) -> Orchestrator<'_> {
        Orchestrator {
            llm: self.llm.as_ref(),
            embedder: self.embedder.as_ref(),
            search: self.search.as_ref(),
            settings: TurnSettings::from_settings(settings),
        }
    }
}

pub fn build(settings: &Settings, files: &[PathBuf]) -> Result<(), AppError> {
    let docs = load_documents(files)?;
    if !docs.is_empty() {
        // Fail fast instead of once per chunk.
        settings.require_embedding_key()?;
    }

    let services = Services::from_settings(settings);
    let store = IndexStore::open(settings.index_dir());
    let reader = DefaultPageReader::default();
    let kb = KnowledgeBase {
        reader: &reader,
        chunker: Chunker::new(
            settings.chunking.size,
            settings.chunking.overlap,
            settings.chunking.prefer_boundaries,
        )?,
        embedder: services.embedder.as_ref(),
        store: &store,
        model: &settings.embedding.model,
    };

    let mut state = KnowledgeBaseState::detect(&store);
    let report = kb.create(&mut state, &docs)?;
    println!(
        "Knowledge base ready: {} chunks from {} document(s)",
        report.handle.chunk_count, report.documents
    );
    if report.pages_skipped > 0 {
        println!("{} page(s) had no extractable text and were skipped", report.pages_skipped);
    }
    println!("Stored at {}", report.handle.path.display());
    Ok(())
}

pub fn ask(settings: &Settings, mode: ResponseMode, question: &str) -> Result<(), AppError> {
    let services = Services::from_settings(settings);
    let orchestrator = services.orchestrator(settings);
    let kb = KnowledgeBaseState::detect(&IndexStore::open(settings.index_dir()));
    let mut conversation = Conversation::new(mode);

    let outcome = orchestrator.turn(&mut conversation, &kb, question, &mut print_delta)?;
    println!();
    print_sources(&outcome);
    Ok(())
}

pub fn chat(settings: &Settings, mode: ResponseMode) -> Result<(), AppError> {
    let services = Services::from_settings(settings);
    let orchestrator = services.orchestrator(settings);
    let store = IndexStore::open(settings.index_dir());
    let mut conversation = Conversation::new(mode);

    println!("kbchat: mode {mode}. Type /help for commands.");
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("[{}] you> ", conversation.mode);
        let _ = io::stdout().flush();
        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "stdin closed");
                break;
            }
            None => break,
        };
        let trimmed = line.trim();

        if let Some(cmd) = trimmed.strip_prefix('/') {
            let mut parts = cmd.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some("quit" | "exit"), _) => break,
                (Some("clear"), _) => {
                    conversation.clear();
                    println!("History cleared.");
                }
                (Some("history"), _) => {
                    for e in conversation.entries() {
                        println!("{} {}: {}", e.ts, e.role.label(), e.text);
                    }
                }
                (Some("mode"), Some(m)) => match m.parse::<ResponseMode>() {
                    Ok(mode) => {
                        conversation.mode = mode;
                        println!("Mode: {mode}");
                    }
                    Err(e) => eprintln!("{}", e.user_message()),
                },
                _ => println!("Commands: /mode plain|web|docs, /clear, /history, /quit"),
            }
            continue;
        }
        if trimmed.is_empty() {
            continue;
        }

        // Re-check every turn so a build from another terminal is picked up.
        let kb = KnowledgeBaseState::detect(&store);
        print!("ai> ");
        match orchestrator.turn(&mut conversation, &kb, &line, &mut print_delta) {
            Ok(outcome) => {
                println!();
                print_sources(&outcome);
            }
            Err(e) => {
                println!();
                eprintln!("{}", e.user_message());
            }
        }
    }
    Ok(())
}

pub fn status(settings: &Settings) -> Result<(), AppError> {
    let store = IndexStore::open(settings.index_dir());
    match KnowledgeBaseState::detect(&store) {
        KnowledgeBaseState::IndexReady(h) => {
            println!("Knowledge base: ready");
            println!("  path:     {}", h.path.display());
            println!("  chunks:   {}", h.chunk_count);
            println!("  model:    {} ({} dims)", h.model, h.dims);
            println!("  built at: {}", h.built_at);
            if h.model != settings.embedding.model {
                println!(
                    "  warning:  configured embedding model is {}; rebuild before using docs mode",
                    settings.embedding.model
                );
            }
        }
        KnowledgeBaseState::NoIndex => {
            println!("Knowledge base: none (run `kbchat build <files...>`)");
        }
    }
    println!(
        "Completion service: {}",
        if settings.require_completion_key().is_ok() { "configured" } else { "missing key" }
    );
    println!(
        "Embedding service:  {}",
        if settings.require_embedding_key().is_ok() { "configured" } else { "missing key" }
    );
    println!("Web search:         {:?}", settings.search.provider);
    Ok(())
}

fn print_delta(delta: &str) {
    print!("{delta}");
    let _ = io::stdout().flush();
}

fn print_sources(outcome: &TurnOutcome) {
    if outcome.sources.is_empty() {
        return;
    }
    let refs: Vec<String> = outcome
        .sources
        .iter()
        .map(|s| format!("#{} ({:.2})", s.ordinal, s.score))
        .collect();
    println!("sources: {}", refs.join(", "));
}
