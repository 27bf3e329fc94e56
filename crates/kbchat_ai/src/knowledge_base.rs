use kbchat_core::error::{codes, AppError};
use kbchat_core::ingest::{ingest_documents, Document, PageReader};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::chunking::{Chunker, TextChunk};
use crate::embeddings::Embedder;
use crate::index::{IndexBuildInput, IndexHandle, IndexStore};

/// Whether retrieval mode can be used. Only a successful build or a valid
/// index found on disk moves this to `IndexReady`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KnowledgeBaseState {
    #[default]
    NoIndex,
    IndexReady(IndexHandle),
}

impl KnowledgeBaseState {
    /// Startup check. A corrupt index is reported and treated as absent.
    pub fn detect(store: &IndexStore) -> Self {
        match store.handle() {
            Ok(handle) => {
                tracing::info!(
                    chunks = handle.chunk_count,
                    model = %handle.model,
                    "existing knowledge base found"
                );
                KnowledgeBaseState::IndexReady(handle)
            }
            Err(e) if e.is(codes::INDEX_NOT_FOUND) => KnowledgeBaseState::NoIndex,
            Err(e) => {
                tracing::warn!(error = %e.user_message(), "ignoring unreadable knowledge base");
                KnowledgeBaseState::NoIndex
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, KnowledgeBaseState::IndexReady(_))
    }

    pub fn handle(&self) -> Option<&IndexHandle> {
        match self {
            KnowledgeBaseState::IndexReady(h) => Some(h),
            KnowledgeBaseState::NoIndex => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub handle: IndexHandle,
    pub documents: usize,
    pub pages_read: usize,
    pub pages_skipped: usize,
}

/// The "create knowledge base" action: ingest, chunk, embed, persist.
pub struct KnowledgeBase<'a> {
    pub reader: &'a dyn PageReader,
    pub chunker: Chunker,
    pub embedder: &'a dyn Embedder,
    pub store: &'a IndexStore,
    pub model: &'a str,
}

impl KnowledgeBase<'_> {
    /// `state` is only touched on success.
    pub fn create(
        &self,
        state: &mut KnowledgeBaseState,
        docs: &[Document],
    ) -> Result<BuildReport, AppError> {
        if docs.is_empty() {
            return Err(AppError::new(
                codes::INGEST_EMPTY_INPUT,
                "Select at least one document to build a knowledge base",
            ));
        }

        let raw = ingest_documents(docs, self.reader)?;
        if raw.is_empty() {
            return Err(AppError::new(
                codes::INGEST_EMPTY_EXTRACTION,
                "No extractable text found in the selected documents",
            )
            .with_details(format!(
                "documents={}; pages_skipped={}",
                raw.documents, raw.pages_skipped
            )));
        }

        let chunks: Vec<TextChunk<'_>> = self.chunker.chunks(&raw.text).collect();
        tracing::info!(
            documents = raw.documents,
            chars = raw.char_count(),
            chunks = chunks.len(),
            "knowledge base text chunked"
        );

        let handle = self.store.build_with_embedder(
            &chunks,
            self.embedder,
            IndexBuildInput {
                model: self.model.to_string(),
                built_at: now_rfc3339()?,
            },
        )?;

        *state = KnowledgeBaseState::IndexReady(handle.clone());
        Ok(BuildReport {
            handle,
            documents: raw.documents,
            pages_read: raw.pages_read,
            pages_skipped: raw.pages_skipped,
        })
    }
}

fn now_rfc3339() -> Result<String, AppError> {
    OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
        AppError::new(codes::INDEX_BUILD_FAILED, "Failed to format build timestamp")
            .with_details(e.to_string())
    })
}
