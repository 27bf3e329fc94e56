use kbchat_core::error::{codes, AppError};
use serde::{Deserialize, Serialize};

use crate::embeddings::Embedder;
use crate::index::read_index;
use crate::knowledge_base::KnowledgeBaseState;

mod similarity;

use similarity::by_rank;
pub use similarity::{cosine_similarity, dot, l2_norm};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub ordinal: u32,
    pub text: String,
    pub score: f32,
}

/// Top-`top_k` chunks by cosine similarity to `query`.
///
/// `configured_model` is the embedding model currently configured; it must
/// match the model the index was built with or query vectors would live in a
/// different space.
pub fn retrieve_with_embedder(
    state: &KnowledgeBaseState,
    embedder: &dyn Embedder,
    configured_model: &str,
    query: &str,
    top_k: usize,
) -> Result<Vec<RetrievedChunk>, AppError> {
    let handle = state.handle().ok_or_else(|| {
        AppError::new(
            codes::INDEX_NOT_FOUND,
            "No knowledge base yet; create one before asking about your documents",
        )
    })?;

    let q = query.trim();
    if q.is_empty() {
        return Err(AppError::new(
            codes::RETRIEVAL_INVALID_QUERY,
            "Query must not be empty",
        ));
    }
    let top_k = top_k.max(1);

    let index = read_index(&handle.path)?;
    if index.model != configured_model {
        return Err(AppError::new(
            codes::INDEX_MODEL_MISMATCH,
            "Knowledge base was built with a different embedding model; rebuild it",
        )
        .with_details(format!(
            "index_model={}; configured_model={}",
            index.model, configured_model
        )));
    }
    if index.entries.is_empty() {
        return Ok(Vec::new());
    }

    let qv = embedder.embed(&index.model, q).map_err(|e| {
        AppError::new(codes::EMBEDDING_SERVICE_FAILED, "Failed to embed query")
            .with_details(e.user_message())
            .with_retryable(e.retryable)
    })?;
    if qv.len() as u32 != index.dims {
        return Err(AppError::new(
            codes::RETRIEVAL_DIMS_MISMATCH,
            "Query embedding dims do not match index dims",
        )
        .with_details(format!("index_dims={}; query_dims={}", index.dims, qv.len())));
    }

    let qnorm = l2_norm(&qv);
    let mut hits: Vec<(usize, f32)> = Vec::with_capacity(index.entries.len());
    for (i, entry) in index.entries.iter().enumerate() {
        if entry.vector.len() as u32 != index.dims {
            return Err(AppError::new(codes::INDEX_CORRUPT, "Index vector dims mismatch")
                .with_details(format!(
                    "ordinal={}; expected={}; got={}",
                    entry.ordinal,
                    index.dims,
                    entry.vector.len()
                )));
        }
        let score = cosine_similarity(&qv, &entry.vector, qnorm, l2_norm(&entry.vector));
        hits.push((i, score));
    }

    hits.sort_by(|a, b| {
        by_rank(
            (index.entries[a.0].ordinal, a.1),
            (index.entries[b.0].ordinal, b.1),
        )
    });
    hits.truncate(top_k);
    tracing::debug!(hits = hits.len(), top_k, "retrieval complete");

    Ok(hits
        .into_iter()
        .map(|(i, score)| {
            let entry = &index.entries[i];
            RetrievedChunk {
                ordinal: entry.ordinal,
                text: entry.text.clone(),
                score,
            }
        })
        .collect())
}
