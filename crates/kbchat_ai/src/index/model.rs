use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const INDEX_FORMAT_VERSION: u32 = 1;

/// On-disk knowledge base: one entry per chunk, in chunk order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedIndex {
    pub version: u32,
    pub model: String,
    pub dims: u32,
    pub built_at: String,
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub ordinal: u32,
    pub text: String,
    pub text_sha256: String,
    pub vector: Vec<f32>,
}

/// Metadata for a built index; what `KnowledgeBaseState::IndexReady` carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHandle {
    pub path: PathBuf,
    pub model: String,
    pub dims: u32,
    pub chunk_count: u32,
    pub built_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexBuildInput {
    pub model: String,
    pub built_at: String,
}

impl PersistedIndex {
    pub fn handle(&self, path: PathBuf) -> IndexHandle {
        IndexHandle {
            path,
            model: self.model.clone(),
            dims: self.dims,
            chunk_count: self.entries.len() as u32,
            built_at: self.built_at.clone(),
        }
    }
}
