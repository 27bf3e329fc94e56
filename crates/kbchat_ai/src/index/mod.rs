use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use kbchat_core::error::{codes, AppError};
use sha2::{Digest, Sha256};

use crate::chunking::TextChunk;
use crate::embeddings::Embedder;

mod lock;
mod model;

pub use lock::BuildLock;
pub use model::{IndexBuildInput, IndexEntry, IndexHandle, PersistedIndex, INDEX_FORMAT_VERSION};

#[derive(Debug, Clone)]
pub struct IndexStore {
    root: PathBuf,
}

impl IndexStore {
    /// `root` is the knowledge base directory, usually `<data_dir>/knowledge_base`.
    pub fn open(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join("index.json")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join("index.lock")
    }

    fn ensure_dirs(&self) -> Result<(), AppError> {
        fs::create_dir_all(&self.root).map_err(|e| {
            AppError::new(codes::INDEX_BUILD_FAILED, "Failed to create index directory")
                .with_details(format!("path={}; err={}", self.root.display(), e))
        })
    }

    pub fn exists(&self) -> bool {
        self.index_path().is_file()
    }

    pub fn load(&self) -> Result<PersistedIndex, AppError> {
        read_index(&self.index_path())
    }

    pub fn handle(&self) -> Result<IndexHandle, AppError> {
        Ok(self.load()?.handle(self.index_path()))
    }

    /// Full rebuild. Nothing is written unless every chunk embeds successfully.
    pub fn build_with_embedder(
        &self,
        chunks: &[TextChunk<'_>],
        embedder: &dyn Embedder,
        input: IndexBuildInput,
    ) -> Result<IndexHandle, AppError> {
        if chunks.is_empty() {
            return Err(AppError::new(
                codes::INDEX_EMPTY,
                "No chunks to index; the documents produced no text",
            ));
        }
        self.ensure_dirs()?;
        let _lock = BuildLock::acquire(&self.lock_path())?;

        tracing::info!(chunks = chunks.len(), model = %input.model, "embedding chunks");
        let mut dims: Option<u32> = None;
        let mut entries: Vec<IndexEntry> = Vec::with_capacity(chunks.len());

        for chunk in chunks {
            let v = embedder.embed(&input.model, chunk.text).map_err(|e| {
                AppError::new(codes::EMBEDDING_SERVICE_FAILED, "Failed to compute embeddings")
                    .with_details(format!("ordinal={}; err={}", chunk.ordinal, e.user_message()))
                    .with_retryable(e.retryable)
            })?;

            let this_dims = v.len() as u32;
            match dims {
                Some(d) if d != this_dims => {
                    return Err(AppError::new(
                        codes::INDEX_BUILD_FAILED,
                        "Embedding dimension mismatch across chunks",
                    )
                    .with_details(format!(
                        "expected={}; got={}; ordinal={}",
                        d, this_dims, chunk.ordinal
                    )));
                }
                Some(_) => {}
                None if this_dims == 0 => {
                    return Err(AppError::new(
                        codes::INDEX_BUILD_FAILED,
                        "Embedding service returned an empty vector",
                    )
                    .with_details(format!("ordinal={}", chunk.ordinal)));
                }
                None => dims = Some(this_dims),
            }

            entries.push(IndexEntry {
                ordinal: chunk.ordinal,
                text: chunk.text.to_string(),
                text_sha256: sha256_hex(chunk.text.as_bytes()),
                vector: v,
            });
            tracing::debug!(ordinal = chunk.ordinal, "chunk embedded");
        }

        let index = PersistedIndex {
            version: INDEX_FORMAT_VERSION,
            model: input.model,
            dims: dims.unwrap_or(0),
            built_at: input.built_at,
            entries,
        };
        self.write_index(&index)?;

        let handle = index.handle(self.index_path());
        tracing::info!(
            chunks = handle.chunk_count,
            dims = handle.dims,
            path = %handle.path.display(),
            "knowledge base written"
        );
        Ok(handle)
    }

    fn write_index(&self, index: &PersistedIndex) -> Result<(), AppError> {
        let path = self.index_path();
        let tmp = path.with_extension("tmp");
        let json = serde_json::to_vec(index).map_err(|e| {
            AppError::new(codes::INDEX_BUILD_FAILED, "Failed to encode index")
                .with_details(e.to_string())
        })?;
        fs::write(&tmp, &json).map_err(|e| {
            AppError::new(codes::INDEX_BUILD_FAILED, "Failed to write index")
                .with_details(format!("path={}; err={}", tmp.display(), e))
        })?;
        fs::rename(&tmp, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            AppError::new(codes::INDEX_BUILD_FAILED, "Failed to finalize index write")
                .with_details(format!(
                    "tmp={}; dest={}; err={}",
                    tmp.display(),
                    path.display(),
                    e
                ))
        })?;
        Ok(())
    }
}

pub fn read_index(path: &Path) -> Result<PersistedIndex, AppError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(AppError::new(
                codes::INDEX_NOT_FOUND,
                "No knowledge base found; create one first",
            )
            .with_details(format!("path={}", path.display())));
        }
        Err(e) => {
            return Err(AppError::new(codes::INDEX_CORRUPT, "Failed to read index")
                .with_details(format!("path={}; err={}", path.display(), e)));
        }
    };
    let index: PersistedIndex = serde_json::from_slice(&bytes).map_err(|e| {
        AppError::new(codes::INDEX_CORRUPT, "Failed to decode index")
            .with_details(format!("path={}; err={}", path.display(), e))
    })?;
    if index.version != INDEX_FORMAT_VERSION {
        return Err(AppError::new(codes::INDEX_CORRUPT, "Unsupported index format version")
            .with_details(format!(
                "path={}; version={}; expected={}",
                path.display(),
                index.version,
                INDEX_FORMAT_VERSION
            )));
    }
    Ok(index)
}

fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
