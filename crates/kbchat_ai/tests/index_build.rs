use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};

use kbchat_ai::chunking::Chunker;
use kbchat_ai::embeddings::Embedder;
use kbchat_ai::index::{IndexBuildInput, IndexStore};
use kbchat_ai::knowledge_base::{KnowledgeBase, KnowledgeBaseState};
use kbchat_core::error::{codes, AppError};
use kbchat_core::ingest::{DefaultPageReader, Document, DocumentKind};
use pretty_assertions::assert_eq;

/// Deterministic embedding `[len, first_byte, last_byte]`; can fail on the n-th call.
struct CountingEmbedder {
    calls: AtomicUsize,
    fail_on_call: Option<usize>,
    dims_override: Option<(usize, usize)>,
}

impl CountingEmbedder {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail_on_call: None,
            dims_override: None,
        }
    }

    fn failing_on(call: usize) -> Self {
        Self {
            fail_on_call: Some(call),
            ..Self::new()
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn embed(&self, _model: &str, input: &str) -> Result<Vec<f32>, AppError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_on_call == Some(n) {
            return Err(AppError::new(codes::EMBEDDING_SERVICE_FAILED, "embedding request failed")
                .with_details("status=503; upstream=model overloaded")
                .with_retryable(true));
        }
        let bytes = input.as_bytes();
        let first = bytes.first().copied().unwrap_or(0) as f32;
        let last = bytes.last().copied().unwrap_or(0) as f32;
        let mut v = vec![bytes.len() as f32, first, last];
        if let Some((at, dims)) = self.dims_override {
            if at == n {
                v.resize(dims, 1.0);
            }
        }
        Ok(v)
    }
}

fn text_doc(name: &str, text: &str) -> Document {
    Document::new(name, DocumentKind::PlainText, text.as_bytes().to_vec())
}

fn input() -> IndexBuildInput {
    IndexBuildInput {
        model: "mock".to_string(),
        built_at: "2026-02-10T00:00:00Z".to_string(),
    }
}

#[test]
fn create_builds_index_and_marks_state_ready() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().join("knowledge_base"));
    let embedder = CountingEmbedder::new();
    let reader = DefaultPageReader::default();
    let kb = KnowledgeBase {
        reader: &reader,
        chunker: Chunker::new(100, 20, false).expect("chunker"),
        embedder: &embedder,
        store: &store,
        model: "mock",
    };

    let mut state = KnowledgeBaseState::NoIndex;
    let text = "x".repeat(150);
    let report = kb
        .create(&mut state, &[text_doc("a.txt", &text), text_doc("b.txt", &"y".repeat(100))])
        .expect("create");

    // 250 chars, S=100, O=20 -> [0,100) [80,180) [160,250)
    assert_eq!(report.handle.chunk_count, 3);
    assert_eq!(report.documents, 2);
    assert_eq!(embedder.call_count(), 3);
    assert!(state.is_ready());
    assert_eq!(state.handle(), Some(&report.handle));

    let index = store.load().expect("load");
    assert_eq!(index.model, "mock");
    assert_eq!(index.dims, 3);
    let ordinals: Vec<u32> = index.entries.iter().map(|e| e.ordinal).collect();
    assert_eq!(ordinals, vec![0, 1, 2]);
    assert_eq!(index.entries[1].text, format!("{}{}", "x".repeat(70), "y".repeat(30)));
    assert_eq!(index.entries[0].text_sha256.len(), 64);
    assert!(!store.lock_path().exists());
}

#[test]
fn empty_document_list_fails_without_embedding_calls() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().to_path_buf());
    let embedder = CountingEmbedder::new();
    let reader = DefaultPageReader::default();
    let kb = KnowledgeBase {
        reader: &reader,
        chunker: Chunker::new(100, 20, true).expect("chunker"),
        embedder: &embedder,
        store: &store,
        model: "mock",
    };

    let mut state = KnowledgeBaseState::NoIndex;
    let err = kb.create(&mut state, &[]).expect_err("empty");
    assert_eq!(err.code, codes::INGEST_EMPTY_INPUT);
    assert_eq!(embedder.call_count(), 0);
    assert_eq!(state, KnowledgeBaseState::NoIndex);
}

#[test]
fn documents_without_text_fail_as_empty_extraction() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().to_path_buf());
    let embedder = CountingEmbedder::new();
    let reader = DefaultPageReader::default();
    let kb = KnowledgeBase {
        reader: &reader,
        chunker: Chunker::new(100, 20, true).expect("chunker"),
        embedder: &embedder,
        store: &store,
        model: "mock",
    };

    let mut state = KnowledgeBaseState::NoIndex;
    let err = kb
        .create(&mut state, &[text_doc("blank.txt", "  \n\n ")])
        .expect_err("empty extraction");
    assert_eq!(err.code, codes::INGEST_EMPTY_EXTRACTION);
    assert_eq!(embedder.call_count(), 0);
    assert!(!state.is_ready());
    assert!(!store.exists());
}

#[test]
fn embedding_failure_midway_writes_nothing_and_keeps_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().to_path_buf());
    let embedder = CountingEmbedder::failing_on(2);
    let reader = DefaultPageReader::default();
    let kb = KnowledgeBase {
        reader: &reader,
        chunker: Chunker::new(100, 0, false).expect("chunker"),
        embedder: &embedder,
        store: &store,
        model: "mock",
    };

    let mut state = KnowledgeBaseState::NoIndex;
    let err = kb
        .create(&mut state, &[text_doc("a.txt", &"z".repeat(500))])
        .expect_err("embedding failure");
    assert_eq!(err.code, codes::EMBEDDING_SERVICE_FAILED);
    assert!(err.retryable);
    let details = err.details.unwrap_or_default();
    assert!(details.contains("ordinal=2"), "{details}");
    assert!(details.contains("model overloaded"), "{details}");

    assert_eq!(embedder.call_count(), 3);
    assert_eq!(state, KnowledgeBaseState::NoIndex);
    assert!(!store.exists());
    assert!(!store.index_path().with_extension("tmp").exists());
    assert!(!store.lock_path().exists());
}

#[test]
fn failed_rebuild_keeps_previous_index() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().to_path_buf());
    let reader = DefaultPageReader::default();
    let chunker = Chunker::new(100, 0, false).expect("chunker");

    let good = CountingEmbedder::new();
    let mut state = KnowledgeBaseState::NoIndex;
    KnowledgeBase {
        reader: &reader,
        chunker,
        embedder: &good,
        store: &store,
        model: "mock",
    }
    .create(&mut state, &[text_doc("v1.txt", &"a".repeat(200))])
    .expect("first build");
    let before = state.clone();

    let bad = CountingEmbedder::failing_on(0);
    KnowledgeBase {
        reader: &reader,
        chunker,
        embedder: &bad,
        store: &store,
        model: "mock",
    }
    .create(&mut state, &[text_doc("v2.txt", &"b".repeat(300))])
    .expect_err("second build fails");

    assert_eq!(state, before);
    let index = store.load().expect("old index still readable");
    assert_eq!(index.entries.len(), 2);
    assert!(index.entries[0].text.starts_with('a'));
}

#[test]
fn rebuild_replaces_previous_index() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().to_path_buf());
    let chunker = Chunker::new(100, 0, false).expect("chunker");
    let embedder = CountingEmbedder::new();

    let text_v1 = "a".repeat(300);
    let chunks: Vec<_> = chunker.chunks(&text_v1).collect();
    store.build_with_embedder(&chunks, &embedder, input()).expect("v1");

    let text_v2 = "b".repeat(100);
    let chunks: Vec<_> = chunker.chunks(&text_v2).collect();
    let handle = store.build_with_embedder(&chunks, &embedder, input()).expect("v2");

    assert_eq!(handle.chunk_count, 1);
    let index = store.load().expect("load");
    assert_eq!(index.entries.len(), 1);
    assert_eq!(index.entries[0].text, text_v2);
}

#[test]
fn zero_chunks_is_index_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().to_path_buf());
    let embedder = CountingEmbedder::new();
    let err = store
        .build_with_embedder(&[], &embedder, input())
        .expect_err("empty");
    assert_eq!(err.code, codes::INDEX_EMPTY);
    assert_eq!(embedder.call_count(), 0);
}

#[test]
fn dimension_drift_fails_the_build() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().to_path_buf());
    let embedder = CountingEmbedder {
        dims_override: Some((1, 5)),
        ..CountingEmbedder::new()
    };
    let chunker = Chunker::new(10, 0, false).expect("chunker");
    let text = "q".repeat(30);
    let chunks: Vec<_> = chunker.chunks(&text).collect();

    let err = store
        .build_with_embedder(&chunks, &embedder, input())
        .expect_err("drift");
    assert_eq!(err.code, codes::INDEX_BUILD_FAILED);
    assert!(!store.exists());
}

#[test]
fn concurrent_build_is_rejected_while_lock_is_held() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().to_path_buf());
    fs::write(store.lock_path(), b"pid=1").expect("stale lock");

    let embedder = CountingEmbedder::new();
    let chunker = Chunker::new(10, 0, false).expect("chunker");
    let chunks: Vec<_> = chunker.chunks("some text here").collect();
    let err = store
        .build_with_embedder(&chunks, &embedder, input())
        .expect_err("locked");
    assert_eq!(err.code, codes::INDEX_BUILD_IN_PROGRESS);
    assert_eq!(embedder.call_count(), 0);

    fs::remove_file(store.lock_path()).expect("unlock");
    store
        .build_with_embedder(&chunks, &embedder, input())
        .expect("build after unlock");
}

#[test]
fn detect_restores_ready_state_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = IndexStore::open(dir.path().to_path_buf());
    assert_eq!(KnowledgeBaseState::detect(&store), KnowledgeBaseState::NoIndex);

    let chunker = Chunker::new(10, 0, false).expect("chunker");
    let chunks: Vec<_> = chunker.chunks("persisted knowledge").collect();
    let handle = store
        .build_with_embedder(&chunks, &CountingEmbedder::new(), input())
        .expect("build");

    assert_eq!(
        KnowledgeBaseState::detect(&store),
        KnowledgeBaseState::IndexReady(handle)
    );

    fs::write(store.index_path(), b"truncated{").expect("corrupt");
    assert_eq!(KnowledgeBaseState::detect(&store), KnowledgeBaseState::NoIndex);
}
