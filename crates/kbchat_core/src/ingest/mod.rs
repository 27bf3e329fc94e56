//! Document ingestion: uploaded files in, one concatenated [`RawText`] out.
//!
//! Pages are read through a [`PageReader`] so the PDF backend can be swapped
//! for a fake in tests. Pages without a text layer are skipped; nothing is
//! inserted between pages or documents.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{codes, AppError};

mod pdf;
mod text;

pub use pdf::PdfPageReader;
pub use text::PlainTextReader;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Pdf,
    PlainText,
}

impl DocumentKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "md" | "markdown" | "text" => Some(Self::PlainText),
            _ => None,
        }
    }
}

/// An uploaded file. Dropped after extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub source: String,
    pub kind: DocumentKind,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(source: impl Into<String>, kind: DocumentKind, bytes: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            kind,
            bytes,
        }
    }
}

pub trait PageReader {
    /// Text of every page, in page order. Pages with no text layer yield "".
    fn read_pages(&self, doc: &Document) -> Result<Vec<String>, AppError>;
}

/// Dispatches on [`DocumentKind`].
#[derive(Debug, Clone, Default)]
pub struct DefaultPageReader {
    pdf: PdfPageReader,
    text: PlainTextReader,
}

impl PageReader for DefaultPageReader {
    fn read_pages(&self, doc: &Document) -> Result<Vec<String>, AppError> {
        match doc.kind {
            DocumentKind::Pdf => self.pdf.read_pages(doc),
            DocumentKind::PlainText => self.text.read_pages(doc),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawText {
    pub text: String,
    pub documents: usize,
    pub pages_read: usize,
    pub pages_skipped: usize,
}

impl RawText {
    /// True when every page of every document yielded no text.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

pub fn ingest_documents(docs: &[Document], reader: &dyn PageReader) -> Result<RawText, AppError> {
    if docs.is_empty() {
        return Err(AppError::new(
            codes::INGEST_EMPTY_INPUT,
            "Upload at least one document before building a knowledge base",
        ));
    }

    let mut out = RawText {
        documents: docs.len(),
        ..RawText::default()
    };
    for doc in docs {
        let pages = reader.read_pages(doc)?;
        for page in pages {
            if page.trim().is_empty() {
                out.pages_skipped += 1;
                continue;
            }
            out.pages_read += 1;
            out.text.push_str(&page);
        }
    }

    if out.is_empty() {
        tracing::warn!(
            documents = out.documents,
            pages_skipped = out.pages_skipped,
            "no extractable text in uploaded documents"
        );
    } else {
        tracing::debug!(
            documents = out.documents,
            pages_read = out.pages_read,
            pages_skipped = out.pages_skipped,
            "ingested documents"
        );
    }
    Ok(out)
}

/// Read files from disk, classifying each by extension.
pub fn load_documents<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Document>, AppError> {
    let mut docs = Vec::with_capacity(paths.len());
    for p in paths {
        let path = p.as_ref();
        let kind = DocumentKind::from_path(path).ok_or_else(|| {
            AppError::new(codes::INGEST_UNSUPPORTED_TYPE, "Unsupported document type")
                .with_details(format!("path={}; supported=.pdf,.txt,.md", path.display()))
        })?;
        let bytes = fs::read(path).map_err(|e| {
            AppError::new(codes::INGEST_READ_FAILED, "Failed to read document")
                .with_details(format!("path={}; err={}", path.display(), e))
        })?;
        docs.push(Document::new(path.display().to_string(), kind, bytes));
    }
    Ok(docs)
}
