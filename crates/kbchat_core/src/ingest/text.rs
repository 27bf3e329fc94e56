use crate::error::{codes, AppError};

use super::{Document, PageReader};

/// Plain text is a single page. CRLF is normalized so offsets match what users see.
#[derive(Debug, Clone, Default)]
pub struct PlainTextReader;

impl PageReader for PlainTextReader {
    fn read_pages(&self, doc: &Document) -> Result<Vec<String>, AppError> {
        let text = std::str::from_utf8(&doc.bytes).map_err(|e| {
            AppError::new(codes::INGEST_READ_FAILED, "Document is not valid UTF-8 text")
                .with_details(format!("source={}; err={}", doc.source, e))
        })?;
        Ok(vec![text.replace("\r\n", "\n").replace('\r', "\n")])
    }
}
