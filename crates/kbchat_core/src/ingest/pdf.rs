use crate::error::{codes, AppError};

use super::{Document, PageReader};

#[derive(Debug, Clone, Default)]
pub struct PdfPageReader;

impl PageReader for PdfPageReader {
    fn read_pages(&self, doc: &Document) -> Result<Vec<String>, AppError> {
        pdf_extract::extract_text_from_mem_by_pages(&doc.bytes).map_err(|e| {
            AppError::new(codes::INGEST_READ_FAILED, "Failed to extract text from PDF")
                .with_details(format!("source={}; err={}", doc.source, e))
        })
    }
}
