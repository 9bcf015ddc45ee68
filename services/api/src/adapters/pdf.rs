//! services/api/src/adapters/pdf.rs
//!
//! Implements the `TextExtractionService` port for PDF files stored on disk.
//! Text comes from `pdf-extract`; the page count comes from `lopdf`.

use async_trait::async_trait;
use std::path::Path;
use study_assistant_core::domain::ExtractedText;
use study_assistant_core::ports::{PortError, PortResult, TextExtractionService};
use tracing::{debug, warn};

#[derive(Clone, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parses an in-memory PDF. Blocking; run it off the async runtime.
    pub fn extract_from_bytes(data: &[u8]) -> PortResult<ExtractedText> {
        let text = pdf_extract::extract_text_from_mem(data)
            .map_err(|e| PortError::Unexpected(format!("PDF text extraction failed: {}", e)))?;

        // A page count is only used to estimate chunk pages, so a failure here is not fatal.
        let page_count = match lopdf::Document::load_mem(data) {
            Ok(doc) => Some(doc.get_pages().len() as u32).filter(|pages| *pages > 0),
            Err(e) => {
                warn!("Could not count PDF pages: {}", e);
                None
            }
        };

        Ok(ExtractedText { text, page_count })
    }
}

#[async_trait]
impl TextExtractionService for PdfTextExtractor {
    async fn extract_text(&self, file_path: &Path) -> PortResult<ExtractedText> {
        let data = tokio::fs::read(file_path).await.map_err(|e| {
            PortError::Unexpected(format!("Could not read {}: {}", file_path.display(), e))
        })?;
        debug!("Extracting text from {} ({} bytes)", file_path.display(), data.len());

        tokio::task::spawn_blocking(move || Self::extract_from_bytes(&data))
            .await
            .map_err(|e| PortError::Unexpected(format!("PDF extraction task failed: {}", e)))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_pdf_bytes_are_rejected() {
        let result = PdfTextExtractor::extract_from_bytes(b"definitely not a pdf");
        assert!(matches!(result, Err(PortError::Unexpected(_))));
    }

    #[tokio::test]
    async fn test_missing_file_is_an_error() {
        let extractor = PdfTextExtractor::new();
        let result = extractor
            .extract_text(Path::new("/nonexistent/study-assistant/missing.pdf"))
            .await;
        assert!(matches!(result, Err(PortError::Unexpected(msg)) if msg.contains("missing.pdf")));
    }
}
