//! Concurrent page extraction
//!
//! The decoder is a trait seam so the extraction algorithm (fan-out per
//! page, ordered fan-in, single-space token join) is independent of the PDF
//! library doing the parsing.

use std::sync::Arc;
use std::time::Instant;

use futures::future::try_join_all;

use super::{Document, ExtractedText, LopdfDecoder};
use crate::error::ExtractionError;

/// A decoded, page-addressable document
pub trait PageSource: Send + Sync {
    /// Number of pages
    fn page_count(&self) -> u32;

    /// Ordered text tokens of a 1-based page
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::PageAccess`] if the page cannot be read.
    fn page_tokens(&self, page: u32) -> Result<Vec<String>, ExtractionError>;
}

/// Decodes raw bytes into a [`PageSource`]
pub trait PdfDecoder: Send + Sync {
    /// Decode a PDF payload
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Malformed`] if the bytes are not a
    /// readable PDF.
    fn decode(&self, bytes: &[u8]) -> Result<Arc<dyn PageSource>, ExtractionError>;
}

/// Turns documents into [`ExtractedText`]
#[derive(Clone)]
pub struct DocumentExtractor {
    decoder: Arc<dyn PdfDecoder>,
    max_bytes: Option<u64>,
}

impl Default for DocumentExtractor {
    fn default() -> Self {
        Self::new(LopdfDecoder)
    }
}

impl DocumentExtractor {
    /// Create an extractor using the given decoder
    pub fn new(decoder: impl PdfDecoder + 'static) -> Self {
        Self {
            decoder: Arc::new(decoder),
            max_bytes: None,
        }
    }

    /// Reject documents larger than `max_bytes`
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = Some(max_bytes);
        self
    }

    /// Extract ordered plain text from a document
    ///
    /// # Errors
    ///
    /// Fails if the payload is empty, too large or not a PDF, cannot be
    /// decoded, has no pages, or any single page cannot be read.
    pub async fn extract(&self, document: &Document) -> Result<ExtractedText, ExtractionError> {
        if document.bytes().is_empty() {
            return Err(ExtractionError::EmptyInput {
                file_name: document.file_name().to_string(),
            });
        }
        let size = document.bytes().len() as u64;
        if let Some(limit) = self.max_bytes.filter(|limit| size > *limit) {
            return Err(ExtractionError::TooLarge {
                file_name: document.file_name().to_string(),
                size,
                limit,
            });
        }
        if !document.looks_like_pdf() {
            return Err(ExtractionError::UnsupportedFormat {
                file_name: document.file_name().to_string(),
            });
        }

        let start = Instant::now();
        let decoder = Arc::clone(&self.decoder);
        let bytes = document.bytes().to_vec();
        let source = tokio::task::spawn_blocking(move || decoder.decode(&bytes))
            .await
            .map_err(|e| ExtractionError::Task(e.to_string()))??;

        let page_count = source.page_count();
        if page_count == 0 {
            return Err(ExtractionError::NoPages);
        }

        let tasks = (1..=page_count).map(|page| {
            let source = Arc::clone(&source);
            tokio::task::spawn_blocking(move || {
                source.page_tokens(page).map(|tokens| tokens.join(" "))
            })
        });

        // try_join_all keeps input order, which restores page order
        let pages = try_join_all(tasks)
            .await
            .map_err(|e| ExtractionError::Task(e.to_string()))?
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        let text = ExtractedText::from_pages(pages);
        tracing::info!(
            file = %document.file_name(),
            page_count = page_count,
            chars = text.as_str().len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Extracted document text"
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakePages {
        pages: Vec<Result<Vec<&'static str>, &'static str>>,
    }

    impl PageSource for FakePages {
        fn page_count(&self) -> u32 {
            self.pages.len() as u32
        }

        fn page_tokens(&self, page: u32) -> Result<Vec<String>, ExtractionError> {
            // Later pages finish first to prove ordering is restored at join
            std::thread::sleep(std::time::Duration::from_millis(
                u64::from(self.page_count() - page) * 5,
            ));
            match &self.pages[(page - 1) as usize] {
                Ok(tokens) => Ok(tokens.iter().map(|t| (*t).to_string()).collect()),
                Err(reason) => Err(ExtractionError::PageAccess {
                    page,
                    reason: (*reason).to_string(),
                }),
            }
        }
    }

    struct FakeDecoder(fn() -> Vec<Result<Vec<&'static str>, &'static str>>);

    impl PdfDecoder for FakeDecoder {
        fn decode(&self, _bytes: &[u8]) -> Result<Arc<dyn PageSource>, ExtractionError> {
            Ok(Arc::new(FakePages { pages: (self.0)() }))
        }
    }

    struct BrokenDecoder;

    impl PdfDecoder for BrokenDecoder {
        fn decode(&self, _bytes: &[u8]) -> Result<Arc<dyn PageSource>, ExtractionError> {
            Err(ExtractionError::Malformed("trailer not found".to_string()))
        }
    }

    fn pdf(name: &str) -> Document {
        Document::new(name, b"%PDF-1.4 fake".to_vec())
    }

    #[tokio::test]
    async fn test_pages_joined_in_order() {
        let extractor = DocumentExtractor::new(FakeDecoder(|| {
            vec![
                Ok(vec!["Página", "um"]),
                Ok(vec!["Página", "dois"]),
                Ok(vec!["Página", "três"]),
            ]
        }));

        let text = extractor.extract(&pdf("ip.pdf")).await.unwrap();
        assert_eq!(text.page_count(), 3);
        assert_eq!(text.pages()[0], "Página um");
        assert_eq!(text.pages()[2], "Página três");
        assert_eq!(text.as_str(), "Página um\n\nPágina dois\n\nPágina três");
    }

    #[tokio::test]
    async fn test_empty_page_is_kept() {
        let extractor =
            DocumentExtractor::new(FakeDecoder(|| vec![Ok(vec!["capa"]), Ok(vec![]), Ok(vec!["fim"])]));

        let text = extractor.extract(&pdf("ip.pdf")).await.unwrap();
        assert_eq!(text.page_count(), 3);
        assert_eq!(text.pages()[1], "");
        assert_eq!(text.as_str(), "capa\n\n\n\nfim");
    }

    #[tokio::test]
    async fn test_page_failure_aborts_everything() {
        let extractor = DocumentExtractor::new(FakeDecoder(|| {
            vec![Ok(vec!["ok"]), Err("corrupt stream"), Ok(vec!["ok"])]
        }));

        let err = extractor.extract(&pdf("ip.pdf")).await.unwrap_err();
        assert!(matches!(err, ExtractionError::PageAccess { page: 2, .. }));
    }

    #[tokio::test]
    async fn test_zero_pages_fails() {
        let extractor = DocumentExtractor::new(FakeDecoder(Vec::new));
        let err = extractor.extract(&pdf("ip.pdf")).await.unwrap_err();
        assert!(matches!(err, ExtractionError::NoPages));
    }

    #[tokio::test]
    async fn test_decode_failure_surfaces() {
        let extractor = DocumentExtractor::new(BrokenDecoder);
        let err = extractor.extract(&pdf("ip.pdf")).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_size_limit() {
        let extractor = DocumentExtractor::new(FakeDecoder(|| vec![Ok(vec!["ok"])])).with_max_bytes(8);

        let err = extractor
            .extract(&Document::new("grande.pdf", b"%PDF-1.4 too long".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::TooLarge { limit: 8, .. }));

        let text = extractor
            .extract(&Document::new("ok.pdf", b"%PDF-1.4".to_vec()))
            .await
            .unwrap();
        assert_eq!(text.as_str(), "ok");
    }

    #[tokio::test]
    async fn test_empty_and_non_pdf_rejected_before_decoding() {
        let extractor = DocumentExtractor::new(FakeDecoder(|| vec![Ok(vec!["never"])]));

        let err = extractor
            .extract(&Document::new("vazio.pdf", Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::EmptyInput { .. }));

        let err = extractor
            .extract(&Document::new("nota.txt", b"just text".to_vec()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::UnsupportedFormat { .. }));
    }
}
