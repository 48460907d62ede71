//! `lopdf`-backed decoder
//!
//! lopdf emits one line per text-showing run; those runs are the page's
//! tokens. Joining them is the extractor's job, not the decoder's.

use std::sync::Arc;

use super::extractor::{PageSource, PdfDecoder};
use crate::error::ExtractionError;

/// Decoder built on the pure-Rust `lopdf` parser
#[derive(Clone, Copy, Debug, Default)]
pub struct LopdfDecoder;

impl PdfDecoder for LopdfDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<Arc<dyn PageSource>, ExtractionError> {
        let document = lopdf::Document::load_mem(bytes)
            .map_err(|e| ExtractionError::Malformed(e.to_string()))?;

        // get_pages is keyed by 1-based page number, already sorted
        let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();

        tracing::debug!(page_count = page_numbers.len(), "Decoded PDF");

        Ok(Arc::new(LopdfPages {
            document,
            page_numbers,
        }))
    }
}

struct LopdfPages {
    document: lopdf::Document,
    page_numbers: Vec<u32>,
}

impl PageSource for LopdfPages {
    fn page_count(&self) -> u32 {
        self.page_numbers.len() as u32
    }

    fn page_tokens(&self, page: u32) -> Result<Vec<String>, ExtractionError> {
        let number = page
            .checked_sub(1)
            .and_then(|idx| self.page_numbers.get(idx as usize))
            .copied()
            .ok_or_else(|| ExtractionError::PageAccess {
                page,
                reason: "page out of range".to_string(),
            })?;

        let text = self
            .document
            .extract_text(&[number])
            .map_err(|e| ExtractionError::PageAccess {
                page,
                reason: e.to_string(),
            })?;

        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}
