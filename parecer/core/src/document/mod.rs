//! Document Extraction
//!
//! Turns a binary document (a scanned or typed PDF) into ordered plain text.
//!
//! # Pipeline
//!
//! ```text
//! Document (bytes + name)
//!     │
//!     ▼  PdfDecoder::decode          (blocking task)
//! PageSource (page-addressable)
//!     │
//!     ├──▶ page 1 tokens ─┐
//!     ├──▶ page 2 tokens ─┤          (one blocking task per page)
//!     └──▶ page N tokens ─┘
//!     │
//!     ▼  join tokens with " ", pages with "\n\n", trim
//! ExtractedText
//! ```
//!
//! Pages are extracted concurrently and joined back in page order. Any
//! failure aborts the whole extraction; a truncated document is never
//! returned.

mod extractor;
mod pdf;

use std::path::Path;

use crate::error::ExtractionError;

pub use extractor::{DocumentExtractor, PageSource, PdfDecoder};
pub use pdf::LopdfDecoder;

/// Separator placed between page strings
pub const PAGE_SEPARATOR: &str = "\n\n";

/// A binary document supplied by the user
///
/// Exists only for the duration of one extraction call.
#[derive(Clone, Debug)]
pub struct Document {
    file_name: String,
    bytes: Vec<u8>,
}

impl Document {
    /// Create a document from an in-memory payload
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read a document from disk
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Read`] if the file cannot be read.
    pub async fn read(path: impl AsRef<Path>) -> Result<Self, ExtractionError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ExtractionError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        let file_name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        Ok(Self::new(file_name, bytes))
    }

    /// File name as supplied by the user
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// The raw payload
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Whether the payload carries a PDF header
    ///
    /// The header may be preceded by junk, but must start within the first
    /// kilobyte.
    #[must_use]
    pub fn looks_like_pdf(&self) -> bool {
        let window = &self.bytes[..self.bytes.len().min(1024)];
        window.windows(5).any(|w| w == b"%PDF-")
    }
}

/// Plain text recovered from a document, ordered by source page
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedText {
    pages: Vec<String>,
    text: String,
}

impl ExtractedText {
    /// Build from page strings in page order
    ///
    /// Empty pages are kept so page count always matches the source.
    #[must_use]
    pub fn from_pages(pages: Vec<String>) -> Self {
        let text = pages.join(PAGE_SEPARATOR).trim().to_string();
        Self { pages, text }
    }

    /// The page strings, in page order
    #[must_use]
    pub fn pages(&self) -> &[String] {
        &self.pages
    }

    /// Number of pages in the source document
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// The concatenated, trimmed text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Whether no text at all was recovered
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

impl std::fmt::Display for ExtractedText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
