// Port for turning an uploaded document into one text blob.
// The PDF library and OCR engine live in infra; core only fixes the output
// contract: page text in page order, OCR transcripts wrapped in a marker.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Opening tag of an OCR transcript inside [`RawDocumentText`].
pub const IMAGE_CONTENT_PREFIX: &str = "[Image Content: ";

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Error reading PDF file {path}: {reason}")]
    Unreadable { path: PathBuf, reason: String },

    #[error("PDF file {0} contains no extractable text")]
    EmptyDocument(PathBuf),

    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// Concatenated page text and bracketed OCR transcripts, in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDocumentText {
    pub text: String,
    pub page_count: usize,
    /// Embedded images that produced an OCR transcript.
    pub images_read: usize,
}

impl RawDocumentText {
    pub fn has_ocr_content(&self) -> bool {
        self.text.contains(IMAGE_CONTENT_PREFIX)
    }
}

/// Wraps OCR output so downstream readers can tell it apart from page text.
pub fn image_content_marker(ocr_text: &str) -> String {
    format!("\n{}{}]\n", IMAGE_CONTENT_PREFIX, ocr_text)
}

/// Extracts text from a document on local storage. Blocking; callers on the
/// async runtime should use `spawn_blocking`.
pub trait DocumentExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<RawDocumentText, ExtractionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_wraps_ocr_text() {
        assert_eq!(
            image_content_marker("Figure 1: cell diagram"),
            "\n[Image Content: Figure 1: cell diagram]\n"
        );
    }

    #[test]
    fn test_has_ocr_content() {
        let plain = RawDocumentText {
            text: "page one".to_string(),
            page_count: 1,
            images_read: 0,
        };
        assert!(!plain.has_ocr_content());

        let with_image = RawDocumentText {
            text: format!("page one{}", image_content_marker("chart")),
            page_count: 1,
            images_read: 1,
        };
        assert!(with_image.has_ocr_content());
    }
}
