pub mod document_extractor;

pub use document_extractor::{
    image_content_marker, DocumentExtractor, ExtractionError, RawDocumentText,
};
