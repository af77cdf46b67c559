pub mod pdf_extractor;
pub mod tesseract_ocr;

pub use pdf_extractor::PdfExtractor;
pub use tesseract_ocr::TesseractOcr;
