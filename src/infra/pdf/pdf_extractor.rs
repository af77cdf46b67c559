// =============================================================================
// PDF EXTRACTOR
// =============================================================================
//
// `DocumentExtractor` backed by lopdf. For every page, in order:
//   1. the page's text layer
//   2. one `[Image Content: ...]` block per embedded image the OCR engine read
//
// Images are handed to OCR in a container format it understands:
//   DCTDecode -> JPEG bytes as stored
//   JPXDecode -> JPEG 2000 bytes as stored
//   raw / FlateDecode DeviceGray or DeviceRGB at 8 bits -> re-encoded as PNG
// Anything else (CCITT, JBIG2, indexed palettes) is skipped with a debug log.

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::Cursor;
use std::path::Path;

use super::tesseract_ocr::{EncodedImage, ImageKind, OcrEngine};
use crate::core::extract::{
    image_content_marker, DocumentExtractor, ExtractionError, RawDocumentText,
};

/// Page tree depth limit when looking up inherited resources.
const MAX_PARENT_DEPTH: usize = 32;

pub struct PdfExtractor {
    ocr: Option<Box<dyn OcrEngine>>,
}

impl PdfExtractor {
    pub fn new(ocr: Box<dyn OcrEngine>) -> Self {
        Self { ocr: Some(ocr) }
    }

    /// Reads the text layer only; embedded images are ignored.
    pub fn text_only() -> Self {
        Self { ocr: None }
    }

    fn ocr_page_images(&self, doc: &Document, page_id: ObjectId, page_number: u32, out: &mut RawDocumentText) {
        let Some(ocr) = self.ocr.as_ref() else {
            return;
        };

        for (name, stream) in page_images(doc, page_id) {
            let image = match encode_image(doc, stream) {
                Ok(image) => image,
                Err(reason) => {
                    tracing::debug!("Page {}: skipping image {}: {}", page_number, name, reason);
                    continue;
                }
            };

            match ocr.recognize(&image) {
                Ok(text) if text.trim().is_empty() => {
                    tracing::debug!("Page {}: no text found in image {}", page_number, name);
                }
                Ok(text) => {
                    out.text.push_str(&image_content_marker(&text));
                    out.images_read += 1;
                }
                Err(e) => {
                    tracing::warn!("Page {}: OCR failed on image {}: {}", page_number, name, e);
                }
            }
        }
    }
}

impl DocumentExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<RawDocumentText, ExtractionError> {
        let unreadable = |reason: String| ExtractionError::Unreadable {
            path: path.to_path_buf(),
            reason,
        };

        let doc = Document::load(path).map_err(|e| unreadable(e.to_string()))?;
        if doc.is_encrypted() {
            return Err(unreadable("the document is encrypted".to_string()));
        }

        let pages = doc.get_pages();
        let mut out = RawDocumentText {
            page_count: pages.len(),
            ..Default::default()
        };

        for (&page_number, &page_id) in &pages {
            match doc.extract_text(&[page_number]) {
                Ok(text) => out.text.push_str(&text),
                Err(e) => tracing::warn!("Page {}: no text layer extracted: {}", page_number, e),
            }
            self.ocr_page_images(&doc, page_id, page_number, &mut out);
        }

        if out.text.trim().is_empty() {
            return Err(ExtractionError::EmptyDocument(path.to_path_buf()));
        }

        Ok(out)
    }
}

// =============================================================================
// LOPDF HELPERS
// =============================================================================

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn resolve_dict<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Dictionary> {
    dict.get(key)
        .ok()
        .and_then(|object| resolve(doc, object))
        .and_then(|object| object.as_dict().ok())
}

/// The page's `/Resources`, following `/Parent` when the page inherits them.
fn page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;

    for _ in 0..MAX_PARENT_DEPTH {
        if let Some(resources) = resolve_dict(doc, node, b"Resources") {
            return Some(resources);
        }
        node = resolve_dict(doc, node, b"Parent")?;
    }

    None
}

/// Image XObjects referenced from the page resources, with their resource names.
fn page_images(doc: &Document, page_id: ObjectId) -> Vec<(String, &Stream)> {
    let Some(xobjects) = page_resources(doc, page_id).and_then(|r| resolve_dict(doc, r, b"XObject"))
    else {
        return Vec::new();
    };

    xobjects
        .iter()
        .filter_map(|(name, object)| {
            let stream = resolve(doc, object)?.as_stream().ok()?;
            let is_image = stream
                .dict
                .get(b"Subtype")
                .and_then(Object::as_name)
                .map(|subtype| subtype == b"Image")
                .unwrap_or(false);
            is_image.then(|| (String::from_utf8_lossy(name).into_owned(), stream))
        })
        .collect()
}

fn filter_names(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(filters)) => filters
            .iter()
            .filter_map(|f| f.as_name().ok())
            .map(<[u8]>::to_vec)
            .collect(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PixelLayout {
    Gray,
    Rgb,
}

fn pixel_layout(doc: &Document, dict: &Dictionary) -> Result<PixelLayout, String> {
    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|object| resolve(doc, object))
        .ok_or("no color space")?;

    match color_space {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" => Ok(PixelLayout::Gray),
            b"DeviceRGB" | b"CalRGB" => Ok(PixelLayout::Rgb),
            other => Err(format!("color space {}", String::from_utf8_lossy(other))),
        },
        // [/ICCBased <stream>]: the component count lives in the profile's /N.
        Object::Array(parts) if parts.first().and_then(|p| p.as_name().ok()) == Some(b"ICCBased".as_slice()) => {
            let components = parts
                .get(1)
                .and_then(|p| resolve(doc, p))
                .and_then(|p| p.as_stream().ok())
                .and_then(|s| s.dict.get(b"N").ok())
                .and_then(|n| n.as_i64().ok());
            match components {
                Some(1) => Ok(PixelLayout::Gray),
                Some(3) => Ok(PixelLayout::Rgb),
                other => Err(format!("ICC profile with {:?} components", other)),
            }
        }
        _ => Err("unsupported color space".to_string()),
    }
}

fn dimension(dict: &Dictionary, key: &[u8]) -> Result<u32, String> {
    dict.get(key)
        .and_then(Object::as_i64)
        .ok()
        .and_then(|v| u32::try_from(v).ok())
        .filter(|v| *v > 0)
        .ok_or_else(|| format!("missing /{}", String::from_utf8_lossy(key)))
}

/// Re-encodes raw 8-bit samples as PNG.
fn samples_to_png(doc: &Document, dict: &Dictionary, mut samples: Vec<u8>) -> Result<Vec<u8>, String> {
    let width = dimension(dict, b"Width")?;
    let height = dimension(dict, b"Height")?;
    let bits = dict
        .get(b"BitsPerComponent")
        .and_then(Object::as_i64)
        .unwrap_or(8);
    if bits != 8 {
        return Err(format!("{} bits per component", bits));
    }

    let layout = pixel_layout(doc, dict)?;
    let channels = match layout {
        PixelLayout::Gray => 1,
        PixelLayout::Rgb => 3,
    };
    let expected = width as usize * height as usize * channels;
    if samples.len() < expected {
        return Err(format!("{} sample bytes, expected {}", samples.len(), expected));
    }
    samples.truncate(expected);

    let image = match layout {
        PixelLayout::Gray => GrayImage::from_raw(width, height, samples).map(DynamicImage::ImageLuma8),
        PixelLayout::Rgb => RgbImage::from_raw(width, height, samples).map(DynamicImage::ImageRgb8),
    }
    .ok_or("sample buffer does not match dimensions")?;

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| e.to_string())?;
    Ok(png)
}

fn encode_image(doc: &Document, stream: &Stream) -> Result<EncodedImage, String> {
    let filters = filter_names(&stream.dict);
    let names: Vec<&[u8]> = filters.iter().map(Vec::as_slice).collect();

    match names.as_slice() {
        [b"DCTDecode"] => Ok(EncodedImage {
            kind: ImageKind::Jpeg,
            bytes: stream.content.clone(),
        }),
        [b"JPXDecode"] => Ok(EncodedImage {
            kind: ImageKind::Jpeg2000,
            bytes: stream.content.clone(),
        }),
        [] => Ok(EncodedImage {
            kind: ImageKind::Png,
            bytes: samples_to_png(doc, &stream.dict, stream.content.clone())?,
        }),
        [b"FlateDecode"] => {
            let samples = stream.decompressed_content().map_err(|e| e.to_string())?;
            Ok(EncodedImage {
                kind: ImageKind::Png,
                bytes: samples_to_png(doc, &stream.dict, samples)?,
            })
        }
        other => Err(format!(
            "unsupported filter chain {:?}",
            other
                .iter()
                .map(|f| String::from_utf8_lossy(f).into_owned())
                .collect::<Vec<_>>()
        )),
    }
}
