// OCR over images pulled out of a PDF, by shelling out to the `tesseract`
// binary. Blocking; only called from the extractor, which already runs on
// the blocking pool.

use std::error::Error;
use std::io::Write;
use std::process::Command;

/// Container format of an image handed to an OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Png,
    Jpeg,
    Jpeg2000,
}

impl ImageKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
            ImageKind::Jpeg2000 => "jp2",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub kind: ImageKind,
    pub bytes: Vec<u8>,
}

pub trait OcrEngine: Send + Sync {
    fn recognize(&self, image: &EncodedImage) -> Result<String, Box<dyn Error + Send + Sync>>;
}

pub struct TesseractOcr {
    command: String,
    language: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            language: language.into(),
        }
    }

    /// True when the configured binary can be executed.
    pub fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image: &EncodedImage) -> Result<String, Box<dyn Error + Send + Sync>> {
        // Tesseract picks the decoder from the file extension.
        let mut file = tempfile::Builder::new()
            .prefix("quiz-ocr-")
            .suffix(&format!(".{}", image.kind.extension()))
            .tempfile()?;
        file.write_all(&image.bytes)?;
        file.flush()?;

        let output = Command::new(&self.command)
            .arg(file.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .output()
            .map_err(|e| format!("Failed to run {}: {}", self.command, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("tesseract failed: {}", stderr.trim()).into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
