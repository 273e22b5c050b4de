//! OCR provider boundary.
//!
//! A provider turns image bytes into raw text plus a 0-100 confidence, or a
//! typed [`OcrError`]. Everything downstream works on [`RawOcrResult`] only.

mod plain_text;
mod vision;

pub use plain_text::PlainTextProvider;
pub use vision::{parse_response, VisionProvider};

use std::path::Path;

use async_trait::async_trait;
use image::ImageFormat;
use serde::{Deserialize, Serialize};

use crate::error::OcrError;

/// File extensions accepted as receipt images.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic", "heif"];

/// Extension of already-recognized text inputs.
pub const TEXT_EXTENSION: &str = "txt";

/// Text recognized from one image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOcrResult {
    /// Full recognized text, lines separated by `\n`.
    pub text: String,

    /// Overall confidence (0 - 100).
    pub confidence: f32,
}

impl RawOcrResult {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }

    /// A result with no text.
    pub fn empty() -> Self {
        Self::new(String::new(), 0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Source of OCR text for receipt images.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Recognize the text in `image`.
    async fn recognize(&self, image: &[u8]) -> Result<RawOcrResult, OcrError>;

    /// Short provider name for logs.
    fn name(&self) -> &str;
}

/// Whether `path` has an extension accepted as a receipt image.
pub fn is_supported_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Whether `path` is a plain-text OCR input.
pub fn is_text_input(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(TEXT_EXTENSION))
}

/// Check image bytes before they are sent to a provider.
///
/// Rejects empty or oversized uploads and anything whose magic bytes are not
/// a JPEG, PNG, WebP, GIF, BMP, TIFF or HEIF/AVIF image.
pub fn validate_image(image: &[u8], max_bytes: usize) -> Result<(), OcrError> {
    if image.is_empty() {
        return Err(OcrError::InvalidImage("empty image".to_string()));
    }
    if image.len() > max_bytes {
        return Err(OcrError::InvalidImage(format!(
            "image is {} bytes, limit is {}",
            image.len(),
            max_bytes
        )));
    }
    if is_heif(image) {
        return Ok(());
    }

    match image::guess_format(image) {
        Ok(
            ImageFormat::Jpeg
            | ImageFormat::Png
            | ImageFormat::WebP
            | ImageFormat::Gif
            | ImageFormat::Bmp
            | ImageFormat::Tiff
            | ImageFormat::Avif,
        ) => Ok(()),
        Ok(format) => Err(OcrError::InvalidImage(format!("unsupported image format: {format:?}"))),
        Err(_) => Err(OcrError::InvalidImage("unrecognized image format".to_string())),
    }
}

fn is_heif(image: &[u8]) -> bool {
    const BRANDS: [&[u8; 4]; 8] = [
        b"heic", b"heix", b"hevc", b"hevx", b"heim", b"heis", b"mif1", b"msf1",
    ];

    image.len() >= 12 && &image[4..8] == b"ftyp" && BRANDS.iter().any(|b| &image[8..12] == *b)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";
    const JPEG_MAGIC: &[u8] = b"\xFF\xD8\xFF\xE0\0\x10JFIF\0";
    const HEIC_MAGIC: &[u8] = b"\0\0\0\x18ftypheic\0\0\0\0";

    #[test]
    fn test_validate_image_formats() {
        assert!(validate_image(PNG_MAGIC, 1024).is_ok());
        assert!(validate_image(JPEG_MAGIC, 1024).is_ok());
        assert!(validate_image(HEIC_MAGIC, 1024).is_ok());
    }

    #[test]
    fn test_validate_image_rejects() {
        assert!(matches!(validate_image(b"", 1024), Err(OcrError::InvalidImage(_))));
        assert!(matches!(validate_image(b"hello world, not an image", 1024), Err(OcrError::InvalidImage(_))));
        assert!(matches!(validate_image(PNG_MAGIC, 4), Err(OcrError::InvalidImage(_))));
    }

    #[test]
    fn test_supported_extensions() {
        assert!(is_supported_image(Path::new("receipt.JPG")));
        assert!(is_supported_image(Path::new("a/b/receipt.heic")));
        assert!(!is_supported_image(Path::new("receipt.pdf")));
        assert!(!is_supported_image(Path::new("receipt")));
        assert!(is_text_input(Path::new("scan.txt")));
    }
}
