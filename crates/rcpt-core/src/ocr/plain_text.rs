//! Provider for inputs that are already text.

use async_trait::async_trait;

use crate::error::OcrError;

use super::{OcrProvider, RawOcrResult};

/// Treats the input bytes as recognized UTF-8 text with full confidence.
///
/// Used for `.txt` inputs and for running the pipeline without network access.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextProvider;

impl PlainTextProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OcrProvider for PlainTextProvider {
    async fn recognize(&self, image: &[u8]) -> Result<RawOcrResult, OcrError> {
        let text = std::str::from_utf8(image)
            .map_err(|e| OcrError::InvalidImage(format!("input is not UTF-8 text: {e}")))?;

        let text = text.trim_start_matches('\u{feff}').replace("\r\n", "\n");
        Ok(RawOcrResult::new(text, 100.0))
    }

    fn name(&self) -> &str {
        "plain_text"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recognize_text() {
        let result = PlainTextProvider::new()
            .recognize("\u{feff}STARBUCKS\r\nTotal: $12.50 USD".as_bytes())
            .await
            .unwrap();

        assert_eq!(result.text, "STARBUCKS\nTotal: $12.50 USD");
        assert_eq!(result.confidence, 100.0);
    }

    #[tokio::test]
    async fn test_rejects_binary() {
        let err = PlainTextProvider::new().recognize(&[0xFF, 0xD8, 0xFF, 0xE0]).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_image");
    }
}
