//! Error types for the rcpt-core library.

use std::time::Duration;

use thiserror::Error;

/// Main error type for the rcpt library.
#[derive(Error, Debug)]
pub enum RcptError {
    /// OCR provider error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Category store error.
    #[error("category error: {0}")]
    Category(#[from] CategoryError),

    /// CSV export error.
    #[error("export error: {0}")]
    Export(#[from] csv::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Failures at the OCR provider boundary.
///
/// Every variant degrades to a defaulted, error-annotated receipt; none of
/// them aborts a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OcrError {
    /// The provider could not be reached or returned a server error.
    #[error("OCR provider unavailable: {0}")]
    Unavailable(String),

    /// The image was rejected (unsupported format, too large, corrupt).
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The provider refused the request because a quota was exhausted.
    #[error("OCR quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The call did not complete within the configured bound.
    #[error("OCR call timed out after {0:?}")]
    Timeout(Duration),
}

impl OcrError {
    /// Short machine-readable kind, used in CSV summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            OcrError::Unavailable(_) => "unavailable",
            OcrError::InvalidImage(_) => "invalid_image",
            OcrError::QuotaExceeded(_) => "quota_exceeded",
            OcrError::Timeout(_) => "timeout",
        }
    }
}

/// Errors from editing a category set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CategoryError {
    /// A category with this name already exists.
    #[error("category already exists: {0}")]
    Duplicate(String),

    /// No category with this name.
    #[error("category not found: {0}")]
    NotFound(String),

    /// The fallback category cannot be removed.
    #[error("category is reserved: {0}")]
    Reserved(String),
}

/// Result type for the rcpt library.
pub type Result<T> = std::result::Result<T, RcptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ocr_error_kind() {
        assert_eq!(OcrError::QuotaExceeded("daily".into()).kind(), "quota_exceeded");
        assert_eq!(OcrError::Timeout(Duration::from_secs(3)).kind(), "timeout");
    }

    #[test]
    fn test_error_conversion() {
        let err: RcptError = CategoryError::NotFound("Travel".into()).into();
        assert_eq!(err.to_string(), "category error: category not found: Travel");
    }
}
