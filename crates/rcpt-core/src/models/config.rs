//! Configuration structures for the receipt pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::receipt::Currency;

/// Main configuration for the rcpt pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RcptConfig {
    /// OCR provider configuration.
    pub ocr: OcrConfig,

    /// Field extraction configuration.
    pub extraction: ExtractionConfig,

    /// Batch processing configuration.
    pub batch: BatchConfig,

    /// Where the category set is persisted (default: next to the config file).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories_path: Option<PathBuf>,
}

/// Which OCR provider to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OcrProviderKind {
    /// Google Cloud Vision REST API.
    #[default]
    Vision,
    /// Input bytes are already-recognized UTF-8 text.
    PlainText,
}

/// OCR provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Provider used for image inputs.
    pub provider: OcrProviderKind,

    /// Vision `images:annotate` endpoint.
    pub endpoint: String,

    /// Environment variable holding the Vision API key.
    pub api_key_env: String,

    /// Upper bound on a single OCR call, in seconds.
    pub timeout_secs: u64,

    /// Images larger than this are rejected before upload.
    pub max_image_bytes: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            provider: OcrProviderKind::Vision,
            endpoint: "https://vision.googleapis.com/v1/images:annotate".to_string(),
            api_key_env: "GOOGLE_VISION_API_KEY".to_string(),
            timeout_secs: 30,
            max_image_bytes: 10 * 1024 * 1024,
        }
    }
}

impl OcrConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Currency assumed when no marker is printed.
    pub default_currency: Currency,

    /// Currency a bare `$` denotes.
    pub dollar_sign_currency: Currency,

    /// How many leading lines are searched for the merchant name.
    pub merchant_scan_lines: usize,

    /// Maximum number of line items kept.
    pub max_items: usize,

    /// Receipts below this confidence are flagged for review.
    pub low_confidence_threshold: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            default_currency: Currency::Ntd,
            dollar_sign_currency: Currency::Usd,
            merchant_scan_lines: 5,
            max_items: 10,
            low_confidence_threshold: 60.0,
        }
    }
}

/// Batch processing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Maximum number of OCR calls in flight.
    pub concurrency: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { concurrency: 4 }
    }
}

impl RcptConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
