//! Core library for receipt OCR expense extraction.
//!
//! This crate provides:
//! - OCR provider boundary (Google Cloud Vision, plain text)
//! - Receipt field extraction (date, merchant, amount and currency, items)
//! - Keyword-based expense classification over immutable category snapshots
//! - Concurrent batch processing with per-image failure isolation
//! - CSV export and summary statistics

pub mod batch;
pub mod error;
pub mod export;
pub mod extract;
pub mod models;
pub mod ocr;

pub use batch::{BatchProcessor, ImageInput};
pub use error::{CategoryError, OcrError, RcptError, Result};
pub use export::{summarize, to_csv_string, Summary};
pub use extract::{classify, Classification, ReceiptExtractor, ReceiptParser};
pub use models::category::{Category, CategorySet, CategoryStore, FALLBACK_CATEGORY};
pub use models::config::RcptConfig;
pub use models::receipt::{Currency, OutcomeStatus, Receipt, ReceiptOutcome};
pub use ocr::{OcrProvider, PlainTextProvider, RawOcrResult, VisionProvider};
