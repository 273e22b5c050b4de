//! Receipt field extraction module.

pub mod classifier;
mod parser;
pub mod rules;

pub use classifier::{classify, Classification};
pub use parser::{ParsedFields, ReceiptParser};

use crate::models::category::CategorySet;
use crate::models::receipt::Receipt;
use crate::ocr::RawOcrResult;

/// Trait for receipt extractors.
///
/// Extraction has no failure mode: unreadable input yields a defaulted,
/// low-confidence receipt.
pub trait ReceiptExtractor {
    /// Extract a receipt from OCR output.
    fn extract(&self, ocr: &RawOcrResult, categories: &CategorySet) -> Receipt;

    /// Extract a receipt from plain text.
    fn extract_from_text(&self, text: &str, categories: &CategorySet) -> Receipt;
}
