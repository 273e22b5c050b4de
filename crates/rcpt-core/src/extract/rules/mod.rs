//! Rule-based field extractors for receipts.

use std::borrow::Cow;

pub mod amounts;
pub mod dates;
pub mod items;
pub mod merchant;
pub mod patterns;

pub use amounts::{extract_amounts, parse_amount, AmountCandidate, AmountExtractor, ReceiptAmounts};
pub use dates::{extract_date, mask_dates, DateExtractor};
pub use items::extract_items;
pub use merchant::MerchantExtractor;

/// Fold full-width digits and numeric separators (`３５０`, `１，２００．５０`)
/// to their ASCII forms. Other characters are left alone.
pub fn normalize_width(text: &str) -> Cow<'_, str> {
    let is_wide = |c: char| matches!(c, '\u{FF10}'..='\u{FF19}' | '，' | '．' | '／');
    if !text.chars().any(is_wide) {
        return Cow::Borrowed(text);
    }

    Cow::Owned(
        text.chars()
            .map(|c| match c {
                '\u{FF10}'..='\u{FF19}' => char::from(b'0' + (c as u32 - 0xFF10) as u8),
                '，' => ',',
                '．' => '.',
                '／' => '/',
                c => c,
            })
            .collect(),
    )
}

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// An extracted value with where it came from.
#[derive(Debug, Clone)]
pub struct ExtractionMatch<T> {
    /// Extracted value.
    pub value: T,
    /// Confidence score (0.0 - 1.0).
    pub confidence: f32,
    /// Byte range in source text.
    pub position: Option<(usize, usize)>,
    /// Source text that was matched.
    pub source: String,
}

impl<T> ExtractionMatch<T> {
    pub fn new(value: T, confidence: f32, source: impl Into<String>) -> Self {
        Self {
            value,
            confidence,
            position: None,
            source: source.into(),
        }
    }

    pub fn with_position(mut self, start: usize, end: usize) -> Self {
        self.position = Some((start, end));
        self
    }

    /// Start offset, or `usize::MAX` when unknown so positioned matches sort first.
    pub fn start(&self) -> usize {
        self.position.map(|(s, _)| s).unwrap_or(usize::MAX)
    }
}
