//! Receipt assembler combining the field extractors and the classifier.

use std::time::Instant;

use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::error::OcrError;
use crate::models::category::CategorySet;
use crate::models::config::ExtractionConfig;
use crate::models::receipt::{Currency, Receipt};
use crate::ocr::RawOcrResult;

use super::classifier::classify;
use super::rules::{
    extract_amounts, extract_items, normalize_width, AmountExtractor, DateExtractor, FieldExtractor,
    MerchantExtractor,
};
use super::ReceiptExtractor;

/// Confidence lost when no date could be read.
const MISSING_DATE_PENALTY: f32 = 0.2;
/// Confidence lost when no amount could be read.
const MISSING_AMOUNT_PENALTY: f32 = 0.3;
/// Confidence lost when no merchant could be read.
const MISSING_MERCHANT_PENALTY: f32 = 0.2;

/// Fields found in receipt text, before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedFields {
    pub date: Option<NaiveDate>,
    pub merchant: Option<String>,
    /// Raw header line the merchant was read from.
    pub merchant_line: Option<String>,
    pub amount: Option<Decimal>,
    /// Currency printed on the receipt, if any.
    pub currency: Option<Currency>,
    pub items: Vec<String>,
}

/// Rule-based receipt parser.
pub struct ReceiptParser {
    /// Currency used when none is printed.
    default_currency: Currency,
    /// Currency a bare `$` denotes.
    dollar_currency: Currency,
    /// Leading lines searched for the merchant.
    merchant_scan_lines: usize,
    /// Maximum number of items kept.
    max_items: usize,
}

impl ReceiptParser {
    /// Create a parser with default settings.
    pub fn new() -> Self {
        Self {
            default_currency: Currency::Ntd,
            dollar_currency: Currency::Usd,
            merchant_scan_lines: 5,
            max_items: 10,
        }
    }

    /// Create a parser from the extraction section of the config.
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new()
            .with_default_currency(config.default_currency)
            .with_dollar_currency(config.dollar_sign_currency)
            .with_merchant_scan_lines(config.merchant_scan_lines)
            .with_max_items(config.max_items)
    }

    /// Set the currency used when none is printed.
    pub fn with_default_currency(mut self, currency: Currency) -> Self {
        self.default_currency = currency;
        self
    }

    /// Set the currency a bare `$` denotes.
    pub fn with_dollar_currency(mut self, currency: Currency) -> Self {
        self.dollar_currency = currency;
        self
    }

    /// Set how many leading lines are searched for the merchant.
    pub fn with_merchant_scan_lines(mut self, lines: usize) -> Self {
        self.merchant_scan_lines = lines;
        self
    }

    /// Set the maximum number of items kept.
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn default_currency(&self) -> Currency {
        self.default_currency
    }

    /// Run every field extractor over `text`.
    pub fn parse(&self, text: &str) -> ParsedFields {
        let normalized = normalize_width(text);
        let text = normalized.as_ref();
        let date = DateExtractor::new().extract(text).map(|m| m.value);

        let merchant = MerchantExtractor::new()
            .with_scan_lines(self.merchant_scan_lines)
            .extract(text);

        let amounts = extract_amounts(
            text,
            &AmountExtractor::new().with_dollar_currency(self.dollar_currency),
        );

        let merchant_line = merchant.as_ref().map(|m| m.source.clone());
        let items = extract_items(text, merchant_line.as_deref(), self.max_items);

        if let Some(total) = &amounts.total {
            debug!(
                "Total {} picked from line {} ({} candidates)",
                total.value.value,
                total.value.line,
                amounts.all_amounts.len()
            );
        }

        ParsedFields {
            date,
            merchant: merchant.map(|m| m.value),
            merchant_line,
            amount: amounts.total.map(|t| t.value.value),
            currency: amounts.currency,
            items,
        }
    }

    /// Build a receipt from OCR output, dating it today if no date is printed.
    pub fn assemble(&self, ocr: &RawOcrResult, categories: &CategorySet) -> Receipt {
        self.assemble_on(ocr, categories, Local::now().date_naive())
    }

    /// Build a receipt from OCR output with `today` as the fallback date.
    ///
    /// Never fails: every missing field falls back to its default, is named in
    /// `missing_fields`, and lowers the confidence.
    pub fn assemble_on(&self, ocr: &RawOcrResult, categories: &CategorySet, today: NaiveDate) -> Receipt {
        let start = Instant::now();
        let text = ocr.text.as_str();

        info!("Parsing receipt from {} characters of text", text.len());

        let fields = self.parse(text);
        let mut receipt = Receipt::defaulted(today, categories.fallback(), self.default_currency);
        let mut penalty = 0.0;

        match fields.date {
            Some(date) => receipt.date = date,
            None => {
                receipt.warnings.push(format!("Could not extract date, using {today}"));
                receipt.missing_fields.push("date".to_string());
                penalty += MISSING_DATE_PENALTY;
            }
        }

        match fields.amount {
            Some(amount) => receipt.amount = amount,
            None => {
                receipt.warnings.push("Could not extract total amount, using 0".to_string());
                receipt.missing_fields.push("amount".to_string());
                penalty += MISSING_AMOUNT_PENALTY;
            }
        }

        match fields.merchant {
            Some(merchant) => receipt.merchant = merchant,
            None => {
                receipt.warnings.push("Could not extract merchant name".to_string());
                receipt.missing_fields.push("merchant".to_string());
                penalty += MISSING_MERCHANT_PENALTY;
            }
        }

        if let Some(currency) = fields.currency {
            receipt.currency = currency;
        }

        let classification = classify(&receipt.merchant, &fields.items, categories);
        debug!(
            "Classified as {} ({} keyword hits: {:?})",
            classification.category, classification.hits, classification.matched
        );

        receipt.category = classification.category;
        receipt.items = fields.items;
        receipt.confidence = ocr.confidence.clamp(0.0, 100.0) * (1.0 - penalty);
        receipt.raw_text = ocr.text.clone();

        info!(
            "Receipt parsed in {}ms: {} {} {} ({}), confidence {:.1}",
            start.elapsed().as_millis(),
            receipt.merchant,
            receipt.amount,
            receipt.currency,
            receipt.category,
            receipt.confidence
        );

        receipt
    }

    /// The receipt recorded for an image whose OCR call failed.
    pub fn placeholder(&self, error: &OcrError, categories: &CategorySet, today: NaiveDate) -> Receipt {
        let mut receipt = Receipt::defaulted(today, categories.fallback(), self.default_currency);
        receipt.warnings.push(format!("OCR failed ({}), all fields defaulted", error.kind()));
        receipt.missing_fields = vec!["date".to_string(), "amount".to_string(), "merchant".to_string()];
        receipt.error = Some(error.to_string());
        receipt
    }
}

impl Default for ReceiptParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiptExtractor for ReceiptParser {
    fn extract(&self, ocr: &RawOcrResult, categories: &CategorySet) -> Receipt {
        self.assemble(ocr, categories)
    }

    fn extract_from_text(&self, text: &str, categories: &CategorySet) -> Receipt {
        self.assemble(&RawOcrResult::new(text, 100.0), categories)
    }
}
