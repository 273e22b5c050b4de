//! Normalized receipt record and batch outcome types.

use std::fmt;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Currencies a receipt amount can be expressed in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// United States dollar.
    Usd,
    /// New Taiwan dollar.
    #[default]
    Ntd,
    /// Hong Kong dollar.
    Hkd,
}

impl Currency {
    /// All supported currencies.
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Ntd, Currency::Hkd];

    /// ISO-style code used in exports.
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Ntd => "NTD",
            Currency::Hkd => "HKD",
        }
    }

    /// Parse a currency code or printed marker (`NT$`, `TWD`, `元`, ...).
    pub fn from_marker(s: &str) -> Option<Self> {
        let s = s.trim().to_uppercase();

        match s.as_str() {
            "USD" | "US$" => Some(Currency::Usd),
            "NTD" | "TWD" | "NT$" | "元" | "圓" | "塊" => Some(Currency::Ntd),
            "HKD" | "HK$" => Some(Currency::Hkd),
            _ => None,
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A normalized expense record extracted from one receipt image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    /// Purchase date; the processing date when none could be read.
    pub date: NaiveDate,

    /// Merchant name; "Unknown" when none could be read.
    pub merchant: String,

    /// Total amount, never negative; zero when none could be read.
    pub amount: Decimal,

    /// Currency of `amount`.
    pub currency: Currency,

    /// Category name from the category set in effect at assembly time.
    pub category: String,

    /// Line descriptions in receipt order.
    #[serde(default)]
    pub items: Vec<String>,

    /// Extraction confidence (0 - 100).
    pub confidence: f32,

    /// OCR text the record was built from.
    pub raw_text: String,

    /// Notes about fields that fell back to defaults.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,

    /// Fields that could not be extracted.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_fields: Vec<String>,

    /// OCR failure that produced this placeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Receipt {
    /// Merchant name used when no merchant line is found.
    pub const UNKNOWN_MERCHANT: &'static str = "Unknown";

    /// A fully-defaulted receipt dated `date` and filed under `category`.
    pub fn defaulted(date: NaiveDate, category: impl Into<String>, currency: Currency) -> Self {
        Self {
            date,
            merchant: Self::UNKNOWN_MERCHANT.to_string(),
            amount: Decimal::ZERO,
            currency,
            category: category.into(),
            items: Vec::new(),
            confidence: 0.0,
            raw_text: String::new(),
            warnings: Vec::new(),
            missing_fields: Vec::new(),
            error: None,
        }
    }

    /// Whether the confidence is below `threshold` and the record should be reviewed.
    pub fn is_low_confidence(&self, threshold: f32) -> bool {
        self.confidence < threshold
    }

    /// Whether this receipt is an OCR-failure placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.error.is_some()
    }
}

/// Outcome status for one image of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// OCR succeeded and a receipt was assembled.
    Success,
    /// OCR failed; the receipt is a placeholder.
    Error,
}

/// One image's result within a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptOutcome {
    /// Name of the source image (usually the file name).
    pub source: String,

    /// Whether OCR succeeded.
    pub status: OutcomeStatus,

    /// Extracted receipt, or an error-annotated placeholder.
    pub receipt: Receipt,
}

impl ReceiptOutcome {
    pub fn success(source: impl Into<String>, receipt: Receipt) -> Self {
        Self {
            source: source.into(),
            status: OutcomeStatus::Success,
            receipt,
        }
    }

    pub fn failure(source: impl Into<String>, receipt: Receipt) -> Self {
        Self {
            source: source.into(),
            status: OutcomeStatus::Error,
            receipt,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }

    /// The OCR error message, if this outcome failed.
    pub fn error(&self) -> Option<&str> {
        self.receipt.error.as_deref()
    }
}
