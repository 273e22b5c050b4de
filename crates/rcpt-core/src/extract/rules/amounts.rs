//! Amount and currency extraction for receipts.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::models::receipt::Currency;

use super::dates::mask_dates;
use super::patterns::{
    AMOUNT_TOKEN, CURRENCY_ANY, CURRENCY_PREFIX, CURRENCY_SUFFIX, NON_TOTAL_LINE, PRICE_LIKE,
    TAX_INCLUDED, TAX_LINE, TOTAL_LABEL,
};
use super::{normalize_width, ExtractionMatch, FieldExtractor};

/// A number found on the receipt that could be the total.
#[derive(Debug, Clone, PartialEq)]
pub struct AmountCandidate {
    /// Parsed value.
    pub value: Decimal,
    /// Currency printed next to the number.
    pub currency: Option<Currency>,
    /// Whether the currency came from an explicit code rather than a bare `$`.
    pub explicit_currency: bool,
    /// Whether the number sits on (or right after) a grand-total line.
    pub labeled_total: bool,
    /// Zero-based line index.
    pub line: usize,
}

/// Amount field extractor.
pub struct AmountExtractor {
    /// Currency a bare `$` denotes.
    dollar_currency: Currency,
}

impl AmountExtractor {
    pub fn new() -> Self {
        Self {
            dollar_currency: Currency::Usd,
        }
    }

    /// Set the currency a bare `$` maps to.
    pub fn with_dollar_currency(mut self, currency: Currency) -> Self {
        self.dollar_currency = currency;
        self
    }

    fn scan_line(&self, line: &str, index: usize, labeled_total: bool) -> Vec<ExtractionMatch<AmountCandidate>> {
        let masked = mask_dates(line);
        let mut results = Vec::new();

        for m in AMOUNT_TOKEN.find_iter(&masked) {
            let before = &masked[..m.start()];
            let after = &masked[m.end()..];

            let prefix = CURRENCY_PREFIX.captures(before).map(|c| c[1].to_string());
            let suffix = CURRENCY_SUFFIX.captures(after).map(|c| c[1].to_string());

            // "10oz", "3pcs": a number glued to a word is not a price
            if suffix.is_none() && after.chars().next().is_some_and(|c| c.is_alphabetic()) {
                continue;
            }

            // "12.345" runs past two decimals; neither "12.34" nor "5" is a price
            if after.starts_with(|c: char| c.is_ascii_digit()) || before.ends_with(|c: char| c.is_ascii_digit()) {
                continue;
            }

            let (currency, explicit) = self.resolve_currency(prefix.as_deref(), suffix.as_deref());
            let price_like = PRICE_LIKE.is_match(m.as_str());

            if currency.is_none() && !price_like && !labeled_total {
                continue;
            }

            let Some(value) = parse_amount(m.as_str()) else {
                continue;
            };

            let confidence = match (labeled_total, currency.is_some()) {
                (true, true) => 0.95,
                (true, false) => 0.85,
                (false, true) => 0.8,
                (false, false) => 0.6,
            };

            results.push(
                ExtractionMatch::new(
                    AmountCandidate {
                        value,
                        currency,
                        explicit_currency: explicit,
                        labeled_total,
                        line: index,
                    },
                    confidence,
                    line[m.start()..m.end()].to_string(),
                )
                .with_position(m.start(), m.end()),
            );
        }

        results
    }

    /// Explicit codes beat a bare dollar sign; a suffix beats a prefix.
    fn resolve_currency(&self, prefix: Option<&str>, suffix: Option<&str>) -> (Option<Currency>, bool) {
        if let Some(c) = suffix.and_then(Currency::from_marker) {
            return (Some(c), true);
        }
        if let Some(c) = prefix.and_then(Currency::from_marker) {
            return (Some(c), true);
        }
        if prefix.is_some() {
            return (Some(self.dollar_currency), false);
        }
        (None, false)
    }

    /// First currency marker anywhere in the text, explicit codes preferred.
    pub fn detect_currency(&self, text: &str) -> Option<Currency> {
        let mut bare_dollar = false;
        for caps in CURRENCY_ANY.captures_iter(text) {
            match Currency::from_marker(&caps[1]) {
                Some(currency) => return Some(currency),
                None => bare_dollar = true,
            }
        }
        bare_dollar.then_some(self.dollar_currency)
    }
}

impl Default for AmountExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for AmountExtractor {
    type Output = ExtractionMatch<AmountCandidate>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        select_total(self.extract_all(text))
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let text = normalize_width(text);
        let mut results = Vec::new();
        let mut carry_label = false;

        for (index, line) in text.lines().enumerate() {
            let labeled = is_total_line(line);
            let found = self.scan_line(line, index, labeled || carry_label);

            // A total label with its number printed on the next line
            carry_label = labeled && found.is_empty();
            results.extend(found);
        }

        results
    }
}

/// Amount information extracted from a receipt.
#[derive(Debug, Clone, Default)]
pub struct ReceiptAmounts {
    /// The amount judged to be the receipt total.
    pub total: Option<ExtractionMatch<AmountCandidate>>,
    /// Currency of the total, or the first marker printed anywhere.
    pub currency: Option<Currency>,
    /// All candidate amounts in text order.
    pub all_amounts: Vec<ExtractionMatch<AmountCandidate>>,
}

/// Extract the total and its currency from receipt text.
pub fn extract_amounts(text: &str, extractor: &AmountExtractor) -> ReceiptAmounts {
    let all_amounts = extractor.extract_all(text);
    let total = select_total(all_amounts.clone());

    let currency = total
        .as_ref()
        .and_then(|t| t.value.currency)
        .or_else(|| extractor.detect_currency(text));

    ReceiptAmounts {
        total,
        currency,
        all_amounts,
    }
}

/// Prefer the largest total-labelled amount, else the largest amount overall.
fn select_total(candidates: Vec<ExtractionMatch<AmountCandidate>>) -> Option<ExtractionMatch<AmountCandidate>> {
    let (labeled, unlabeled): (Vec<_>, Vec<_>) =
        candidates.into_iter().partition(|c| c.value.labeled_total);

    let pool = if labeled.is_empty() { unlabeled } else { labeled };

    // max_by returns the last maximum; keep the first so ties favour the
    // amount printed higher up
    pool.into_iter().fold(None, |best, c| match best {
        Some(b) if b.value.value >= c.value.value => Some(b),
        _ => Some(c),
    })
}

/// Whether a line carries the grand total rather than a subtotal or tax.
pub fn is_total_line(line: &str) -> bool {
    if !TOTAL_LABEL.is_match(line) || NON_TOTAL_LINE.is_match(line) {
        return false;
    }
    !TAX_LINE.is_match(line) || TAX_INCLUDED.is_match(line)
}

/// Parse a printed amount such as `1,234.56`, `12,345`, `12,50` or `1,2O0.5O`.
///
/// OCR often reads `0` as `O`; those are mapped back to zeros. Returns
/// `None` for anything that is not a non-negative number.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .chars()
        .filter_map(|c| match c {
            'O' | 'o' => Some('0'),
            c if c.is_ascii_digit() || c == ',' || c == '.' => Some(c),
            _ => None,
        })
        .collect();

    if cleaned.is_empty() || !cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        // 1,234.56
        (Some(c), Some(d)) if c < d => cleaned.replace(',', ""),
        (Some(_), Some(_)) => return None,
        // 12,345 vs 12,50
        (Some(c), None) => {
            if cleaned.len() - c - 1 == 3 {
                cleaned.replace(',', "")
            } else if cleaned.matches(',').count() == 1 {
                cleaned.replace(',', ".")
            } else {
                return None;
            }
        }
        _ => cleaned,
    };

    Decimal::from_str(&normalized).ok()
}
