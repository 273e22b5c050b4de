//! Merchant name extraction.
//!
//! Receipts print the store name in the header, so the merchant is taken to
//! be the first line near the top that reads like a name: enough letters,
//! no date, no price, no boilerplate such as "RECEIPT" or "統一發票".

use super::patterns::{INLINE_AMOUNT, MERCHANT_SKIP};
use super::{dates::DateExtractor, ExtractionMatch, FieldExtractor};

/// Merchant field extractor.
pub struct MerchantExtractor {
    /// Number of leading non-empty lines to examine.
    scan_lines: usize,
}

impl MerchantExtractor {
    pub fn new() -> Self {
        Self { scan_lines: 5 }
    }

    /// Set how many leading non-empty lines are examined.
    pub fn with_scan_lines(mut self, lines: usize) -> Self {
        self.scan_lines = lines.max(1);
        self
    }
}

impl Default for MerchantExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for MerchantExtractor {
    type Output = ExtractionMatch<String>;

    fn extract(&self, text: &str) -> Option<Self::Output> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<Self::Output> {
        let dates = DateExtractor::new();

        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .take(self.scan_lines)
            .enumerate()
            .filter(|(_, line)| looks_like_name(line) && dates.extract(line).is_none())
            .map(|(index, line)| {
                // Earlier lines are more likely to be the header
                let confidence = (0.9 - 0.1 * index as f32).max(0.5);
                ExtractionMatch::new(clean_name(line), confidence, line)
            })
            .filter(|m| !m.value.is_empty())
            .collect()
    }
}

fn looks_like_name(line: &str) -> bool {
    let letters = line.chars().filter(|c| c.is_alphabetic()).count();
    let visible = line.chars().filter(|c| !c.is_whitespace()).count();

    letters >= 2
        && letters * 2 >= visible
        && !INLINE_AMOUNT.is_match(line)
        && !MERCHANT_SKIP.is_match(line)
}

fn clean_name(line: &str) -> String {
    line.trim_matches(|c: char| c.is_whitespace() || matches!(c, '*' | '#' | '=' | '-' | '_' | '|' | '~' | ':'))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merchant(text: &str) -> Option<String> {
        MerchantExtractor::new().extract(text).map(|m| m.value)
    }

    #[test]
    fn test_first_line_is_merchant() {
        assert_eq!(merchant("STARBUCKS\n2024-03-15\nTotal: $12.50"), Some("STARBUCKS".to_string()));
        assert_eq!(merchant("\n\n  星巴克咖啡  \n"), Some("星巴克咖啡".to_string()));
    }

    #[test]
    fn test_skips_boilerplate_and_noise() {
        let text = "RECEIPT\n||| 1 2 3 |||\n2024-03-15\n*** Joe's Diner ***\nTotal 20.00";
        assert_eq!(merchant(text), Some("Joe's Diner".to_string()));

        let text = "電子發票證明聯\n全家便利商店\n";
        assert_eq!(merchant(text), Some("全家便利商店".to_string()));
    }

    #[test]
    fn test_skips_amount_lines() {
        assert_eq!(merchant("Coffee 4.50\nBlue Bottle"), Some("Blue Bottle".to_string()));
    }

    #[test]
    fn test_taxi_is_not_boilerplate() {
        assert_eq!(merchant("Yellow Taxi Co"), Some("Yellow Taxi Co".to_string()));
    }

    #[test]
    fn test_scan_window() {
        let text = "1\n2\n3\n4\n5\nLate Name";
        assert_eq!(merchant(text), None);
        assert_eq!(
            MerchantExtractor::new().with_scan_lines(6).extract(text).map(|m| m.value),
            Some("Late Name".to_string())
        );
    }

    #[test]
    fn test_unparseable_header() {
        assert_eq!(merchant("@@@@\n#### ####\n12345"), None);
        assert_eq!(merchant(""), None);
    }
}
