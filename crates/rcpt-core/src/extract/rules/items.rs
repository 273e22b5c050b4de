//! Line item extraction.

use super::dates::DateExtractor;
use super::patterns::ITEM_SKIP;
use super::FieldExtractor;

/// Collect item descriptions in receipt order.
///
/// `merchant_line` is the raw header line chosen as the merchant; its first
/// occurrence is left out. Lines without letters, dated lines, and
/// total/tax/payment/boilerplate lines are dropped. At most `max_items`
/// lines are returned.
pub fn extract_items(text: &str, merchant_line: Option<&str>, max_items: usize) -> Vec<String> {
    let dates = DateExtractor::new();
    let mut merchant_skipped = merchant_line.is_none();

    text.lines()
        .map(str::trim)
        .filter(|line| {
            if !merchant_skipped && Some(*line) == merchant_line {
                merchant_skipped = true;
                return false;
            }
            true
        })
        .filter(|line| line.chars().count() > 2)
        .filter(|line| line.chars().any(|c| c.is_alphabetic()))
        .filter(|line| !ITEM_SKIP.is_match(line))
        .filter(|line| dates.extract(line).is_none())
        .take(max_items)
        .map(str::to_string)
        .collect()
}
