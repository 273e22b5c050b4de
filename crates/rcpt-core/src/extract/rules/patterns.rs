//! Common regex patterns for receipt extraction.
//!
//! Date patterns guard their edges with explicit non-digit classes instead
//! of `\b`, because CJK characters count as word characters and receipts
//! often print `日期2024-03-15` without a separator.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // YYYY-MM-DD, YYYY/MM/DD, YYYY.MM.DD
    pub static ref DATE_YMD: Regex = Regex::new(
        r"(?:^|[^0-9])([0-9]{4})[./\-]([0-9]{1,2})[./\-]([0-9]{1,2})(?:[^0-9]|$)"
    ).unwrap();

    // DD-MM-YYYY, DD-MM-YY
    pub static ref DATE_DMY: Regex = Regex::new(
        r"(?:^|[^0-9])([0-9]{1,2})-([0-9]{1,2})-([0-9]{4}|[0-9]{2})(?:[^0-9]|$)"
    ).unwrap();

    // DD.MM.YYYY; dotted dates always print a four-digit year
    pub static ref DATE_DMY_DOTTED: Regex = Regex::new(
        r"(?:^|[^0-9])([0-9]{1,2})\.([0-9]{1,2})\.([0-9]{4})(?:[^0-9]|$)"
    ).unwrap();

    // MM/DD/YYYY (and two-digit years)
    pub static ref DATE_MDY: Regex = Regex::new(
        r"(?:^|[^0-9])([0-9]{1,2})/([0-9]{1,2})/([0-9]{4}|[0-9]{2})(?:[^0-9]|$)"
    ).unwrap();

    // Taiwan ROC era: 113/03/15, 113.03.15
    pub static ref DATE_ROC: Regex = Regex::new(
        r"(?:^|[^0-9])([0-9]{3})[./]([0-9]{1,2})[./]([0-9]{1,2})(?:[^0-9]|$)"
    ).unwrap();

    // 2024年3月15日, 民國113年3月15日
    pub static ref DATE_CJK: Regex = Regex::new(
        r"(?:^|[^0-9])(民國\s*)?([0-9]{2,4})\s*年\s*([0-9]{1,2})\s*月\s*([0-9]{1,2})\s*[日號]?"
    ).unwrap();

    // Numeric token: digits with OCR O/o confusion, thousands commas,
    // 1-2 decimals after a point or a comma
    pub static ref AMOUNT_TOKEN: Regex = Regex::new(
        r"[0-9][0-9Oo]*(?:,[0-9Oo]{3})*(?:[.,][0-9Oo]{1,2})?"
    ).unwrap();

    // Price-like token: exactly two decimals
    pub static ref PRICE_LIKE: Regex = Regex::new(
        r"^[0-9][0-9Oo]*(?:,[0-9Oo]{3})*[.,][0-9Oo]{2}$"
    ).unwrap();

    // Currency marker immediately before a number
    pub static ref CURRENCY_PREFIX: Regex = Regex::new(
        r"(?i)(NT\$|NTD|TWD|HK\$|HKD|US\$|USD|\$|＄)\s*$"
    ).unwrap();

    // Currency marker immediately after a number
    pub static ref CURRENCY_SUFFIX: Regex = Regex::new(
        r"(?i)^\s*(NTD|TWD|HKD|USD|元|圓|塊)"
    ).unwrap();

    // Any currency marker anywhere
    pub static ref CURRENCY_ANY: Regex = Regex::new(
        r"(?i)(NT\$|NTD|TWD|HK\$|HKD|US\$|USD|元|圓|\$|＄)"
    ).unwrap();

    // Grand-total labels
    pub static ref TOTAL_LABEL: Regex = Regex::new(
        r"(?i)(grand\s+total|total|amount\s+due|balance\s+due|合計|總計|總金額|總額|應付|實付)"
    ).unwrap();

    // Lines that mention a total but are not the final total
    pub static ref NON_TOTAL_LINE: Regex = Regex::new(
        r"(?i)(sub[\s\-]?total|小計|\bitems?\b|\bqty\b|件數|數量)"
    ).unwrap();

    pub static ref TAX_LINE: Regex = Regex::new(
        r"(?i)(\btax\b|\bvat\b|稅)"
    ).unwrap();

    pub static ref TAX_INCLUDED: Regex = Regex::new(
        r"(?i)(incl|含稅)"
    ).unwrap();

    // Header boilerplate that is never the merchant name
    pub static ref MERCHANT_SKIP: Regex = Regex::new(
        r"(?i)(\b(receipt|invoice|date|time|total|amount|tax|subtotal|sum)\b|收據|統一發票|發票|日期|時間)"
    ).unwrap();

    // A printed amount inside a line
    pub static ref INLINE_AMOUNT: Regex = Regex::new(
        r"(\$\s*[0-9])|([0-9]+[.,][0-9]{2}(?:[^0-9]|$))"
    ).unwrap();

    // Lines that are never line items
    pub static ref ITEM_SKIP: Regex = Regex::new(
        r"(?i)(\b(total|subtotal|amount|tax|vat|change|cash|receipt|invoice|thank|date|time|tel|visa|mastercard)\b|合計|總計|小計|稅|找零|現金|收據|發票|謝謝|日期|時間)"
    ).unwrap();
}
