//! CSV export and summary statistics.

use std::collections::BTreeMap;
use std::io::Write;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{RcptError, Result};
use crate::models::receipt::{Receipt, ReceiptOutcome};

/// Column headers of the receipt CSV.
pub const CSV_HEADERS: [&str; 6] = ["Date", "Merchant", "Category", "Amount", "Currency", "Items"];

/// Separator between items in the `Items` column.
pub const ITEM_SEPARATOR: &str = "; ";

/// Write receipts as CSV, one row per receipt, in the given order.
pub fn write_csv<W: Write>(writer: W, receipts: &[Receipt]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(CSV_HEADERS)?;

    for receipt in receipts {
        wtr.write_record([
            receipt.date.format("%Y-%m-%d").to_string().as_str(),
            receipt.merchant.as_str(),
            receipt.category.as_str(),
            receipt.amount.to_string().as_str(),
            receipt.currency.code(),
            receipt.items.join(ITEM_SEPARATOR).as_str(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Receipts as a CSV string.
pub fn to_csv_string(receipts: &[Receipt]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(&mut buf, receipts)?;
    into_string(buf)
}

/// Write batch outcomes as CSV, including per-image status and error.
pub fn write_outcomes_csv<W: Write>(writer: W, outcomes: &[ReceiptOutcome]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record([
        "source",
        "status",
        "date",
        "merchant",
        "category",
        "amount",
        "currency",
        "confidence",
        "error",
    ])?;

    for outcome in outcomes {
        let receipt = &outcome.receipt;
        wtr.write_record([
            outcome.source.as_str(),
            if outcome.is_success() { "success" } else { "error" },
            receipt.date.format("%Y-%m-%d").to_string().as_str(),
            receipt.merchant.as_str(),
            receipt.category.as_str(),
            receipt.amount.to_string().as_str(),
            receipt.currency.code(),
            format!("{:.1}", receipt.confidence).as_str(),
            outcome.error().unwrap_or(""),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Batch outcomes as a CSV string.
pub fn outcomes_to_csv_string(outcomes: &[ReceiptOutcome]) -> Result<String> {
    let mut buf = Vec::new();
    write_outcomes_csv(&mut buf, outcomes)?;
    into_string(buf)
}

fn into_string(buf: Vec<u8>) -> Result<String> {
    String::from_utf8(buf).map_err(|e| RcptError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Totals over a set of receipts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_receipts: usize,
    /// Sum of all amounts, regardless of currency.
    pub total_amount: Decimal,
    /// Receipt count per category.
    pub categories: BTreeMap<String, usize>,
    /// Summed amount per currency code, for receipts with a non-zero amount.
    pub currencies: BTreeMap<String, Decimal>,
}

/// Summarize receipts by category and currency.
pub fn summarize(receipts: &[Receipt]) -> Summary {
    let mut summary = Summary {
        total_receipts: receipts.len(),
        ..Default::default()
    };

    for receipt in receipts {
        summary.total_amount += receipt.amount;
        *summary.categories.entry(receipt.category.clone()).or_default() += 1;

        if !receipt.amount.is_zero() {
            *summary
                .currencies
                .entry(receipt.currency.code().to_string())
                .or_default() += receipt.amount;
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::receipt::Currency;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn receipt(merchant: &str, amount: &str, currency: Currency, category: &str, items: &[&str]) -> Receipt {
        let mut r = Receipt::defaulted(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(), category, currency);
        r.merchant = merchant.to_string();
        r.amount = Decimal::from_str(amount).unwrap();
        r.items = items.iter().map(|s| s.to_string()).collect();
        r.confidence = 90.0;
        r
    }

    #[test]
    fn test_csv_export() {
        let receipts = vec![
            receipt("STARBUCKS", "12.50", Currency::Usd, "Food & Dining", &[]),
            receipt("全家便利商店", "90", Currency::Ntd, "Shopping", &["御飯糰 35", "拿鐵咖啡 55"]),
        ];

        let csv = to_csv_string(&receipts).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines[0], "Date,Merchant,Category,Amount,Currency,Items");
        assert_eq!(lines[1], "2024-03-15,STARBUCKS,Food & Dining,12.50,USD,");
        assert_eq!(lines[2], "2024-03-15,全家便利商店,Shopping,90,NTD,御飯糰 35; 拿鐵咖啡 55");
    }

    #[test]
    fn test_csv_quotes_commas() {
        let receipts = vec![receipt("Joe's Diner, Inc", "5.00", Currency::Usd, "Other", &[])];
        let csv = to_csv_string(&receipts).unwrap();
        assert!(csv.contains("\"Joe's Diner, Inc\""));
    }

    #[test]
    fn test_outcomes_csv() {
        let ok = ReceiptOutcome::success("a.jpg", receipt("Cafe", "5.00", Currency::Usd, "Food & Dining", &[]));
        let mut placeholder = receipt("Unknown", "0", Currency::Ntd, "Other", &[]);
        placeholder.confidence = 0.0;
        placeholder.error = Some("OCR quota exceeded: daily".to_string());
        let failed = ReceiptOutcome::failure("b.jpg", placeholder);

        let csv = outcomes_to_csv_string(&[ok, failed]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1], "a.jpg,success,2024-03-15,Cafe,Food & Dining,5.00,USD,90.0,");
        assert_eq!(lines[2], "b.jpg,error,2024-03-15,Unknown,Other,0,NTD,0.0,OCR quota exceeded: daily");
    }

    #[test]
    fn test_summarize() {
        let receipts = vec![
            receipt("A", "10.00", Currency::Usd, "Food & Dining", &[]),
            receipt("B", "5.50", Currency::Usd, "Food & Dining", &[]),
            receipt("C", "300", Currency::Ntd, "Shopping", &[]),
            receipt("D", "0", Currency::Hkd, "Other", &[]),
        ];

        let summary = summarize(&receipts);

        assert_eq!(summary.total_receipts, 4);
        assert_eq!(summary.total_amount, Decimal::from_str("315.50").unwrap());
        assert_eq!(summary.categories.get("Food & Dining"), Some(&2));
        assert_eq!(summary.categories.get("Other"), Some(&1));
        assert_eq!(summary.currencies.get("USD"), Some(&Decimal::from_str("15.50").unwrap()));
        assert_eq!(summary.currencies.get("NTD"), Some(&Decimal::from(300)));
        assert!(!summary.currencies.contains_key("HKD"));
    }

    #[test]
    fn test_summarize_empty() {
        assert_eq!(summarize(&[]), Summary::default());
    }
}
