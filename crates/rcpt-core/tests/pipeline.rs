//! End-to-end tests for the receipt pipeline using an in-memory OCR provider.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;

use rcpt_core::export::{summarize, to_csv_string};
use rcpt_core::{
    BatchProcessor, CategorySet, CategoryStore, Currency, ImageInput, OcrError, OcrProvider,
    RawOcrResult, ReceiptExtractor, ReceiptParser,
};

/// Returns canned OCR results keyed by the image bytes.
struct ScriptedProvider {
    script: HashMap<Vec<u8>, Result<RawOcrResult, OcrError>>,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            script: HashMap::new(),
        }
    }

    fn text(mut self, image: &str, text: &str) -> Self {
        self.script
            .insert(image.as_bytes().to_vec(), Ok(RawOcrResult::new(text, 98.0)));
        self
    }

    fn fail(mut self, image: &str, error: OcrError) -> Self {
        self.script.insert(image.as_bytes().to_vec(), Err(error));
        self
    }
}

#[async_trait]
impl OcrProvider for ScriptedProvider {
    async fn recognize(&self, image: &[u8]) -> Result<RawOcrResult, OcrError> {
        self.script
            .get(image)
            .cloned()
            .unwrap_or_else(|| Err(OcrError::InvalidImage("not in script".to_string())))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn starbucks_receipt_is_fully_extracted() {
    let categories = CategorySet::default();
    let receipt = ReceiptParser::new().extract_from_text("STARBUCKS\n2024-03-15\nTotal: $12.50 USD", &categories);

    assert_eq!(receipt.date, ymd(2024, 3, 15));
    assert_eq!(receipt.merchant, "STARBUCKS");
    assert_eq!(receipt.amount, Decimal::from_str("12.50").unwrap());
    assert_eq!(receipt.currency, Currency::Usd);
    assert_eq!(receipt.category, "Food & Dining");
    assert_eq!(receipt.raw_text, "STARBUCKS\n2024-03-15\nTotal: $12.50 USD");
    assert!(!receipt.is_low_confidence(60.0));
}

#[test]
fn unrecognizable_text_falls_back_to_defaults() {
    let categories = CategorySet::default();
    let before = Local::now().date_naive();
    let receipt = ReceiptParser::new().extract(&RawOcrResult::new("~~ ## ~~\n** ** **", 85.0), &categories);
    let after = Local::now().date_naive();

    assert!(receipt.date == before || receipt.date == after);
    assert_eq!(receipt.amount, Decimal::ZERO);
    assert_eq!(receipt.category, "Other");
    assert_eq!(receipt.merchant, "Unknown");
    assert!(receipt.confidence < 85.0);
    assert!(receipt.is_low_confidence(60.0));
    assert!(receipt.error.is_none());
}

#[tokio::test]
async fn quota_failure_yields_placeholder_without_aborting_batch() {
    let provider = ScriptedProvider::new()
        .text("img-1", "STARBUCKS\n2024-03-15\nTotal: $12.50 USD")
        .text("img-2", "Uber Trip\n03/16/2024\nTotal $23.10")
        .fail("img-3", OcrError::QuotaExceeded("requests per minute".to_string()))
        .text("img-4", "全家便利商店\n2024年3月17日\n御飯糰 35\n合計 35元")
        .text("img-5", "CITY CINEMA\n2024-03-18\nMovie ticket 12.00\nTotal 12.00");

    let inputs: Vec<ImageInput> = (1..=5)
        .map(|i| ImageInput::new(format!("receipt{i}.jpg"), format!("img-{i}").into_bytes()))
        .collect();

    let processor = BatchProcessor::new(Arc::new(provider))
        .with_concurrency(2)
        .with_processing_date(ymd(2024, 4, 1));
    let outcomes = processor.process(inputs, Arc::new(CategorySet::default())).await;

    assert_eq!(outcomes.len(), 5);
    assert_eq!(outcomes.iter().filter(|o| o.is_success()).count(), 4);

    let sources: Vec<&str> = outcomes.iter().map(|o| o.source.as_str()).collect();
    assert_eq!(
        sources,
        vec!["receipt1.jpg", "receipt2.jpg", "receipt3.jpg", "receipt4.jpg", "receipt5.jpg"]
    );

    let placeholder = &outcomes[2];
    assert!(!placeholder.is_success());
    assert_eq!(placeholder.error(), Some("OCR quota exceeded: requests per minute"));
    assert_eq!(placeholder.receipt.date, ymd(2024, 4, 1));
    assert_eq!(placeholder.receipt.category, "Other");
    assert_eq!(placeholder.receipt.confidence, 0.0);

    let categories: Vec<&str> = outcomes.iter().map(|o| o.receipt.category.as_str()).collect();
    assert_eq!(
        categories,
        vec!["Food & Dining", "Transportation", "Other", "Shopping", "Entertainment"]
    );

    assert_eq!(outcomes[1].receipt.date, ymd(2024, 3, 16));
    assert_eq!(outcomes[3].receipt.amount, Decimal::from(35));
    assert_eq!(outcomes[3].receipt.currency, Currency::Ntd);
}

#[tokio::test]
async fn category_edits_do_not_reclassify_existing_receipts() {
    let store = CategoryStore::default();
    let provider = ScriptedProvider::new().text("a", "Blue Lagoon Spa\nTotal 80.00");
    let processor = BatchProcessor::new(Arc::new(provider));

    let first = processor
        .process(vec![ImageInput::new("a.jpg", b"a".to_vec())], store.snapshot())
        .await;
    assert_eq!(first[0].receipt.category, "Other");

    store.add("Wellness", &["spa"]).unwrap();
    let second = processor
        .process(vec![ImageInput::new("a.jpg", b"a".to_vec())], store.snapshot())
        .await;

    assert_eq!(second[0].receipt.category, "Wellness");
    assert_eq!(first[0].receipt.category, "Other");
}

#[tokio::test]
async fn batch_results_export_to_csv() {
    let provider = ScriptedProvider::new()
        .text("a", "STARBUCKS\n2024-03-15\nTotal: $12.50 USD")
        .text("b", "全家便利商店\n2024/03/17\n御飯糰 35\n合計 NT$35");
    let processor = BatchProcessor::new(Arc::new(provider));

    let outcomes = processor
        .process(
            vec![
                ImageInput::new("a.jpg", b"a".to_vec()),
                ImageInput::new("b.jpg", b"b".to_vec()),
            ],
            Arc::new(CategorySet::default()),
        )
        .await;
    let receipts: Vec<_> = outcomes.into_iter().map(|o| o.receipt).collect();

    let csv = to_csv_string(&receipts).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[1], "2024-03-15,STARBUCKS,Food & Dining,12.50,USD,");
    assert_eq!(lines[2], "2024-03-17,全家便利商店,Shopping,35,NTD,御飯糰 35");

    let summary = summarize(&receipts);
    assert_eq!(summary.total_receipts, 2);
    assert_eq!(summary.currencies.get("NTD"), Some(&Decimal::from(35)));
}
