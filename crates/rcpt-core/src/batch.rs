//! Concurrent batch processing of receipt images.
//!
//! Each image gets its own task. A semaphore bounds how many OCR calls are
//! in flight and every call runs under a timeout. A failed image turns into
//! an error-annotated placeholder; the batch itself always completes and
//! returns outcomes in input order.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Local, NaiveDate};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::error::{OcrError, Result};
use crate::extract::ReceiptParser;
use crate::models::category::CategorySet;
use crate::models::config::RcptConfig;
use crate::models::receipt::ReceiptOutcome;
use crate::ocr::{OcrProvider, RawOcrResult};

/// One image to process.
#[derive(Debug, Clone)]
pub struct ImageInput {
    /// Name reported in the outcome, usually the file name.
    pub source: String,
    /// Raw image bytes.
    pub bytes: Vec<u8>,
    /// Set when the image could not be loaded; OCR is skipped.
    pub error: Option<OcrError>,
}

impl ImageInput {
    pub fn new(source: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            bytes,
            error: None,
        }
    }

    /// An input that failed before OCR; it yields a placeholder outcome.
    pub fn unreadable(source: impl Into<String>, error: OcrError) -> Self {
        Self {
            source: source.into(),
            bytes: Vec::new(),
            error: Some(error),
        }
    }

    /// Read an image from disk, naming it after the file.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(Self::new(source_name(path), bytes))
    }

    /// Like [`from_path`](Self::from_path), but a read failure becomes an
    /// `InvalidImage` input instead of an error.
    pub fn load(path: &Path) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => Self::new(source_name(path), bytes),
            Err(err) => {
                warn!("Cannot read {}: {}", path.display(), err);
                Self::unreadable(
                    source_name(path),
                    OcrError::InvalidImage(format!("cannot read file: {}", err)),
                )
            }
        }
    }
}

fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Runs OCR and extraction over many images.
pub struct BatchProcessor {
    provider: Arc<dyn OcrProvider>,
    parser: Arc<ReceiptParser>,
    /// Maximum OCR calls in flight.
    concurrency: usize,
    /// Bound on a single OCR call.
    timeout: Duration,
    /// Fallback date; the local date when unset.
    processing_date: Option<NaiveDate>,
}

impl BatchProcessor {
    /// Create a processor with default settings.
    pub fn new(provider: Arc<dyn OcrProvider>) -> Self {
        Self {
            provider,
            parser: Arc::new(ReceiptParser::new()),
            concurrency: 4,
            timeout: Duration::from_secs(30),
            processing_date: None,
        }
    }

    /// Create a processor from the config file settings.
    pub fn from_config(provider: Arc<dyn OcrProvider>, config: &RcptConfig) -> Self {
        Self::new(provider)
            .with_parser(ReceiptParser::from_config(&config.extraction))
            .with_concurrency(config.batch.concurrency)
            .with_timeout(config.ocr.timeout())
    }

    pub fn with_parser(mut self, parser: ReceiptParser) -> Self {
        self.parser = Arc::new(parser);
        self
    }

    /// Set the maximum number of OCR calls in flight (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the bound on a single OCR call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use `date` instead of today as the fallback receipt date.
    pub fn with_processing_date(mut self, date: NaiveDate) -> Self {
        self.processing_date = Some(date);
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    fn today(&self) -> NaiveDate {
        self.processing_date.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Process a single image.
    pub async fn process_one(&self, input: ImageInput, categories: &CategorySet) -> ReceiptOutcome {
        let result = match input.error {
            Some(err) => Err(err),
            None => recognize_with_timeout(self.provider.as_ref(), &input.bytes, self.timeout).await,
        };
        build_outcome(&self.parser, input.source, result, categories, self.today())
    }

    /// Process all images, returning one outcome per input in input order.
    pub async fn process(&self, inputs: Vec<ImageInput>, categories: Arc<CategorySet>) -> Vec<ReceiptOutcome> {
        self.process_with_progress(inputs, categories, |_| {}).await
    }

    /// Like [`process`](Self::process), calling `on_done` as each image finishes.
    pub async fn process_with_progress<F>(
        &self,
        inputs: Vec<ImageInput>,
        categories: Arc<CategorySet>,
        mut on_done: F,
    ) -> Vec<ReceiptOutcome>
    where
        F: FnMut(&ReceiptOutcome),
    {
        let start = Instant::now();
        let total = inputs.len();
        let today = self.today();

        info!(
            "Processing {} images with {} (concurrency {}, timeout {:?})",
            total,
            self.provider.name(),
            self.concurrency,
            self.timeout
        );

        let sources: Vec<String> = inputs.iter().map(|i| i.source.clone()).collect();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, input) in inputs.into_iter().enumerate() {
            let provider = Arc::clone(&self.provider);
            let parser = Arc::clone(&self.parser);
            let categories = Arc::clone(&categories);
            let semaphore = Arc::clone(&semaphore);
            let timeout = self.timeout;

            tasks.spawn(async move {
                let result = if let Some(err) = input.error {
                    Err(err)
                } else {
                    match semaphore.acquire_owned().await {
                        Ok(_permit) => recognize_with_timeout(provider.as_ref(), &input.bytes, timeout).await,
                        Err(_) => Err(OcrError::Unavailable("batch was shut down".to_string())),
                    }
                };
                (index, build_outcome(&parser, input.source, result, &categories, today))
            });
        }

        let mut slots: Vec<Option<ReceiptOutcome>> = vec![None; total];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => {
                    on_done(&outcome);
                    slots[index] = Some(outcome);
                }
                Err(err) => warn!("Receipt task failed: {}", err),
            }
        }

        // Slots left empty belong to tasks that panicked
        let outcomes: Vec<ReceiptOutcome> = slots
            .into_iter()
            .zip(sources)
            .map(|(slot, source)| {
                slot.unwrap_or_else(|| {
                    let error = OcrError::Unavailable("processing task failed".to_string());
                    let outcome = ReceiptOutcome::failure(
                        source,
                        self.parser.placeholder(&error, &categories, today),
                    );
                    on_done(&outcome);
                    outcome
                })
            })
            .collect();

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        info!(
            "Batch complete in {}ms: {} succeeded, {} failed",
            start.elapsed().as_millis(),
            total - failed,
            failed
        );

        outcomes
    }
}

async fn recognize_with_timeout(
    provider: &dyn OcrProvider,
    bytes: &[u8],
    timeout: Duration,
) -> std::result::Result<RawOcrResult, OcrError> {
    match tokio::time::timeout(timeout, provider.recognize(bytes)).await {
        Ok(result) => result,
        Err(_) => Err(OcrError::Timeout(timeout)),
    }
}

fn build_outcome(
    parser: &ReceiptParser,
    source: String,
    result: std::result::Result<RawOcrResult, OcrError>,
    categories: &CategorySet,
    today: NaiveDate,
) -> ReceiptOutcome {
    match result {
        Ok(ocr) => {
            debug!("OCR for {} returned {} characters", source, ocr.text.len());
            ReceiptOutcome::success(source, parser.assemble_on(&ocr, categories, today))
        }
        Err(err) => {
            warn!("OCR failed for {}: {}", source, err);
            ReceiptOutcome::failure(source, parser.placeholder(&err, categories, today))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Reads the input as text; `QUOTA`, `SLOW` and `PANIC` trigger failures.
    #[derive(Default)]
    struct ScriptedProvider {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    #[async_trait]
    impl OcrProvider for ScriptedProvider {
        async fn recognize(&self, image: &[u8]) -> std::result::Result<RawOcrResult, OcrError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let text = String::from_utf8_lossy(image).into_owned();
            let delay = if text == "SLOW" { 500 } else { 10 + (image.len() as u64 % 3) * 10 };
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            match text.as_str() {
                "QUOTA" => Err(OcrError::QuotaExceeded("daily limit".to_string())),
                "PANIC" => panic!("provider crashed"),
                _ => Ok(RawOcrResult::new(text, 95.0)),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn inputs(texts: &[&str]) -> Vec<ImageInput> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| ImageInput::new(format!("img{i}.jpg"), t.as_bytes().to_vec()))
            .collect()
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
    }

    #[tokio::test]
    async fn test_outcomes_keep_input_order() {
        let processor = BatchProcessor::new(Arc::new(ScriptedProvider::default()))
            .with_concurrency(3)
            .with_processing_date(date());

        let texts = ["Shop A\nTotal 1.00", "Shop BB\nTotal 2.00", "Shop CCC\nTotal 3.00", "Shop D\nTotal 4.00"];
        let outcomes = processor.process(inputs(&texts), Arc::new(CategorySet::default())).await;

        let sources: Vec<&str> = outcomes.iter().map(|o| o.source.as_str()).collect();
        assert_eq!(sources, vec!["img0.jpg", "img1.jpg", "img2.jpg", "img3.jpg"]);
        let merchants: Vec<&str> = outcomes.iter().map(|o| o.receipt.merchant.as_str()).collect();
        assert_eq!(merchants, vec!["Shop A", "Shop BB", "Shop CCC", "Shop D"]);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let processor = BatchProcessor::new(Arc::new(ScriptedProvider::default())).with_processing_date(date());

        let outcomes = processor
            .process(inputs(&["Cafe\nTotal 5.00", "QUOTA", "Cafe\nTotal 6.00"]), Arc::new(CategorySet::default()))
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes[0].is_success());
        assert!(!outcomes[1].is_success());
        assert!(outcomes[2].is_success());

        let placeholder = &outcomes[1].receipt;
        assert_eq!(placeholder.date, date());
        assert_eq!(placeholder.category, "Other");
        assert_eq!(placeholder.confidence, 0.0);
        assert_eq!(outcomes[1].error(), Some("OCR quota exceeded: daily limit"));
    }

    #[tokio::test]
    async fn test_unreadable_file_becomes_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("a.txt");
        std::fs::write(&good, "Cafe\nTotal 5.00").unwrap();
        let not_a_file = dir.path().join("bad.txt");
        std::fs::create_dir(&not_a_file).unwrap();

        let bad = ImageInput::load(&not_a_file);
        assert_eq!(bad.source, "bad.txt");
        assert!(matches!(bad.error, Some(OcrError::InvalidImage(_))));

        let processor = BatchProcessor::new(Arc::new(ScriptedProvider::default())).with_processing_date(date());
        let outcomes = processor
            .process(vec![bad, ImageInput::load(&good)], Arc::new(CategorySet::default()))
            .await;

        assert!(!outcomes[0].is_success());
        assert!(outcomes[0].error().unwrap().starts_with("invalid image: cannot read file"));
        assert_eq!(outcomes[0].receipt.date, date());
        assert!(outcomes[1].is_success());
        assert_eq!(outcomes[1].receipt.merchant, "Cafe");
    }

    #[tokio::test]
    async fn test_timeout_marks_image_failed() {
        let processor = BatchProcessor::new(Arc::new(ScriptedProvider::default()))
            .with_timeout(Duration::from_millis(100))
            .with_processing_date(date());

        let outcomes = processor
            .process(inputs(&["SLOW", "Cafe\nTotal 5.00"]), Arc::new(CategorySet::default()))
            .await;

        assert!(!outcomes[0].is_success());
        assert!(outcomes[0].error().unwrap().contains("timed out"));
        assert!(outcomes[1].is_success());
    }

    #[tokio::test]
    async fn test_panicking_task_becomes_placeholder() {
        let processor = BatchProcessor::new(Arc::new(ScriptedProvider::default())).with_processing_date(date());

        let outcomes = processor
            .process(inputs(&["PANIC", "Cafe\nTotal 5.00"]), Arc::new(CategorySet::default()))
            .await;

        assert_eq!(outcomes[0].source, "img0.jpg");
        assert!(outcomes[0].receipt.is_placeholder());
        assert!(outcomes[1].is_success());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let provider = Arc::new(ScriptedProvider::default());
        let processor = BatchProcessor::new(provider.clone()).with_concurrency(2);

        let texts = ["a\nTotal 1.00"; 8];
        processor.process(inputs(&texts), Arc::new(CategorySet::default())).await;

        let max = provider.max_in_flight.load(Ordering::SeqCst);
        assert!((1..=2).contains(&max), "max in flight was {max}");
    }

    #[tokio::test]
    async fn test_progress_called_per_image() {
        let processor = BatchProcessor::new(Arc::new(ScriptedProvider::default()));
        let mut seen = 0;

        let outcomes = processor
            .process_with_progress(inputs(&["x", "QUOTA", "y"]), Arc::new(CategorySet::default()), |_| seen += 1)
            .await;

        assert_eq!(seen, 3);
        assert_eq!(outcomes.len(), 3);
    }

    #[tokio::test]
    async fn test_category_snapshot_is_fixed_for_batch() {
        let store = crate::models::category::CategoryStore::default();
        let snapshot = store.snapshot();
        store.remove("Food & Dining").unwrap();

        let processor = BatchProcessor::new(Arc::new(ScriptedProvider::default()));
        let outcomes = processor.process(inputs(&["STARBUCKS\nTotal 5.00"]), snapshot).await;

        assert_eq!(outcomes[0].receipt.category, "Food & Dining");
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let processor = BatchProcessor::new(Arc::new(ScriptedProvider::default()));
        assert!(processor.process(Vec::new(), Arc::new(CategorySet::default())).await.is_empty());
    }
}
