//! Process command - extract an expense record from a single receipt.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use rcpt_core::export::to_csv_string;
use rcpt_core::ocr::{is_supported_image, is_text_input};
use rcpt_core::{BatchProcessor, ImageInput, Receipt};

use super::{build_provider, load_categories, load_config};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (receipt image, or .txt with already-recognized text)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Show extraction confidence and warnings
    #[arg(long)]
    show_confidence: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    // Check input file exists
    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let text_input = is_text_input(&args.input);
    if !text_input && !is_supported_image(&args.input) {
        let extension = args.input.extension().and_then(|e| e.to_str()).unwrap_or("");
        anyhow::bail!("Unsupported file format: {}", extension);
    }

    info!("Processing file: {}", args.input.display());

    let provider = build_provider(&config, text_input)?;
    let store = load_categories(&config)?;
    let processor = BatchProcessor::from_config(provider, &config);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.set_message(format!("Running OCR ({})...", processor.provider_name()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let input = ImageInput::from_path(&args.input)?;
    let outcome = processor.process_one(input, &store.snapshot()).await;

    pb.finish_and_clear();

    if let Some(error) = outcome.error() {
        eprintln!(
            "{} OCR failed, fields were defaulted: {}",
            style("⚠").yellow(),
            error
        );
    }

    let receipt = &outcome.receipt;
    let output = format_receipt(receipt, args.format)?;

    // Write output
    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    let threshold = config.extraction.low_confidence_threshold;
    if args.show_confidence || receipt.is_low_confidence(threshold) {
        eprintln!();
        let label = if receipt.is_low_confidence(threshold) {
            style("low, please review").yellow()
        } else {
            style("ok").green()
        };
        eprintln!(
            "{} Extraction confidence: {:.1}% ({})",
            style("ℹ").blue(),
            receipt.confidence,
            label
        );
        for warning in &receipt.warnings {
            eprintln!("  - {}", warning);
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn format_receipt(receipt: &Receipt, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(receipt)?),
        OutputFormat::Csv => Ok(to_csv_string(std::slice::from_ref(receipt))?),
        OutputFormat::Text => Ok(format_text(receipt)),
    }
}

fn format_text(receipt: &Receipt) -> String {
    let mut output = String::new();

    output.push_str(&format!("Merchant: {}\n", receipt.merchant));
    output.push_str(&format!("Date:     {}\n", receipt.date));
    output.push_str(&format!("Amount:   {} {}\n", receipt.amount, receipt.currency));
    output.push_str(&format!("Category: {}\n", receipt.category));

    if !receipt.items.is_empty() {
        output.push_str("Items:\n");
        for item in &receipt.items {
            output.push_str(&format!("  - {}\n", item));
        }
    }

    output.trim_end().to_string()
}
