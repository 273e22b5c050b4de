//! Batch processing command for multiple receipt images.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use rcpt_core::export::{summarize, write_csv, write_outcomes_csv, Summary};
use rcpt_core::ocr::{is_supported_image, is_text_input};
use rcpt_core::{BatchProcessor, ImageInput, Receipt, ReceiptOutcome};

use super::{build_provider, load_categories, load_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Output directory (default: print to stdout)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: BatchFormat,

    /// Also write a per-file summary CSV and print totals
    #[arg(long)]
    summary: bool,

    /// Number of parallel OCR calls (default: from config)
    #[arg(short = 'j', long)]
    jobs: Option<usize>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum BatchFormat {
    /// One JSON file per receipt
    Json,
    /// One CSV with a row per receipt
    Csv,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    // Expand glob pattern
    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| p.is_file())
        .filter(|p| is_supported_image(p) || is_text_input(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    eprintln!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    // Create output directory if specified
    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let all_text = files.iter().all(|p| is_text_input(p));
    let provider = build_provider(&config, all_text)?;
    let store = load_categories(&config)?;

    let mut processor = BatchProcessor::from_config(provider, &config);
    if let Some(jobs) = args.jobs {
        processor = processor.with_concurrency(jobs);
    }

    let inputs: Vec<ImageInput> = files.iter().map(|p| ImageInput::load(p)).collect();

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} receipts")
            .unwrap()
            .progress_chars("=>-"),
    );

    let outcomes = processor
        .process_with_progress(inputs, store.snapshot(), |outcome| {
            if let Some(error) = outcome.error() {
                warn!("Failed to process {}: {}", outcome.source, error);
            }
            pb.inc(1);
        })
        .await;

    pb.finish_and_clear();

    write_outputs(&args, &files, &outcomes)?;

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_outcomes_csv(fs::File::create(&summary_path)?, &outcomes)?;
        eprintln!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );

        let receipts: Vec<Receipt> = outcomes
            .iter()
            .filter(|o| o.is_success())
            .map(|o| o.receipt.clone())
            .collect();
        print_summary(&summarize(&receipts));
    }

    let failed: Vec<&ReceiptOutcome> = outcomes.iter().filter(|o| !o.is_success()).collect();
    let low_confidence = outcomes
        .iter()
        .filter(|o| o.is_success() && o.receipt.is_low_confidence(config.extraction.low_confidence_threshold))
        .count();

    eprintln!();
    eprintln!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    eprintln!(
        "   {} successful, {} failed, {} need review",
        style(outcomes.len() - failed.len()).green(),
        style(failed.len()).red(),
        style(low_confidence).yellow()
    );

    if !failed.is_empty() {
        eprintln!();
        eprintln!("{}", style("Failed files:").red());
        for outcome in &failed {
            eprintln!(
                "  - {}: {}",
                outcome.source,
                outcome.error().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

fn write_outputs(args: &BatchArgs, files: &[PathBuf], outcomes: &[ReceiptOutcome]) -> anyhow::Result<()> {
    let Some(output_dir) = &args.output_dir else {
        match args.format {
            BatchFormat::Json => println!("{}", serde_json::to_string_pretty(outcomes)?),
            BatchFormat::Csv => {
                let receipts: Vec<Receipt> = outcomes.iter().map(|o| o.receipt.clone()).collect();
                write_csv(std::io::stdout().lock(), &receipts)?;
            }
        }
        return Ok(());
    };

    match args.format {
        BatchFormat::Json => {
            for (name, outcome) in output_names(files).iter().zip(outcomes) {
                let output_path = output_dir.join(format!("{}.json", name));
                fs::write(&output_path, serde_json::to_string_pretty(&outcome.receipt)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
        BatchFormat::Csv => {
            let output_path = output_dir.join("receipts.csv");
            let receipts: Vec<Receipt> = outcomes.iter().map(|o| o.receipt.clone()).collect();
            write_csv(fs::File::create(&output_path)?, &receipts)?;
            debug!("Wrote output to {}", output_path.display());
        }
    }

    Ok(())
}

/// One output name per input: the file stem, widened to the file name and
/// then numbered when two inputs would collide.
fn output_names(files: &[PathBuf]) -> Vec<String> {
    let mut taken = HashSet::new();

    files
        .iter()
        .map(|path| {
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("receipt");
            let full = path.file_name().and_then(|s| s.to_str()).unwrap_or(stem);

            let mut name = stem.to_string();
            if taken.contains(&name) {
                name = full.to_string();
            }
            let mut n = 2;
            while taken.contains(&name) {
                name = format!("{}-{}", full, n);
                n += 1;
            }

            taken.insert(name.clone());
            name
        })
        .collect()
}

fn print_summary(summary: &Summary) {
    eprintln!();
    eprintln!("{}", style("Summary").bold());
    eprintln!("  Receipts: {}", summary.total_receipts);
    eprintln!("  Total:    {}", summary.total_amount);

    if !summary.categories.is_empty() {
        eprintln!("  By category:");
        for (category, count) in &summary.categories {
            eprintln!("    {:<20} {}", category, count);
        }
    }

    if !summary.currencies.is_empty() {
        eprintln!("  By currency:");
        for (currency, amount) in &summary.currencies {
            eprintln!("    {:<20} {}", currency, amount);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(names: &[&str]) -> Vec<PathBuf> {
        names.iter().map(PathBuf::from).collect()
    }

    #[test]
    fn test_output_names_use_stem() {
        assert_eq!(output_names(&paths(&["in/a.jpg", "in/b.txt"])), vec!["a", "b"]);
    }

    #[test]
    fn test_output_names_do_not_collide() {
        let names = output_names(&paths(&["in/a.jpg", "in/a.txt", "other/a.txt", "in/a.txt.jpg"]));
        assert_eq!(names, vec!["a", "a.txt", "a.txt-2", "a.txt.jpg"]);
    }
}
