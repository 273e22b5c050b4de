//! CLI subcommands and the settings they share.

pub mod batch;
pub mod categories;
pub mod config;
pub mod process;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use rcpt_core::models::config::{OcrProviderKind, RcptConfig};
use rcpt_core::{CategoryStore, OcrProvider, PlainTextProvider, VisionProvider};

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("rcpt")
}

pub fn default_config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Resolve the config file: the `--config` argument, else the default path.
pub fn config_path(config_path: Option<&str>) -> PathBuf {
    config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

/// Load configuration, falling back to defaults when no file exists.
///
/// A path passed with `--config` must exist.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<RcptConfig> {
    if let Some(path) = config_path {
        let path = Path::new(path);
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }
        return Ok(RcptConfig::from_file(path)?);
    }

    let path = default_config_path();
    if path.exists() {
        debug!("Loading config from {}", path.display());
        Ok(RcptConfig::from_file(&path)?)
    } else {
        Ok(RcptConfig::default())
    }
}

/// Where the category set is persisted.
pub fn categories_path(config: &RcptConfig) -> PathBuf {
    config
        .categories_path
        .clone()
        .unwrap_or_else(|| config_dir().join("categories.json"))
}

pub fn load_categories(config: &RcptConfig) -> anyhow::Result<CategoryStore> {
    Ok(CategoryStore::load(&categories_path(config))?)
}

/// Pick the OCR provider: plain text for `.txt` inputs, otherwise the configured one.
pub fn build_provider(config: &RcptConfig, text_input: bool) -> anyhow::Result<Arc<dyn OcrProvider>> {
    if text_input || config.ocr.provider == OcrProviderKind::PlainText {
        return Ok(Arc::new(PlainTextProvider::new()));
    }

    let provider = VisionProvider::from_config(&config.ocr).map_err(|e| {
        anyhow::anyhow!(
            "{}.\n\nSet {} to a Google Cloud Vision API key, or pass .txt files.",
            e,
            config.ocr.api_key_env
        )
    })?;
    Ok(Arc::new(provider))
}
