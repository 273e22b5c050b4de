//! Data models: receipts, category sets, configuration.

pub mod category;
pub mod config;
pub mod receipt;
