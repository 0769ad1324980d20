//! Logging utilities
//!
//! This module provides standardized logging functions for ingestion steps.

use std::time::Duration;

/// Initialise `env_logger` with an `info` default filter
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Log the start of a file with consistent format
pub fn log_file_start(file_name: &str, batch_id: &str) {
    log::info!("Processing {file_name} for batch {batch_id}");
}

/// Log the completion of a file with consistent format
///
/// # Arguments
/// * `file_name` - Name of the processed file
/// * `rows` - Number of data rows classified
/// * `skipped` - Number of rows skipped as unrecognized
/// * `elapsed` - Time spent on the file
pub fn log_file_complete(file_name: &str, rows: usize, skipped: usize, elapsed: Duration) {
    log::info!(
        "Successfully processed {rows} rows from {file_name} ({skipped} skipped) in {elapsed:?}"
    );
}
