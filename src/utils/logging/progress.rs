//! Progress reporting utilities
//!
//! Hosts running the pipeline from a terminal can hand it an indicatif
//! progress bar; it receives the same percentage milestones as any other
//! [`ProgressReporter`].

use indicatif::{ProgressBar, ProgressStyle};

use crate::services::ProgressReporter;

/// Default style for the run progress bar
pub const DEFAULT_MAIN_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}% {msg}";

/// Create a percentage progress bar with a standardized style
///
/// # Arguments
/// * `description` - Optional description to display as the initial message
#[must_use]
pub fn create_main_progress_bar(description: Option<&str>) -> ProgressBar {
    let pb = ProgressBar::new(100);
    let style = ProgressStyle::default_bar()
        .template(DEFAULT_MAIN_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);

    if let Some(desc) = description {
        pb.set_message(desc.to_string());
    }

    pb
}

impl ProgressReporter for ProgressBar {
    fn set_percentage(&self, percentage: u8) {
        self.set_position(u64::from(percentage.min(100)));
    }

    fn finish(&self) {
        self.finish_with_message("done");
    }
}

/// Progress reporter that discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn set_percentage(&self, _percentage: u8) {}
}
