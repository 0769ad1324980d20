//! Console adapters
//!
//! Implementations of the host [`Console`] for running outside a host UI.

use indicatif::ProgressBar;

use crate::services::Console;

/// Console that forwards every line to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogConsole;

impl Console for LogConsole {
    fn log(&self, message: &str) {
        log::info!(target: "worksheet_ingest::console", "{message}");
    }
}

/// Console printing above a running progress bar
#[derive(Debug, Clone)]
pub struct ProgressConsole {
    bar: ProgressBar,
}

impl ProgressConsole {
    #[must_use]
    pub const fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }
}

impl Console for ProgressConsole {
    fn log(&self, message: &str) {
        self.bar.println(message);
    }
}
