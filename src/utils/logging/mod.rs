//! Logging utilities for output and progress tracking
//!
//! This module provides utilities for logging, console output, and progress tracking.

pub mod console;
pub mod log;
pub mod progress;

// Re-export commonly used functions for convenience
pub use console::{LogConsole, ProgressConsole};
pub use self::log::{init_logging, log_file_complete, log_file_start};
pub use progress::{NoProgress, create_main_progress_bar};
