//! Shared utilities

pub mod logging;

pub use logging::{init_logging, log_file_complete, log_file_start};
