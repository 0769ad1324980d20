//! A Rust library for ingesting laboratory instrument exports and reconciling
//! them into per-test and per-batch worksheet documents.
//!
//! The host hands [`IngestPipeline`] its service handles (batch, test, sample
//! and parameter stores, a console and a progress indicator) and a list of
//! files; the pipeline returns a [`RunReport`] once every file is processed.

pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod services;
pub mod utils;

// Re-export the most common types for easier use
// Core types
pub use config::{FileFormat, IngestConfig};
pub use error::{IngestError, Result};

// Pipeline
pub use ingest::{FileOutcome, FileSummary, IngestPipeline, InstrumentFile, RunReport};

// Domain models
pub use models::{
    AssayParameterSet, Batch, InstrumentResults, OrderEntry, QcEntry, Sample, Test,
    WorksheetDocument,
};

// Service interfaces
pub use services::{
    BatchService, Console, ParameterStore, ProgressReporter, SampleService, Services, TestService,
};
