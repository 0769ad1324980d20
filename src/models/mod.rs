//! Domain models for worksheet ingestion
//!
//! This module contains the laboratory records read from the external store
//! and the worksheet documents this crate writes back.

pub mod lab;
pub mod worksheet;

// Re-export commonly used types
pub use lab::{Assay, AssayParameterSet, Batch, SampleId, Sample, SampleRef, Test, TestId, TestPage};
pub use worksheet::{
    BatchWorksheetPatch, InstrumentResults, OrderEntry, QcEntry, TestWorksheet, WorksheetDocument,
    INSTRUMENT_RESULTS_FIELD, MATRIX_BLANK, MATRIX_SPIKE,
};
