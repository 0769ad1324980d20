//! Laboratory records
//!
//! Read-only entities fetched from the laboratory information system. The
//! serde field names follow the store's wire format.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identifier of a test
pub type TestId = u64;

/// Identifier of a sample
pub type SampleId = u64;

/// A laboratory work unit grouping tests under one assay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    /// Batch identifier
    pub id: String,
    /// Assay the batch is run under
    pub assay: Assay,
}

/// Analytical method definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assay {
    /// Assay identifier
    pub id: u64,
    /// Human-readable assay title
    #[serde(default)]
    pub title: String,
    /// Key of the assay's parameter set in the parameter store
    #[serde(rename = "assay_params")]
    pub parameter_set_id: String,
}

/// Assay-specific ingestion parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssayParameterSet {
    /// Instrument column label to analyte code
    #[serde(default)]
    pub data_columns_to_analytes: HashMap<String, String>,
    /// QC type name substrings, in match-priority order
    #[serde(default)]
    pub qc_types: Vec<String>,
    /// Analyte codes shown on the worksheet
    #[serde(default)]
    pub worksheet_analytes: Vec<String>,
}

/// Reference to a test's owning sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRef {
    /// Sample identifier
    pub id: SampleId,
}

/// One sample's scheduled analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Test {
    /// Test identifier
    pub id: TestId,
    /// Owning sample
    pub sample: SampleRef,
}

impl Test {
    #[must_use]
    pub const fn new(id: TestId, sample_id: SampleId) -> Self {
        Self {
            id,
            sample: SampleRef { id: sample_id },
        }
    }

    #[must_use]
    pub const fn sample_id(&self) -> SampleId {
        self.sample.id
    }
}

/// One page of a paginated test listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPage {
    /// Tests on this page
    #[serde(rename = "data")]
    pub tests: Vec<Test>,
    /// Total number of pages in the listing
    pub total_pages: u32,
}

/// Physical specimen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Sample identifier
    pub id: SampleId,
    /// Whether the sample is a QC control (matrix spike/blank)
    #[serde(default)]
    pub qc_flag: bool,
}
