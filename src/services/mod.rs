//! Service interfaces injected by the host
//!
//! The pipeline never reaches for global state: the laboratory store, the
//! parameter store, the user-visible console and the progress indicator are
//! all handed to it through the traits in this module. Every store call is an
//! async suspension point and is awaited before the caller continues.

pub mod memory;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::models::{AssayParameterSet, Batch, BatchWorksheetPatch, Sample, SampleId, TestId, TestPage};

/// Boxed future returned by every service call
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Access to batches and their worksheets
pub trait BatchService: Send + Sync {
    /// Fetch a batch with its assay
    fn get_batch<'a>(&'a self, batch_id: &'a str) -> ServiceFuture<'a, Batch>;

    /// Patch the batch worksheet
    fn patch_worksheet<'a>(
        &'a self,
        batch_id: &'a str,
        patch: &'a BatchWorksheetPatch,
    ) -> ServiceFuture<'a, ()>;
}

/// Access to tests and their worksheets
pub trait TestService: Send + Sync {
    /// Fetch one page (1-based) of the tests belonging to a batch
    fn list_tests<'a>(&'a self, batch_id: &'a str, page: u32) -> ServiceFuture<'a, TestPage>;

    /// Fetch the raw worksheet document of a test; a test without a stored
    /// worksheet yields an empty document
    fn fetch_worksheet(&self, test_id: TestId) -> ServiceFuture<'_, Map<String, Value>>;

    /// Replace the worksheet document of a test
    fn update_worksheet(
        &self,
        test_id: TestId,
        document: Map<String, Value>,
        run_calculations: bool,
    ) -> ServiceFuture<'_, ()>;
}

/// Access to samples
pub trait SampleService: Send + Sync {
    fn get_sample(&self, sample_id: SampleId) -> ServiceFuture<'_, Sample>;
}

/// Key-value store holding assay parameter sets
pub trait ParameterStore: Send + Sync {
    fn get_parameters<'a>(&'a self, parameter_set_id: &'a str)
    -> ServiceFuture<'a, AssayParameterSet>;
}

/// User-visible console of the host
pub trait Console: Send + Sync {
    /// Write one line
    fn log(&self, message: &str);

    /// Clear previous output
    fn clear(&self) {}
}

/// Progress indicator of the host
pub trait ProgressReporter: Send + Sync {
    /// Set the overall completion percentage (0-100)
    fn set_percentage(&self, percentage: u8);

    /// Mark the run as finished
    fn finish(&self) {}
}

/// Bundle of every handle the pipeline needs
#[derive(Clone)]
pub struct Services {
    pub batches: Arc<dyn BatchService>,
    pub tests: Arc<dyn TestService>,
    pub samples: Arc<dyn SampleService>,
    pub parameters: Arc<dyn ParameterStore>,
    pub console: Arc<dyn Console>,
    pub progress: Arc<dyn ProgressReporter>,
}

impl Services {
    /// Use one in-memory lab for every store, with the given console and progress
    #[must_use]
    pub fn from_lab(
        lab: Arc<memory::InMemoryLab>,
        console: Arc<dyn Console>,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            batches: lab.clone(),
            tests: lab.clone(),
            samples: lab.clone(),
            parameters: lab,
            console,
            progress,
        }
    }
}
