//! In-memory implementations of the service interfaces
//!
//! `InMemoryLab` plays every store at once. It paginates test listings,
//! records every write and call, and can be told to fail specific calls, which
//! makes it suitable both for tests and for hosts prototyping against the
//! pipeline without a live laboratory system.

use std::sync::{Mutex, MutexGuard, PoisonError};

use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{Map, Value};

use super::{
    BatchService, Console, ParameterStore, ProgressReporter, SampleService, ServiceFuture,
    TestService,
};
use crate::error::IngestError;
use crate::models::{
    AssayParameterSet, Batch, BatchWorksheetPatch, InstrumentResults, Sample, SampleId, Test,
    TestId, TestPage, INSTRUMENT_RESULTS_FIELD,
};

/// Default number of tests per listing page
pub const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Default)]
struct LabState {
    batches: FxHashMap<String, Batch>,
    tests: FxHashMap<String, Vec<Test>>,
    samples: FxHashMap<SampleId, Sample>,
    parameters: FxHashMap<String, AssayParameterSet>,
    worksheets: FxHashMap<TestId, Map<String, Value>>,
    patches: FxHashMap<String, Vec<BatchWorksheetPatch>>,
    updates: Vec<(TestId, bool)>,
    list_calls: Vec<(String, u32)>,
    sample_fetches: Vec<SampleId>,
    parameter_fetches: Vec<String>,
    failing_batches: FxHashSet<String>,
    failing_parameters: FxHashSet<String>,
    failing_listings: FxHashSet<String>,
    failing_samples: FxHashSet<SampleId>,
    failing_updates: FxHashSet<TestId>,
    failing_patches: FxHashSet<String>,
}

/// In-memory laboratory store
#[derive(Debug)]
pub struct InMemoryLab {
    page_size: usize,
    state: Mutex<LabState>,
}

impl Default for InMemoryLab {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLab {
    #[must_use]
    pub fn new() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            state: Mutex::new(LabState::default()),
        }
    }

    /// Set the number of tests returned per listing page
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn state(&self) -> MutexGuard<'_, LabState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_batch(&self, batch: Batch) {
        self.state().batches.insert(batch.id.clone(), batch);
    }

    /// Register a test under a batch, in listing order
    pub fn add_test(&self, batch_id: &str, test: Test) {
        self.state()
            .tests
            .entry(batch_id.to_string())
            .or_default()
            .push(test);
    }

    pub fn add_sample(&self, sample: Sample) {
        self.state().samples.insert(sample.id, sample);
    }

    pub fn add_parameters(&self, parameter_set_id: &str, parameters: AssayParameterSet) {
        self.state()
            .parameters
            .insert(parameter_set_id.to_string(), parameters);
    }

    /// Store a worksheet document for a test
    pub fn set_worksheet(&self, test_id: TestId, document: Map<String, Value>) {
        self.state().worksheets.insert(test_id, document);
    }

    /// Current worksheet document of a test
    #[must_use]
    pub fn worksheet(&self, test_id: TestId) -> Option<Map<String, Value>> {
        self.state().worksheets.get(&test_id).cloned()
    }

    /// Decoded instrument results of a test's stored worksheet
    #[must_use]
    pub fn instrument_results(&self, test_id: TestId) -> InstrumentResults {
        self.state()
            .worksheets
            .get(&test_id)
            .map(|doc| InstrumentResults::decode(doc.get(INSTRUMENT_RESULTS_FIELD)))
            .unwrap_or_default()
    }

    /// Every patch submitted to a batch worksheet, oldest first
    #[must_use]
    pub fn batch_patches(&self, batch_id: &str) -> Vec<BatchWorksheetPatch> {
        self.state().patches.get(batch_id).cloned().unwrap_or_default()
    }

    /// Successful test worksheet updates as `(test id, run_calculations)`
    #[must_use]
    pub fn updates(&self) -> Vec<(TestId, bool)> {
        self.state().updates.clone()
    }

    /// Test listing calls as `(batch id, page)`
    #[must_use]
    pub fn list_calls(&self) -> Vec<(String, u32)> {
        self.state().list_calls.clone()
    }

    /// Sample ids fetched, in call order
    #[must_use]
    pub fn sample_fetches(&self) -> Vec<SampleId> {
        self.state().sample_fetches.clone()
    }

    /// Parameter set ids fetched, in call order
    #[must_use]
    pub fn parameter_fetches(&self) -> Vec<String> {
        self.state().parameter_fetches.clone()
    }

    pub fn fail_batch(&self, batch_id: &str) {
        self.state().failing_batches.insert(batch_id.to_string());
    }

    pub fn fail_parameters(&self, parameter_set_id: &str) {
        self.state()
            .failing_parameters
            .insert(parameter_set_id.to_string());
    }

    pub fn fail_listing(&self, batch_id: &str) {
        self.state().failing_listings.insert(batch_id.to_string());
    }

    pub fn fail_sample(&self, sample_id: SampleId) {
        self.state().failing_samples.insert(sample_id);
    }

    pub fn fail_update(&self, test_id: TestId) {
        self.state().failing_updates.insert(test_id);
    }

    pub fn fail_patch(&self, batch_id: &str) {
        self.state().failing_patches.insert(batch_id.to_string());
    }
}

impl BatchService for InMemoryLab {
    fn get_batch<'a>(&'a self, batch_id: &'a str) -> ServiceFuture<'a, Batch> {
        Box::pin(async move {
            let state = self.state();
            if state.failing_batches.contains(batch_id) {
                return Err(IngestError::service(format!("batch {batch_id} unavailable")));
            }
            state
                .batches
                .get(batch_id)
                .cloned()
                .ok_or_else(|| IngestError::service(format!("batch {batch_id} not found")))
        })
    }

    fn patch_worksheet<'a>(
        &'a self,
        batch_id: &'a str,
        patch: &'a BatchWorksheetPatch,
    ) -> ServiceFuture<'a, ()> {
        Box::pin(async move {
            let mut state = self.state();
            if state.failing_patches.contains(batch_id) {
                return Err(IngestError::service(format!(
                    "batch worksheet {batch_id} rejected the patch"
                )));
            }
            state
                .patches
                .entry(batch_id.to_string())
                .or_default()
                .push(patch.clone());
            Ok(())
        })
    }
}

impl TestService for InMemoryLab {
    fn list_tests<'a>(&'a self, batch_id: &'a str, page: u32) -> ServiceFuture<'a, TestPage> {
        Box::pin(async move {
            let mut state = self.state();
            state.list_calls.push((batch_id.to_string(), page));
            if state.failing_listings.contains(batch_id) {
                return Err(IngestError::service(format!(
                    "test listing for batch {batch_id} unavailable"
                )));
            }
            let all = state.tests.get(batch_id).map(Vec::as_slice).unwrap_or_default();
            let total_pages = all.len().div_ceil(self.page_size).max(1);
            let start = (page.max(1) as usize - 1) * self.page_size;
            let tests = all
                .iter()
                .skip(start)
                .take(self.page_size)
                .copied()
                .collect();
            Ok(TestPage {
                tests,
                total_pages: u32::try_from(total_pages).unwrap_or(u32::MAX),
            })
        })
    }

    fn fetch_worksheet(&self, test_id: TestId) -> ServiceFuture<'_, Map<String, Value>> {
        Box::pin(async move { Ok(self.state().worksheets.get(&test_id).cloned().unwrap_or_default()) })
    }

    fn update_worksheet(
        &self,
        test_id: TestId,
        document: Map<String, Value>,
        run_calculations: bool,
    ) -> ServiceFuture<'_, ()> {
        Box::pin(async move {
            let mut state = self.state();
            if state.failing_updates.contains(&test_id) {
                return Err(IngestError::service(format!(
                    "worksheet update for test {test_id} rejected"
                )));
            }
            state.worksheets.insert(test_id, document);
            state.updates.push((test_id, run_calculations));
            Ok(())
        })
    }
}

impl SampleService for InMemoryLab {
    fn get_sample(&self, sample_id: SampleId) -> ServiceFuture<'_, Sample> {
        Box::pin(async move {
            let mut state = self.state();
            state.sample_fetches.push(sample_id);
            if state.failing_samples.contains(&sample_id) {
                return Err(IngestError::service(format!("sample {sample_id} unavailable")));
            }
            state
                .samples
                .get(&sample_id)
                .copied()
                .ok_or_else(|| IngestError::service(format!("sample {sample_id} not found")))
        })
    }
}

impl ParameterStore for InMemoryLab {
    fn get_parameters<'a>(
        &'a self,
        parameter_set_id: &'a str,
    ) -> ServiceFuture<'a, AssayParameterSet> {
        Box::pin(async move {
            let mut state = self.state();
            state.parameter_fetches.push(parameter_set_id.to_string());
            if state.failing_parameters.contains(parameter_set_id) {
                return Err(IngestError::service(format!(
                    "parameter set {parameter_set_id} unavailable"
                )));
            }
            state
                .parameters
                .get(parameter_set_id)
                .cloned()
                .ok_or_else(|| {
                    IngestError::service(format!("parameter set {parameter_set_id} not found"))
                })
        })
    }
}

/// Console that keeps every line it is given
#[derive(Debug, Default)]
pub struct MemoryConsole {
    lines: Mutex<Vec<String>>,
}

impl MemoryConsole {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Whether any line contains the given text
    #[must_use]
    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl Console for MemoryConsole {
    fn log(&self, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }

    fn clear(&self) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Progress reporter that keeps every percentage it is given
#[derive(Debug, Default)]
pub struct MemoryProgress {
    percentages: Mutex<Vec<u8>>,
}

impl MemoryProgress {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn percentages(&self) -> Vec<u8> {
        self.percentages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ProgressReporter for MemoryProgress {
    fn set_percentage(&self, percentage: u8) {
        self.percentages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(percentage.min(100));
    }
}
