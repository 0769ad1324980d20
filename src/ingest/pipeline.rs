//! Ingestion entry point
//!
//! Files are processed strictly one after another. Any error escaping a file
//! (unreadable file, failed lookup, rejected batch patch) ends that file only;
//! writes already committed for earlier files stay as they are.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use rustc_hash::FxHashMap;

use crate::config::IngestConfig;
use crate::error::Result;
use crate::ingest::classify::{Classification, QcClassifier};
use crate::ingest::columns::ColumnMap;
use crate::ingest::identity::{IdentityResolver, SampleFlagCache, TestIndex};
use crate::ingest::parser::{InstrumentFile, parse_file};
use crate::ingest::readings::ReadingAccumulator;
use crate::ingest::reconcile::{MergeSummary, ReconciliationWriter};
use crate::models::{Assay, AssayParameterSet};
use crate::services::{ParameterStore, Services};
use crate::utils::logging::{log_file_complete, log_file_start};

/// Progress milestones reported while processing a file
pub mod milestones {
    pub const FILE_READ: u8 = 10;
    pub const BATCH_FETCHED: u8 = 25;
    pub const PARAMETERS_FETCHED: u8 = 40;
    pub const TESTS_LISTED: u8 = 55;
    pub const ROWS_CLASSIFIED: u8 = 75;
    pub const TESTS_MERGED: u8 = 90;
    pub const DONE: u8 = 100;
}

/// Assay parameter sets by assay id
///
/// Entries are fetched once and never replaced; the cache lives as long as
/// the pipeline that owns it, i.e. one run.
#[derive(Debug, Default)]
pub struct ParameterCache {
    entries: FxHashMap<u64, Arc<AssayParameterSet>>,
}

impl ParameterCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, assay_id: u64) -> Option<Arc<AssayParameterSet>> {
        self.entries.get(&assay_id).cloned()
    }

    /// Cached parameters of an assay, fetching them on first use
    pub async fn get_or_fetch(
        &mut self,
        assay: &Assay,
        store: &dyn ParameterStore,
    ) -> Result<Arc<AssayParameterSet>> {
        if let Some(parameters) = self.get(assay.id) {
            return Ok(parameters);
        }
        let parameters = store
            .get_parameters(&assay.parameter_set_id)
            .await
            .map_err(|e| {
                e.into_lookup(&format!(
                    "Error fetching parameters for Assay {}: {}",
                    assay.id, assay.title
                ))
            })?;
        let parameters = Arc::new(parameters);
        self.entries.insert(assay.id, Arc::clone(&parameters));
        Ok(parameters)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of one successfully processed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub file_name: String,
    pub batch_id: String,
    /// Rows recorded on the batch worksheet
    pub rows_recorded: usize,
    /// Rows skipped as unrecognized
    pub rows_skipped: usize,
    /// QC entries on the batch worksheet
    pub qc_entries: usize,
    pub merge: MergeSummary,
}

/// Outcome of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Completed(FileSummary),
    Failed {
        file_name: String,
        batch_id: String,
        error: String,
    },
}

impl FileOutcome {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    #[must_use]
    pub fn file_name(&self) -> &str {
        match self {
            Self::Completed(summary) => &summary.file_name,
            Self::Failed { file_name, .. } => file_name,
        }
    }
}

/// Outcome of a whole run, returned to the host
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcomes: Vec<FileOutcome>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Whether every file was processed without a file-level failure
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(FileOutcome::is_success)
    }

    /// Number of files that failed
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_success()).count()
    }
}

/// Reconciles instrument files against the laboratory store
pub struct IngestPipeline {
    services: Services,
    config: IngestConfig,
    parameters: ParameterCache,
    sample_flags: SampleFlagCache,
}

impl IngestPipeline {
    #[must_use]
    pub fn new(services: Services, config: IngestConfig) -> Self {
        Self {
            services,
            config,
            parameters: ParameterCache::new(),
            sample_flags: SampleFlagCache::new(),
        }
    }

    /// Parameter sets fetched so far in this run
    #[must_use]
    pub const fn parameter_cache(&self) -> &ParameterCache {
        &self.parameters
    }

    /// Process every file in order and report the outcome
    pub async fn run(&mut self, files: &[InstrumentFile]) -> RunReport {
        let console = Arc::clone(&self.services.console);
        let progress = Arc::clone(&self.services.progress);
        progress.set_percentage(0);
        console.clear();
        console.log("Begin process...");

        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            let outcome = match self.process_file(file).await {
                Ok(summary) => {
                    console.log(&format!("Finished processing {}", file.name()));
                    FileOutcome::Completed(summary)
                }
                Err(e) => {
                    log::error!("Error processing file {}: {e}", file.name());
                    console.log(&format!("Error processing file {}: {e}", file.name()));
                    FileOutcome::Failed {
                        file_name: file.name().to_string(),
                        batch_id: file.batch_id(),
                        error: e.to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let report = RunReport {
            outcomes,
            finished_at: Utc::now(),
        };
        progress.set_percentage(milestones::DONE);
        progress.finish();
        if report.succeeded() {
            console.log("All files processed successfully!");
        } else {
            console.log(&format!(
                "Finished with {} of {} files failed",
                report.failed(),
                report.outcomes.len()
            ));
        }
        report
    }

    /// Process one file: resolve, classify and accumulate every row, then
    /// merge the test worksheets and write the batch worksheet
    pub async fn process_file(&mut self, file: &InstrumentFile) -> Result<FileSummary> {
        let started = Instant::now();
        let services = self.services.clone();
        let console = services.console.as_ref();
        let progress = services.progress.as_ref();
        let batch_id = file.batch_id();
        let format = self.config.format_for(file.name());
        log_file_start(file.name(), &batch_id);

        let rows = parse_file(file, format).await?;
        progress.set_percentage(milestones::FILE_READ);

        console.log(&format!("Fetching batch: {batch_id}"));
        let batch = services
            .batches
            .get_batch(&batch_id)
            .await
            .map_err(|e| e.into_lookup(&format!("Error fetching batch {batch_id}")))?;
        console.log(&format!("Successfully fetched Batch {batch_id}"));
        progress.set_percentage(milestones::BATCH_FETCHED);

        let assay = &batch.assay;
        if self.parameters.get(assay.id).is_some() {
            console.log(&format!("Using cached parameters for Assay {}", assay.id));
        } else {
            console.log(&format!(
                "Fetching parameters for Assay {}: {}",
                assay.id, assay.title
            ));
        }
        let parameters = self
            .parameters
            .get_or_fetch(assay, services.parameters.as_ref())
            .await?;
        progress.set_percentage(milestones::PARAMETERS_FETCHED);

        console.log(&format!("Fetching tests for batch {batch_id}"));
        let index = TestIndex::fetch(services.tests.as_ref(), &batch_id).await?;
        console.log(&format!(
            "Found {} tests across {} samples",
            index.len(),
            index.sample_count()
        ));
        progress.set_percentage(milestones::TESTS_LISTED);

        let header_row = format.header_row();
        let header = rows.get(header_row).map(Vec::as_slice).unwrap_or_default();
        let columns = ColumnMap::from_header(header, &parameters.data_columns_to_analytes);
        if columns.is_empty() {
            log::warn!(
                "No analyte columns recognised in {} (header: {})",
                file.name(),
                header.iter().map(|cell| cell.trim()).join(", ")
            );
        }

        let resolver = IdentityResolver::new(format);
        let mut classifier = QcClassifier::new(&parameters.qc_types);
        let mut readings = ReadingAccumulator::new();
        let mut rows_skipped = 0;

        for row in rows.iter().skip(header_row + 1) {
            if row.first().is_none_or(|first| first.trim().is_empty()) {
                continue;
            }
            let Some(identity) = resolver.identify(row) else {
                console.log("Skipping row without a sample identity");
                rows_skipped += 1;
                continue;
            };

            let class = classifier
                .classify(
                    &identity,
                    &index,
                    &mut self.sample_flags,
                    services.samples.as_ref(),
                    console,
                )
                .await;
            match &class {
                Classification::Unrecognized => {
                    console.log(&format!("Skipping unrecognized sample: {}", identity.token));
                    rows_skipped += 1;
                    continue;
                }
                Classification::FlaggedQc {
                    qc_type,
                    sample_id,
                    test_id,
                    ..
                } => console.log(&format!(
                    "Adding {qc_type} (test {test_id}, sample {sample_id}) to batch worksheet"
                )),
                Classification::Normal { .. } | Classification::NamedQc { .. } => {}
            }
            readings.record(&class, row, &columns);
        }
        progress.set_percentage(milestones::ROWS_CLASSIFIED);

        console.log("Updating test worksheets...");
        let writer = ReconciliationWriter::new(&services, &self.config);
        let merge = writer
            .merge_test_worksheets(
                &index,
                &mut self.sample_flags,
                &readings,
                &parameters.worksheet_analytes,
            )
            .await;
        progress.set_percentage(milestones::TESTS_MERGED);

        console.log("Updating batch worksheet...");
        writer.write_batch(&batch_id, readings.document()).await?;

        let summary = FileSummary {
            file_name: file.name().to_string(),
            batch_id,
            rows_recorded: readings.rows(),
            rows_skipped,
            qc_entries: readings.document().control_data.len(),
            merge,
        };
        log_file_complete(
            file.name(),
            summary.rows_recorded,
            summary.rows_skipped,
            started.elapsed(),
        );
        Ok(summary)
    }
}
