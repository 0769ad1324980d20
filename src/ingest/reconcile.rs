//! Write-back of accumulated readings
//!
//! Per-test worksheets are merged sample by sample, each write awaited before
//! the next begins, and a failed sample does not stop the others. The batch
//! worksheet patch is written last and its failure is returned to the caller.

use crate::config::IngestConfig;
use crate::error::Result;
use crate::ingest::identity::{SampleFlagCache, TestIndex};
use crate::ingest::readings::ReadingAccumulator;
use crate::models::{InstrumentResults, SampleId, TestId, TestWorksheet, WorksheetDocument};
use crate::services::Services;

/// Outcome of the per-test merge of one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Test worksheets written
    pub written: usize,
    /// Test worksheets whose fetch or write failed
    pub failed: usize,
    /// Samples skipped because they are QC samples
    pub skipped_qc: usize,
}

/// Overlay new readings onto stored instrument results
///
/// Only the `(analyte, test)` pairs present in `readings` change; every other
/// stored reading is kept. Aggregate analytes are never written.
pub fn merge_readings(
    results: &mut InstrumentResults,
    analytes: &[String],
    tests: &[TestId],
    readings: &ReadingAccumulator,
    config: &IngestConfig,
) {
    for analyte in analytes.iter().filter(|a| !config.is_aggregate(a)) {
        results.ensure_analyte(analyte);
        for &test_id in tests {
            if let Some(value) = readings.reading(analyte, test_id) {
                results.overlay(analyte, test_id, value);
            }
        }
    }
}

/// Writes one file's readings back to the store
pub struct ReconciliationWriter<'a> {
    services: &'a Services,
    config: &'a IngestConfig,
}

impl<'a> ReconciliationWriter<'a> {
    #[must_use]
    pub const fn new(services: &'a Services, config: &'a IngestConfig) -> Self {
        Self { services, config }
    }

    /// Merge new readings into the worksheet of every sample that has any
    ///
    /// Each sample's worksheet lives on its first test. QC samples are skipped.
    pub async fn merge_test_worksheets(
        &self,
        index: &TestIndex,
        flags: &mut SampleFlagCache,
        readings: &ReadingAccumulator,
        analytes: &[String],
    ) -> MergeSummary {
        let console = self.services.console.as_ref();
        let mut summary = MergeSummary::default();

        for (sample_id, tests) in index.samples() {
            let Some(&target) = tests.first() else {
                continue;
            };
            if !tests.iter().any(|&t| readings.has_readings(t)) {
                continue;
            }
            if flags
                .is_qc(sample_id, self.services.samples.as_ref(), console)
                .await
            {
                console.log(&format!(
                    "Skipping test worksheet update for QC sample {sample_id}"
                ));
                summary.skipped_qc += 1;
                continue;
            }

            match self.merge_sample(sample_id, target, tests, readings, analytes).await {
                Ok(()) => {
                    console.log(&format!("Test worksheet updated for sample {sample_id}"));
                    summary.written += 1;
                }
                Err(e) => {
                    log::warn!("Test worksheet update failed for sample {sample_id}: {e}");
                    console.log(&format!(
                        "Error updating test worksheet for sample {sample_id}: {e}"
                    ));
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    async fn merge_sample(
        &self,
        sample_id: SampleId,
        target: TestId,
        tests: &[TestId],
        readings: &ReadingAccumulator,
        analytes: &[String],
    ) -> Result<()> {
        let context = format!("test {target} (sample {sample_id})");
        let fields = self
            .services
            .tests
            .fetch_worksheet(target)
            .await
            .map_err(|e| e.into_persistence(&format!("Error fetching worksheet of {context}")))?;

        let mut worksheet = TestWorksheet::from_fields(fields);
        merge_readings(
            &mut worksheet.instrument_results,
            analytes,
            tests,
            readings,
            self.config,
        );

        let document = worksheet
            .into_fields()
            .map_err(|e| e.into_persistence(&format!("Error encoding worksheet of {context}")))?;
        self.services
            .tests
            .update_worksheet(target, document, self.config.run_worksheet_calculations)
            .await
            .map_err(|e| e.into_persistence(&format!("Error updating worksheet of {context}")))
    }

    /// Submit the batch worksheet patch
    pub async fn write_batch(&self, batch_id: &str, document: &WorksheetDocument) -> Result<()> {
        let patch = document.to_patch()?;
        self.services
            .batches
            .patch_worksheet(batch_id, &patch)
            .await
            .map_err(|e| e.into_persistence(&format!("Error updating batch worksheet {batch_id}")))?;
        self.services
            .console
            .log(&format!("Batch worksheet updated for batch {batch_id}"));
        Ok(())
    }
}
