//! Row classification
//!
//! Decides whether a data row is a genuine sample test, a QC entry derived
//! from a flagged sample (matrix spike/blank), or a named QC measurement such
//! as a calibration check, and assigns each the key it is recorded under.

use crate::ingest::identity::{IdentityToken, SampleFlagCache, TestIndex};
use crate::models::{MATRIX_BLANK, MATRIX_SPIKE, OrderEntry, SampleId, TestId};
use crate::services::{Console, SampleService};

/// Outcome of classifying one data row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A genuine analytical result for a batch test
    Normal {
        test_id: TestId,
    },
    /// A QC row produced from a flagged sample's own test
    FlaggedQc {
        key: String,
        qc_type: &'static str,
        sample_id: SampleId,
        test_id: TestId,
    },
    /// A QC row matched by configured type name
    NamedQc {
        key: String,
        qc_type: String,
    },
    /// Neither a batch test nor a known QC type
    Unrecognized,
}

impl Classification {
    /// Entry recorded in the file order, if the row is recorded at all
    #[must_use]
    pub fn order_entry(&self) -> Option<OrderEntry> {
        match self {
            Self::Normal { test_id } => Some(OrderEntry::Test(*test_id)),
            Self::FlaggedQc { key, .. } | Self::NamedQc { key, .. } => {
                Some(OrderEntry::Qc(key.clone()))
            }
            Self::Unrecognized => None,
        }
    }
}

/// Per-file row classifier
///
/// Holds one running counter per configured QC type, so a fresh classifier
/// is needed for every file.
#[derive(Debug, Clone)]
pub struct QcClassifier {
    qc_types: Vec<String>,
    lowered: Vec<String>,
    counters: Vec<usize>,
}

impl QcClassifier {
    /// Classifier for the given QC type names, in priority order
    ///
    /// Blank names would match every token and are dropped.
    #[must_use]
    pub fn new(qc_types: &[String]) -> Self {
        let qc_types: Vec<String> = qc_types
            .iter()
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .collect();
        let lowered = qc_types.iter().map(|t| t.to_lowercase()).collect();
        let counters = vec![0; qc_types.len()];
        Self {
            qc_types,
            lowered,
            counters,
        }
    }

    /// Classify a row by its identity
    ///
    /// A token naming a batch test is a sample row; whether it is a genuine
    /// sample or a matrix QC depends on the owning sample's QC flag. Any other
    /// token is matched case-insensitively against the QC type names, first
    /// configured match winning.
    pub async fn classify(
        &mut self,
        identity: &IdentityToken,
        index: &TestIndex,
        flags: &mut SampleFlagCache,
        samples: &dyn SampleService,
        console: &dyn Console,
    ) -> Classification {
        let known = identity
            .candidate
            .filter(|&id| index.contains(id))
            .and_then(|id| index.sample_of(id).map(|sample_id| (id, sample_id)));

        if let Some((test_id, sample_id)) = known {
            if !flags.is_qc(sample_id, samples, console).await {
                return Classification::Normal { test_id };
            }
            let qc_type = if identity.spiked { MATRIX_SPIKE } else { MATRIX_BLANK };
            return Classification::FlaggedQc {
                key: format!("{qc_type}_{test_id}"),
                qc_type,
                sample_id,
                test_id,
            };
        }

        self.classify_named(&identity.token)
    }

    /// Match a token against the configured QC type names
    pub fn classify_named(&mut self, token: &str) -> Classification {
        let token = token.to_lowercase();
        let Some(position) = self.lowered.iter().position(|t| token.contains(t.as_str())) else {
            return Classification::Unrecognized;
        };

        self.counters[position] += 1;
        let qc_type = self.qc_types[position].clone();
        Classification::NamedQc {
            key: format!("{qc_type}_{}", self.counters[position]),
            qc_type,
        }
    }
}
