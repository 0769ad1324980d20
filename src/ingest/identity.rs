//! Sample identity resolution
//!
//! A data row names its sample through an identity field such as `101_A` or
//! `205-spk_B`. The token before the first underscore is matched against the
//! batch's tests; the sample owning a matched test is then checked for its QC
//! flag.

use std::collections::BTreeMap;

use futures::{StreamExt, TryStreamExt, stream};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::FileFormat;
use crate::error::{IngestError, Result};
use crate::models::{SampleId, Test, TestId};
use crate::services::{Console, SampleService, TestService};

/// Identity of one data row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityToken {
    /// Identity field up to the first underscore
    pub token: String,
    /// Test id the token names, if it starts with an integer
    pub candidate: Option<TestId>,
    /// Whether the token carries the spike qualifier
    pub spiked: bool,
}

impl IdentityToken {
    /// Parse an identity field
    ///
    /// Returns `None` for a blank field.
    #[must_use]
    pub fn parse(field: &str, spike_qualifier: Option<&str>) -> Option<Self> {
        let field = field.trim();
        let token = field.split('_').next().unwrap_or(field).trim();
        if token.is_empty() {
            return None;
        }

        let (spiked, bare) = match spike_qualifier {
            Some(qualifier) if token.contains(qualifier) => (true, token.replacen(qualifier, "", 1)),
            _ => (false, token.to_string()),
        };

        Some(Self {
            token: token.to_string(),
            candidate: leading_integer(&bare),
            spiked,
        })
    }
}

/// Integer prefix of a string, ignoring leading whitespace
fn leading_integer(s: &str) -> Option<u64> {
    let s = s.trim_start();
    let s = s.strip_prefix('+').unwrap_or(s);
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[..end].parse().ok()
}

/// Extracts row identities for one file format
#[derive(Debug, Clone, Copy)]
pub struct IdentityResolver {
    identity_column: usize,
    spike_qualifier: Option<&'static str>,
}

impl IdentityResolver {
    #[must_use]
    pub const fn new(format: FileFormat) -> Self {
        Self {
            identity_column: format.identity_column(),
            spike_qualifier: format.spike_qualifier(),
        }
    }

    /// Identity of a data row, if its identity field is present and non-blank
    #[must_use]
    pub fn identify(&self, row: &[String]) -> Option<IdentityToken> {
        row.get(self.identity_column)
            .and_then(|field| IdentityToken::parse(field, self.spike_qualifier))
    }
}

/// Every test of a batch, indexed by id and by owning sample
#[derive(Debug, Clone, Default)]
pub struct TestIndex {
    ids: FxHashSet<TestId>,
    owners: FxHashMap<TestId, SampleId>,
    by_sample: BTreeMap<SampleId, Vec<TestId>>,
}

impl TestIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one listing page into the index
    pub fn add_page(&mut self, tests: &[Test]) {
        for test in tests {
            if !self.ids.insert(test.id) {
                continue;
            }
            self.owners.insert(test.id, test.sample_id());
            self.by_sample.entry(test.sample_id()).or_default().push(test.id);
        }
    }

    /// Build the index from every page of a batch's test listing
    ///
    /// All pages are fetched, in order, before the index is returned.
    pub async fn fetch(tests: &dyn TestService, batch_id: &str) -> Result<Self> {
        let lookup = move |page: u32| async move {
            tests.list_tests(batch_id, page).await.map_err(|e| {
                e.into_lookup(&format!("Error fetching tests page {page} for batch {batch_id}"))
            })
        };

        let first = lookup(1).await?;
        let mut index = Self::new();
        index.add_page(&first.tests);

        let remaining: Vec<_> = stream::iter(2..=first.total_pages)
            .then(lookup)
            .try_collect()
            .await?;
        for page in &remaining {
            index.add_page(&page.tests);
        }

        log::debug!(
            "Indexed {} tests across {} samples ({} pages) for batch {batch_id}",
            index.len(),
            index.sample_count(),
            first.total_pages.max(1)
        );
        Ok(index)
    }

    #[must_use]
    pub fn contains(&self, test_id: TestId) -> bool {
        self.ids.contains(&test_id)
    }

    /// Sample owning a test
    #[must_use]
    pub fn sample_of(&self, test_id: TestId) -> Option<SampleId> {
        self.owners.get(&test_id).copied()
    }

    /// Tests of a sample, in listing order
    #[must_use]
    pub fn tests_of(&self, sample_id: SampleId) -> &[TestId] {
        self.by_sample
            .get(&sample_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Samples with their tests, ordered by sample id
    pub fn samples(&self) -> impl Iterator<Item = (SampleId, &[TestId])> {
        self.by_sample.iter().map(|(&id, tests)| (id, tests.as_slice()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.by_sample.len()
    }
}

/// QC flags of samples, fetched once each and kept for the whole run
#[derive(Debug, Clone, Default)]
pub struct SampleFlagCache {
    flags: FxHashMap<SampleId, bool>,
}

impl SampleFlagCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached flag, without fetching
    #[must_use]
    pub fn cached(&self, sample_id: SampleId) -> Option<bool> {
        self.flags.get(&sample_id).copied()
    }

    /// Whether a sample is a QC sample, fetching it on first reference
    ///
    /// A failed fetch counts as "not QC" and is cached as such.
    pub async fn is_qc(
        &mut self,
        sample_id: SampleId,
        samples: &dyn SampleService,
        console: &dyn Console,
    ) -> bool {
        if let Some(flag) = self.cached(sample_id) {
            return flag;
        }

        let flag = match samples.get_sample(sample_id).await {
            Ok(sample) => {
                if sample.qc_flag {
                    console.log(&format!(
                        "Sample {sample_id} is a QC sample (matrix blank/spike)"
                    ));
                }
                sample.qc_flag
            }
            Err(e) => {
                warn_sample_unavailable(sample_id, &e, console);
                false
            }
        };
        self.flags.insert(sample_id, flag);
        flag
    }
}

fn warn_sample_unavailable(sample_id: SampleId, error: &IngestError, console: &dyn Console) {
    log::warn!("Could not fetch sample {sample_id}, treating it as non-QC: {error}");
    console.log(&format!("Warning: Could not fetch sample {sample_id}: {error}"));
}
