//! Reading accumulation
//!
//! Numeric cells of every classified row are collected here: genuine sample
//! readings by test and analyte, QC readings inside the batch worksheet's
//! control data.

use std::collections::BTreeMap;

use crate::ingest::classify::Classification;
use crate::ingest::columns::ColumnMap;
use crate::models::{QcEntry, TestId, WorksheetDocument};

/// Significant figures kept for every reading
pub const SIG_FIGS: usize = 5;

/// Value recorded for empty or non-numeric cells
pub const DEFAULT_READING: f64 = 0.0;

/// Precision that prints any finite `f64` without rounding
const EXACT_DIGITS: usize = 800;

/// Round a value to `digits` significant figures, ties away from zero
///
/// Rounding is decided on the exact decimal expansion of the value, so a
/// double that is exactly halfway (`1.03125` at five figures) rounds up in
/// magnitude while one just below a tie (`2.00005`) rounds down.
#[must_use]
pub fn round_sig_figs(value: f64, digits: usize) -> f64 {
    if value == 0.0 || !value.is_finite() || digits == 0 {
        return value;
    }
    let digits = digits.min(17);

    let exact = format!("{:.*e}", EXACT_DIGITS, value.abs());
    let Some((mantissa, exponent)) = exact.split_once('e') else {
        return value;
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return value;
    };
    let figures: Vec<u8> = mantissa
        .bytes()
        .filter(u8::is_ascii_digit)
        .map(|b| b - b'0')
        .collect();

    let mut kept = figures
        .iter()
        .take(digits)
        .fold(0_u64, |acc, &d| acc * 10 + u64::from(d));
    if figures.get(digits).is_some_and(|&d| d >= 5) {
        kept += 1;
    }

    let shift = exponent - (digits as i32 - 1);
    format!("{kept}e{shift}")
        .parse::<f64>()
        .map_or(value, |rounded| rounded.copysign(value))
}

/// Parse a cell as a reading
///
/// Empty, non-numeric and non-finite cells read as [`DEFAULT_READING`].
#[must_use]
pub fn to_float(cell: &str) -> f64 {
    cell.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map_or(DEFAULT_READING, |v| round_sig_figs(v, SIG_FIGS))
}

/// Readings of one file
#[derive(Debug, Clone, Default)]
pub struct ReadingAccumulator {
    document: WorksheetDocument,
    readings: BTreeMap<TestId, BTreeMap<String, f64>>,
}

impl ReadingAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a classified row
    ///
    /// Every recorded row appends its key to the file order, repeats included.
    /// Mapped columns beyond the end of the row are left out.
    pub fn record(&mut self, class: &Classification, row: &[String], columns: &ColumnMap) {
        let Some(entry) = class.order_entry() else {
            return;
        };
        self.document.testing_file_order.push(entry);

        let cells = columns
            .iter()
            .filter_map(|(position, analyte)| row.get(position).map(|cell| (analyte, to_float(cell))));

        match class {
            Classification::Normal { test_id } => {
                let by_analyte = self.readings.entry(*test_id).or_default();
                for (analyte, value) in cells {
                    by_analyte.insert(analyte.to_string(), value);
                }
            }
            Classification::FlaggedQc {
                key,
                qc_type,
                sample_id,
                test_id,
            } => {
                let mut entry = QcEntry::flagged(*qc_type, *sample_id, *test_id);
                entry.readings = cells.map(|(a, v)| (a.to_string(), v)).collect();
                self.document.control_data.insert(key.clone(), entry);
            }
            Classification::NamedQc { key, qc_type } => {
                let mut entry = QcEntry::named(qc_type.clone());
                entry.readings = cells.map(|(a, v)| (a.to_string(), v)).collect();
                self.document.control_data.insert(key.clone(), entry);
            }
            Classification::Unrecognized => {}
        }
    }

    /// Reading of an analyte for a test
    #[must_use]
    pub fn reading(&self, analyte: &str, test_id: TestId) -> Option<f64> {
        self.readings
            .get(&test_id)
            .and_then(|by_analyte| by_analyte.get(analyte))
            .copied()
    }

    #[must_use]
    pub fn has_readings(&self, test_id: TestId) -> bool {
        self.readings.contains_key(&test_id)
    }

    /// Tests with at least one recorded row
    pub fn tests(&self) -> impl Iterator<Item = TestId> + '_ {
        self.readings.keys().copied()
    }

    #[must_use]
    pub fn document(&self) -> &WorksheetDocument {
        &self.document
    }

    /// Number of rows recorded
    #[must_use]
    pub fn rows(&self) -> usize {
        self.document.testing_file_order.len()
    }
}
