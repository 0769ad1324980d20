//! Worksheet documents
//!
//! `WorksheetDocument` is the per-file batch worksheet assembled while rows
//! are read. `TestWorksheet` is the persisted per-test document; its
//! instrument results are stored as encoded JSON inside the document and are
//! decoded here, at the store boundary, into [`InstrumentResults`].

use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use super::lab::{SampleId, TestId};
use crate::error::Result;

/// Field of the per-test document holding the encoded instrument results
pub const INSTRUMENT_RESULTS_FIELD: &str = "ws_instrument_results";

/// QC type assigned to a flagged sample's spiked row
pub const MATRIX_SPIKE: &str = "matrix_spike";

/// QC type assigned to a flagged sample's unspiked row
pub const MATRIX_BLANK: &str = "matrix_blank";

/// Entry of the batch worksheet's `testing_file_order`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OrderEntry {
    /// A genuine sample test
    Test(TestId),
    /// A QC entry key
    Qc(String),
}

/// A control measurement recorded on the batch worksheet
#[derive(Debug, Clone, PartialEq)]
pub struct QcEntry {
    /// QC type name (`matrix_spike`, `matrix_blank` or a configured type)
    pub qc_type: String,
    /// Owning sample, for flagged QC samples
    pub sample_id: Option<SampleId>,
    /// Source test, for flagged QC samples
    pub test_id: Option<TestId>,
    /// Raw reading per analyte code
    pub readings: BTreeMap<String, f64>,
}

impl QcEntry {
    /// A QC entry matched by configured type name
    #[must_use]
    pub fn named(qc_type: impl Into<String>) -> Self {
        Self {
            qc_type: qc_type.into(),
            sample_id: None,
            test_id: None,
            readings: BTreeMap::new(),
        }
    }

    /// A QC entry derived from a flagged sample's test
    #[must_use]
    pub fn flagged(qc_type: impl Into<String>, sample_id: SampleId, test_id: TestId) -> Self {
        Self {
            qc_type: qc_type.into(),
            sample_id: Some(sample_id),
            test_id: Some(test_id),
            readings: BTreeMap::new(),
        }
    }
}

// Readings are written flat, as `<analyte>_raw`, next to the entry metadata.
impl Serialize for QcEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("qc_type", &self.qc_type)?;
        if let Some(sample_id) = self.sample_id {
            map.serialize_entry("sample_id", &sample_id)?;
        }
        if let Some(test_id) = self.test_id {
            map.serialize_entry("test_id", &test_id)?;
        }
        for (analyte, value) in &self.readings {
            map.serialize_entry(&format!("{analyte}_raw"), &reading_value(*value))?;
        }
        map.end()
    }
}

/// Per-file batch worksheet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorksheetDocument {
    /// Processed entries in row-encounter order
    pub testing_file_order: Vec<OrderEntry>,
    /// QC entries by key
    pub control_data: BTreeMap<String, QcEntry>,
}

impl WorksheetDocument {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a test appears in the file order
    #[must_use]
    pub fn contains_test(&self, test_id: TestId) -> bool {
        self.testing_file_order.contains(&OrderEntry::Test(test_id))
    }

    /// Encode into the patch submitted to the batch worksheet
    pub fn to_patch(&self) -> Result<BatchWorksheetPatch> {
        Ok(BatchWorksheetPatch {
            testing_file_order: serde_json::to_string(&self.testing_file_order)?,
            control_data: serde_json::to_string(&self.control_data)?,
        })
    }
}

/// Batch worksheet patch payload, with both fields as encoded JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWorksheetPatch {
    /// Encoded list of test ids and QC keys
    pub testing_file_order: String,
    /// Encoded map of QC key to entry
    pub control_data: String,
}

/// Stored form of one reading
///
/// Whole numbers are written as JSON integers (`2`, not `2.0`), matching what
/// the worksheet UI writes for the same reading.
#[must_use]
pub fn reading_value(value: f64) -> Value {
    const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() < MAX_EXACT_INT {
        Value::from(value as i64)
    } else {
        Value::from(value)
    }
}

/// Instrument readings of a test worksheet: analyte code -> test id -> value
///
/// Stored values are kept as JSON. Entries this crate never writes (`null`,
/// `"ND"`, anything the worksheet UI saved) survive a merge untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstrumentResults(pub Map<String, Value>);

impl InstrumentResults {
    /// Decode the stored field value
    ///
    /// Accepts `{"value": "<json>"}` or a bare encoded string. Only an absent
    /// field, text that is not JSON, or JSON that is not an object decodes as
    /// empty.
    #[must_use]
    pub fn decode(field: Option<&Value>) -> Self {
        let encoded = match field {
            Some(Value::Object(wrapper)) => wrapper.get("value").and_then(Value::as_str),
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        };
        let Some(encoded) = encoded.filter(|s| !s.trim().is_empty()) else {
            return Self::default();
        };
        match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Object(results)) => Self(results),
            Ok(Value::Null) => Self::default(),
            Ok(other) => {
                log::warn!("Ignoring {INSTRUMENT_RESULTS_FIELD} that is not an object: {other}");
                Self::default()
            }
            Err(e) => {
                log::warn!("Discarding unparseable {INSTRUMENT_RESULTS_FIELD}: {e}");
                Self::default()
            }
        }
    }

    /// Encode into the stored field value
    pub fn encode(&self) -> Result<Value> {
        let encoded = serde_json::to_string(self)?;
        let mut wrapper = Map::new();
        wrapper.insert("value".to_string(), Value::String(encoded));
        Ok(Value::Object(wrapper))
    }

    /// Make sure an analyte has an entry, leaving existing readings alone
    ///
    /// An absent or `null` entry becomes an empty map; any other stored value
    /// is kept.
    pub fn ensure_analyte(&mut self, analyte: &str) {
        let entry = self.0.entry(analyte.to_string()).or_insert(Value::Null);
        if entry.is_null() {
            *entry = Value::Object(Map::new());
        }
    }

    /// Set one reading, leaving every other reading alone
    ///
    /// An analyte entry that is not a map cannot hold readings and is
    /// replaced by one.
    pub fn overlay(&mut self, analyte: &str, test_id: TestId, value: f64) {
        let entry = self
            .0
            .entry(analyte.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            log::debug!("Replacing non-map {INSTRUMENT_RESULTS_FIELD} entry for {analyte}");
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(by_test) = entry {
            by_test.insert(test_id.to_string(), reading_value(value));
        }
    }

    /// Numeric reading of an analyte for a test
    #[must_use]
    pub fn get(&self, analyte: &str, test_id: TestId) -> Option<f64> {
        self.raw(analyte, test_id).and_then(Value::as_f64)
    }

    /// Stored value of an analyte for a test, whatever its type
    #[must_use]
    pub fn raw(&self, analyte: &str, test_id: TestId) -> Option<&Value> {
        self.0
            .get(analyte)
            .and_then(|by_test| by_test.get(test_id.to_string().as_str()))
    }
}

/// Persisted per-test worksheet document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestWorksheet {
    /// Every other field of the document, kept verbatim
    pub fields: Map<String, Value>,
    /// Decoded instrument results
    pub instrument_results: InstrumentResults,
}

impl TestWorksheet {
    /// Split a fetched document into its fields and decoded results
    #[must_use]
    pub fn from_fields(mut fields: Map<String, Value>) -> Self {
        let instrument_results = InstrumentResults::decode(fields.get(INSTRUMENT_RESULTS_FIELD));
        fields.remove(INSTRUMENT_RESULTS_FIELD);
        Self {
            fields,
            instrument_results,
        }
    }

    /// Reassemble the document for write-back
    pub fn into_fields(self) -> Result<Map<String, Value>> {
        let mut fields = self.fields;
        fields.insert(
            INSTRUMENT_RESULTS_FIELD.to_string(),
            self.instrument_results.encode()?,
        );
        Ok(fields)
    }
}
