//! Header-to-analyte column mapping

use std::collections::{BTreeMap, HashMap};

/// Column position to analyte code, built once per file from its header row
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: BTreeMap<usize, String>,
}

impl ColumnMap {
    /// Map every header cell whose trimmed label is in `labels`
    ///
    /// Cells without an exact match (sample names, timestamps, ...) are not
    /// analyte columns and are ignored.
    #[must_use]
    pub fn from_header(header: &[String], labels: &HashMap<String, String>) -> Self {
        let columns = header
            .iter()
            .enumerate()
            .filter_map(|(position, cell)| {
                let label = cell.trim();
                match labels.get(label) {
                    Some(analyte) => Some((position, analyte.clone())),
                    None => {
                        log::trace!("Header column {position} ({label:?}) is not an analyte");
                        None
                    }
                }
            })
            .collect();
        Self { columns }
    }

    /// Analyte mapped at a position
    #[must_use]
    pub fn analyte(&self, position: usize) -> Option<&str> {
        self.columns.get(&position).map(String::as_str)
    }

    /// Mapped `(position, analyte)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.columns.iter().map(|(&pos, analyte)| (pos, analyte.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}
