//! Configuration for worksheet ingestion.

use std::path::Path;

/// Environment variable forcing the file format (`tab` or `csv`)
pub const FORMAT_ENV_VAR: &str = "WORKSHEET_INGEST_FORMAT";

/// Environment variable toggling downstream worksheet recalculation
pub const RECALCULATE_ENV_VAR: &str = "WORKSHEET_INGEST_RECALCULATE";

/// Instrument export layouts understood by the parser
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    /// Tab-delimited export, header on the first row, identity in column 1
    TabExport,
    /// Comma-delimited export with a three-line preamble, identity in column 0
    /// and a `-spk` suffix marking matrix spikes
    CsvExport,
}

impl FileFormat {
    /// Field delimiter
    #[must_use]
    pub const fn delimiter(self) -> char {
        match self {
            Self::TabExport => '\t',
            Self::CsvExport => ',',
        }
    }

    /// Index of the header row
    #[must_use]
    pub const fn header_row(self) -> usize {
        match self {
            Self::TabExport => 0,
            Self::CsvExport => 3,
        }
    }

    /// Index of the column carrying the sample identity
    #[must_use]
    pub const fn identity_column(self) -> usize {
        match self {
            Self::TabExport => 1,
            Self::CsvExport => 0,
        }
    }

    /// Suffix marking a matrix spike, if the format carries one
    #[must_use]
    pub const fn spike_qualifier(self) -> Option<&'static str> {
        match self {
            Self::TabExport => None,
            Self::CsvExport => Some("-spk"),
        }
    }

    /// Pick a format from a file name's extension
    #[must_use]
    pub fn detect(file_name: &str) -> Self {
        let is_csv = Path::new(file_name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
        if is_csv { Self::CsvExport } else { Self::TabExport }
    }

    /// Parse a format name as used in the environment
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "tab" | "tsv" | "txt" => Some(Self::TabExport),
            "csv" | "comma" => Some(Self::CsvExport),
            _ => None,
        }
    }
}

/// Configuration for an ingestion run
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Forced file format; `None` detects it from each file's extension
    pub format: Option<FileFormat>,
    /// Ask the store to rerun worksheet calculations after each test update
    pub run_worksheet_calculations: bool,
    /// Marker identifying synthetic aggregate analytes
    pub aggregate_marker: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            format: None,
            run_worksheet_calculations: true,
            aggregate_marker: "total".to_string(),
        }
    }
}

impl IngestConfig {
    /// Defaults overlaid with any settings found in the environment
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(format) = std::env::var(FORMAT_ENV_VAR)
            .ok()
            .and_then(|s| FileFormat::from_name(&s))
        {
            config.format = Some(format);
        }
        if let Some(recalculate) = std::env::var(RECALCULATE_ENV_VAR)
            .ok()
            .and_then(|s| parse_flag(&s))
        {
            config.run_worksheet_calculations = recalculate;
        }
        config
    }

    /// Format to use for the named file
    #[must_use]
    pub fn format_for(&self, file_name: &str) -> FileFormat {
        self.format.unwrap_or_else(|| FileFormat::detect(file_name))
    }

    /// Whether an analyte code names a synthetic aggregate
    #[must_use]
    pub fn is_aggregate(&self, analyte: &str) -> bool {
        analyte.contains(self.aggregate_marker.as_str())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
