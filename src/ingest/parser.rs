//! Instrument file reading and row splitting

use std::path::{Path, PathBuf};

use crate::config::FileFormat;
use crate::error::{IngestError, Result};

/// One delimited row of an instrument export
pub type Row = Vec<String>;

#[derive(Debug, Clone)]
enum FileSource {
    Path(PathBuf),
    Memory(Vec<u8>),
}

/// An uploaded instrument export
#[derive(Debug, Clone)]
pub struct InstrumentFile {
    name: String,
    source: FileSource,
}

impl InstrumentFile {
    /// A file on disk, named after its final path component
    #[must_use]
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self {
            name,
            source: FileSource::Path(path),
        }
    }

    /// A file already held in memory
    #[must_use]
    pub fn in_memory(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            source: FileSource::Memory(content.into()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Batch the file belongs to: the lower-cased file name without extension
    #[must_use]
    pub fn batch_id(&self) -> String {
        let stem = Path::new(&self.name)
            .file_stem()
            .map_or_else(|| self.name.clone(), |s| s.to_string_lossy().into_owned());
        stem.to_lowercase()
    }

    /// Read the whole file as text
    ///
    /// Bytes that are not valid UTF-8 are read one character per byte, the way
    /// a binary string read treats them.
    pub async fn read_text(&self) -> Result<String> {
        let bytes = match &self.source {
            FileSource::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|e| IngestError::parse(&self.name, e))?,
            FileSource::Memory(bytes) => bytes.clone(),
        };
        Ok(String::from_utf8(bytes)
            .unwrap_or_else(|e| e.into_bytes().into_iter().map(char::from).collect()))
    }
}

/// Split text into rows of fields
///
/// Carriage returns are stripped from the end of each line and from the first
/// field, so CRLF exports parse like LF ones.
#[must_use]
pub fn parse_rows(text: &str, delimiter: char) -> Vec<Row> {
    text.split('\n')
        .map(|line| {
            let mut fields: Row = line
                .trim_end_matches('\r')
                .split(delimiter)
                .map(str::to_string)
                .collect();
            if let Some(first) = fields.first_mut() {
                let stripped = first.trim_end_matches('\r').len();
                first.truncate(stripped);
            }
            fields
        })
        .collect()
}

/// Read and split an instrument file according to its format
pub async fn parse_file(file: &InstrumentFile, format: FileFormat) -> Result<Vec<Row>> {
    let text = file.read_text().await?;
    let rows = parse_rows(&text, format.delimiter());
    log::debug!("Parsed {} rows from {}", rows.len(), file.name());
    Ok(rows)
}
