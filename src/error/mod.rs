//! Error handling for worksheet ingestion.

use std::io;

/// Errors raised while ingesting an instrument file
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The uploaded file could not be read
    #[error("Parse error in {file}: {message}")]
    Parse {
        /// Name of the file being parsed
        file: String,
        /// What went wrong
        message: String,
    },

    /// A batch, parameter set or test listing could not be fetched
    #[error("Lookup error: {0}")]
    Lookup(String),

    /// A worksheet document could not be written
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Raw failure reported by a service implementation
    #[error("Service error: {0}")]
    Service(String),

    /// JSON encode/decode failure at the document-store boundary
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Error opening or reading a file
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl IngestError {
    /// Create a parse error for the named file
    pub fn parse(file: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            file: file.into(),
            message: message.to_string(),
        }
    }

    /// Create a service error
    pub fn service(message: impl Into<String>) -> Self {
        Self::Service(message.into())
    }

    /// Wrap this error as a lookup failure with context
    #[must_use]
    pub fn into_lookup(self, context: &str) -> Self {
        Self::Lookup(format!("{context}: {self}"))
    }

    /// Wrap this error as a persistence failure with context
    #[must_use]
    pub fn into_persistence(self, context: &str) -> Self {
        Self::Persistence(format!("{context}: {self}"))
    }
}

/// Result type for ingestion operations
pub type Result<T> = std::result::Result<T, IngestError>;
