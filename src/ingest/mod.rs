//! Instrument file ingestion
//!
//! Each file flows through parsing, column mapping, identity resolution,
//! QC classification and reading accumulation before its readings are
//! reconciled with the stored test and batch worksheets.

pub mod classify;
pub mod columns;
pub mod identity;
pub mod parser;
pub mod pipeline;
pub mod readings;
pub mod reconcile;

pub use classify::{Classification, QcClassifier};
pub use columns::ColumnMap;
pub use identity::{IdentityResolver, IdentityToken, SampleFlagCache, TestIndex};
pub use parser::{InstrumentFile, Row, parse_file, parse_rows};
pub use pipeline::{FileOutcome, FileSummary, IngestPipeline, ParameterCache, RunReport};
pub use readings::{ReadingAccumulator, round_sig_figs, to_float};
pub use reconcile::{MergeSummary, ReconciliationWriter, merge_readings};
