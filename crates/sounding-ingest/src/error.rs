//! Errors for the ingestion crate.

use thiserror::Error;

/// Errors that can occur while reading or submitting soundings.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to read sounding source: {0}")]
    Source(#[from] std::io::Error),

    #[error("malformed sounding record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error(transparent)]
    MapSheet(#[from] mapsheet_common::error::MapSheetError),
}

pub type Result<T> = std::result::Result<T, IngestError>;
