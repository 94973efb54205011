//! The unified error hierarchy shared across every crate in
//! the workspace. Individual crates may keep a narrower local error type
//! for I/O details, but anything crossing a crate boundary converts into
//! one of these five kinds.

use thiserror::Error;

/// The five error kinds shared across the workspace.
#[derive(Error, Debug)]
pub enum MapSheetError {
    /// Invalid grid geometry, unsupported projection, inconsistent tile
    /// size vs. grid size, or an operation attempted against the wrong
    /// algorithm selector.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Backing-store I/O failure, malformed or version-mismatched
    /// header, or a truncated tile file.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Tile or grid allocation failure.
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    /// An invalid parameter value rejected at configuration time.
    /// (A sounding outside the sheet bounds is *not* this variant — it
    /// is silently dropped, not surfaced as an error.)
    #[error("invalid input: {0}")]
    Input(String),

    /// A call that requires a particular estimator variant was made
    /// against a MapSheet configured with a different one.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl MapSheetError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    pub fn out_of_memory(msg: impl Into<String>) -> Self {
        Self::OutOfMemory(msg.into())
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }
}

impl From<std::io::Error> for MapSheetError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Result type used across the workspace.
pub type Result<T> = std::result::Result<T, MapSheetError>;
