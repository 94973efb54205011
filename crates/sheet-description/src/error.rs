use mapsheet_common::error::MapSheetError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DescriptionError {
    #[error("unexpected end of input while parsing {0}")]
    UnexpectedEof(&'static str),

    #[error("expected {expected}, found {found:?}")]
    Unexpected {
        expected: &'static str,
        found: String,
    },

    #[error("unknown projection type {0:?}")]
    UnknownProjectionType(String),

    #[error("unknown unit {0:?}")]
    UnknownUnit(String),

    #[error("missing required field {0:?} in {1} block")]
    MissingField(&'static str, &'static str),

    #[error("sheet block must specify either `location` (center+size) or `bounds`, not both or neither")]
    AmbiguousExtent,
}

impl From<DescriptionError> for MapSheetError {
    fn from(err: DescriptionError) -> Self {
        MapSheetError::configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, DescriptionError>;
