//! Batch sounding ingestion: record
//! gating is `mapsheet-core`'s own (`Gates`/`SoundingDispatcher`), so
//! this crate is only responsible for reading an ordered batch of
//! sounding records from a minimal line-oriented source and submitting
//! them to a `MapSheet` one at a time, in order.

pub mod error;
pub mod ingester;
pub mod source;

pub use error::{IngestError, Result};
pub use ingester::{IngestSummary, Ingester};
pub use source::{parse_line, SoundingLines};
