//! Shared types for the MapSheet workspace.
//!
//! This crate holds only what needs to cross crate boundaries: projected
//! bounds, the invalid-data sentinels published by the core, a plain
//! seconds-since-epoch timestamp, and the unified error hierarchy.
//! Everything else (tiles, hypotheses, projections, raster headers)
//! lives in the crate that owns that concept.

pub mod bounds;
pub mod error;
pub mod sentinel;
pub mod time;

pub use bounds::ProjectedBounds;
pub use error::{MapSheetError, Result};
pub use sentinel::{invalid_f32, Sentinel, SentinelValue};
pub use time::Timestamp;
