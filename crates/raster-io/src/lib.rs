//! The OMG1/R4 on-disk raster collaborator: a 1024-byte
//! fixed header followed by raw big-endian samples, used by the CLI and
//! `storage::PersistenceLayer` for mapsheet initialization I/O. Not
//! part of the core engine.

pub mod header;
pub mod raster;

pub use header::{DisplayHints, RasterHeader, RotationKind, SampleType, HEADER_LEN};
pub use raster::{Raster, RasterSamples};
