//! The MapSheet gridded depth-estimation engine.
//!
//! `mapsheet-core` has no knowledge of wire formats, sounding files, or
//! ASCII sheet descriptions — those live in `sounding-ingest`,
//! `sheet-description`, and `raster-io` respectively. This crate owns
//! only the CUBE-style hypothesis tracker, the tiled backing-store
//! cache, the IDW sounding dispatcher, hypothesis disambiguation, and
//! raster/AOI assembly.

pub mod algorithm;
pub mod assembler;
pub mod cache;
pub mod config;
pub mod disambiguator;
pub mod dispatcher;
pub mod hypothesis;
pub mod mapsheet;
pub mod node;
pub mod persistence;
pub mod tile;
pub mod types;

pub use algorithm::Algorithm;
pub use assembler::{Layer, LayerGrid, SurfaceAssembler};
pub use cache::{CacheStats, TileCache};
pub use config::Parameters;
pub use disambiguator::{Disambiguation, Disambiguator, DisambiguatorPolicy, LocaleNeighbor};
pub use dispatcher::{DispatchOutcome, Gates, Sounding, SoundingDispatcher};
pub use hypothesis::Hypothesis;
pub use mapsheet::MapSheet;
pub use node::{BinnedNode, HypothesisNode, NodeState};
pub use persistence::{MapSheetHeader, TileCodec};
pub use tile::{Tile, TileGrid};
pub use types::{Aoi, GridGeometry, HypoArray};
