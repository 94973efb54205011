//! Thin wrapper over `sounding-ingest` for the CLI's `ingest` subcommand:
//! loads a batch, submits it in order, flushes, and reports the tally.

use std::path::Path;

use anyhow::Result;
use mapsheet_core::MapSheet;
use sounding_ingest::{IngestSummary, Ingester};
use storage::BackingStore;
use tracing::info;

pub fn ingest_file<S: BackingStore + Clone>(sheet: &mut MapSheet<S>, path: &Path) -> Result<IngestSummary> {
    let summary = Ingester::ingest_path(sheet, path)?;
    info!(
        read = summary.read,
        applied = summary.applied,
        dropped = summary.dropped,
        "batch ingested"
    );
    Ok(summary)
}
