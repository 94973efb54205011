//! Ordered submission of a sounding batch into a `MapSheet`: records are gated and submitted strictly in source order, one
//! at a time, exactly as `MapSheet::submit_sounding` requires.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use mapsheet_core::{DispatchOutcome, MapSheet};
use storage::BackingStore;
use tracing::{debug, info};

use crate::error::Result;
use crate::source::SoundingLines;

/// Tally of one ingestion run, surfaced for logging/CLI reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub read: u64,
    pub applied: u64,
    pub dropped: u64,
}

/// Reads a line-oriented sounding source and submits every record to
/// `sheet` in order.
pub struct Ingester;

impl Ingester {
    /// Ingest every record from `reader`, stopping at the first
    /// malformed line.
    pub fn ingest<S: BackingStore + Clone>(
        sheet: &mut MapSheet<S>,
        reader: impl BufRead,
    ) -> Result<IngestSummary> {
        let mut summary = IngestSummary::default();
        for record in SoundingLines::new(reader) {
            let sounding = record?;
            summary.read += 1;
            match sheet.submit_sounding(&sounding)? {
                DispatchOutcome::Applied { nodes_touched } => {
                    debug!(nodes_touched, "sounding applied");
                    summary.applied += 1;
                }
                DispatchOutcome::Dropped => {
                    summary.dropped += 1;
                }
            }
        }
        info!(
            read = summary.read,
            applied = summary.applied,
            dropped = summary.dropped,
            "ingestion complete"
        );
        Ok(summary)
    }

    pub fn ingest_str<S: BackingStore + Clone>(
        sheet: &mut MapSheet<S>,
        text: &str,
    ) -> Result<IngestSummary> {
        Self::ingest(sheet, text.as_bytes())
    }

    pub fn ingest_path<S: BackingStore + Clone>(
        sheet: &mut MapSheet<S>,
        path: impl AsRef<Path>,
    ) -> Result<IngestSummary> {
        let file = File::open(path)?;
        Self::ingest(sheet, BufReader::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapsheet_common::ProjectedBounds;
    use mapsheet_core::{Algorithm, GridGeometry, Parameters};
    use projection::{Ellipsoid, ProjectionContext};

    #[test]
    fn ingests_a_batch_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let geometry = GridGeometry::new(10, 10, 1.0, 1.0, ProjectedBounds::new(0.0, 0.0, 10.0, 10.0));
        let projection = ProjectionContext::utm(31, true, Ellipsoid::WGS84).unwrap();
        let mut sheet = MapSheet::create_at(
            dir.path(),
            projection,
            geometry,
            Parameters {
                dispatcher_influence_radius: 1.0,
                ..Parameters::default()
            },
        )
        .unwrap();
        sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();

        let text = "\
# comment
5.0 5.0 40.0 1.0 0.0 0.0 0.0 0.0
5.0 5.0 44.0 1.0 0.0 0.0 0.0 1.0
";
        let summary = Ingester::ingest_str(&mut sheet, text).unwrap();
        assert_eq!(summary.read, 2);
        assert_eq!(summary.applied, 2);

        let hypos = sheet.hypotheses_at(5, 5).unwrap();
        assert_eq!(hypos.hypotheses.len(), 1);
        assert!((hypos.hypotheses[0].0 - 42.0).abs() < 1e-6);
    }

    #[test]
    fn stops_on_a_malformed_record() {
        let dir = tempfile::tempdir().unwrap();
        let geometry = GridGeometry::new(10, 10, 1.0, 1.0, ProjectedBounds::new(0.0, 0.0, 10.0, 10.0));
        let projection = ProjectionContext::utm(31, true, Ellipsoid::WGS84).unwrap();
        let mut sheet = MapSheet::create_at(dir.path(), projection, geometry, Parameters::default()).unwrap();
        sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();

        let text = "5.0 5.0 40.0 1.0 0.0 0.0 0.0 0.0\nnot a record\n";
        assert!(Ingester::ingest_str(&mut sheet, text).is_err());
    }
}
