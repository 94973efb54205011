//! Synthetic `MapSheet`s.
//!
//! These builders exist so a test wanting "a small sheet, already
//! attached to an algorithm, over a scratch directory" doesn't have to
//! repeat the four-call dance (`GridGeometry::new`, `ProjectionContext::
//! utm`, `MapSheet::create_at`, `attach_depth_layer`) that `mapsheet-
//! core`'s own unit tests inline every time.

use mapsheet_common::{ProjectedBounds, Result};
use mapsheet_core::{Algorithm, GridGeometry, MapSheet, Parameters};
use projection::{Ellipsoid, ProjectionContext};
use storage::DirectoryBackingStore;

use crate::scratch::ScratchStore;

/// A UTM zone 31N context over WGS84, the zone the original CUBE test
/// fixtures near the Greenwich meridian used.
pub fn utm_projection() -> ProjectionContext {
    ProjectionContext::utm(31, true, Ellipsoid::WGS84).expect("zone 31 is valid")
}

/// A `width`x`height` node grid at `spacing` meters, SW corner pinned
/// at the projected origin — the geometry used by every worked-example
/// scenario below.
pub fn grid_geometry(width: u32, height: u32, spacing: f64) -> GridGeometry {
    GridGeometry::new(
        width,
        height,
        spacing,
        spacing,
        ProjectedBounds::new(0.0, 0.0, width as f64 * spacing, height as f64 * spacing),
    )
}

/// Parameters tuned so a handful of soundings reliably exercise the
/// path under test: a wide-enough influence radius to reach a 10x10
/// sheet's center node, and `node_monitor_depth = 1` so a mismatched
/// sample promotes to a new hypothesis on the very next one, rather than needing a monitor buffer built up first.
pub fn quick_fold_params() -> Parameters {
    Parameters {
        dispatcher_influence_radius: 1.0,
        node_monitor_depth: 1,
        ..Parameters::default()
    }
}

/// A fresh scratch-backed sheet, geometry and projection from the
/// helpers above, with no depth layer attached yet.
pub fn bare_sheet(params: Parameters) -> Result<(ScratchStore, MapSheet<DirectoryBackingStore>)> {
    let store = ScratchStore::new();
    let sheet = MapSheet::create_at(store.path(), utm_projection(), grid_geometry(10, 10, 1.0), params)?;
    Ok((store, sheet))
}

/// A scratch-backed sheet with the full hypothesis tracker already attached — the shape most dispatcher/disambiguator/
/// persistence tests want.
pub fn hypothesis_sheet() -> Result<(ScratchStore, MapSheet<DirectoryBackingStore>)> {
    sheet_with_algorithm(Algorithm::Hypothesis, quick_fold_params())
}

/// A scratch-backed sheet attached to `algorithm`, for tests that sweep
/// across the alternative in-memory estimators.
pub fn sheet_with_algorithm(
    algorithm: Algorithm,
    params: Parameters,
) -> Result<(ScratchStore, MapSheet<DirectoryBackingStore>)> {
    let (store, mut sheet) = bare_sheet(params)?;
    sheet.attach_depth_layer(algorithm)?;
    Ok((store, sheet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::single_sounding_at_center;

    #[test]
    fn hypothesis_sheet_accepts_a_sounding() {
        let (_store, mut sheet) = hypothesis_sheet().unwrap();
        let outcome = sheet
            .submit_sounding(&single_sounding_at_center(&grid_geometry(10, 10, 1.0), 42.0, 1.0))
            .unwrap();
        assert!(matches!(outcome, mapsheet_core::DispatchOutcome::Applied { .. }));
    }
}
