//! Converts an assembled layer grid into an on-disk
//! OMG1/R4 raster. Raster encoding lives in `raster-io`;
//! this module only owns the header fields a `MapSheet` can supply that
//! `raster-io` itself has no way to know (projection, spacing, bounds).

use std::path::Path;

use anyhow::Result;
use mapsheet_core::{Layer, LayerGrid, MapSheet};
use projection::{ProjectionContext, ProjectionType};
use raster_io::{DisplayHints, Raster, RasterHeader, RasterSamples, RotationKind, SampleType};
use storage::BackingStore;

/// Emit `layer` over the whole sheet and write it to `out` as an OMG1/R4
/// raster of 32-bit float samples.
pub fn export_layer<S: BackingStore + Clone>(
    sheet: &mut MapSheet<S>,
    layer: Layer,
    out: &Path,
) -> Result<()> {
    let grid = mapsheet_core::SurfaceAssembler::emit(sheet, layer)?;
    let raster = build_raster(&grid, sheet.geometry(), sheet.projection());
    raster.write_to_path(out)?;
    Ok(())
}

fn build_raster(grid: &LayerGrid, geometry: &mapsheet_core::GridGeometry, projection: &ProjectionContext) -> Raster {
    let (projection_type, ellipsoid_tag, hemisphere_north) = match projection {
        ProjectionContext::Utm(u) => (ProjectionType::Utm, u.ellipsoid.tag(), u.northern),
        ProjectionContext::Mercator(m) => (ProjectionType::Mercator, m.ellipsoid.tag(), true),
    };
    let header = RasterHeader {
        width: grid.width,
        height: grid.height,
        sw_x: geometry.bounds.sw_x,
        sw_y: geometry.bounds.sw_y,
        ne_x: geometry.bounds.ne_x,
        ne_y: geometry.bounds.ne_y,
        spacing_e: geometry.spacing_e,
        spacing_n: geometry.spacing_n,
        sample_type: SampleType::F32,
        projection_type,
        ellipsoid_tag,
        projection_scalar: 1.0,
        hemisphere_north,
        rotation: RotationKind::None,
        rotation_deg: 0.0,
        display: DisplayHints::default(),
    };
    Raster {
        header,
        samples: RasterSamples::F32(grid.samples.clone()),
    }
}
