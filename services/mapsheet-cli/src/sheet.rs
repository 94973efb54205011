//! Resolves a parsed ASCII sheet description into a live
//! `MapSheet`: projection construction, extent-to-`GridGeometry`
//! conversion, and the one place that knows how a `location`/`bounds`
//! block becomes a node grid.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use mapsheet_common::ProjectedBounds;
use mapsheet_core::{GridGeometry, MapSheet, Parameters};
use projection::{Ellipsoid, ProjectionContext};
use sheet_description::{ProjectionKind, SheetDescription, SheetExtent};
use storage::DirectoryBackingStore;

/// Build the projection this description's `projection { }` block
/// describes. Polar Stereographic is a recognized tag everywhere else
/// in the workspace but can never be mounted as an active projection,
/// so a description naming it is rejected here rather than deeper in
/// the stack.
pub fn resolve_projection(desc: &SheetDescription) -> Result<ProjectionContext> {
    let p = &desc.projection;
    let ctx = match p.kind {
        ProjectionKind::Utm => ProjectionContext::utm_for_longitude(
            p.origin_lon_deg,
            p.origin_lat_deg >= 0.0,
            Ellipsoid::WGS84,
        ),
        ProjectionKind::Mercator => ProjectionContext::mercator(
            p.origin_lon_deg,
            p.origin_lat_deg,
            p.false_origin_x_m,
            p.false_origin_y_m,
            Ellipsoid::WGS84,
        ),
        ProjectionKind::PolarStereographic => ProjectionContext::polar_stereographic(),
    };
    ctx.context("resolving the description's projection block")
}

/// Resolve the `sheet { }` block's extent into node-grid geometry,
/// projecting geographic corners through `projection` first.
pub fn resolve_geometry(desc: &SheetDescription, projection: &ProjectionContext) -> Result<GridGeometry> {
    let spec = &desc.sheet;
    if spec.spacing_e_m <= 0.0 || spec.spacing_n_m <= 0.0 {
        bail!("sheet spacing must be positive");
    }

    let bounds = match spec.extent {
        SheetExtent::CenterSize {
            center_lon_deg,
            center_lat_deg,
            width_m,
            height_m,
        } => {
            let (cx, cy) = projection.forward(center_lon_deg, center_lat_deg);
            ProjectedBounds::new(
                cx - width_m / 2.0,
                cy - height_m / 2.0,
                cx + width_m / 2.0,
                cy + height_m / 2.0,
            )
        }
        SheetExtent::Bounds {
            sw_x,
            sw_y,
            ne_x,
            ne_y,
            geographic,
        } => {
            if geographic {
                let (sw_x, sw_y) = projection.forward(sw_x, sw_y);
                let (ne_x, ne_y) = projection.forward(ne_x, ne_y);
                ProjectedBounds::new(sw_x, sw_y, ne_x, ne_y)
            } else {
                ProjectedBounds::new(sw_x, sw_y, ne_x, ne_y)
            }
        }
    };

    if bounds.width() <= 0.0 || bounds.height() <= 0.0 {
        bail!("resolved sheet bounds are degenerate: {bounds:?}");
    }

    let width_nodes = (bounds.width() / spec.spacing_e_m).round() as u32 + 1;
    let height_nodes = (bounds.height() / spec.spacing_n_m).round() as u32 + 1;
    Ok(GridGeometry::new(
        width_nodes,
        height_nodes,
        spec.spacing_e_m,
        spec.spacing_n_m,
        bounds,
    ))
}

/// The backing-store directory a description names, or `override_path`
/// if the caller supplied one on the command line.
pub fn resolve_backstore(desc: &SheetDescription, override_path: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = override_path {
        return Ok(p.to_path_buf());
    }
    desc.sheet
        .backstore
        .clone()
        .context("sheet description has no `backstore` path and none was given on the command line")
}

/// Parse a description file and build a fresh, empty `MapSheet` at its
/// (or the override) backing-store location. Does not attach a depth
/// layer — callers choose the algorithm explicitly.
pub fn create_from_description(
    description_path: &Path,
    backstore_override: Option<&Path>,
    params: Parameters,
) -> Result<MapSheet<DirectoryBackingStore>> {
    let text = std::fs::read_to_string(description_path)
        .with_context(|| format!("reading sheet description {}", description_path.display()))?;
    let desc = sheet_description::parse(&text).context("parsing sheet description")?;

    let projection = resolve_projection(&desc)?;
    let geometry = resolve_geometry(&desc, &projection)?;
    let backstore = resolve_backstore(&desc, backstore_override)?;

    Ok(MapSheet::create_at(backstore, projection, geometry, params)?)
}

pub fn open(backstore: &Path) -> Result<MapSheet<DirectoryBackingStore>> {
    Ok(MapSheet::open_at(backstore)
        .with_context(|| format!("opening mapsheet at {}", backstore.display()))?)
}
