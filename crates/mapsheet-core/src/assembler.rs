//! `SurfaceAssembler`: walks a sheet's nodes tile by tile,
//! row-major north-to-south, and emits one of the published raster
//! layers or an area-of-interest summary.

use mapsheet_common::error::Result;
use mapsheet_common::sentinel::{invalid_f32, Sentinel};
use mapsheet_common::ProjectedBounds;
use storage::BackingStore;

use crate::algorithm::Algorithm;
use crate::disambiguator::{Disambiguation, Disambiguator, DisambiguatorPolicy, LocaleNeighbor};
use crate::hypothesis::z_score;
use crate::mapsheet::MapSheet;
use crate::node::NodeState;
use crate::types::Aoi;

/// The raster layers a sheet can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Depth,
    Uncertainty,
    StdDev,
    HitCount,
    HypothesisCount,
    HypothesisStrength,
}

/// A dense `width*height` grid of one layer's samples, row-major
/// north-to-south, ready to be handed to `raster-io` for on-disk
/// encoding — that conversion is a CLI concern, kept out of the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerGrid {
    pub layer: Layer,
    pub width: u32,
    pub height: u32,
    pub samples: Vec<f32>,
}

pub struct SurfaceAssembler;

impl SurfaceAssembler {
    /// Emit one layer over the whole sheet. A single `Disambiguator`
    /// call happens per touched node regardless of how many layers the
    /// caller eventually asks for — callers wanting several layers
    /// should call `emit_many` instead of repeating `emit`.
    pub fn emit<S: BackingStore + Clone>(sheet: &mut MapSheet<S>, layer: Layer) -> Result<LayerGrid> {
        Ok(Self::emit_many(sheet, &[layer])?.into_iter().next().unwrap())
    }

    pub fn emit_many<S: BackingStore + Clone>(
        sheet: &mut MapSheet<S>,
        layers: &[Layer],
    ) -> Result<Vec<LayerGrid>> {
        let geometry = *sheet.geometry();
        let (width, height) = (geometry.width_nodes, geometry.height_nodes);
        let count = (width as usize) * (height as usize);
        let mut grids: Vec<LayerGrid> = layers
            .iter()
            .map(|&layer| LayerGrid {
                layer,
                width,
                height,
                samples: vec![invalid_f32(); count],
            })
            .collect();

        let disambiguations = Self::disambiguate_sheet(sheet)?;
        for row in 0..height {
            for col in 0..width {
                let idx = (row as usize) * (width as usize) + (col as usize);
                let hit_count = sheet.hit_count_at(col, row);
                for (grid, &layer) in grids.iter_mut().zip(layers.iter()) {
                    grid.samples[idx] =
                        sample_for_layer(layer, disambiguations[idx].as_ref(), hit_count);
                }
            }
        }

        Ok(grids)
    }

    /// Disambiguate every node in the sheet once, row-major
    /// north-to-south. Under `DisambiguatorPolicy::Locale` this runs the
    /// iterate-until-stable neighbor-agreement pass described in the
    /// component design; every other policy is a single per-node call,
    /// identical to what `MapSheet::disambiguate_node` already does.
    pub fn disambiguate_sheet<S: BackingStore + Clone>(
        sheet: &mut MapSheet<S>,
    ) -> Result<Vec<Option<Disambiguation>>> {
        if sheet.params().disambiguator_policy != DisambiguatorPolicy::Locale {
            let geometry = *sheet.geometry();
            let (width, height) = (geometry.width_nodes, geometry.height_nodes);
            let mut out = Vec::with_capacity((width as usize) * (height as usize));
            for row in 0..height {
                for col in 0..width {
                    out.push(sheet.disambiguate_node(col, row)?);
                }
            }
            return Ok(out);
        }
        locale_disambiguate_sheet(sheet)
    }

    /// Summarize a rectangular area of interest. `focus_x`/`focus_y` is the node nearest the AOI's center;
    /// means are taken only over nodes that carry at least one sample.
    pub fn analyze_area<S: BackingStore + Clone>(
        sheet: &mut MapSheet<S>,
        bounds: ProjectedBounds,
    ) -> Result<Aoi> {
        let geometry = *sheet.geometry();
        let (col_at_sw, row_at_sw) = geometry.nearest_node(bounds.sw_x, bounds.sw_y);
        let (col_at_ne, row_at_ne) = geometry.nearest_node(bounds.ne_x, bounds.ne_y);
        let col_lo = col_at_sw.min(col_at_ne).max(0) as u32;
        let col_hi = (col_at_sw.max(col_at_ne).max(0) as u32).min(geometry.width_nodes.saturating_sub(1));
        let row_lo = row_at_sw.min(row_at_ne).max(0) as u32;
        let row_hi = (row_at_sw.max(row_at_ne).max(0) as u32).min(geometry.height_nodes.saturating_sub(1));

        let focus_x = (bounds.sw_x + bounds.ne_x) / 2.0;
        let focus_y = (bounds.sw_y + bounds.ne_y) / 2.0;
        let (focus_col, focus_row) = geometry.nearest_node(focus_x, focus_y);
        let z = crate::hypothesis::z_score(sheet.params().disambiguator_ci_level);

        let mut shoalest_depth: Option<f64> = None;
        let mut depth_sum = 0.0;
        let mut depth_n = 0u64;
        let mut variance_sum = 0.0;
        let mut variance_n = 0u64;
        let mut hyp_count_sum = 0.0;
        let mut hyp_strength_sum = 0.0;
        let mut sampled_nodes = 0u64;

        let mut focus_hypothesis_count = 0u32;
        let mut focus_hypothesis_strength = 0.0;

        let disambiguations = Self::disambiguate_sheet(sheet)?;
        if col_lo <= col_hi && row_lo <= row_hi {
            for row in row_lo..=row_hi {
                for col in col_lo..=col_hi {
                    let idx = (row as usize) * (geometry.width_nodes as usize) + (col as usize);
                    let d = disambiguations[idx];
                    if let Some(d) = d {
                        shoalest_depth = Some(shoalest_depth.map_or(d.depth, |s: f64| s.min(d.depth)));
                        depth_sum += d.depth;
                        depth_n += 1;
                        let variance = (d.ci_width / z).powi(2);
                        variance_sum += variance;
                        variance_n += 1;
                        hyp_count_sum += d.hypothesis_count as f64;
                        hyp_strength_sum += d.hypothesis_strength;
                        sampled_nodes += 1;

                        if geometry.contains_node(focus_col, focus_row)
                            && col == focus_col as u32
                            && row == focus_row as u32
                        {
                            focus_hypothesis_count = d.hypothesis_count;
                            focus_hypothesis_strength = d.hypothesis_strength;
                        }
                    }
                }
            }
        }

        Ok(Aoi {
            bounds,
            shoalest_depth,
            focus_x,
            focus_y,
            focus_hypothesis_count,
            focus_hypothesis_strength,
            mean_depth: if depth_n > 0 {
                Some(depth_sum / depth_n as f64)
            } else {
                None
            },
            mean_variance: if variance_n > 0 {
                Some(variance_sum / variance_n as f64)
            } else {
                None
            },
            mean_hypothesis_count: if sampled_nodes > 0 {
                hyp_count_sum / sampled_nodes as f64
            } else {
                0.0
            },
            mean_hypothesis_strength: if sampled_nodes > 0 {
                hyp_strength_sum / sampled_nodes as f64
            } else {
                0.0
            },
        })
    }
}

/// The `Locale` policy's whole-sheet pass: bootstrap every node with its
/// density choice, then repeatedly reselect each node's hypothesis
/// against the variance-weighted mean of its already-disambiguated
/// window of neighbors, until a full pass changes nothing or
/// `disambiguator_locale_max_passes` is reached.
fn locale_disambiguate_sheet<S: BackingStore + Clone>(
    sheet: &mut MapSheet<S>,
) -> Result<Vec<Option<Disambiguation>>> {
    let geometry = *sheet.geometry();
    let (width, height) = (geometry.width_nodes, geometry.height_nodes);
    let count = (width as usize) * (height as usize);
    let ci_level = sheet.params().disambiguator_ci_level;
    let window = sheet.params().disambiguator_locale_window;
    let max_passes = sheet.params().disambiguator_locale_max_passes;
    let use_median = matches!(sheet.algorithm(), Algorithm::BinnedMedian);

    let mut nodes: Vec<NodeState> = Vec::with_capacity(count);
    for row in 0..height {
        for col in 0..width {
            nodes.push(sheet.node_state_at(col, row)?);
        }
    }

    let density = Disambiguator::new(DisambiguatorPolicy::Density, ci_level);
    let locale = Disambiguator::new(DisambiguatorPolicy::Locale, ci_level);
    let z = z_score(ci_level);

    // Bootstrap: each node's own best match, with no neighbor context yet.
    let mut chosen: Vec<Option<(f64, f64)>> = nodes
        .iter()
        .map(|n| match n {
            NodeState::Hypothesis(h) => density.disambiguate(h, &[]).map(|d| {
                let variance = (d.ci_width / z).powi(2);
                (d.depth, variance)
            }),
            NodeState::Binned(b) => {
                let variance = b.variance().unwrap_or(0.0);
                density
                    .disambiguate_binned(b, use_median)
                    .map(|d| (d.depth, variance))
            }
        })
        .collect();

    for _pass in 0..max_passes {
        let mut changed = false;
        let mut next = chosen.clone();
        for row in 0..height {
            for col in 0..width {
                let idx = (row as usize) * (width as usize) + (col as usize);
                let NodeState::Hypothesis(h) = &nodes[idx] else {
                    continue;
                };
                if h.hypotheses.is_empty() || h.nomination.is_some() {
                    continue;
                }
                let neighbors = gather_neighbors(&chosen, width, height, col, row, window);
                if let Some(d) = locale.disambiguate(h, &neighbors) {
                    let variance = (d.ci_width / z).powi(2);
                    if next[idx] != Some((d.depth, variance)) {
                        changed = true;
                    }
                    next[idx] = Some((d.depth, variance));
                }
            }
        }
        chosen = next;
        if !changed {
            break;
        }
    }

    let mut out = Vec::with_capacity(count);
    for row in 0..height {
        for col in 0..width {
            let idx = (row as usize) * (width as usize) + (col as usize);
            match &nodes[idx] {
                NodeState::Hypothesis(h) => {
                    if h.hypotheses.is_empty() {
                        out.push(None);
                        continue;
                    }
                    let neighbors = gather_neighbors(&chosen, width, height, col, row, window);
                    out.push(locale.disambiguate(h, &neighbors));
                }
                NodeState::Binned(b) => out.push(density.disambiguate_binned(b, use_median)),
            }
        }
    }
    Ok(out)
}

/// Collect the already-disambiguated `(depth, variance)` of every node
/// in the `±window` square around `(col, row)`, excluding the node
/// itself, skipping sheet edges and any neighbor with no data yet.
fn gather_neighbors(
    chosen: &[Option<(f64, f64)>],
    width: u32,
    height: u32,
    col: u32,
    row: u32,
    window: u32,
) -> Vec<LocaleNeighbor> {
    let w = window as i64;
    let mut out = Vec::new();
    for dr in -w..=w {
        for dc in -w..=w {
            if dr == 0 && dc == 0 {
                continue;
            }
            let c = col as i64 + dc;
            let r = row as i64 + dr;
            if c < 0 || r < 0 || c as u32 >= width || r as u32 >= height {
                continue;
            }
            let idx = (r as usize) * (width as usize) + (c as usize);
            if let Some((depth, variance)) = chosen[idx] {
                out.push(LocaleNeighbor {
                    depth,
                    variance: variance.max(1e-9),
                });
            }
        }
    }
    out
}

fn sample_for_layer(layer: Layer, d: Option<&Disambiguation>, hit_count: u32) -> f32 {
    match layer {
        Layer::Depth => d.map(|d| d.depth as f32).unwrap_or_else(invalid_f32),
        Layer::Uncertainty => d.map(|d| d.ci_width as f32).unwrap_or_else(invalid_f32),
        Layer::StdDev => d
            .map(|d| (d.ci_width / crate::hypothesis::z_score(0.95)) as f32)
            .unwrap_or_else(invalid_f32),
        Layer::HitCount => {
            if hit_count == 0 {
                Sentinel::U32.value().as_u32().unwrap() as f32
            } else {
                hit_count as f32
            }
        }
        Layer::HypothesisCount => d.map(|d| d.hypothesis_count as f32).unwrap_or_else(invalid_f32),
        Layer::HypothesisStrength => d.map(|d| d.hypothesis_strength as f32).unwrap_or_else(invalid_f32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::Algorithm;
    use crate::config::Parameters;
    use crate::dispatcher::Sounding;
    use mapsheet_common::Timestamp;
    use projection::{Ellipsoid, ProjectionContext};

    fn sheet() -> MapSheet<storage::DirectoryBackingStore> {
        let dir = tempfile::tempdir().unwrap();
        let geometry = crate::types::GridGeometry::new(
            4,
            4,
            1.0,
            1.0,
            ProjectedBounds::new(0.0, 0.0, 4.0, 4.0),
        );
        let projection = ProjectionContext::utm(31, true, Ellipsoid::WGS84).unwrap();
        let mut sheet = MapSheet::create_at(
            dir.path(),
            projection,
            geometry,
            Parameters {
                dispatcher_influence_radius: 0.5,
                ..Parameters::default()
            },
        )
        .unwrap();
        sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();
        sheet
            .submit_sounding(&Sounding {
                east: 2.0,
                north: 2.0,
                depth: 15.0,
                depth_variance: 1.0,
                along_track_variance: 0.0,
                across_track_variance: 0.0,
                beam_angle_deg: 0.0,
                timestamp: Timestamp::new(0.0),
                backscatter: None,
            })
            .unwrap();
        sheet
    }

    #[test]
    fn depth_layer_leaves_sentinel_for_untouched_nodes() {
        let mut sheet = sheet();
        let grid = SurfaceAssembler::emit(&mut sheet, Layer::Depth).unwrap();
        assert_eq!(grid.samples.len(), 16);
        let touched_idx = 2 * 4 + 2;
        assert!((grid.samples[touched_idx] - 15.0).abs() < 1e-4);
        assert!(mapsheet_common::sentinel::is_invalid_f32(grid.samples[0]));
    }

    #[test]
    fn emit_many_matches_single_layer_emit() {
        let mut sheet = sheet();
        let depth_alone = SurfaceAssembler::emit(&mut sheet, Layer::Depth).unwrap();
        let mut sheet2 = sheet();
        let both = SurfaceAssembler::emit_many(&mut sheet2, &[Layer::Depth, Layer::HitCount]).unwrap();
        assert_eq!(both[0].samples, depth_alone.samples);
    }

    #[test]
    fn analyze_area_reports_shoalest_depth() {
        let mut sheet = sheet();
        let aoi = SurfaceAssembler::analyze_area(&mut sheet, ProjectedBounds::new(0.0, 0.0, 4.0, 4.0)).unwrap();
        assert_eq!(aoi.shoalest_depth, Some(15.0));
        assert_eq!(aoi.mean_depth, Some(15.0));
    }
}
