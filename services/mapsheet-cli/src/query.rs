//! Read and mutate a single node or area without a full raster export:
//! the `hypotheses`/`aoi`/`nominate`/`unnominate` subcommands.

use anyhow::Result;
use mapsheet_common::ProjectedBounds;
use mapsheet_core::{Aoi, HypoArray, MapSheet, SurfaceAssembler};
use serde::Serialize;
use storage::BackingStore;

#[derive(Serialize)]
struct HypothesisReport {
    x: f64,
    y: f64,
    nominated_index: Option<usize>,
    hypotheses: Vec<HypothesisEntry>,
}

#[derive(Serialize)]
struct HypothesisEntry {
    depth: f64,
    ci_width: f64,
    sample_count: u32,
}

impl From<HypoArray> for HypothesisReport {
    fn from(h: HypoArray) -> Self {
        Self {
            x: h.x,
            y: h.y,
            nominated_index: h.nominated_index,
            hypotheses: h
                .hypotheses
                .into_iter()
                .map(|(depth, ci_width, sample_count)| HypothesisEntry {
                    depth,
                    ci_width,
                    sample_count,
                })
                .collect(),
        }
    }
}

pub fn print_hypotheses<S: BackingStore + Clone>(sheet: &mut MapSheet<S>, col: u32, row: u32) -> Result<()> {
    let report: HypothesisReport = sheet.hypotheses_at(col, row)?.into();
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn print_aoi<S: BackingStore + Clone>(
    sheet: &mut MapSheet<S>,
    sw_x: f64,
    sw_y: f64,
    ne_x: f64,
    ne_y: f64,
) -> Result<()> {
    let aoi: Aoi = SurfaceAssembler::analyze_area(sheet, ProjectedBounds::new(sw_x, sw_y, ne_x, ne_y))?;
    println!("{}", serde_json::to_string_pretty(&AoiReport::from(aoi))?);
    Ok(())
}

#[derive(Serialize)]
struct AoiReport {
    shoalest_depth: Option<f64>,
    mean_depth: Option<f64>,
    mean_variance: Option<f64>,
    mean_hypothesis_count: f64,
    mean_hypothesis_strength: f64,
    focus_x: f64,
    focus_y: f64,
    focus_hypothesis_count: u32,
    focus_hypothesis_strength: f64,
}

impl From<Aoi> for AoiReport {
    fn from(a: Aoi) -> Self {
        Self {
            shoalest_depth: a.shoalest_depth,
            mean_depth: a.mean_depth,
            mean_variance: a.mean_variance,
            mean_hypothesis_count: a.mean_hypothesis_count,
            mean_hypothesis_strength: a.mean_hypothesis_strength,
            focus_x: a.focus_x,
            focus_y: a.focus_y,
            focus_hypothesis_count: a.focus_hypothesis_count,
            focus_hypothesis_strength: a.focus_hypothesis_strength,
        }
    }
}

pub fn nominate<S: BackingStore + Clone>(sheet: &mut MapSheet<S>, col: u32, row: u32, depth: f64) -> Result<()> {
    sheet.nominate_at_node(col, row, depth)?;
    Ok(())
}

pub fn unnominate<S: BackingStore + Clone>(sheet: &mut MapSheet<S>, col: u32, row: u32) -> Result<()> {
    sheet.clear_nomination(col, row)?;
    Ok(())
}
