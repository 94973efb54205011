//! Small value types shared across the engine.

use mapsheet_common::ProjectedBounds;

/// Node-grid geometry: width/height in nodes, spacing, and the SW/NE
/// corners in projected units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    pub width_nodes: u32,
    pub height_nodes: u32,
    pub spacing_e: f64,
    pub spacing_n: f64,
    pub bounds: ProjectedBounds,
}

impl GridGeometry {
    pub fn new(
        width_nodes: u32,
        height_nodes: u32,
        spacing_e: f64,
        spacing_n: f64,
        bounds: ProjectedBounds,
    ) -> Self {
        Self {
            width_nodes,
            height_nodes,
            spacing_e,
            spacing_n,
            bounds,
        }
    }

    /// Projected location of node `(col, row)`. Row 0 is the
    /// northern-most row.
    pub fn node_location(&self, col: u32, row: u32) -> (f64, f64) {
        let x = self.bounds.sw_x + col as f64 * self.spacing_e;
        let y = self.bounds.ne_y - row as f64 * self.spacing_n;
        (x, y)
    }

    /// The (col, row) of the node nearest to a projected point,
    /// regardless of whether it lies within the grid.
    pub fn nearest_node(&self, x: f64, y: f64) -> (i64, i64) {
        let col = ((x - self.bounds.sw_x) / self.spacing_e).round() as i64;
        let row = ((self.bounds.ne_y - y) / self.spacing_n).round() as i64;
        (col, row)
    }

    pub fn contains_node(&self, col: i64, row: i64) -> bool {
        col >= 0
            && row >= 0
            && (col as u32) < self.width_nodes
            && (row as u32) < self.height_nodes
    }
}

/// A node's hypothesis list, for user inspection.
#[derive(Debug, Clone, PartialEq)]
pub struct HypoArray {
    pub x: f64,
    pub y: f64,
    pub nominated_index: Option<usize>,
    /// (z, ci_width, n) triples, one per live hypothesis.
    pub hypotheses: Vec<(f64, f64, u32)>,
}

impl HypoArray {
    pub fn hypothesis_count(&self) -> usize {
        self.hypotheses.len()
    }
}

/// Area-of-interest summary produced by `SurfaceAssembler::analyze_area`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aoi {
    pub bounds: ProjectedBounds,
    pub shoalest_depth: Option<f64>,
    pub focus_x: f64,
    pub focus_y: f64,
    pub focus_hypothesis_count: u32,
    pub focus_hypothesis_strength: f64,
    pub mean_depth: Option<f64>,
    pub mean_variance: Option<f64>,
    pub mean_hypothesis_count: f64,
    pub mean_hypothesis_strength: f64,
}
