//! `Tile`, a fixed block of resident nodes, and the logical `TileGrid`
//! that indexes every tile in the survey whether resident or not.

use mapsheet_common::Timestamp;

use crate::algorithm::Algorithm;
use crate::config::Parameters;
use crate::node::{BinnedNode, HypothesisNode, NodeState};

/// A fixed `W·H` block of `NodeState` values. Physical
/// layout is row-major within the tile, northern-most row first.
/// Right/bottom edge tiles carry `active_cols`/`active_rows` narrower
/// than the tile's nominal `width`/`height`; cells beyond that extent
/// are allocated (so every tile is a uniform `width*height` block on
/// disk) but never addressed.
#[derive(Debug, Clone)]
pub struct Tile {
    pub tc: u32,
    pub tr: u32,
    pub width: u32,
    pub height: u32,
    pub active_cols: u32,
    pub active_rows: u32,
    pub nodes: Vec<NodeState>,
    pub last_touch: u64,
    pub dirty: bool,
    pub resident: bool,
}

impl Tile {
    pub fn new(
        algorithm: Algorithm,
        tc: u32,
        tr: u32,
        width: u32,
        height: u32,
        active_cols: u32,
        active_rows: u32,
    ) -> Self {
        let count = (width as usize) * (height as usize);
        let nodes = match algorithm {
            Algorithm::BinnedMean | Algorithm::BinnedMedian => {
                vec![NodeState::Binned(BinnedNode::default()); count]
            }
            _ => vec![NodeState::Hypothesis(HypothesisNode::default()); count],
        };
        Self {
            tc,
            tr,
            width,
            height,
            active_cols,
            active_rows,
            nodes,
            last_touch: 0,
            dirty: false,
            resident: true,
        }
    }

    /// Local-row-major index of `(local_col, local_row)` within this
    /// tile's `width*height` allocation.
    pub fn local_index(&self, local_col: u32, local_row: u32) -> usize {
        (local_row as usize) * (self.width as usize) + (local_col as usize)
    }

    pub fn is_active(&self, local_col: u32, local_row: u32) -> bool {
        local_col < self.active_cols && local_row < self.active_rows
    }

    pub fn node(&self, local_col: u32, local_row: u32) -> &NodeState {
        &self.nodes[self.local_index(local_col, local_row)]
    }

    pub fn node_mut(&mut self, local_col: u32, local_row: u32) -> &mut NodeState {
        let idx = self.local_index(local_col, local_row);
        &mut self.nodes[idx]
    }

    /// Number of nodes in the tile that carry at least one hypothesis
    /// or binned sample; used by `sample_count()` style readback and
    /// by tests.
    pub fn touched_count(&self) -> usize {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(i, n)| {
                let col = (*i as u32) % self.width;
                let row = (*i as u32) / self.width;
                self.is_active(col, row) && has_data(n)
            })
            .count()
    }
}

fn has_data(node: &NodeState) -> bool {
    match node {
        NodeState::Hypothesis(h) => !h.hypotheses.is_empty(),
        NodeState::Binned(b) => !b.depths.is_empty(),
    }
}

/// Logical tiling of the full survey area, expressed purely as
/// geometry — no resident tile state lives here, that belongs to
/// `TileCache`. Tile (0,0) is at the northwest corner; row-major
/// north-to-south is the reporting order at the boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileGrid {
    pub tile_width: u32,
    pub tile_height: u32,
    pub total_cols: u32,
    pub total_rows: u32,
}

impl TileGrid {
    pub fn new(tile_width: u32, tile_height: u32, total_cols: u32, total_rows: u32) -> Self {
        Self {
            tile_width,
            tile_height,
            total_cols,
            total_rows,
        }
    }

    pub fn from_params(params: &Parameters, total_cols: u32, total_rows: u32) -> Self {
        Self::new(params.tile_width, params.tile_height, total_cols, total_rows)
    }

    pub fn tiles_across(&self) -> u32 {
        div_ceil(self.total_cols, self.tile_width)
    }

    pub fn tiles_down(&self) -> u32 {
        div_ceil(self.total_rows, self.tile_height)
    }

    pub fn tile_count(&self) -> u64 {
        self.tiles_across() as u64 * self.tiles_down() as u64
    }

    /// `(tc, tr, local_col, local_row)` for global node `(col, row)`.
    pub fn locate(&self, col: u32, row: u32) -> (u32, u32, u32, u32) {
        (
            col / self.tile_width,
            row / self.tile_height,
            col % self.tile_width,
            row % self.tile_height,
        )
    }

    /// How many of the nominal `tile_width`/`tile_height` columns/rows
    /// are real grid nodes for tile `(tc, tr)` — narrower/shorter for
    /// the right/bottom edge tiles.
    pub fn active_extent(&self, tc: u32, tr: u32) -> (u32, u32) {
        let cols = self.total_cols.saturating_sub(tc * self.tile_width);
        let rows = self.total_rows.saturating_sub(tr * self.tile_height);
        (cols.min(self.tile_width), rows.min(self.tile_height))
    }

    /// Iterate every tile coordinate in row-major, north-to-south order.
    pub fn iter_tiles(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        let across = self.tiles_across();
        let down = self.tiles_down();
        (0..down).flat_map(move |tr| (0..across).map(move |tc| (tc, tr)))
    }
}

fn div_ceil(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

/// A transient lock-like guard over one resident tile, returned by
/// `TileCache::get_node_mut`/`get_node`. Its lifetime ties the borrow
/// to the `TileCache` call that created it so a tile can never be
/// evicted out from under an in-flight access.
pub struct NodeHandle<'a> {
    pub(crate) state: &'a mut NodeState,
}

impl<'a> NodeHandle<'a> {
    pub fn get(&self) -> &NodeState {
        self.state
    }

    pub fn get_mut(&mut self) -> &mut NodeState {
        self.state
    }

    pub fn update(&mut self, d: f64, sigma_sq: f64, timestamp: Timestamp, params: &Parameters) {
        match self.state {
            NodeState::Hypothesis(h) => h.update(d, sigma_sq, timestamp, params),
            NodeState::Binned(b) => b.add(d as f32, params.binned_max_slots),
        }
    }
}
