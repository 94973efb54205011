//! `MapSheet`: the facade tying projection, grid geometry, the tiled
//! cache, the sounding dispatcher, and persistence together.

use std::collections::HashMap;
use std::path::PathBuf;

use mapsheet_common::error::{MapSheetError, Result};
use projection::{ProjectionContext, ProjectionType};
use storage::{BackingStore, DirectoryBackingStore};
use tracing::info;

use crate::algorithm::Algorithm;
use crate::cache::TileCache;
use crate::config::Parameters;
use crate::disambiguator::{Disambiguation, Disambiguator};
use crate::dispatcher::{DispatchOutcome, Gates, Sounding, SoundingDispatcher};
use crate::node::NodeState;
use crate::persistence::{
    decode_nominations, decode_u16_grid, decode_u32_grid, encode_nominations, encode_u16_grid,
    encode_u32_grid, MapSheetHeader,
};
use crate::tile::TileGrid;
use crate::types::{GridGeometry, HypoArray};

/// Ties a backing store to everything needed to track depth over a
/// survey area. A freshly-created sheet carries `Algorithm::None` (no
/// depth layer) until [`MapSheet::attach_depth_layer`] is called exactly
/// once.
pub struct MapSheet<S: BackingStore + Clone> {
    store: S,
    projection: ProjectionContext,
    geometry: GridGeometry,
    params: Parameters,
    algorithm: Algorithm,
    cache: Option<TileCache<S>>,
    /// Per-node total sample count, persisted separately from tile
    /// state so a raster export doesn't have to page in every tile just
    /// to read hit counts.
    hit_counts: Vec<u32>,
    /// Most-recently-reported backscatter per node; `0xFFFF` marks a
    /// node that has never received one.
    backscatter: Vec<u16>,
    gates: Gates,
}

impl<S: BackingStore + Clone> MapSheet<S> {
    /// Build a new, empty sheet over `geometry` with no depth layer yet
    /// attached.
    pub fn new(
        store: S,
        projection: ProjectionContext,
        geometry: GridGeometry,
        params: Parameters,
    ) -> Result<Self> {
        params.validate()?;
        let count = (geometry.width_nodes as usize) * (geometry.height_nodes as usize);
        Ok(Self {
            store,
            projection,
            geometry,
            params,
            algorithm: Algorithm::None,
            cache: None,
            hit_counts: vec![0; count],
            backscatter: vec![0xFFFF; count],
            gates: Gates::default(),
        })
    }

    pub fn with_gates(mut self, gates: Gates) -> Self {
        self.gates = gates;
        self
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn params(&self) -> &Parameters {
        &self.params
    }

    pub fn projection(&self) -> &ProjectionContext {
        &self.projection
    }

    /// Attach the depth-tracking layer, choosing the in-memory
    /// estimator. Calling this a second time is a
    /// configuration error — a sheet's estimator is fixed for its
    /// lifetime once samples may have been folded into it.
    pub fn attach_depth_layer(&mut self, algorithm: Algorithm) -> Result<()> {
        if self.algorithm != Algorithm::None {
            return Err(MapSheetError::configuration(
                "a depth layer is already attached to this sheet",
            ));
        }
        if algorithm == Algorithm::None {
            return Err(MapSheetError::configuration(
                "attach_depth_layer requires a concrete algorithm",
            ));
        }
        let grid = TileGrid::from_params(
            &self.params,
            self.geometry.width_nodes,
            self.geometry.height_nodes,
        );
        let max_hypotheses = if algorithm == Algorithm::Nodal {
            1
        } else {
            self.params.node_max_hypotheses
        };
        self.cache = Some(TileCache::new(
            grid,
            algorithm,
            max_hypotheses,
            self.params.binned_max_slots,
            self.store.clone(),
            self.params.cache_capacity,
            self.params.cache_sell_by,
        ));
        self.algorithm = algorithm;
        info!(?algorithm, "depth layer attached");
        Ok(())
    }

    fn cache_mut(&mut self) -> Result<&mut TileCache<S>> {
        self.cache
            .as_mut()
            .ok_or_else(|| MapSheetError::configuration("no depth layer attached to this sheet"))
    }

    /// Submit one sounding for incorporation. The slope
    /// term of the IDW inflation uses each touched node's current
    /// representative depth, snapshotted read-only before dispatch so
    /// the update pass itself never re-enters the cache.
    pub fn submit_sounding(&mut self, sounding: &Sounding) -> Result<DispatchOutcome> {
        let priors = self.snapshot_window_priors(sounding)?;
        let dispatcher = SoundingDispatcher::new(self.gates);
        let geometry = self.geometry;
        let algorithm = self.algorithm;
        let params = self.params;
        let predicted_depth = |col: u32, row: u32| priors.get(&(col, row)).copied();
        let outcome = {
            let cache = self.cache_mut()?;
            dispatcher.dispatch(
                sounding,
                &geometry,
                Some(&predicted_depth),
                algorithm,
                &params,
                cache,
            )?
        };
        if let DispatchOutcome::Applied { .. } = outcome {
            self.record_auxiliary(sounding)?;
        }
        Ok(outcome)
    }

    /// Read-only pass over the same footprint `dispatch` will touch,
    /// collecting each node's current representative depth before any
    /// writes happen this round.
    fn snapshot_window_priors(&mut self, sounding: &Sounding) -> Result<HashMap<(u32, u32), f64>> {
        if self.cache.is_none() {
            return Ok(HashMap::new());
        }
        let rho = self.params.dispatcher_influence_radius;
        let geometry = self.geometry;
        let (center_col, center_row) = geometry.nearest_node(sounding.east, sounding.north);
        let half_e = (rho / geometry.spacing_e).ceil() as i64 + 1;
        let half_n = (rho / geometry.spacing_n).ceil() as i64 + 1;

        let mut priors = HashMap::new();
        let cache = self.cache_mut()?;
        for dr in -half_n..=half_n {
            for dc in -half_e..=half_e {
                let col = center_col + dc;
                let row = center_row + dr;
                if !geometry.contains_node(col, row) {
                    continue;
                }
                let (col, row) = (col as u32, row as u32);
                if let Some(depth) = representative_depth(cache.get_node(col, row)?) {
                    priors.insert((col, row), depth);
                }
            }
        }
        Ok(priors)
    }

    fn record_auxiliary(&mut self, sounding: &Sounding) -> Result<()> {
        let geometry = self.geometry;
        let (col, row) = geometry.nearest_node(sounding.east, sounding.north);
        if !geometry.contains_node(col, row) {
            return Ok(());
        }
        let idx = (row as usize) * (geometry.width_nodes as usize) + (col as usize);
        self.hit_counts[idx] = self.hit_counts[idx].saturating_add(1);
        if let Some(b) = sounding.backscatter {
            self.backscatter[idx] = b;
        }
        Ok(())
    }

    /// Durability barrier: write every dirty resident tile through to
    /// the backing store.
    pub fn flush(&mut self) -> Result<()> {
        if let Some(cache) = self.cache.as_mut() {
            cache.flush()?;
        }
        Ok(())
    }

    pub fn minimize_memory(&mut self) -> Result<()> {
        if let Some(cache) = self.cache.as_mut() {
            cache.minimize_memory()?;
        }
        Ok(())
    }

    /// Persist the header, parameters readback, nominations, and the
    /// hit-count/backscatter auxiliary grids to the current backing
    /// store, after flushing dirty tiles. Tiles that
    /// were never touched are never written; this call only ever adds
    /// bytes for dirty state, never rewrites the whole sheet.
    pub fn save(&mut self) -> Result<()> {
        self.flush()?;
        let header = self.build_header()?;
        self.store.write_header(&header.write())?;
        let params_json = serde_json::to_vec(&self.params)
            .map_err(|e| MapSheetError::persistence(format!("failed to encode parameters: {e}")))?;
        self.store.write_params(&params_json)?;

        let mut nominations = Vec::new();
        if let Some(cache) = self.cache.as_mut() {
            if self.algorithm.is_hypothesis_shaped() {
                let geometry = self.geometry;
                for row in 0..geometry.height_nodes {
                    for col in 0..geometry.width_nodes {
                        if let NodeState::Hypothesis(h) = cache.get_node(col, row)? {
                            if let Some(idx) = h.nomination {
                                nominations.push((col, row, idx));
                            }
                        }
                    }
                }
            }
        }
        self.store.write_nominations(&encode_nominations(&nominations))?;
        self.store.write_hits(&encode_u32_grid(&self.hit_counts))?;
        self.store
            .write_backscatter(&encode_u16_grid(&self.backscatter))?;
        Ok(())
    }

    fn build_header(&self) -> Result<MapSheetHeader> {
        let (projection_type, ellipsoid_tag, utm_zone, hemisphere_north, cen_lon_deg, cen_lat_deg, false_x, false_y) =
            match &self.projection {
                ProjectionContext::Utm(u) => (
                    ProjectionType::Utm,
                    u.ellipsoid.tag(),
                    u.zone,
                    u.northern,
                    0.0,
                    0.0,
                    0.0,
                    0.0,
                ),
                ProjectionContext::Mercator(m) => (
                    ProjectionType::Mercator,
                    m.ellipsoid.tag(),
                    0,
                    true,
                    m.cen_lon_deg,
                    m.cen_lat_deg,
                    m.false_x,
                    m.false_y,
                ),
            };
        let (max_hypotheses, binned_max_slots) = if self.algorithm == Algorithm::Nodal {
            (1, self.params.binned_max_slots)
        } else {
            (self.params.node_max_hypotheses, self.params.binned_max_slots)
        };
        Ok(MapSheetHeader {
            version: crate::persistence::HEADER_VERSION,
            algorithm: self.algorithm,
            projection_type,
            ellipsoid_tag,
            utm_zone,
            hemisphere_north,
            cen_lon_deg,
            cen_lat_deg,
            false_x,
            false_y,
            width_nodes: self.geometry.width_nodes,
            height_nodes: self.geometry.height_nodes,
            spacing_e: self.geometry.spacing_e,
            spacing_n: self.geometry.spacing_n,
            sw_x: self.geometry.bounds.sw_x,
            sw_y: self.geometry.bounds.sw_y,
            ne_x: self.geometry.bounds.ne_x,
            ne_y: self.geometry.bounds.ne_y,
            tile_width: self.params.tile_width,
            tile_height: self.params.tile_height,
            max_hypotheses,
            binned_max_slots,
        })
    }

    /// Load a sheet from an existing backing store.
    pub fn load(store: S) -> Result<Self> {
        let header_bytes = store
            .read_header()?
            .ok_or_else(|| MapSheetError::persistence("backing store has no header"))?;
        let header = MapSheetHeader::read(&header_bytes)?;
        let projection = header.build_projection()?;
        let geometry = header.grid_geometry();

        let mut params = Parameters {
            tile_width: header.tile_width,
            tile_height: header.tile_height,
            node_max_hypotheses: header.max_hypotheses,
            binned_max_slots: header.binned_max_slots,
            ..Parameters::default()
        };
        if let Some(bytes) = store.read_params()? {
            if let Ok(p) = serde_json::from_slice::<Parameters>(&bytes) {
                params = p;
            }
        }

        let count = (geometry.width_nodes as usize) * (geometry.height_nodes as usize);
        let mut sheet = Self {
            store: store.clone(),
            projection,
            geometry,
            params,
            algorithm: Algorithm::None,
            cache: None,
            hit_counts: store
                .read_hits()?
                .map(|b| decode_u32_grid(&b, count))
                .transpose()?
                .unwrap_or_else(|| vec![0; count]),
            backscatter: store
                .read_backscatter()?
                .map(|b| decode_u16_grid(&b, count))
                .transpose()?
                .unwrap_or_else(|| vec![0xFFFF; count]),
            gates: Gates::default(),
        };

        if header.algorithm != Algorithm::None {
            sheet.attach_depth_layer(header.algorithm)?;
            if let (Some(bytes), Some(cache)) = (store.read_nominations()?, sheet.cache.as_mut()) {
                for (col, row, idx) in decode_nominations(&bytes)? {
                    if let NodeState::Hypothesis(h) = cache.get_node_mut(col, row)?.get_mut() {
                        h.nomination = Some(idx);
                    }
                }
            }
        }

        Ok(sheet)
    }

    pub fn nominate_at_node(&mut self, col: u32, row: u32, nominated_depth: f64) -> Result<()> {
        self.algorithm.require_hypothesis_shaped("nominate")?;
        let policy = self.params.disambiguator_policy;
        let ci_level = self.params.disambiguator_ci_level;
        let cache = self.cache_mut()?;
        let handle = cache.get_node_mut(col, row)?;
        match handle.get_mut() {
            NodeState::Hypothesis(h) => {
                let d = Disambiguator::new(policy, ci_level);
                let idx = d.match_nomination(h, nominated_depth).ok_or_else(|| {
                    MapSheetError::input(format!(
                        "no live hypothesis at ({col},{row}) within 0.001m of {nominated_depth}"
                    ))
                })?;
                h.nomination = Some(idx);
                Ok(())
            }
            NodeState::Binned(_) => unreachable!("require_hypothesis_shaped already gated this"),
        }
    }

    pub fn nominate_at_location(&mut self, x: f64, y: f64, nominated_depth: f64) -> Result<()> {
        let (col, row) = self.geometry.nearest_node(x, y);
        if !self.geometry.contains_node(col, row) {
            return Err(MapSheetError::input("location falls outside the sheet"));
        }
        self.nominate_at_node(col as u32, row as u32, nominated_depth)
    }

    pub fn clear_nomination(&mut self, col: u32, row: u32) -> Result<()> {
        self.algorithm.require_hypothesis_shaped("clear_nomination")?;
        let cache = self.cache_mut()?;
        if let NodeState::Hypothesis(h) = cache.get_node_mut(col, row)?.get_mut() {
            h.nomination = None;
        }
        Ok(())
    }

    /// Replace the active `Parameters`, validating before committing so
    /// a rejected update never leaves the sheet half-changed.
    /// `tile_width`/`tile_height`/`node_max_hypotheses`/`binned_max_slots`
    /// are baked into the already-attached `TileCache`'s grid and fixed
    /// on-disk tile record layout once a depth layer exists, so changing
    /// any of them after `attach_depth_layer` is rejected outright rather
    /// than silently desyncing the header from the bytes tiles were
    /// encoded with.
    pub fn reset_params(&mut self, new_params: Parameters) -> Result<()> {
        new_params.validate()?;
        if self.cache.is_some() {
            if new_params.tile_width != self.params.tile_width
                || new_params.tile_height != self.params.tile_height
                || new_params.node_max_hypotheses != self.params.node_max_hypotheses
                || new_params.binned_max_slots != self.params.binned_max_slots
            {
                return Err(MapSheetError::configuration(
                    "tile_width/tile_height/node_max_hypotheses/binned_max_slots are fixed once a depth layer is attached",
                ));
            }
        }
        self.params = new_params;
        Ok(())
    }

    pub fn hypotheses_at(&mut self, col: u32, row: u32) -> Result<HypoArray> {
        self.algorithm.require_hypothesis_shaped("hypotheses_at")?;
        let (x, y) = self.geometry.node_location(col, row);
        let ci_level = self.params.disambiguator_ci_level;
        let cache = self.cache_mut()?;
        match cache.get_node(col, row)? {
            NodeState::Hypothesis(h) => Ok(HypoArray {
                x,
                y,
                nominated_index: h.nomination,
                hypotheses: h
                    .hypotheses
                    .iter()
                    .map(|hy| (hy.z, hy.ci_width(ci_level), hy.n))
                    .collect(),
            }),
            NodeState::Binned(_) => unreachable!("require_hypothesis_shaped already gated this"),
        }
    }

    /// A read-only clone of a node's raw state, for callers (the
    /// `SurfaceAssembler` locale pass) that need the whole hypothesis
    /// list rather than a single disambiguated scalar.
    pub fn node_state_at(&mut self, col: u32, row: u32) -> Result<NodeState> {
        let cache = self.cache_mut()?;
        Ok(cache.get_node(col, row)?.clone())
    }

    /// Disambiguate a single node in isolation. Under
    /// `DisambiguatorPolicy::Locale` this has no neighbor window to
    /// agree against and falls back to the density rule — the
    /// iterate-until-stable locale pass described in the component
    /// design needs the whole sheet's context and lives in
    /// `SurfaceAssembler` instead.
    pub fn disambiguate_node(&mut self, col: u32, row: u32) -> Result<Option<Disambiguation>> {
        let policy = self.params.disambiguator_policy;
        let ci_level = self.params.disambiguator_ci_level;
        let d = Disambiguator::new(policy, ci_level);
        let cache = self.cache_mut()?;
        match cache.get_node(col, row)? {
            NodeState::Hypothesis(h) => Ok(d.disambiguate(h, &[])),
            NodeState::Binned(b) => {
                Ok(d.disambiguate_binned(b, matches!(self.algorithm, Algorithm::BinnedMedian)))
            }
        }
    }

    pub fn hit_count_at(&self, col: u32, row: u32) -> u32 {
        let idx = (row as usize) * (self.geometry.width_nodes as usize) + (col as usize);
        self.hit_counts.get(idx).copied().unwrap_or(0)
    }

    pub fn backscatter_at(&self, col: u32, row: u32) -> u16 {
        let idx = (row as usize) * (self.geometry.width_nodes as usize) + (col as usize);
        self.backscatter.get(idx).copied().unwrap_or(0xFFFF)
    }
}

impl MapSheet<DirectoryBackingStore> {
    pub fn create_at(
        root: impl Into<PathBuf>,
        projection: ProjectionContext,
        geometry: GridGeometry,
        params: Parameters,
    ) -> Result<Self> {
        let store = DirectoryBackingStore::open(root)?;
        Self::new(store, projection, geometry, params)
    }

    pub fn open_at(root: impl Into<PathBuf>) -> Result<Self> {
        let store = DirectoryBackingStore::open(root)?;
        Self::load(store)
    }

    /// Flush and write the current location, then copy the entire
    /// backing store to `target` and re-mount there. Resident tiles are
    /// dropped and reloaded lazily from the copy — their bytes are
    /// already identical, so nothing is lost.
    pub fn save_as(&mut self, target: impl Into<PathBuf>) -> Result<()> {
        self.save()?;
        let new_store = self.store.copy_entire_to(target)?;
        self.store = new_store.clone();
        if self.cache.is_some() {
            let grid = TileGrid::from_params(
                &self.params,
                self.geometry.width_nodes,
                self.geometry.height_nodes,
            );
            let max_hypotheses = if self.algorithm == Algorithm::Nodal {
                1
            } else {
                self.params.node_max_hypotheses
            };
            self.cache = Some(TileCache::new(
                grid,
                self.algorithm,
                max_hypotheses,
                self.params.binned_max_slots,
                new_store,
                self.params.cache_capacity,
                self.params.cache_sell_by,
            ));
        }
        Ok(())
    }
}

fn representative_depth(node: &NodeState) -> Option<f64> {
    match node {
        NodeState::Hypothesis(h) => h
            .hypotheses
            .iter()
            .max_by_key(|hy| hy.n)
            .map(|hy| hy.z)
            .or(h.predicted_depth),
        NodeState::Binned(b) => b.mean(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapsheet_common::{ProjectedBounds, Timestamp};
    use projection::Ellipsoid;

    fn geometry() -> GridGeometry {
        GridGeometry::new(10, 10, 1.0, 1.0, ProjectedBounds::new(0.0, 0.0, 10.0, 10.0))
    }

    fn projection() -> ProjectionContext {
        ProjectionContext::utm(31, true, Ellipsoid::WGS84).unwrap()
    }

    #[test]
    fn attaching_depth_layer_twice_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut sheet = MapSheet::create_at(dir.path(), projection(), geometry(), Parameters::default()).unwrap();
        sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();
        assert!(sheet.attach_depth_layer(Algorithm::Hypothesis).is_err());
    }

    #[test]
    fn reset_params_rejects_tile_shape_changes_after_attach() {
        let dir = tempfile::tempdir().unwrap();
        let mut sheet = MapSheet::create_at(dir.path(), projection(), geometry(), Parameters::default()).unwrap();
        sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();

        let mut changed = *sheet.params();
        changed.node_max_hypotheses = 16;
        assert!(sheet.reset_params(changed).is_err());
        assert_eq!(sheet.params().node_max_hypotheses, 8);

        let mut allowed = *sheet.params();
        allowed.dispatcher_influence_radius = 9.0;
        sheet.reset_params(allowed).unwrap();
        assert_eq!(sheet.params().dispatcher_influence_radius, 9.0);
    }

    #[test]
    fn save_and_load_round_trips_a_sounding_scenario_1() {
        let dir = tempfile::tempdir().unwrap();
        let mut sheet = MapSheet::create_at(
            dir.path(),
            projection(),
            geometry(),
            Parameters {
                dispatcher_influence_radius: 1.0,
                ..Parameters::default()
            },
        )
        .unwrap();
        sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();
        sheet
            .submit_sounding(&Sounding {
                east: 5.0,
                north: 5.0,
                depth: 42.0,
                depth_variance: 1.0,
                along_track_variance: 0.0,
                across_track_variance: 0.0,
                beam_angle_deg: 0.0,
                timestamp: Timestamp::new(0.0),
                backscatter: Some(120),
            })
            .unwrap();
        sheet.save().unwrap();

        let mut reloaded = MapSheet::open_at(dir.path()).unwrap();
        let hypos = reloaded.hypotheses_at(5, 5).unwrap();
        assert_eq!(hypos.hypotheses.len(), 1);
        assert!((hypos.hypotheses[0].0 - 42.0).abs() < 1e-9);
        assert_eq!(reloaded.hit_count_at(5, 5), 1);
        assert_eq!(reloaded.backscatter_at(5, 5), 120);
    }

    #[test]
    fn nomination_overrides_disambiguation_scenario_6() {
        let dir = tempfile::tempdir().unwrap();
        let mut sheet = MapSheet::create_at(
            dir.path(),
            projection(),
            geometry(),
            Parameters {
                dispatcher_influence_radius: 0.5,
                node_monitor_depth: 1,
                ..Parameters::default()
            },
        )
        .unwrap();
        sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();
        for depth in [10.0, 10.0, 10.0, 50.0] {
            sheet
                .submit_sounding(&Sounding {
                    east: 5.0,
                    north: 5.0,
                    depth,
                    depth_variance: 1.0,
                    along_track_variance: 0.0,
                    across_track_variance: 0.0,
                    beam_angle_deg: 0.0,
                    timestamp: Timestamp::new(0.0),
                    backscatter: None,
                })
                .unwrap();
        }
        let before = sheet.disambiguate_node(5, 5).unwrap().unwrap();
        assert!((before.depth - 10.0).abs() < 1.0);

        sheet.nominate_at_node(5, 5, 50.0).unwrap();
        let after = sheet.disambiguate_node(5, 5).unwrap().unwrap();
        assert!((after.depth - 50.0).abs() < 1.0);

        sheet.clear_nomination(5, 5).unwrap();
        let cleared = sheet.disambiguate_node(5, 5).unwrap().unwrap();
        assert!((cleared.depth - 10.0).abs() < 1.0);
    }
}
