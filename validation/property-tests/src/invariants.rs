//! One invariant property per `proptest!` block.

use mapsheet_common::sentinel::is_invalid_f32;
use mapsheet_common::Timestamp;
use mapsheet_core::{
    Algorithm, DispatchOutcome, GridGeometry, HypothesisNode, Layer, Parameters, SurfaceAssembler,
    TileCache, TileGrid,
};
use proptest::prelude::*;
use storage::DirectoryBackingStore;
use test_utils::{bare_sheet, hypothesis_sheet, scratch::ScratchStore, utm_projection};

use crate::strategies;

fn params_with_radius(rho: f64) -> Parameters {
    Parameters {
        dispatcher_influence_radius: rho,
        node_monitor_depth: 1,
        ..Parameters::default()
    }
}

proptest! {
    /// Every node touched by a sounding is within its influence radius
    /// and inside the sheet's bounds; a gated-through, in-bounds
    /// sounding leaves at least one node non-empty.
    #[test]
    fn bounds_and_non_empty_after_update(
        geometry in strategies::small_geometry(),
        // Node spacing is 1.0, so the farthest a point can land from its
        // nearest node is sqrt(0.5^2 + 0.5^2) ~= 0.707; keep rho safely
        // above that so "Applied" is guaranteed, not just likely.
        rho in 1.0f64..3.0,
        d in strategies::depth(),
        v in strategies::variance(),
        frac_x in 0.1f64..0.9,
        frac_y in 0.1f64..0.9,
    ) {
        let store = ScratchStore::new();
        let params = params_with_radius(rho);
        let mut sheet = mapsheet_core::MapSheet::create_at(store.path(), utm_projection(), geometry, params).unwrap();
        sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();

        let x = geometry.bounds.sw_x + frac_x * geometry.bounds.width();
        let y = geometry.bounds.sw_y + frac_y * geometry.bounds.height();
        let sounding = mapsheet_core::Sounding {
            east: x,
            north: y,
            depth: d,
            depth_variance: v,
            along_track_variance: 0.0,
            across_track_variance: 0.0,
            beam_angle_deg: 0.0,
            timestamp: Timestamp::new(0.0),
            backscatter: None,
        };
        let outcome = sheet.submit_sounding(&sounding).unwrap();
        prop_assert!(matches!(outcome, DispatchOutcome::Applied { .. }));

        let mut any_touched = false;
        for row in 0..geometry.height_nodes {
            for col in 0..geometry.width_nodes {
                let hypos = sheet.hypotheses_at(col, row).unwrap();
                if hypos.hypothesis_count() > 0 {
                    any_touched = true;
                    let (nx, ny) = geometry.node_location(col, row);
                    let dist = ((nx - x).powi(2) + (ny - y).powi(2)).sqrt();
                    prop_assert!(dist <= rho + 1e-9);
                }
            }
        }
        prop_assert!(any_touched);
    }

    /// For a single hypothesis repeatedly folding samples at the same
    /// depth, variance is non-increasing and never drops below the
    /// configured floor.
    #[test]
    fn variance_is_monotone_and_floored(
        d in strategies::depth(),
        v in strategies::variance(),
        floor in 1e-6f64..0.5,
        repeats in 1usize..30,
    ) {
        let params = Parameters { node_variance_floor: floor, ..Parameters::default() };
        let mut node = HypothesisNode::default();
        let mut last_variance = f64::INFINITY;
        for i in 0..repeats {
            node.update(d as f64, v as f64, Timestamp::new(i as f64), &params);
            let current = node.hypotheses[0].variance;
            prop_assert!(current <= last_variance + 1e-12);
            prop_assert!(current >= floor - 1e-12);
            last_variance = current;
        }
    }

    /// The number of live hypotheses at a node never exceeds `H_max`,
    /// however many (possibly wildly inconsistent) samples it absorbs.
    #[test]
    fn hypothesis_cap_never_exceeded(
        depths in proptest::collection::vec(strategies::depth(), 1..40),
        max_hyp in 1u32..6,
    ) {
        let params = Parameters { node_max_hypotheses: max_hyp, node_monitor_depth: 1, ..Parameters::default() };
        let mut node = HypothesisNode::default();
        for (i, d) in depths.into_iter().enumerate() {
            node.update(d as f64, 1.0, Timestamp::new(i as f64), &params);
            prop_assert!(node.hypotheses.len() as u32 <= max_hyp);
        }
    }

    /// `TileCache` never holds more than `K` resident tiles, whatever
    /// sequence of node coordinates is touched.
    #[test]
    fn cache_never_exceeds_capacity(
        capacity in 1usize..8,
        coords in proptest::collection::vec((0u32..16, 0u32..16), 1..60),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryBackingStore::open(dir.path()).unwrap();
        let grid = TileGrid::new(2, 2, 16, 16);
        let mut cache: TileCache<DirectoryBackingStore> =
            TileCache::new(grid, Algorithm::Hypothesis, 8, 32, store, capacity, 1000);
        for (col, row) in coords {
            cache.get_node_mut(col, row).unwrap();
            prop_assert!(cache.resident_count() <= capacity);
        }
    }

    /// `flush()` called twice in succession performs no additional
    /// writes on the second call.
    #[test]
    fn flush_twice_is_idempotent(
        coords in proptest::collection::vec((0u32..8, 0u32..8), 1..20),
    ) {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryBackingStore::open(dir.path()).unwrap();
        let grid = TileGrid::new(4, 4, 8, 8);
        let mut cache: TileCache<DirectoryBackingStore> =
            TileCache::new(grid, Algorithm::Hypothesis, 8, 32, store, 16, 1000);
        for (col, row) in coords {
            cache.get_node_mut(col, row).unwrap();
        }
        cache.flush().unwrap();
        let writes_after_first = cache.stats().flush_writes;
        cache.flush().unwrap();
        prop_assert_eq!(cache.stats().flush_writes, writes_after_first);
    }

    /// After `minimize_memory`, the resident tile count equals exactly
    /// the number of tiles touched within the last `sell_by` clock
    /// ticks — a deterministic corollary of "strictly by `last_touch`"
    /// eviction.
    #[test]
    fn sell_by_eviction_keeps_only_recent_tiles(
        num_tiles in 1u32..12,
        sell_by in 0u64..14,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryBackingStore::open(dir.path()).unwrap();
        let grid = TileGrid::new(1, 1, num_tiles, 1);
        let mut cache: TileCache<DirectoryBackingStore> = TileCache::new(
            grid,
            Algorithm::Hypothesis,
            8,
            32,
            store,
            num_tiles as usize,
            sell_by,
        );
        for col in 0..num_tiles {
            cache.get_node_mut(col, 0).unwrap();
        }
        cache.minimize_memory().unwrap();
        let expected = sell_by.min(num_tiles as u64) as usize;
        prop_assert_eq!(cache.resident_count(), expected);
    }

    /// `save` → `load` → disambiguate yields bit-identical depth,
    /// uncertainty, hypothesis-count, and hypothesis-strength rasters
    /// when no further updates happen in between.
    #[test]
    fn save_load_round_trips_rasters(
        soundings in strategies::scattered_soundings(
            GridGeometry::new(8, 8, 1.0, 1.0, mapsheet_common::ProjectedBounds::new(0.0, 0.0, 8.0, 8.0)),
            1..15,
        ),
    ) {
        let store = ScratchStore::new();
        let params = params_with_radius(2.0);
        let geometry = GridGeometry::new(8, 8, 1.0, 1.0, mapsheet_common::ProjectedBounds::new(0.0, 0.0, 8.0, 8.0));
        let mut sheet = mapsheet_core::MapSheet::create_at(store.path(), utm_projection(), geometry, params).unwrap();
        sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();
        for s in &soundings {
            sheet.submit_sounding(s).unwrap();
        }
        let layers = [Layer::Depth, Layer::Uncertainty, Layer::HypothesisCount, Layer::HypothesisStrength];
        let before = SurfaceAssembler::emit_many(&mut sheet, &layers).unwrap();
        sheet.save().unwrap();

        let mut reloaded = mapsheet_core::MapSheet::open_at(store.path()).unwrap();
        let after = SurfaceAssembler::emit_many(&mut reloaded, &layers).unwrap();

        for (b, a) in before.iter().zip(after.iter()) {
            prop_assert_eq!(b.samples.iter().map(|f| f.to_bits()).collect::<Vec<_>>(),
                             a.samples.iter().map(|f| f.to_bits()).collect::<Vec<_>>());
        }
    }
}

/// Untouched nodes always carry exactly the published invalid-data
/// sentinel, whatever geometry or algorithm the sheet uses. Not itself randomized over soundings (an
/// empty sheet has none by construction), so this is a plain `#[test]`
/// rather than a `proptest!` property.
#[test]
fn untouched_nodes_carry_the_published_sentinel() {
    let (_store, mut sheet) = hypothesis_sheet().unwrap();
    let grid = SurfaceAssembler::emit(&mut sheet, Layer::Depth).unwrap();
    assert!(grid.samples.iter().all(|&s| is_invalid_f32(s)));
}

#[test]
fn binned_mean_sheet_also_starts_all_sentinel() {
    let (_store, mut sheet) = bare_sheet(Parameters::default()).unwrap();
    sheet.attach_depth_layer(Algorithm::BinnedMean).unwrap();
    let grid = SurfaceAssembler::emit(&mut sheet, Layer::Depth).unwrap();
    assert!(grid.samples.iter().all(|&s| is_invalid_f32(s)));
}
