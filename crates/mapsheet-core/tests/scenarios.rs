//! End-to-end coverage of the worked sheet scenarios, driven through
//! the `MapSheet` facade rather than the individual components each
//! already exercises in their own unit tests.

use mapsheet_common::{ProjectedBounds, Timestamp};
use mapsheet_core::{
    Algorithm, DisambiguatorPolicy, DispatchOutcome, Gates, GridGeometry, Layer, MapSheet,
    Parameters, Sounding, SurfaceAssembler,
};
use projection::{Ellipsoid, ProjectionContext};

fn geometry(n: u32) -> GridGeometry {
    GridGeometry::new(n, n, 1.0, 1.0, ProjectedBounds::new(0.0, 0.0, n as f64, n as f64))
}

fn projection() -> ProjectionContext {
    ProjectionContext::utm(31, true, Ellipsoid::WGS84).unwrap()
}

fn sounding(east: f64, north: f64, depth: f32, timestamp: f64) -> Sounding {
    Sounding {
        east,
        north,
        depth,
        depth_variance: 1.0,
        along_track_variance: 0.0,
        across_track_variance: 0.0,
        beam_angle_deg: 0.0,
        timestamp: Timestamp::new(timestamp),
        backscatter: None,
    }
}

/// Scenario 1: a single sounding lands on exactly one node and is
/// reported back as that node's sole hypothesis.
#[test]
fn scenario_1_single_sounding_single_node() {
    let dir = tempfile::tempdir().unwrap();
    let mut sheet = MapSheet::create_at(
        dir.path(),
        projection(),
        geometry(10),
        Parameters {
            dispatcher_influence_radius: 1.0,
            ..Parameters::default()
        },
    )
    .unwrap();
    sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();

    let outcome = sheet.submit_sounding(&sounding(5.0, 5.0, 42.0, 0.0)).unwrap();
    assert_eq!(outcome, DispatchOutcome::Applied { nodes_touched: 1 });

    let hypos = sheet.hypotheses_at(5, 5).unwrap();
    assert_eq!(hypos.hypotheses.len(), 1);
    assert!((hypos.hypotheses[0].0 - 42.0).abs() < 1e-9);

    let d = sheet.disambiguate_node(5, 5).unwrap().unwrap();
    assert!((d.depth - 42.0).abs() < 1e-9);
}

/// Scenario 2: two mutually consistent soundings fold into one
/// hypothesis whose depth sits between the two inputs.
#[test]
fn scenario_2_two_consistent_soundings_fold_together() {
    let dir = tempfile::tempdir().unwrap();
    let mut sheet = MapSheet::create_at(
        dir.path(),
        projection(),
        geometry(10),
        Parameters {
            dispatcher_influence_radius: 1.0,
            ..Parameters::default()
        },
    )
    .unwrap();
    sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();

    sheet.submit_sounding(&sounding(5.0, 5.0, 40.0, 0.0)).unwrap();
    sheet.submit_sounding(&sounding(5.0, 5.0, 44.0, 1.0)).unwrap();

    let hypos = sheet.hypotheses_at(5, 5).unwrap();
    assert_eq!(hypos.hypotheses.len(), 1);
    assert!((hypos.hypotheses[0].0 - 42.0).abs() < 1e-6);
    assert_eq!(hypos.hypotheses[0].2, 2);
}

/// Scenario 3: two soundings far enough apart in depth spawn a second
/// live hypothesis at the same node instead of folding together.
#[test]
fn scenario_3_two_inconsistent_soundings_spawn_second_hypothesis() {
    let dir = tempfile::tempdir().unwrap();
    let mut sheet = MapSheet::create_at(
        dir.path(),
        projection(),
        geometry(10),
        Parameters {
            dispatcher_influence_radius: 1.0,
            node_monitor_depth: 1,
            ..Parameters::default()
        },
    )
    .unwrap();
    sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();

    sheet.submit_sounding(&sounding(5.0, 5.0, 10.0, 0.0)).unwrap();
    sheet.submit_sounding(&sounding(5.0, 5.0, 200.0, 1.0)).unwrap();

    let hypos = sheet.hypotheses_at(5, 5).unwrap();
    assert_eq!(hypos.hypotheses.len(), 2);
    let mut depths: Vec<f64> = hypos.hypotheses.iter().map(|h| h.0).collect();
    depths.sort_by(|a, b| a.total_cmp(b));
    assert!((depths[0] - 10.0).abs() < 1e-6);
    assert!((depths[1] - 200.0).abs() < 1e-6);
}

/// Scenario 4: a cache capped at one resident tile, swept over 16
/// distinct tiles, evicts as it goes but every tile's data survives a
/// save/load round trip once all of it is written back.
#[test]
fn scenario_4_eviction_round_trip_with_k1_cache_and_16_tiles() {
    let dir = tempfile::tempdir().unwrap();
    let mut sheet = MapSheet::create_at(
        dir.path(),
        projection(),
        geometry(64),
        Parameters {
            tile_width: 16,
            tile_height: 16,
            cache_capacity: 1,
            dispatcher_influence_radius: 0.5,
            ..Parameters::default()
        },
    )
    .unwrap();
    sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();

    // One sounding per tile (4x4 tiles of 16x16 nodes over a 64x64 grid).
    let mut expected = Vec::new();
    for tr in 0..4u32 {
        for tc in 0..4u32 {
            let col = tc * 16 + 8;
            let row = tr * 16 + 8;
            let depth = 10.0 + (tr * 4 + tc) as f32;
            sheet
                .submit_sounding(&sounding(col as f64, row as f64, depth, 0.0))
                .unwrap();
            expected.push((col, row, depth as f64));
        }
    }

    sheet.save().unwrap();
    let mut reloaded = MapSheet::open_at(dir.path()).unwrap();
    for (col, row, depth) in expected {
        let hypos = reloaded.hypotheses_at(col, row).unwrap();
        assert_eq!(hypos.hypotheses.len(), 1);
        assert!((hypos.hypotheses[0].0 - depth).abs() < 1e-6, "node ({col},{row})");
    }
}

/// Scenario 5: a binned-median sheet reports the median of its pool,
/// unaffected by a single outlier sample.
#[test]
fn scenario_5_binned_median_ignores_an_outlier() {
    let dir = tempfile::tempdir().unwrap();
    let mut sheet = MapSheet::create_at(
        dir.path(),
        projection(),
        geometry(10),
        Parameters {
            dispatcher_influence_radius: 0.5,
            binned_max_slots: 32,
            ..Parameters::default()
        },
    )
    .unwrap();
    sheet.attach_depth_layer(Algorithm::BinnedMedian).unwrap();

    for depth in [1.0, 2.0, 3.0, 100.0, 5.0, 6.0, 7.0] {
        sheet.submit_sounding(&sounding(5.0, 5.0, depth, 0.0)).unwrap();
    }

    let d = sheet.disambiguate_node(5, 5).unwrap().unwrap();
    assert_eq!(d.depth, 5.0);
}

/// Scenario 6: a user nomination overrides the configured
/// disambiguation policy until it's cleared.
#[test]
fn scenario_6_nomination_overrides_density_policy() {
    let dir = tempfile::tempdir().unwrap();
    let mut sheet = MapSheet::create_at(
        dir.path(),
        projection(),
        geometry(10),
        Parameters {
            dispatcher_influence_radius: 0.5,
            node_monitor_depth: 1,
            ..Parameters::default()
        },
    )
    .unwrap();
    sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();

    for depth in [10.0, 10.0, 10.0, 50.0] {
        sheet.submit_sounding(&sounding(5.0, 5.0, depth, 0.0)).unwrap();
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

/// Under the `Locale` policy, a node whose own hypotheses disagree
/// still reports the depth its settled neighbors agree on, once the
/// whole sheet is disambiguated together via `SurfaceAssembler`.
#[test]
fn locale_policy_pulls_a_contested_node_toward_its_neighbors() {
    let dir = tempfile::tempdir().unwrap();
    let mut sheet = MapSheet::create_at(
        dir.path(),
        projection(),
        geometry(10),
        Parameters {
            dispatcher_influence_radius: 0.5,
            node_monitor_depth: 1,
            disambiguator_policy: DisambiguatorPolicy::Locale,
            ..Parameters::default()
        },
    )
    .unwrap();
    sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();

    // A neighborhood of nodes settles on 20m...
    for (col, row) in [(3, 5), (4, 5), (6, 5), (7, 5)] {
        sheet
            .submit_sounding(&sounding(col as f64, row as f64, 20.0, 0.0))
            .unwrap();
    }
    // ...and the contested center node has two competing hypotheses,
    // one of which agrees with the neighborhood.
    sheet.submit_sounding(&sounding(5.0, 5.0, 20.0, 1.0)).unwrap();
    sheet.submit_sounding(&sounding(5.0, 5.0, 90.0, 2.0)).unwrap();
    assert_eq!(sheet.hypotheses_at(5, 5).unwrap().hypothesis_count(), 2);

    let grid = SurfaceAssembler::emit(&mut sheet, Layer::Depth).unwrap();
    let idx = 5 * 10 + 5;
    assert!((grid.samples[idx] - 20.0).abs() < 1.0);
}

/// A depth/angle gate rejects a sounding outright, independent of the
/// 6 numbered scenarios but the same gating path they all pass through.
#[test]
fn gated_sounding_never_reaches_a_node() {
    let dir = tempfile::tempdir().unwrap();
    let mut sheet = MapSheet::create_at(
        dir.path(),
        projection(),
        geometry(10),
        Parameters::default(),
    )
    .unwrap()
    .with_gates(Gates {
        min_depth: 0.0,
        max_depth: 100.0,
        max_beam_angle_deg: 60.0,
    });
    sheet.attach_depth_layer(Algorithm::Hypothesis).unwrap();

    let mut rejected = sounding(5.0, 5.0, 42.0, 0.0);
    rejected.beam_angle_deg = 75.0;
    let outcome = sheet.submit_sounding(&rejected).unwrap();
    assert_eq!(outcome, DispatchOutcome::Dropped);
}
