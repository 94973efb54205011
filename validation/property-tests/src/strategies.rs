//! `proptest::Strategy` generators for sheets, parameters, and sounding
//! batches.

use mapsheet_common::{ProjectedBounds, Timestamp};
use mapsheet_core::{GridGeometry, Sounding};
use proptest::prelude::*;

/// A plausible positive-down depth, meters.
pub fn depth() -> impl Strategy<Value = f32> {
    -50.0f32..2000.0
}

/// A plausible propagated depth variance, m².
pub fn variance() -> impl Strategy<Value = f32> {
    0.01f32..25.0
}

/// A small square sheet, `side` nodes per edge, 1 m spacing, SW corner
/// pinned at the projected origin — large enough to give a sounding's
/// footprint room to move, small enough that a property test iterating
/// every node stays fast.
pub fn small_geometry() -> impl Strategy<Value = GridGeometry> {
    (4u32..24).prop_map(|side| {
        GridGeometry::new(
            side,
            side,
            1.0,
            1.0,
            ProjectedBounds::new(0.0, 0.0, side as f64, side as f64),
        )
    })
}

/// A batch of soundings landing at the same projected point with
/// independently random depths — "several soundings, same place,
/// different depths".
pub fn soundings_at(
    x: f64,
    y: f64,
    count: std::ops::Range<usize>,
) -> impl Strategy<Value = Vec<Sounding>> {
    proptest::collection::vec((depth(), variance()), count).prop_map(move |samples| {
        samples
            .into_iter()
            .enumerate()
            .map(|(i, (d, v))| Sounding {
                east: x,
                north: y,
                depth: d,
                depth_variance: v,
                along_track_variance: 0.0,
                across_track_variance: 0.0,
                beam_angle_deg: 0.0,
                timestamp: Timestamp::new(i as f64),
                backscatter: None,
            })
            .collect()
    })
}

/// A batch of soundings scattered anywhere inside `geometry`'s bounds,
/// for the bounds/non-emptiness/cache-capacity invariants that need
/// coverage over more than one node.
pub fn scattered_soundings(
    geometry: GridGeometry,
    count: std::ops::Range<usize>,
) -> impl Strategy<Value = Vec<Sounding>> {
    let bounds = geometry.bounds;
    proptest::collection::vec(
        (
            bounds.sw_x..bounds.ne_x,
            bounds.sw_y..bounds.ne_y,
            depth(),
            variance(),
        ),
        count,
    )
    .prop_map(|samples| {
        samples
            .into_iter()
            .enumerate()
            .map(|(i, (x, y, d, v))| Sounding {
                east: x,
                north: y,
                depth: d,
                depth_variance: v,
                along_track_variance: 0.0,
                across_track_variance: 0.0,
                beam_angle_deg: 0.0,
                timestamp: Timestamp::new(i as f64),
                backscatter: None,
            })
            .collect()
    })
}
