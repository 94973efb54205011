//! Sounding batch generators.
//!
//! Deterministic-by-seed: a small hash mix stands in for an RNG so
//! callers get reproducible pseudo-random soundings — "some depths,
//! same every run" — without pulling a full RNG dependency into the
//! test tree.

use mapsheet_common::Timestamp;
use mapsheet_core::{GridGeometry, Sounding};

/// One sounding landing exactly on the nearest node to the center of
/// `geometry`, with `depth_variance = variance` and zero beam angle —
/// the shape of a single-sounding-single-node worked example.
pub fn single_sounding_at_center(geometry: &GridGeometry, depth: f32, variance: f32) -> Sounding {
    let (col, row) = (geometry.width_nodes / 2, geometry.height_nodes / 2);
    let (x, y) = geometry.node_location(col, row);
    sounding_at(x, y, depth, variance, 0.0)
}

/// A single sounding record at a projected location.
pub fn sounding_at(east: f64, north: f64, depth: f32, variance: f32, timestamp: f64) -> Sounding {
    Sounding {
        east,
        north,
        depth,
        depth_variance: variance,
        along_track_variance: 0.0,
        across_track_variance: 0.0,
        beam_angle_deg: 0.0,
        timestamp: Timestamp::new(timestamp),
        backscatter: None,
    }
}

/// A batch of soundings all at the same node, with the given depths in
/// order — the "several soundings, same place, different depths" shape
/// used to exercise folding versus monitoring.
pub fn soundings_at_node_with_depths(
    geometry: &GridGeometry,
    col: u32,
    row: u32,
    depths: impl IntoIterator<Item = f32>,
    variance: f32,
) -> Vec<Sounding> {
    let (x, y) = geometry.node_location(col, row);
    depths
        .into_iter()
        .enumerate()
        .map(|(i, d)| sounding_at(x, y, d, variance, i as f64))
        .collect()
}

/// One sounding per tile, each landing on that tile's northwest-most
/// node — exercises eviction round-trips by targeting a distinct tile
/// per sounding.
pub fn one_sounding_per_tile(
    geometry: &GridGeometry,
    tile_width: u32,
    tile_height: u32,
    depth: f32,
    variance: f32,
) -> Vec<Sounding> {
    let tile_cols = div_ceil(geometry.width_nodes, tile_width);
    let tile_rows = div_ceil(geometry.height_nodes, tile_height);
    let mut out = Vec::with_capacity((tile_cols * tile_rows) as usize);
    let mut t = 0f64;
    for tr in 0..tile_rows {
        for tc in 0..tile_cols {
            let col = tc * tile_width;
            let row = tr * tile_height;
            if col >= geometry.width_nodes || row >= geometry.height_nodes {
                continue;
            }
            let (x, y) = geometry.node_location(col, row);
            out.push(sounding_at(x, y, depth, variance, t));
            t += 1.0;
        }
    }
    out
}

/// Deterministic pseudo-random soundings scattered within `geometry`'s
/// bounds, reproducible by `seed` — the same per-cell hash mix adapted
/// here to a per-sample one.
pub fn scattered_soundings(
    geometry: &GridGeometry,
    count: usize,
    depth_range: (f32, f32),
    variance: f32,
    seed: u32,
) -> Vec<Sounding> {
    let (lo, hi) = depth_range;
    (0..count)
        .map(|i| {
            let hx = simple_hash(i as u32, 0, seed);
            let hy = simple_hash(i as u32, 1, seed);
            let hd = simple_hash(i as u32, 2, seed);
            let x = geometry.bounds.sw_x + unit_fraction(hx) * geometry.bounds.width();
            let y = geometry.bounds.sw_y + unit_fraction(hy) * geometry.bounds.height();
            let depth = lo + unit_fraction(hd) * (hi - lo);
            sounding_at(x, y, depth, variance, i as f64)
        })
        .collect()
}

fn div_ceil(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

fn unit_fraction(h: u32) -> f64 {
    (h % 100_000) as f64 / 100_000.0
}

fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapsheet_common::ProjectedBounds;

    fn geometry() -> GridGeometry {
        GridGeometry::new(16, 16, 1.0, 1.0, ProjectedBounds::new(0.0, 0.0, 16.0, 16.0))
    }

    #[test]
    fn one_sounding_per_tile_covers_every_tile() {
        let soundings = one_sounding_per_tile(&geometry(), 4, 4, 10.0, 1.0);
        assert_eq!(soundings.len(), 16);
    }

    #[test]
    fn scattered_soundings_are_deterministic_by_seed() {
        let a = scattered_soundings(&geometry(), 50, (0.0, 100.0), 1.0, 7);
        let b = scattered_soundings(&geometry(), 50, (0.0, 100.0), 1.0, 7);
        assert_eq!(a, b);

        let c = scattered_soundings(&geometry(), 50, (0.0, 100.0), 1.0, 8);
        assert_ne!(a, c);
    }

    #[test]
    fn scattered_soundings_stay_within_bounds() {
        let geometry = geometry();
        for s in scattered_soundings(&geometry, 200, (0.0, 100.0), 1.0, 42) {
            assert!(geometry.bounds.contains(s.east, s.north));
        }
    }
}
