//! `SoundingDispatcher`: propagates one sounding to the
//! neighborhood of grid nodes within its influence radius.

use mapsheet_common::error::Result;
use mapsheet_common::Timestamp;
use tracing::{debug, warn};

use crate::algorithm::Algorithm;
use crate::cache::TileCache;
use crate::config::Parameters;
use crate::types::GridGeometry;
use storage::BackingStore;

/// A single georeferenced depth observation: the abstract record the core consumes. Concrete device or
/// interchange formats are out of scope; callers
/// are responsible for producing this shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sounding {
    pub east: f64,
    pub north: f64,
    /// Positive-down depth, meters.
    pub depth: f32,
    /// Propagated depth variance, m².
    pub depth_variance: f32,
    pub along_track_variance: f32,
    pub across_track_variance: f32,
    /// Degrees, positive starboard.
    pub beam_angle_deg: f32,
    pub timestamp: Timestamp,
    pub backscatter: Option<u16>,
}

/// Depth/angle gates applied to the sounding itself before any node is
/// touched; soundings outside these are silently
/// dropped, not an error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gates {
    pub min_depth: f32,
    pub max_depth: f32,
    pub max_beam_angle_deg: f32,
}

impl Default for Gates {
    fn default() -> Self {
        Self {
            min_depth: f32::NEG_INFINITY,
            max_depth: f32::INFINITY,
            max_beam_angle_deg: 90.0,
        }
    }
}

impl Gates {
    pub fn accepts(&self, s: &Sounding) -> bool {
        s.depth >= self.min_depth
            && s.depth <= self.max_depth
            && s.beam_angle_deg.abs() <= self.max_beam_angle_deg
    }
}

/// Outcome of dispatching one sounding, surfaced for logging/testing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The sounding failed a gate or fell entirely outside the sheet.
    Dropped,
    /// At least one node was updated.
    Applied { nodes_touched: u32 },
}

/// Computes the footprint of a sounding over the node grid and routes
/// the per-node update through `TileCache`.
pub struct SoundingDispatcher {
    pub gates: Gates,
}

impl SoundingDispatcher {
    pub fn new(gates: Gates) -> Self {
        Self { gates }
    }

    /// Dispatch one sounding against `cache`. `algorithm` overrides
    /// `params.node_max_hypotheses` to 1 for the degenerate `Nodal`
    /// estimator.
    pub fn dispatch<S: BackingStore>(
        &self,
        sounding: &Sounding,
        geometry: &GridGeometry,
        predicted_depth: Option<&dyn Fn(u32, u32) -> Option<f64>>,
        algorithm: Algorithm,
        params: &Parameters,
        cache: &mut TileCache<S>,
    ) -> Result<DispatchOutcome> {
        if !self.gates.accepts(sounding) {
            warn!(
                depth = sounding.depth,
                beam_angle = sounding.beam_angle_deg,
                "sounding rejected by depth/angle gate"
            );
            return Ok(DispatchOutcome::Dropped);
        }

        let rho = params.dispatcher_influence_radius;
        let (center_col, center_row) = geometry.nearest_node(sounding.east, sounding.north);
        let half_width_nodes_e = (rho / geometry.spacing_e).ceil() as i64 + 1;
        let half_width_nodes_n = (rho / geometry.spacing_n).ceil() as i64 + 1;

        let effective_max_hypotheses = if algorithm == Algorithm::Nodal {
            let mut p = *params;
            p.node_max_hypotheses = 1;
            p
        } else {
            *params
        };

        let mut touched = 0u32;
        for dr in -half_width_nodes_n..=half_width_nodes_n {
            for dc in -half_width_nodes_e..=half_width_nodes_e {
                let col = center_col + dc;
                let row = center_row + dr;
                if !geometry.contains_node(col, row) {
                    continue;
                }
                let col = col as u32;
                let row = row as u32;

                let (nx, ny) = geometry.node_location(col, row);
                let d = ((sounding.east - nx).powi(2) + (sounding.north - ny).powi(2)).sqrt();
                if d >= rho {
                    continue;
                }

                let slope = predicted_depth
                    .and_then(|f| f(col, row))
                    .map(|center_prior| {
                        // Local slope estimate: rise over the run to this
                        // node, using the prior at the node itself as the
                        // best available estimate of the surface there.
                        if d > 1e-9 {
                            ((center_prior - sounding.depth as f64) / d).abs()
                        } else {
                            0.0
                        }
                    })
                    .unwrap_or(0.0);

                let sigma_z_sq = sounding.depth_variance as f64;
                let slope_term = (slope * d).powi(2);
                let inflation_term =
                    params.dispatcher_distance_inflation * (d / rho).powi(2) * sigma_z_sq;
                let sigma_eff_sq = sigma_z_sq + slope_term + inflation_term;

                // IDW positional reliability weight, `1/(d²+ε)` floored
                // against blowing up at `d=0`, normalized so a sounding
                // landing exactly on its node (full reliability) leaves
                // the propagated variance unscaled, and variance
                // inflates smoothly as `d` grows toward `ρ`.
                const FLOOR_EPS: f64 = 1e-6;
                let propagated_variance = sigma_eff_sq * (d * d + FLOOR_EPS) / FLOOR_EPS;

                let mut handle = cache.get_node_mut(col, row)?;
                handle.update(
                    sounding.depth as f64,
                    propagated_variance,
                    sounding.timestamp,
                    &effective_max_hypotheses,
                );
                touched += 1;
            }
        }

        debug!(
            east = sounding.east,
            north = sounding.north,
            nodes_touched = touched,
            "sounding dispatched"
        );

        if touched == 0 {
            Ok(DispatchOutcome::Dropped)
        } else {
            Ok(DispatchOutcome::Applied {
                nodes_touched: touched,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TileCache;
    use crate::node::NodeState;
    use crate::tile::TileGrid;
    use mapsheet_common::ProjectedBounds;
    use storage::DirectoryBackingStore;

    fn geometry() -> GridGeometry {
        GridGeometry::new(10, 10, 1.0, 1.0, ProjectedBounds::new(0.0, 0.0, 10.0, 10.0))
    }

    fn cache() -> TileCache<DirectoryBackingStore> {
        let dir = tempfile::tempdir().unwrap();
        let store = DirectoryBackingStore::open(dir.path()).unwrap();
        let grid = TileGrid::new(10, 10, 10, 10);
        TileCache::new(grid, Algorithm::Hypothesis, 8, 32, store, 128, 1000)
    }

    #[test]
    fn single_sounding_single_node_scenario_1() {
        let mut cache = cache();
        let geometry = geometry();
        let params = Parameters {
            dispatcher_influence_radius: 1.0,
            ..Parameters::default()
        };
        let dispatcher = SoundingDispatcher::new(Gates::default());
        let sounding = Sounding {
            east: 5.0,
            north: 5.0,
            depth: 42.0,
            depth_variance: 1.0,
            along_track_variance: 0.0,
            across_track_variance: 0.0,
            beam_angle_deg: 0.0,
            timestamp: Timestamp::new(0.0),
            backscatter: None,
        };
        let outcome = dispatcher
            .dispatch(&sounding, &geometry, None, Algorithm::Hypothesis, &params, &mut cache)
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Applied { nodes_touched: 1 });

        match cache.get_node(5, 5).unwrap() {
            NodeState::Hypothesis(h) => {
                assert_eq!(h.hypotheses.len(), 1);
                assert!((h.hypotheses[0].z - 42.0).abs() < 1e-9);
                assert_eq!(h.hypotheses[0].n, 1);
            }
            _ => panic!("expected hypothesis node"),
        }

        match cache.get_node(0, 0).unwrap() {
            NodeState::Hypothesis(h) => assert!(h.hypotheses.is_empty()),
            _ => panic!("expected hypothesis node"),
        }
    }

    #[test]
    fn gated_sounding_is_dropped() {
        let mut cache = cache();
        let geometry = geometry();
        let params = Parameters::default();
        let dispatcher = SoundingDispatcher::new(Gates {
            min_depth: 0.0,
            max_depth: 100.0,
            max_beam_angle_deg: 60.0,
        });
        let sounding = Sounding {
            east: 5.0,
            north: 5.0,
            depth: 42.0,
            depth_variance: 1.0,
            along_track_variance: 0.0,
            across_track_variance: 0.0,
            beam_angle_deg: 75.0,
            timestamp: Timestamp::new(0.0),
            backscatter: None,
        };
        let outcome = dispatcher
            .dispatch(&sounding, &geometry, None, Algorithm::Hypothesis, &params, &mut cache)
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Dropped);
    }

    #[test]
    fn sounding_outside_sheet_bounds_touches_nothing() {
        let mut cache = cache();
        let geometry = geometry();
        let params = Parameters {
            dispatcher_influence_radius: 1.0,
            ..Parameters::default()
        };
        let dispatcher = SoundingDispatcher::new(Gates::default());
        let sounding = Sounding {
            east: 500.0,
            north: 500.0,
            depth: 42.0,
            depth_variance: 1.0,
            along_track_variance: 0.0,
            across_track_variance: 0.0,
            beam_angle_deg: 0.0,
            timestamp: Timestamp::new(0.0),
            backscatter: None,
        };
        let outcome = dispatcher
            .dispatch(&sounding, &geometry, None, Algorithm::Hypothesis, &params, &mut cache)
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Dropped);
    }
}
