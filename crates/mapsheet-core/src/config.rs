//! Configuration options recognized by the core.

use mapsheet_common::error::{MapSheetError, Result};
use serde::{Deserialize, Serialize};

use crate::disambiguator::DisambiguatorPolicy;

/// The full set of core-recognized configuration options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    pub tile_width: u32,
    pub tile_height: u32,

    pub cache_capacity: usize,
    /// Age, in `TileCache` clock ticks, past which `minimize_memory`
    /// evicts an otherwise-untouched resident tile.
    pub cache_sell_by: u64,

    pub node_max_hypotheses: u32,
    /// The χ² match threshold `T_match`, default
    /// corresponding to ~95% (χ²_{0.95,1} ≈ 3.84).
    pub node_match_threshold: f64,
    /// `M_monitor`: samples a monitored candidate accumulates before
    /// being promoted to a new hypothesis.
    pub node_monitor_depth: u32,
    pub node_variance_floor: f64,

    pub dispatcher_influence_radius: f64,
    /// `k`, the distance-variance inflation factor.
    pub dispatcher_distance_inflation: f64,

    pub binned_max_slots: u32,

    pub disambiguator_policy: DisambiguatorPolicy,
    pub disambiguator_ci_level: f64,
    /// Half-width, in nodes, of the `Locale` policy's neighbor window —
    /// `1` means the classic 3×3 window.
    pub disambiguator_locale_window: u32,
    /// Bound on `Locale`'s iterate-until-stable passes over the sheet.
    pub disambiguator_locale_max_passes: u32,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            tile_width: 64,
            tile_height: 64,
            cache_capacity: 128,
            cache_sell_by: 1000,
            node_max_hypotheses: 8,
            node_match_threshold: 3.84,
            node_monitor_depth: 5,
            node_variance_floor: 0.01,
            dispatcher_influence_radius: 5.0,
            dispatcher_distance_inflation: 1.0,
            binned_max_slots: 32,
            disambiguator_policy: DisambiguatorPolicy::Density,
            disambiguator_ci_level: 0.95,
            disambiguator_locale_window: 1,
            disambiguator_locale_max_passes: 4,
        }
    }
}

impl Parameters {
    /// Load overrides from environment variables under the
    /// `MAPSHEET_`-prefixed convention.
    pub fn from_env() -> Self {
        let mut p = Self::default();

        if let Ok(v) = std::env::var("MAPSHEET_TILE_WIDTH") {
            if let Ok(n) = v.parse() {
                p.tile_width = n;
            }
        }
        if let Ok(v) = std::env::var("MAPSHEET_TILE_HEIGHT") {
            if let Ok(n) = v.parse() {
                p.tile_height = n;
            }
        }
        if let Ok(v) = std::env::var("MAPSHEET_CACHE_CAPACITY") {
            if let Ok(n) = v.parse() {
                p.cache_capacity = n;
            }
        }
        if let Ok(v) = std::env::var("MAPSHEET_CACHE_SELL_BY") {
            if let Ok(n) = v.parse() {
                p.cache_sell_by = n;
            }
        }
        if let Ok(v) = std::env::var("MAPSHEET_NODE_MAX_HYPOTHESES") {
            if let Ok(n) = v.parse() {
                p.node_max_hypotheses = n;
            }
        }
        if let Ok(v) = std::env::var("MAPSHEET_NODE_MATCH_THRESHOLD") {
            if let Ok(n) = v.parse() {
                p.node_match_threshold = n;
            }
        }
        if let Ok(v) = std::env::var("MAPSHEET_NODE_MONITOR_DEPTH") {
            if let Ok(n) = v.parse() {
                p.node_monitor_depth = n;
            }
        }
        if let Ok(v) = std::env::var("MAPSHEET_NODE_VARIANCE_FLOOR") {
            if let Ok(n) = v.parse() {
                p.node_variance_floor = n;
            }
        }
        if let Ok(v) = std::env::var("MAPSHEET_DISPATCHER_INFLUENCE_RADIUS") {
            if let Ok(n) = v.parse() {
                p.dispatcher_influence_radius = n;
            }
        }
        if let Ok(v) = std::env::var("MAPSHEET_DISPATCHER_DISTANCE_INFLATION") {
            if let Ok(n) = v.parse() {
                p.dispatcher_distance_inflation = n;
            }
        }
        if let Ok(v) = std::env::var("MAPSHEET_BINNED_MAX_SLOTS") {
            if let Ok(n) = v.parse() {
                p.binned_max_slots = n;
            }
        }
        if let Ok(v) = std::env::var("MAPSHEET_DISAMBIGUATOR_POLICY") {
            if let Some(policy) = DisambiguatorPolicy::from_str(&v) {
                p.disambiguator_policy = policy;
            }
        }
        if let Ok(v) = std::env::var("MAPSHEET_DISAMBIGUATOR_CI_LEVEL") {
            if let Ok(n) = v.parse() {
                p.disambiguator_ci_level = n;
            }
        }
        if let Ok(v) = std::env::var("MAPSHEET_DISAMBIGUATOR_LOCALE_WINDOW") {
            if let Ok(n) = v.parse() {
                p.disambiguator_locale_window = n;
            }
        }
        if let Ok(v) = std::env::var("MAPSHEET_DISAMBIGUATOR_LOCALE_MAX_PASSES") {
            if let Ok(n) = v.parse() {
                p.disambiguator_locale_max_passes = n;
            }
        }

        p
    }

    /// Reject invalid parameter values at configuration time.
    pub fn validate(&self) -> Result<()> {
        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(MapSheetError::input("tile dimensions must be > 0"));
        }
        if self.cache_capacity == 0 {
            return Err(MapSheetError::input("cache.capacity must be > 0"));
        }
        if self.node_max_hypotheses == 0 {
            return Err(MapSheetError::input("node.max_hypotheses must be > 0"));
        }
        if self.node_match_threshold <= 0.0 {
            return Err(MapSheetError::input("node.match_threshold must be > 0"));
        }
        if self.node_monitor_depth == 0 {
            return Err(MapSheetError::input("node.monitor_depth must be > 0"));
        }
        if self.node_variance_floor <= 0.0 {
            return Err(MapSheetError::input("node.variance_floor must be > 0"));
        }
        if self.dispatcher_influence_radius <= 0.0 {
            return Err(MapSheetError::input(
                "dispatcher.influence_radius must be > 0",
            ));
        }
        if self.dispatcher_distance_inflation < 0.0 {
            return Err(MapSheetError::input(
                "dispatcher.distance_inflation must be >= 0",
            ));
        }
        if self.binned_max_slots == 0 {
            return Err(MapSheetError::input("binned.max_slots must be > 0"));
        }
        if !(0.0..1.0).contains(&self.disambiguator_ci_level) {
            return Err(MapSheetError::input(
                "disambiguator.ci_level must be in [0, 1)",
            ));
        }
        if self.disambiguator_locale_max_passes == 0 {
            return Err(MapSheetError::input(
                "disambiguator.locale_max_passes must be > 0",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_parameters_validate() {
        assert!(Parameters::default().validate().is_ok());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut p = Parameters::default();
        p.cache_capacity = 0;
        assert!(p.validate().is_err());
    }

    #[test]
    fn zero_hypotheses_cap_is_rejected() {
        let mut p = Parameters::default();
        p.node_max_hypotheses = 0;
        assert!(p.validate().is_err());
    }
}
