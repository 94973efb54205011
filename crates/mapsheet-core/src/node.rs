//! `NodeEstimator` — per-node depth hypothesis tracking
//! and the alternative in-memory estimators.

use mapsheet_common::Timestamp;

use crate::config::Parameters;
use crate::hypothesis::Hypothesis;

/// A sliding-window intermediate sum for a sample that did not match
/// any live hypothesis closely enough to fold directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Monitor {
    pub z: f64,
    pub variance: f64,
    pub count: u32,
}

impl Monitor {
    fn start(d: f64, sigma_sq: f64) -> Self {
        Self {
            z: d,
            variance: sigma_sq,
            count: 1,
        }
    }

    fn fold(&mut self, d: f64, sigma_sq: f64, variance_floor: f64) {
        let denom = self.variance + sigma_sq;
        let z_new = (self.z * sigma_sq + d * self.variance) / denom;
        let v_new = (self.variance * sigma_sq / denom).max(variance_floor);
        self.z = z_new;
        self.variance = v_new;
        self.count += 1;
    }
}

/// The full per-node state of the hypothesis tracker. Also backs the
/// degenerate `Nodal` algorithm, which is this same update rule with
/// `node_max_hypotheses` forced to 1.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HypothesisNode {
    pub hypotheses: Vec<Hypothesis>,
    pub monitor: Option<Monitor>,
    pub predicted_depth: Option<f64>,
    pub nomination: Option<usize>,
    pub write_epoch: u64,
}

impl HypothesisNode {
    /// Fold one proposed depth into this node's hypothesis set.
    pub fn update(&mut self, d: f64, sigma_sq: f64, timestamp: Timestamp, params: &Parameters) {
        self.write_epoch += 1;

        if self.hypotheses.is_empty() {
            self.hypotheses.push(Hypothesis::new(d, sigma_sq, timestamp));
            self.monitor = None;
            return;
        }

        let (best_idx, best_r2) = self.best_match(d, sigma_sq);

        if best_r2 <= params.node_match_threshold {
            self.hypotheses[best_idx].fold(d, sigma_sq, timestamp, params.node_variance_floor);
            self.monitor = None;
            return;
        }

        // No direct match: accumulate into the monitor. `just_started`
        // tracks whether this call is the one that seeded the monitor
        // from `(d, sigma_sq)`, so that seed sample is never folded a
        // second time into itself — checking purely by value would
        // wrongly skip a later, unrelated sample that happens to carry
        // the same (z, variance) as the monitor's current state.
        let just_started = self.monitor.is_none();
        let monitor = self.monitor.get_or_insert_with(|| Monitor::start(d, sigma_sq));
        if !just_started {
            monitor.fold(d, sigma_sq, params.node_variance_floor);
        }

        if monitor.count < params.node_monitor_depth {
            return;
        }

        let monitor = self.monitor.take().unwrap();
        let (retry_idx, retry_r2) = self.best_match(monitor.z, monitor.variance);
        let cap_reached = (self.hypotheses.len() as u32) >= params.node_max_hypotheses;
        if retry_r2 <= params.node_match_threshold || cap_reached {
            // Either the matured monitor now matches a live hypothesis,
            // or it doesn't but the cap forbids promoting it anyway:
            // either way it folds into the closest hypothesis instead.
            let h = &mut self.hypotheses[retry_idx];
            h.fold(monitor.z, monitor.variance, timestamp, params.node_variance_floor);
            h.n += monitor.count - 1; // one fold already counted above
            return;
        }

        let mut promoted = Hypothesis::new(monitor.z, monitor.variance, timestamp);
        promoted.n = monitor.count;
        self.hypotheses.push(promoted);
    }

    fn best_match(&self, d: f64, sigma_sq: f64) -> (usize, f64) {
        self.hypotheses
            .iter()
            .enumerate()
            .map(|(i, h)| (i, h.standardized_residual_sq(d, sigma_sq)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .expect("hypotheses is non-empty when best_match is called")
    }

    /// Removal is by swap-with-last-and-truncate, adjusting a
    /// nomination that pointed at either the removed slot or the slot
    /// it was replaced by.
    pub fn remove_hypothesis(&mut self, idx: usize) {
        let last = self.hypotheses.len() - 1;
        self.hypotheses.swap(idx, last);
        self.hypotheses.pop();
        self.nomination = match self.nomination {
            Some(n) if n == idx => None,
            Some(n) if n == last => Some(idx),
            other => other,
        };
    }
}

/// Raw per-node depth pool for the binned mean/median estimators. The
/// same storage backs both — the choice of mean vs. median is a
/// readback-time decision made by `Disambiguator`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BinnedNode {
    pub depths: Vec<f32>,
    pub total_seen: u64,
}

impl BinnedNode {
    /// Reservoir-sample a new depth into the bounded pool (Algorithm R):
    /// while under `max_slots`, always keep; beyond it, replace a
    /// uniformly random existing slot with probability
    /// `max_slots / (total_seen + 1)`.
    pub fn add(&mut self, d: f32, max_slots: u32) {
        use rand::Rng;
        if (self.depths.len() as u32) < max_slots {
            self.depths.push(d);
        } else {
            let j = rand::thread_rng().gen_range(0..=self.total_seen);
            if j < max_slots as u64 {
                self.depths[j as usize] = d;
            }
        }
        self.total_seen += 1;
    }

    pub fn mean(&self) -> Option<f64> {
        if self.depths.is_empty() {
            return None;
        }
        Some(self.depths.iter().map(|&d| d as f64).sum::<f64>() / self.depths.len() as f64)
    }

    pub fn median(&self) -> Option<f64> {
        if self.depths.is_empty() {
            return None;
        }
        let mut sorted: Vec<f64> = self.depths.iter().map(|&d| d as f64).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            Some((sorted[mid - 1] + sorted[mid]) / 2.0)
        } else {
            Some(sorted[mid])
        }
    }

    pub fn variance(&self) -> Option<f64> {
        if self.depths.len() < 2 {
            return None;
        }
        let mean = self.mean()?;
        let sum_sq: f64 = self
            .depths
            .iter()
            .map(|&d| (d as f64 - mean).powi(2))
            .sum();
        Some(sum_sq / (self.depths.len() - 1) as f64)
    }
}

/// The per-node state, tagged by which in-memory estimator the owning
/// MapSheet is configured with.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeState {
    Hypothesis(HypothesisNode),
    Binned(BinnedNode),
}

impl NodeState {
    pub fn as_hypothesis(&self) -> Option<&HypothesisNode> {
        match self {
            NodeState::Hypothesis(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_hypothesis_mut(&mut self) -> Option<&mut HypothesisNode> {
        match self {
            NodeState::Hypothesis(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_binned(&self) -> Option<&BinnedNode> {
        match self {
            NodeState::Binned(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_binned_mut(&mut self) -> Option<&mut BinnedNode> {
        match self {
            NodeState::Binned(b) => Some(b),
            _ => None,
        }
    }

    pub fn hit_count(&self) -> u32 {
        match self {
            NodeState::Hypothesis(h) => h.hypotheses.iter().map(|hy| hy.n).sum(),
            NodeState::Binned(b) => b.total_seen.min(u32::MAX as u64) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> Parameters {
        Parameters::default()
    }

    #[test]
    fn first_update_creates_single_hypothesis() {
        let mut node = HypothesisNode::default();
        node.update(42.0, 1.0, Timestamp::new(0.0), &params());
        assert_eq!(node.hypotheses.len(), 1);
        assert_eq!(node.hypotheses[0].n, 1);
    }

    #[test]
    fn consistent_samples_fold_into_one_hypothesis() {
        let mut node = HypothesisNode::default();
        node.update(42.0, 1.0, Timestamp::new(0.0), &params());
        node.update(44.0, 1.0, Timestamp::new(1.0), &params());
        assert_eq!(node.hypotheses.len(), 1);
        assert!((node.hypotheses[0].z - 43.0).abs() < 1e-9);
        assert!((node.hypotheses[0].variance - 0.5).abs() < 1e-9);
    }

    #[test]
    fn inconsistent_samples_spawn_second_hypothesis() {
        let mut p = params();
        p.node_monitor_depth = 1;
        let mut node = HypothesisNode::default();
        node.update(10.0, 1.0, Timestamp::new(0.0), &p);
        node.update(200.0, 1.0, Timestamp::new(1.0), &p);
        assert_eq!(node.hypotheses.len(), 2);
        let mut depths: Vec<f64> = node.hypotheses.iter().map(|h| h.z).collect();
        depths.sort_by(|a, b| a.total_cmp(b));
        assert!((depths[0] - 10.0).abs() < 1e-9);
        assert!((depths[1] - 200.0).abs() < 1e-9);
    }

    #[test]
    fn hypothesis_cap_is_never_exceeded() {
        let mut p = params();
        p.node_monitor_depth = 1;
        p.node_max_hypotheses = 2;
        let mut node = HypothesisNode::default();
        for (i, depth) in [10.0, 50.0, 100.0, 150.0].into_iter().enumerate() {
            node.update(depth, 1.0, Timestamp::new(i as f64), &p);
        }
        assert!(node.hypotheses.len() as u32 <= p.node_max_hypotheses);
    }

    #[test]
    fn binned_reservoir_keeps_bounded_size() {
        let mut b = BinnedNode::default();
        for i in 0..1000 {
            b.add(i as f32, 16);
        }
        assert_eq!(b.depths.len(), 16);
        assert_eq!(b.total_seen, 1000);
    }

    #[test]
    fn binned_median_matches_scenario_5() {
        let mut b = BinnedNode::default();
        for d in [1.0, 2.0, 3.0, 100.0, 5.0, 6.0, 7.0] {
            b.add(d, 32);
        }
        assert_eq!(b.median(), Some(5.0));
    }
}
