//! `Disambiguator`: selects the reportable hypothesis
//! per node.

use serde::{Deserialize, Serialize};

use crate::hypothesis::{z_score, Hypothesis};
use crate::node::{BinnedNode, HypothesisNode};

/// The disambiguation policy, selected per `MapSheet` and resolvable
/// per-node by nomination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisambiguatorPolicy {
    Nominated,
    Locale,
    Prior,
    Density,
}

impl DisambiguatorPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nominated" => Some(Self::Nominated),
            "locale" => Some(Self::Locale),
            "prior" => Some(Self::Prior),
            "density" => Some(Self::Density),
            _ => None,
        }
    }
}

/// The reportable summary of one node: `(z, uncertainty as configured
/// CI width, sample count, hypothesis count, hypothesis strength)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disambiguation {
    pub depth: f64,
    pub ci_width: f64,
    pub sample_count: u32,
    pub hypothesis_count: u32,
    /// A monotone function of residuals between live hypotheses: 1.0
    /// when there is exactly one hypothesis (no disagreement), falling
    /// toward 0 as competing hypotheses diverge more from the chosen one.
    pub hypothesis_strength: f64,
}

/// A disambiguated neighbor used by the `Locale` policy's iterative
/// pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocaleNeighbor {
    pub depth: f64,
    pub variance: f64,
}

pub struct Disambiguator {
    pub policy: DisambiguatorPolicy,
    pub ci_level: f64,
}

impl Disambiguator {
    pub fn new(policy: DisambiguatorPolicy, ci_level: f64) -> Self {
        Self { policy, ci_level }
    }

    /// Disambiguate one node. `locale_neighbors` is consulted only
    /// under `DisambiguatorPolicy::Locale`; the caller supplies the
    /// already-disambiguated 3x3 (or configured) window.
    pub fn disambiguate(
        &self,
        node: &HypothesisNode,
        locale_neighbors: &[LocaleNeighbor],
    ) -> Option<Disambiguation> {
        if node.hypotheses.is_empty() {
            return None;
        }

        let chosen_idx = self.select_index(node, locale_neighbors);
        let chosen = &node.hypotheses[chosen_idx];
        Some(self.summarize(node, chosen))
    }

    fn select_index(&self, node: &HypothesisNode, locale_neighbors: &[LocaleNeighbor]) -> usize {
        if let Some(nomination) = node.nomination {
            if nomination < node.hypotheses.len() {
                return nomination;
            }
        }

        match self.policy {
            DisambiguatorPolicy::Nominated => self.density_index(node),
            DisambiguatorPolicy::Locale => self.locale_index(node, locale_neighbors),
            DisambiguatorPolicy::Prior => self.prior_index(node),
            DisambiguatorPolicy::Density => self.density_index(node),
        }
    }

    fn density_index(&self, node: &HypothesisNode) -> usize {
        node.hypotheses
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| {
                a.n.cmp(&b.n).then_with(|| b.variance.total_cmp(&a.variance))
            })
            .map(|(i, _)| i)
            .expect("node has at least one hypothesis")
    }

    fn prior_index(&self, node: &HypothesisNode) -> usize {
        match node.predicted_depth {
            Some(prior) => node
                .hypotheses
                .iter()
                .enumerate()
                .min_by(|(_, a), (_, b)| {
                    (a.z - prior).abs().total_cmp(&(b.z - prior).abs())
                })
                .map(|(i, _)| i)
                .expect("node has at least one hypothesis"),
            None => self.density_index(node),
        }
    }

    fn locale_index(&self, node: &HypothesisNode, neighbors: &[LocaleNeighbor]) -> usize {
        if neighbors.is_empty() {
            return self.density_index(node);
        }
        let weight_sum: f64 = neighbors.iter().map(|n| 1.0 / n.variance.max(1e-9)).sum();
        let weighted_mean: f64 = neighbors
            .iter()
            .map(|n| n.depth / n.variance.max(1e-9))
            .sum::<f64>()
            / weight_sum.max(1e-12);

        node.hypotheses
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (a.z - weighted_mean)
                    .abs()
                    .total_cmp(&(b.z - weighted_mean).abs())
            })
            .map(|(i, _)| i)
            .expect("node has at least one hypothesis")
    }

    /// Tie-break a user-nominated depth to the closest live hypothesis
    /// by absolute depth difference, matching within 0.001 m. Returns `None` if no hypothesis matches.
    pub fn match_nomination(&self, node: &HypothesisNode, nominated_depth: f64) -> Option<usize> {
        node.hypotheses
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (a.z - nominated_depth)
                    .abs()
                    .total_cmp(&(b.z - nominated_depth).abs())
            })
            .filter(|(_, h)| (h.z - nominated_depth).abs() <= 0.001)
            .map(|(i, _)| i)
    }

    fn summarize(&self, node: &HypothesisNode, chosen: &Hypothesis) -> Disambiguation {
        let strength = hypothesis_strength(node, chosen);
        Disambiguation {
            depth: chosen.z,
            ci_width: chosen.ci_width(self.ci_level),
            sample_count: chosen.n,
            hypothesis_count: node.hypotheses.len() as u32,
            hypothesis_strength: strength,
        }
    }

    /// Disambiguate a binned (mean or median) node: there is no
    /// hypothesis competition, so `hypothesis_count` is always 1 and
    /// `hypothesis_strength` is always 1.0.
    pub fn disambiguate_binned(&self, node: &BinnedNode, use_median: bool) -> Option<Disambiguation> {
        let depth = if use_median { node.median() } else { node.mean() }?;
        let variance = node.variance().unwrap_or(0.0);
        Some(Disambiguation {
            depth,
            ci_width: z_score(self.ci_level) * variance.sqrt(),
            sample_count: node.total_seen.min(u32::MAX as u64) as u32,
            hypothesis_count: 1,
            hypothesis_strength: 1.0,
        })
    }
}

/// Monotone in the residuals between the chosen hypothesis and the
/// others: `1.0` with a single hypothesis, falling as competitors pull
/// further away (and as they accumulate more samples, since a
/// well-supported competitor is a stronger disagreement than a
/// one-sample outlier).
fn hypothesis_strength(node: &HypothesisNode, chosen: &Hypothesis) -> f64 {
    if node.hypotheses.len() <= 1 {
        return 1.0;
    }
    let disagreement: f64 = node
        .hypotheses
        .iter()
        .filter(|h| !std::ptr::eq(*h, chosen))
        .map(|h| {
            let residual = (h.z - chosen.z).abs();
            let scale = chosen.variance.sqrt().max(1e-6);
            (h.n as f64) * (residual / scale)
        })
        .sum();
    let total_n = node.hypotheses.iter().map(|h| h.n as f64).sum::<f64>().max(1.0);
    (1.0 / (1.0 + disagreement / total_n)).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapsheet_common::Timestamp;

    fn node_with(depths: &[(f64, f64, u32)]) -> HypothesisNode {
        let mut n = HypothesisNode::default();
        for &(z, v, count) in depths {
            n.hypotheses.push(Hypothesis {
                z,
                variance: v,
                n: count,
                sample_variance_sum: v * count as f64,
                first_touch: Timestamp::new(0.0),
                last_touch: Timestamp::new(0.0),
            });
        }
        n
    }

    #[test]
    fn density_prefers_largest_sample_count() {
        let node = node_with(&[(20.0, 1.0, 1), (25.0, 1.0, 5)]);
        let d = Disambiguator::new(DisambiguatorPolicy::Density, 0.95);
        let result = d.disambiguate(&node, &[]).unwrap();
        assert_eq!(result.depth, 25.0);
    }

    #[test]
    fn nomination_override_wins_regardless_of_policy_scenario_6() {
        let mut node = node_with(&[(20.0, 1.0, 10), (25.0, 1.0, 1)]);
        let d = Disambiguator::new(DisambiguatorPolicy::Density, 0.95);
        node.nomination = d.match_nomination(&node, 25.000);
        assert_eq!(node.nomination, Some(1));
        let result = d.disambiguate(&node, &[]).unwrap();
        assert_eq!(result.depth, 25.0);

        node.nomination = None;
        let result = d.disambiguate(&node, &[]).unwrap();
        assert_eq!(result.depth, 20.0);
    }

    #[test]
    fn prior_prefers_hypothesis_closest_to_predicted_depth() {
        let mut node = node_with(&[(20.0, 1.0, 1), (25.0, 1.0, 1)]);
        node.predicted_depth = Some(24.0);
        let d = Disambiguator::new(DisambiguatorPolicy::Prior, 0.95);
        let result = d.disambiguate(&node, &[]).unwrap();
        assert_eq!(result.depth, 25.0);
    }

    #[test]
    fn single_hypothesis_has_full_strength() {
        let node = node_with(&[(42.0, 1.0, 3)]);
        let d = Disambiguator::new(DisambiguatorPolicy::Density, 0.95);
        let result = d.disambiguate(&node, &[]).unwrap();
        assert_eq!(result.hypothesis_strength, 1.0);
        assert_eq!(result.hypothesis_count, 1);
    }

    #[test]
    fn binned_median_matches_scenario_5() {
        let mut node = BinnedNode::default();
        for depth in [1.0, 2.0, 3.0, 100.0, 5.0, 6.0, 7.0] {
            node.add(depth, 32);
        }
        let d = Disambiguator::new(DisambiguatorPolicy::Density, 0.95);
        let result = d.disambiguate_binned(&node, true).unwrap();
        assert_eq!(result.depth, 5.0);
    }
}
