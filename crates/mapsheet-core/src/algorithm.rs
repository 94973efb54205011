//! The tagged algorithm selector.
//!
//! `MapSheet` holds exactly one of these; operations that require a
//! specific variant (nomination, hypothesis queries) fail with
//! `MapSheetError::Unsupported` against any other tag.

use mapsheet_common::error::{MapSheetError, Result};
use serde::{Deserialize, Serialize};

/// Which in-memory estimator a `MapSheet` was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Algorithm {
    /// No depth layer attached yet.
    None,
    /// Nodal-Kalman: `HypothesisNode` with `node_max_hypotheses` forced
    /// to 1.
    Nodal,
    BinnedMean,
    BinnedMedian,
    /// The full multi-hypothesis mixture tracker.
    Hypothesis,
}

impl Algorithm {
    pub fn tag(self) -> u8 {
        match self {
            Algorithm::None => 0,
            Algorithm::Nodal => 1,
            Algorithm::BinnedMean => 2,
            Algorithm::BinnedMedian => 3,
            Algorithm::Hypothesis => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Algorithm::None),
            1 => Ok(Algorithm::Nodal),
            2 => Ok(Algorithm::BinnedMean),
            3 => Ok(Algorithm::BinnedMedian),
            4 => Ok(Algorithm::Hypothesis),
            other => Err(MapSheetError::persistence(format!(
                "unrecognized algorithm selector tag {other}"
            ))),
        }
    }

    /// Hypothesis queries (nomination, `hypotheses_at`) require one of
    /// the two hypothesis-shaped variants.
    pub fn is_hypothesis_shaped(self) -> bool {
        matches!(self, Algorithm::Nodal | Algorithm::Hypothesis)
    }

    pub fn is_binned(self) -> bool {
        matches!(self, Algorithm::BinnedMean | Algorithm::BinnedMedian)
    }

    pub fn require_hypothesis_shaped(self, op: &str) -> Result<()> {
        if self.is_hypothesis_shaped() {
            Ok(())
        } else {
            Err(MapSheetError::unsupported(format!(
                "{op} requires a hypothesis-tracking algorithm, sheet is configured with {self:?}"
            )))
        }
    }
}
