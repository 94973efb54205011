//! Sounding timestamps.
//!
//! The wire representation is f64 seconds since a fixed epoch — there is
//! no calendar arithmetic anywhere in the core, so this stays a thin
//! newtype rather than pulling `chrono` into the hot ingest path.

use serde::{Deserialize, Serialize};

/// Seconds since the epoch (2000-01-01T00:00:00Z by convention, matching
/// the "POSIX time" family of epochs used by the original CUBE sources,
/// but the core never interprets the epoch itself, only orders by it).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Timestamp(pub f64);

impl Timestamp {
    pub fn new(seconds: f64) -> Self {
        Self(seconds)
    }

    pub fn seconds(self) -> f64 {
        self.0
    }
}

impl From<f64> for Timestamp {
    fn from(seconds: f64) -> Self {
        Self(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering() {
        let a = Timestamp::new(10.0);
        let b = Timestamp::new(20.0);
        assert!(a < b);
    }
}
