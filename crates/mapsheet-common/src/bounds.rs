//! Axis-aligned bounds in projected (easting/northing) coordinates.

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box expressed in the *projected* plane, in
/// meters. This is distinct from a geographic (lon/lat) bounding box:
/// the MapSheet core never reasons in degrees, only in the projection's
/// linear units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedBounds {
    pub sw_x: f64,
    pub sw_y: f64,
    pub ne_x: f64,
    pub ne_y: f64,
}

impl ProjectedBounds {
    pub fn new(sw_x: f64, sw_y: f64, ne_x: f64, ne_y: f64) -> Self {
        Self {
            sw_x,
            sw_y,
            ne_x,
            ne_y,
        }
    }

    /// Build the bounds that exactly enclose a set of projected points —
    /// used by the rotated-raster conversion, which always resolves to
    /// an axis-aligned box in meters.
    pub fn enclosing(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut iter = points.into_iter();
        let (x0, y0) = iter.next()?;
        let mut bounds = Self::new(x0, y0, x0, y0);
        for (x, y) in iter {
            bounds.sw_x = bounds.sw_x.min(x);
            bounds.sw_y = bounds.sw_y.min(y);
            bounds.ne_x = bounds.ne_x.max(x);
            bounds.ne_y = bounds.ne_y.max(y);
        }
        Some(bounds)
    }

    pub fn width(&self) -> f64 {
        self.ne_x - self.sw_x
    }

    pub fn height(&self) -> f64 {
        self.ne_y - self.sw_y
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.sw_x && x <= self.ne_x && y >= self.sw_y && y <= self.ne_y
    }

    pub fn intersects(&self, other: &ProjectedBounds) -> bool {
        self.sw_x <= other.ne_x
            && self.ne_x >= other.sw_x
            && self.sw_y <= other.ne_y
            && self.ne_y >= other.sw_y
    }

    /// Expand the bounds by `margin` meters on every side.
    pub fn expand(&self, margin: f64) -> Self {
        Self {
            sw_x: self.sw_x - margin,
            sw_y: self.sw_y - margin,
            ne_x: self.ne_x + margin,
            ne_y: self.ne_y + margin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_and_intersects() {
        let a = ProjectedBounds::new(0.0, 0.0, 10.0, 10.0);
        let b = ProjectedBounds::new(5.0, 5.0, 15.0, 15.0);
        let c = ProjectedBounds::new(20.0, 20.0, 30.0, 30.0);

        assert!(a.contains(5.0, 5.0));
        assert!(!a.contains(11.0, 5.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn enclosing_points() {
        let bounds =
            ProjectedBounds::enclosing([(1.0, 2.0), (-3.0, 5.0), (4.0, -1.0)]).unwrap();
        assert_eq!(bounds, ProjectedBounds::new(-3.0, -1.0, 4.0, 5.0));
        assert!(ProjectedBounds::enclosing(std::iter::empty()).is_none());
    }
}
