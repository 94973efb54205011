//! Polar Stereographic projection.
//!
//! This is a projection type the core must *recognize* (for
//! raster-header tag round-tripping) but not one it can mount a
//! sheet against — [`crate::ProjectionContext::polar_stereographic`]
//! always returns `ConfigurationError`. The forward/inverse math is
//! still implemented here so `raster-io` can convert a legacy rotated
//! polar-stereographic raster's corners without the core needing to
//! activate the projection.
//!
//! Ellipsoidal polar stereographic, scale factor at the pole specified
//! directly as `k0` (Snyder 1987 §21, equations 21-33/21-34), matching
//! the Universal Polar Stereographic convention (`k0 = 0.994`).

use crate::ellipsoid::Ellipsoid;

const K0: f64 = 0.994;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarStereographic {
    pub northern: bool,
    pub cen_lon_deg: f64,
    pub false_x: f64,
    pub false_y: f64,
    pub ellipsoid: Ellipsoid,
}

impl PolarStereographic {
    pub fn new(
        northern: bool,
        cen_lon_deg: f64,
        false_x: f64,
        false_y: f64,
        ellipsoid: Ellipsoid,
    ) -> Self {
        Self {
            northern,
            cen_lon_deg,
            false_x,
            false_y,
            ellipsoid,
        }
    }

    fn t_of(self, lat_pos: f64) -> f64 {
        let e = self.ellipsoid.eccentricity();
        (std::f64::consts::FRAC_PI_4 - lat_pos / 2.0).tan()
            / ((1.0 - e * lat_pos.sin()) / (1.0 + e * lat_pos.sin())).powf(e / 2.0)
    }

    pub fn forward(self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let a = self.ellipsoid.semi_major_m;
        let e = self.ellipsoid.eccentricity();
        let sign = if self.northern { 1.0 } else { -1.0 };

        let lat_pos = sign * lat_deg.to_radians();
        let lon_pos = sign * (lon_deg - self.cen_lon_deg).to_radians();

        let t = self.t_of(lat_pos);
        let rho = 2.0 * a * K0 * t / ((1.0 + e).powf(1.0 + e) * (1.0 - e).powf(1.0 - e)).sqrt();

        let x = sign * rho * lon_pos.sin();
        let y = -rho * lon_pos.cos();

        (x + self.false_x, sign * y + self.false_y)
    }

    pub fn inverse(self, east: f64, north: f64) -> (f64, f64) {
        let a = self.ellipsoid.semi_major_m;
        let e = self.ellipsoid.eccentricity();
        let e2 = self.ellipsoid.e_squared();
        let sign = if self.northern { 1.0 } else { -1.0 };

        let x = east - self.false_x;
        let y = sign * (north - self.false_y);

        let rho = (x * x + y * y).sqrt();
        let t = rho * ((1.0 + e).powf(1.0 + e) * (1.0 - e).powf(1.0 - e)).sqrt() / (2.0 * a * K0);

        let chi = std::f64::consts::FRAC_PI_2 - 2.0 * t.atan();
        let lat_pos = chi
            + (e2 / 2.0 + 5.0 * e2 * e2 / 24.0) * (2.0 * chi).sin()
            + (7.0 * e2 * e2 / 48.0) * (4.0 * chi).sin();

        let lon_pos = sign * x.atan2(-y);
        let lon = self.cen_lon_deg + sign * lon_pos.to_degrees();

        (lon, sign * lat_pos.to_degrees())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_north_pole_is_origin() {
        let ps = PolarStereographic::new(true, 0.0, 0.0, 0.0, Ellipsoid::WGS84);
        let (x, y) = ps.forward(0.0, 90.0);
        assert!(x.abs() < 1e-6);
        assert!(y.abs() < 1e-6);
    }

    #[test]
    fn round_trips_near_pole() {
        let ps = PolarStereographic::new(true, -45.0, 0.0, 0.0, Ellipsoid::WGS84);
        let (x, y) = ps.forward(10.0, 80.0);
        let (lon, lat) = ps.inverse(x, y);
        assert!((lon - 10.0).abs() < 1e-6);
        assert!((lat - 80.0).abs() < 1e-6);
    }
}
