//! Ellipsoidal (normal-aspect) Mercator projection about an arbitrary
//! central meridian and false origin — used by hydrographic mapsheets
//! sited near the equator, where UTM's zone boundaries are awkward.

use crate::ellipsoid::Ellipsoid;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mercator {
    pub cen_lon_deg: f64,
    pub cen_lat_deg: f64,
    pub false_x: f64,
    pub false_y: f64,
    pub ellipsoid: Ellipsoid,
}

impl Mercator {
    pub fn new(
        cen_lon_deg: f64,
        cen_lat_deg: f64,
        false_x: f64,
        false_y: f64,
        ellipsoid: Ellipsoid,
    ) -> Self {
        Self {
            cen_lon_deg,
            cen_lat_deg,
            false_x,
            false_y,
            ellipsoid,
        }
    }

    fn scale_factor(self) -> f64 {
        let e2 = self.ellipsoid.e_squared();
        let phi0 = self.cen_lat_deg.to_radians();
        phi0.cos() / (1.0 - e2 * phi0.sin().powi(2)).sqrt()
    }

    pub fn forward(self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let a = self.ellipsoid.semi_major_m;
        let e = self.ellipsoid.eccentricity();
        let k0 = self.scale_factor();

        let lon0 = self.cen_lon_deg.to_radians();
        let lat = lat_deg.to_radians();
        let mut dlon = lon_deg.to_radians() - lon0;
        // Keep the delta in (-pi, pi] so points crossing the antimeridian
        // relative to the central meridian still map continuously.
        while dlon > std::f64::consts::PI {
            dlon -= 2.0 * std::f64::consts::PI;
        }
        while dlon < -std::f64::consts::PI {
            dlon += 2.0 * std::f64::consts::PI;
        }

        let x = a * k0 * dlon;
        let esin = e * lat.sin();
        let y = a * k0 * (((std::f64::consts::FRAC_PI_4 + lat / 2.0).tan())
            * ((1.0 - esin) / (1.0 + esin)).powf(e / 2.0))
        .ln();

        (x + self.false_x, y + self.false_y)
    }

    pub fn inverse(self, east: f64, north: f64) -> (f64, f64) {
        let a = self.ellipsoid.semi_major_m;
        let e2 = self.ellipsoid.e_squared();
        let k0 = self.scale_factor();

        let x = east - self.false_x;
        let y = north - self.false_y;

        let lon0 = self.cen_lon_deg.to_radians();
        let t = (-(y / (a * k0))).exp();
        let chi = std::f64::consts::FRAC_PI_2 - 2.0 * t.atan();

        let lat = chi
            + (e2 / 2.0 + 5.0 * e2 * e2 / 24.0 + e2.powi(3) / 12.0) * (2.0 * chi).sin()
            + (7.0 * e2 * e2 / 48.0 + 29.0 * e2.powi(3) / 240.0) * (4.0 * chi).sin()
            + (7.0 * e2.powi(3) / 120.0) * (6.0 * chi).sin();

        let lon = lon0 + x / (a * k0);
        (lon.to_degrees(), lat.to_degrees())
    }
}
