//! Universal Transverse Mercator forward/inverse transform.
//!
//! Ellipsoidal transverse Mercator, Snyder's series-expansion form
//! (Snyder 1987, "Map Projections — A Working Manual", §8), truncated
//! to the fourth-order terms that give sub-millimeter closure error
//! across a single UTM zone.

use crate::ellipsoid::Ellipsoid;

const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Utm {
    pub zone: u8,
    pub northern: bool,
    pub ellipsoid: Ellipsoid,
}

impl Utm {
    pub fn new(zone: u8, northern: bool, ellipsoid: Ellipsoid) -> Option<Self> {
        if !(1..=60).contains(&zone) {
            return None;
        }
        Some(Self {
            zone,
            northern,
            ellipsoid,
        })
    }

    /// Central meridian of this zone, in degrees.
    pub fn central_meridian_deg(self) -> f64 {
        (self.zone as f64) * 6.0 - 183.0
    }

    fn false_northing(self) -> f64 {
        if self.northern {
            0.0
        } else {
            10_000_000.0
        }
    }

    pub fn forward(self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let a = self.ellipsoid.semi_major_m;
        let e2 = self.ellipsoid.e_squared();
        let ep2 = e2 / (1.0 - e2);

        let lat = lat_deg.to_radians();
        let lon0 = self.central_meridian_deg().to_radians();
        let dlon = lon_deg.to_radians() - lon0;

        let n = a / (1.0 - e2 * lat.sin().powi(2)).sqrt();
        let t = lat.tan().powi(2);
        let c = ep2 * lat.cos().powi(2);
        let ac = dlon * lat.cos();

        let m = meridian_arc(a, e2, lat);

        let x = K0
            * n
            * (ac
                + (1.0 - t + c) * ac.powi(3) / 6.0
                + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * ac.powi(5) / 120.0);
        let y = K0
            * (m + n
                * lat.tan()
                * (ac.powi(2) / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * ac.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * ac.powi(6) / 720.0));

        (x + FALSE_EASTING, y + self.false_northing())
    }

    pub fn inverse(self, east: f64, north: f64) -> (f64, f64) {
        let a = self.ellipsoid.semi_major_m;
        let e2 = self.ellipsoid.e_squared();
        let ep2 = e2 / (1.0 - e2);
        let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

        let x = east - FALSE_EASTING;
        let y = north - self.false_northing();

        let m = y / K0;
        let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2.powi(3) / 256.0));

        let phi1 = mu
            + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
            + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
            + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
            + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

        let n1 = a / (1.0 - e2 * phi1.sin().powi(2)).sqrt();
        let t1 = phi1.tan().powi(2);
        let c1 = ep2 * phi1.cos().powi(2);
        let r1 = a * (1.0 - e2) / (1.0 - e2 * phi1.sin().powi(2)).powf(1.5);
        let d = x / (n1 * K0);

        let lat = phi1
            - (n1 * phi1.tan() / r1)
                * (d * d / 2.0
                    - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                    + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2
                        - 3.0 * c1 * c1)
                        * d.powi(6)
                        / 720.0);

        let lon0 = self.central_meridian_deg().to_radians();
        let lon = lon0
            + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
                + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                    * d.powi(5)
                    / 120.0)
                / phi1.cos();

        (lon.to_degrees(), lat.to_degrees())
    }
}

/// Meridian arc length from the equator to `lat` (radians), ellipsoidal.
fn meridian_arc(a: f64, e2: f64, lat: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    a * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

/// Derive a UTM zone number from a longitude, per the standard 6°-wide
/// zone convention (zone 1 starts at -180°).
pub fn zone_for_longitude(lon_deg: f64) -> u8 {
    let normalized = ((lon_deg + 180.0).rem_euclid(360.0)) - 180.0;
    (((normalized + 180.0) / 6.0).floor() as i64 + 1).clamp(1, 60) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_within_zone() {
        let utm = Utm::new(33, true, Ellipsoid::WGS84).unwrap();
        let (e, n) = utm.forward(15.5, 45.2);
        let (lon, lat) = utm.inverse(e, n);
        assert!((lon - 15.5).abs() < 1e-7);
        assert!((lat - 45.2).abs() < 1e-7);
    }

    #[test]
    fn zone_boundaries() {
        assert_eq!(zone_for_longitude(-180.0), 1);
        assert_eq!(zone_for_longitude(-177.0), 1);
        assert_eq!(zone_for_longitude(0.0), 31);
        assert_eq!(zone_for_longitude(179.9), 60);
    }
}
