//! The explicit projection context.

use mapsheet_common::error::{MapSheetError, Result};

use crate::ellipsoid::Ellipsoid;
use crate::mercator::Mercator;
use crate::utm::Utm;

/// The projection types the core distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionType {
    Utm,
    Mercator,
    PolarStereographic,
}

impl ProjectionType {
    /// The tag byte written to the OMG1/R4 raster header.
    pub fn tag(self) -> u8 {
        match self {
            ProjectionType::Utm => 1,
            ProjectionType::Mercator => 2,
            ProjectionType::PolarStereographic => 3,
        }
    }

    pub fn from_tag(tag: u8) -> Option<ProjectionType> {
        match tag {
            1 => Some(ProjectionType::Utm),
            2 => Some(ProjectionType::Mercator),
            3 => Some(ProjectionType::PolarStereographic),
            _ => None,
        }
    }
}

/// The parameter read-out every projection collaborator exposes:
/// `(cen_lon, cen_lat, x0, y0)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionParams {
    pub cen_lon_deg: f64,
    pub cen_lat_deg: f64,
    pub x0: f64,
    pub y0: f64,
}

/// An active projection, carrying everything needed to transform points
/// without any process-wide state. Only `Utm` and `Mercator` can be
/// constructed — Polar Stereographic is a recognized *tag* but is
/// rejected as an active projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionContext {
    Utm(Utm),
    Mercator(Mercator),
}

impl ProjectionContext {
    pub fn utm(zone: u8, northern: bool, ellipsoid: Ellipsoid) -> Result<Self> {
        Utm::new(zone, northern, ellipsoid)
            .map(ProjectionContext::Utm)
            .ok_or_else(|| MapSheetError::configuration(format!("invalid UTM zone {zone}")))
    }

    pub fn utm_for_longitude(lon_deg: f64, northern: bool, ellipsoid: Ellipsoid) -> Result<Self> {
        Self::utm(crate::utm::zone_for_longitude(lon_deg), northern, ellipsoid)
    }

    pub fn mercator(
        cen_lon_deg: f64,
        cen_lat_deg: f64,
        false_x: f64,
        false_y: f64,
        ellipsoid: Ellipsoid,
    ) -> Result<Self> {
        if !(-90.0..=90.0).contains(&cen_lat_deg) {
            return Err(MapSheetError::configuration(
                "mercator center latitude out of range",
            ));
        }
        Ok(ProjectionContext::Mercator(Mercator::new(
            cen_lon_deg,
            cen_lat_deg,
            false_x,
            false_y,
            ellipsoid,
        )))
    }

    /// Always fails: Polar Stereographic is a recognized tag for
    /// on-disk interchange but cannot be mounted as an active sheet
    /// projection.
    pub fn polar_stereographic() -> Result<Self> {
        Err(MapSheetError::configuration(
            "polar stereographic is not a supported active sheet projection",
        ))
    }

    pub fn projection_type(&self) -> ProjectionType {
        match self {
            ProjectionContext::Utm(_) => ProjectionType::Utm,
            ProjectionContext::Mercator(_) => ProjectionType::Mercator,
        }
    }

    pub fn ellipsoid(&self) -> Ellipsoid {
        match self {
            ProjectionContext::Utm(u) => u.ellipsoid,
            ProjectionContext::Mercator(m) => m.ellipsoid,
        }
    }

    /// `(lon_deg, lat_deg) -> (east, north)` in projected meters.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        match self {
            ProjectionContext::Utm(u) => u.forward(lon_deg, lat_deg),
            ProjectionContext::Mercator(m) => m.forward(lon_deg, lat_deg),
        }
    }

    /// `(east, north) -> (lon_deg, lat_deg)`.
    pub fn inverse(&self, east: f64, north: f64) -> (f64, f64) {
        match self {
            ProjectionContext::Utm(u) => u.inverse(east, north),
            ProjectionContext::Mercator(m) => m.inverse(east, north),
        }
    }

    pub fn params(&self) -> ProjectionParams {
        match self {
            ProjectionContext::Utm(u) => ProjectionParams {
                cen_lon_deg: u.central_meridian_deg(),
                cen_lat_deg: 0.0,
                x0: 500_000.0,
                y0: if u.northern { 0.0 } else { 10_000_000.0 },
            },
            ProjectionContext::Mercator(m) => ProjectionParams {
                cen_lon_deg: m.cen_lon_deg,
                cen_lat_deg: m.cen_lat_deg,
                x0: m.false_x,
                y0: m.false_y,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polar_stereographic_is_rejected() {
        assert!(ProjectionContext::polar_stereographic().is_err());
    }

    #[test]
    fn utm_round_trips_through_context() {
        let ctx = ProjectionContext::utm(31, true, Ellipsoid::WGS84).unwrap();
        let (e, n) = ctx.forward(3.0, 45.0);
        let (lon, lat) = ctx.inverse(e, n);
        assert!((lon - 3.0).abs() < 1e-6);
        assert!((lat - 45.0).abs() < 1e-6);
        assert_eq!(ctx.projection_type(), ProjectionType::Utm);
    }
}
