//! Parsed representation of an ASCII mapsheet description.

use std::path::PathBuf;

/// `type` values recognized inside a `projection { }` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    Utm,
    Mercator,
    PolarStereographic,
}

/// Linear or angular unit a numeric field was written in. Degrees are
/// coerced to meters at 1 degree ≈ 60·1852 m at the equator — an
/// acknowledged approximation, applied only on mixed-unit coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Meters,
    Kilometers,
    Degrees,
    Minutes,
    Radians,
}

impl Unit {
    pub fn from_keyword(s: &str) -> Option<Unit> {
        match s.to_ascii_lowercase().as_str() {
            "meters" => Some(Unit::Meters),
            "kilometers" => Some(Unit::Kilometers),
            "degrees" => Some(Unit::Degrees),
            "minutes" => Some(Unit::Minutes),
            "radians" => Some(Unit::Radians),
            _ => None,
        }
    }

    /// Convert a linear-unit value to meters.
    pub fn to_meters(self, value: f64) -> f64 {
        match self {
            Unit::Meters => value,
            Unit::Kilometers => value * 1000.0,
            // A degree of arc at the equator, the grammar's one
            // explicitly sanctioned mixed-unit coercion.
            Unit::Degrees => value * 60.0 * 1852.0,
            Unit::Minutes => value * 1852.0,
            Unit::Radians => value.to_degrees() * 60.0 * 1852.0,
        }
    }

    /// Convert an angular-unit value to degrees.
    pub fn to_degrees(self, value: f64) -> f64 {
        match self {
            Unit::Degrees => value,
            Unit::Minutes => value / 60.0,
            Unit::Radians => value.to_degrees(),
            // A linear value coerced into degrees via the same
            // equatorial approximation, used only when a bounds block
            // mixes a linear spacing with a geographic corner.
            Unit::Meters => value / (60.0 * 1852.0),
            Unit::Kilometers => (value * 1000.0) / (60.0 * 1852.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectionSpec {
    pub kind: ProjectionKind,
    pub origin_lon_deg: f64,
    pub origin_lat_deg: f64,
    pub false_origin_x_m: f64,
    pub false_origin_y_m: f64,
}

/// The sheet block's extent: either a center point plus a size, or a
/// pair of axis-aligned corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SheetExtent {
    CenterSize {
        center_lon_deg: f64,
        center_lat_deg: f64,
        width_m: f64,
        height_m: f64,
    },
    Bounds {
        sw_x: f64,
        sw_y: f64,
        ne_x: f64,
        ne_y: f64,
        /// True if the four corner numbers are geographic (degrees)
        /// rather than already-projected linear coordinates; the CLI
        /// resolves these through the projection before building a
        /// MapSheet.
        geographic: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetSpec {
    pub extent: SheetExtent,
    pub spacing_e_m: f64,
    pub spacing_n_m: f64,
    pub backstore: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetDescription {
    pub projection: ProjectionSpec,
    pub sheet: SheetSpec,
}
