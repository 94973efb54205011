//! Raw sample storage and the rotated-variant bounding-box conversion,
//! always resolved to meters in the parent projection's units.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use mapsheet_common::error::{MapSheetError, Result};

use crate::header::{RasterHeader, RotationKind, SampleType};

/// Decoded sample payload, one variant per `SampleType`.
#[derive(Debug, Clone, PartialEq)]
pub enum RasterSamples {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

impl RasterSamples {
    pub fn len(&self) -> usize {
        match self {
            RasterSamples::U8(v) => v.len(),
            RasterSamples::U16(v) => v.len(),
            RasterSamples::U32(v) => v.len(),
            RasterSamples::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            RasterSamples::U8(_) => SampleType::U8,
            RasterSamples::U16(_) => SampleType::U16,
            RasterSamples::U32(_) => SampleType::U32,
            RasterSamples::F32(_) => SampleType::F32,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub header: RasterHeader,
    pub samples: RasterSamples,
}

impl Raster {
    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let tmp_path = sibling_tmp_path(path.as_ref());
        {
            let file = File::create(&tmp_path)?;
            let mut w = BufWriter::new(file);
            self.write(&mut w)?;
            w.flush()?;
        }
        std::fs::rename(&tmp_path, path.as_ref())?;
        Ok(())
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let expected = (self.header.width as usize) * (self.header.height as usize);
        if self.samples.len() != expected {
            return Err(MapSheetError::configuration(format!(
                "raster sample count {} does not match header {}x{}",
                self.samples.len(),
                self.header.width,
                self.header.height
            )));
        }
        self.header.write(w)?;
        match &self.samples {
            RasterSamples::U8(v) => w.write_all(v)?,
            RasterSamples::U16(v) => {
                for &s in v {
                    w.write_u16::<BigEndian>(s)?;
                }
            }
            RasterSamples::U32(v) => {
                for &s in v {
                    w.write_u32::<BigEndian>(s)?;
                }
            }
            RasterSamples::F32(v) => {
                for &s in v {
                    w.write_f32::<BigEndian>(s)?;
                }
            }
        }
        Ok(())
    }

    pub fn read_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let mut r = BufReader::new(file);
        Self::read(&mut r)
    }

    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let header = RasterHeader::read(r)?;
        let count = (header.width as usize) * (header.height as usize);
        let samples = match header.sample_type {
            SampleType::U8 => {
                let mut buf = vec![0u8; count];
                r.read_exact(&mut buf)
                    .map_err(|e| MapSheetError::persistence(format!("truncated raster body: {e}")))?;
                RasterSamples::U8(buf)
            }
            SampleType::U16 => {
                let mut buf = Vec::with_capacity(count);
                for _ in 0..count {
                    buf.push(r.read_u16::<BigEndian>().map_err(|e| {
                        MapSheetError::persistence(format!("truncated raster body: {e}"))
                    })?);
                }
                RasterSamples::U16(buf)
            }
            SampleType::U32 => {
                let mut buf = Vec::with_capacity(count);
                for _ in 0..count {
                    buf.push(r.read_u32::<BigEndian>().map_err(|e| {
                        MapSheetError::persistence(format!("truncated raster body: {e}"))
                    })?);
                }
                RasterSamples::U32(buf)
            }
            SampleType::F32 => {
                let mut buf = Vec::with_capacity(count);
                for _ in 0..count {
                    buf.push(r.read_f32::<BigEndian>().map_err(|e| {
                        MapSheetError::persistence(format!("truncated raster body: {e}"))
                    })?);
                }
                RasterSamples::F32(buf)
            }
        };
        Ok(Raster { header, samples })
    }

    /// If this raster's header marks it as a rotated variant
    /// (`ROTUTM`/`ROTMERC`), recompute `header.sw_*`/`ne_*` as the
    /// axis-aligned box enclosing the rotated footprint's corners and
    /// edge midpoints. The stored corners are already in projected
    /// meters — rotated rasters rotate the sample grid within the
    /// projected plane, not in geographic space — so this is a plain
    /// 2D unrotation, not a reprojection. A no-op for `RotationKind::None`.
    pub fn axis_align(&mut self) {
        if self.header.rotation == RotationKind::None {
            return;
        }
        let h = &self.header;
        let theta = h.rotation_deg.to_radians() as f64;
        let (cos_t, sin_t) = (theta.cos(), theta.sin());
        let cx = (h.sw_x + h.ne_x) / 2.0;
        let cy = (h.sw_y + h.ne_y) / 2.0;
        let half_w = (h.ne_x - h.sw_x) / 2.0;
        let half_h = (h.ne_y - h.sw_y) / 2.0;

        // Corners and edge midpoints of the rotated footprint, in the
        // rotated local frame, rotated back into the unrotated
        // projected frame centered on (cx, cy).
        let local_points = [
            (-half_w, -half_h),
            (half_w, -half_h),
            (half_w, half_h),
            (-half_w, half_h),
            (0.0, -half_h),
            (0.0, half_h),
            (-half_w, 0.0),
            (half_w, 0.0),
        ];

        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for (lx, ly) in local_points {
            let px = cx + lx * cos_t - ly * sin_t;
            let py = cy + lx * sin_t + ly * cos_t;
            min_x = min_x.min(px);
            min_y = min_y.min(py);
            max_x = max_x.max(px);
            max_y = max_y.max(py);
        }

        self.header.sw_x = min_x;
        self.header.sw_y = min_y;
        self.header.ne_x = max_x;
        self.header.ne_y = max_y;
        self.header.rotation = RotationKind::None;
        self.header.rotation_deg = 0.0;
    }
}

fn sibling_tmp_path(path: &Path) -> std::path::PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::DisplayHints;
    use projection::Ellipsoid;

    fn header(rotation: RotationKind, rotation_deg: f32) -> RasterHeader {
        RasterHeader {
            width: 2,
            height: 2,
            sw_x: -1.0,
            sw_y: -1.0,
            ne_x: 1.0,
            ne_y: 1.0,
            spacing_e: 1.0,
            spacing_n: 1.0,
            sample_type: SampleType::F32,
            projection_type: projection::ProjectionType::Utm,
            ellipsoid_tag: 1,
            projection_scalar: 1.0,
            hemisphere_north: true,
            rotation,
            rotation_deg,
            display: DisplayHints::default(),
        }
    }

    #[test]
    fn round_trips_f32_samples() {
        let raster = Raster {
            header: header(RotationKind::None, 0.0),
            samples: RasterSamples::F32(vec![1.0, 2.0, 3.0, 4.0]),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.raster");
        raster.write_to_path(&path).unwrap();
        let back = Raster::read_from_path(&path).unwrap();
        assert_eq!(back, raster);
    }

    #[test]
    fn axis_align_is_noop_when_unrotated() {
        let mut raster = Raster {
            header: header(RotationKind::None, 0.0),
            samples: RasterSamples::F32(vec![0.0; 4]),
        };
        let before = raster.header;
        raster.axis_align();
        assert_eq!(raster.header, before);
    }

    #[test]
    fn axis_align_expands_bounds_for_45deg_rotation() {
        let mut raster = Raster {
            header: header(RotationKind::RotUtm, 45.0),
            samples: RasterSamples::F32(vec![0.0; 4]),
        };
        raster.axis_align();
        assert_eq!(raster.header.rotation, RotationKind::None);
        // A unit square rotated 45 degrees has a larger axis-aligned
        // enclosing box than the original [-1,1]x[-1,1].
        assert!(raster.header.ne_x - raster.header.sw_x > 2.0);
    }
}
