//! The fixed 1024-byte OMG1/R4 raster header.

use std::io::{self, Read, Write};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use mapsheet_common::error::{MapSheetError, Result};
use projection::ProjectionType;

pub const HEADER_LEN: usize = 1024;
const MAGIC: &[u8; 4] = b"OMG1";
/// Canonical "any-endian" marker: a real file written by this
/// implementation always carries this exact byte. A foreign file
/// written big-endian-native on a little-endian-native writer (or vice
/// versa) will carry some other byte in that slot, which tells the
/// reader to byte-swap every multi-byte field as it loads.
const ANY_ENDIAN_CANON: u8 = 0xA5;

/// The sample type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    U8,
    U16,
    U32,
    F32,
}

impl SampleType {
    fn tag(self) -> u8 {
        match self {
            SampleType::U8 => 0,
            SampleType::U16 => 1,
            SampleType::U32 => 2,
            SampleType::F32 => 3,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(SampleType::U8),
            1 => Ok(SampleType::U16),
            2 => Ok(SampleType::U32),
            3 => Ok(SampleType::F32),
            other => Err(MapSheetError::persistence(format!(
                "unrecognized raster sample type tag {other}"
            ))),
        }
    }

    pub fn sample_size(self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::U16 => 2,
            SampleType::U32 => 4,
            SampleType::F32 => 4,
        }
    }
}

/// Rotated variants are converted to axis-aligned bounds on load;
/// this tag records which rotation convention the *source* file
/// used, purely for round-tripping metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationKind {
    None,
    RotUtm,
    RotMerc,
}

impl RotationKind {
    fn tag(self) -> u8 {
        match self {
            RotationKind::None => 0,
            RotationKind::RotUtm => 1,
            RotationKind::RotMerc => 2,
        }
    }

    fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(RotationKind::None),
            1 => Ok(RotationKind::RotUtm),
            2 => Ok(RotationKind::RotMerc),
            other => Err(MapSheetError::persistence(format!(
                "unrecognized rotation tag {other}"
            ))),
        }
    }
}

/// Sun/view/colormap fields: preserved but unused by the core — carried
/// through unread and unwritten.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplayHints {
    pub sun_elevation_deg: f32,
    pub sun_azimuth_deg: f32,
    pub view_elevation_deg: f32,
    pub view_azimuth_deg: f32,
    pub colormap_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterHeader {
    pub width: u32,
    pub height: u32,
    /// SW/NE bounds in the sample's *native* on-disk frame: already
    /// axis-aligned projected meters for `RotationKind::None`; for a
    /// rotated variant, these are the bounds computed by the
    /// rotated-to-axis-aligned conversion, always in
    /// projected meters, never left in lat/lon.
    pub sw_x: f64,
    pub sw_y: f64,
    pub ne_x: f64,
    pub ne_y: f64,
    pub spacing_e: f64,
    pub spacing_n: f64,
    pub sample_type: SampleType,
    pub projection_type: ProjectionType,
    pub ellipsoid_tag: u8,
    pub projection_scalar: f32,
    pub hemisphere_north: bool,
    pub rotation: RotationKind,
    pub rotation_deg: f32,
    pub display: DisplayHints,
}

impl RasterHeader {
    pub fn read<R: Read>(r: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_LEN];
        r.read_exact(&mut buf)
            .map_err(|e| MapSheetError::persistence(format!("truncated raster header: {e}")))?;

        if &buf[0..4] != MAGIC {
            return Err(MapSheetError::persistence(
                "raster file missing OMG1 magic".to_string(),
            ));
        }
        let any_endian = buf[4];
        let foreign = any_endian != ANY_ENDIAN_CANON;

        let mut cursor = io::Cursor::new(&buf[5..]);
        let read = |cursor: &mut io::Cursor<&[u8]>| -> io::Result<RasterHeaderFields> {
            let sample_type = cursor.read_u8()?;
            let projection_type = cursor.read_u8()?;
            let ellipsoid_tag = cursor.read_u8()?;
            let hemisphere = cursor.read_u8()?;
            let rotation = cursor.read_u8()?;
            let width;
            let height;
            let sw_x;
            let sw_y;
            let ne_x;
            let ne_y;
            let spacing_e;
            let spacing_n;
            let projection_scalar;
            let rotation_deg;
            let sun_elevation_deg;
            let sun_azimuth_deg;
            let view_elevation_deg;
            let view_azimuth_deg;
            let colormap_id;
            if foreign {
                width = cursor.read_u32::<LittleEndian>()?;
                height = cursor.read_u32::<LittleEndian>()?;
                sw_x = cursor.read_f64::<LittleEndian>()?;
                sw_y = cursor.read_f64::<LittleEndian>()?;
                ne_x = cursor.read_f64::<LittleEndian>()?;
                ne_y = cursor.read_f64::<LittleEndian>()?;
                spacing_e = cursor.read_f64::<LittleEndian>()?;
                spacing_n = cursor.read_f64::<LittleEndian>()?;
                projection_scalar = cursor.read_f32::<LittleEndian>()?;
                rotation_deg = cursor.read_f32::<LittleEndian>()?;
                sun_elevation_deg = cursor.read_f32::<LittleEndian>()?;
                sun_azimuth_deg = cursor.read_f32::<LittleEndian>()?;
                view_elevation_deg = cursor.read_f32::<LittleEndian>()?;
                view_azimuth_deg = cursor.read_f32::<LittleEndian>()?;
                colormap_id = cursor.read_u32::<LittleEndian>()?;
            } else {
                width = cursor.read_u32::<BigEndian>()?;
                height = cursor.read_u32::<BigEndian>()?;
                sw_x = cursor.read_f64::<BigEndian>()?;
                sw_y = cursor.read_f64::<BigEndian>()?;
                ne_x = cursor.read_f64::<BigEndian>()?;
                ne_y = cursor.read_f64::<BigEndian>()?;
                spacing_e = cursor.read_f64::<BigEndian>()?;
                spacing_n = cursor.read_f64::<BigEndian>()?;
                projection_scalar = cursor.read_f32::<BigEndian>()?;
                rotation_deg = cursor.read_f32::<BigEndian>()?;
                sun_elevation_deg = cursor.read_f32::<BigEndian>()?;
                sun_azimuth_deg = cursor.read_f32::<BigEndian>()?;
                view_elevation_deg = cursor.read_f32::<BigEndian>()?;
                view_azimuth_deg = cursor.read_f32::<BigEndian>()?;
                colormap_id = cursor.read_u32::<BigEndian>()?;
            }
            Ok(RasterHeaderFields {
                sample_type,
                projection_type,
                ellipsoid_tag,
                hemisphere,
                rotation,
                width,
                height,
                sw_x,
                sw_y,
                ne_x,
                ne_y,
                spacing_e,
                spacing_n,
                projection_scalar,
                rotation_deg,
                sun_elevation_deg,
                sun_azimuth_deg,
                view_elevation_deg,
                view_azimuth_deg,
                colormap_id,
            })
        };
        let fields = read(&mut cursor)
            .map_err(|e| MapSheetError::persistence(format!("malformed raster header: {e}")))?;

        Ok(RasterHeader {
            width: fields.width,
            height: fields.height,
            sw_x: fields.sw_x,
            sw_y: fields.sw_y,
            ne_x: fields.ne_x,
            ne_y: fields.ne_y,
            spacing_e: fields.spacing_e,
            spacing_n: fields.spacing_n,
            sample_type: SampleType::from_tag(fields.sample_type)?,
            projection_type: ProjectionType::from_tag(fields.projection_type).ok_or_else(|| {
                MapSheetError::persistence(format!(
                    "unrecognized projection tag {}",
                    fields.projection_type
                ))
            })?,
            ellipsoid_tag: fields.ellipsoid_tag,
            projection_scalar: fields.projection_scalar,
            hemisphere_north: fields.hemisphere == 0,
            rotation: RotationKind::from_tag(fields.rotation)?,
            rotation_deg: fields.rotation_deg,
            display: DisplayHints {
                sun_elevation_deg: fields.sun_elevation_deg,
                sun_azimuth_deg: fields.sun_azimuth_deg,
                view_elevation_deg: fields.view_elevation_deg,
                view_azimuth_deg: fields.view_azimuth_deg,
                colormap_id: fields.colormap_id,
            },
        })
    }

    pub fn write<W: Write>(&self, w: &mut W) -> Result<()> {
        let mut buf = Vec::with_capacity(HEADER_LEN);
        buf.extend_from_slice(MAGIC);
        buf.push(ANY_ENDIAN_CANON);
        buf.push(self.sample_type.tag());
        buf.push(self.projection_type.tag());
        buf.push(self.ellipsoid_tag);
        buf.push(if self.hemisphere_north { 0 } else { 1 });
        buf.push(self.rotation.tag());
        buf.write_u32::<BigEndian>(self.width).unwrap();
        buf.write_u32::<BigEndian>(self.height).unwrap();
        buf.write_f64::<BigEndian>(self.sw_x).unwrap();
        buf.write_f64::<BigEndian>(self.sw_y).unwrap();
        buf.write_f64::<BigEndian>(self.ne_x).unwrap();
        buf.write_f64::<BigEndian>(self.ne_y).unwrap();
        buf.write_f64::<BigEndian>(self.spacing_e).unwrap();
        buf.write_f64::<BigEndian>(self.spacing_n).unwrap();
        buf.write_f32::<BigEndian>(self.projection_scalar).unwrap();
        buf.write_f32::<BigEndian>(self.rotation_deg).unwrap();
        buf.write_f32::<BigEndian>(self.display.sun_elevation_deg)
            .unwrap();
        buf.write_f32::<BigEndian>(self.display.sun_azimuth_deg)
            .unwrap();
        buf.write_f32::<BigEndian>(self.display.view_elevation_deg)
            .unwrap();
        buf.write_f32::<BigEndian>(self.display.view_azimuth_deg)
            .unwrap();
        buf.write_u32::<BigEndian>(self.display.colormap_id)
            .unwrap();

        if buf.len() > HEADER_LEN {
            return Err(MapSheetError::persistence(
                "raster header fields overflow the fixed 1024-byte record",
            ));
        }
        buf.resize(HEADER_LEN, 0);
        w.write_all(&buf)
            .map_err(|e| MapSheetError::persistence(e.to_string()))
    }
}

struct RasterHeaderFields {
    sample_type: u8,
    projection_type: u8,
    ellipsoid_tag: u8,
    hemisphere: u8,
    rotation: u8,
    width: u32,
    height: u32,
    sw_x: f64,
    sw_y: f64,
    ne_x: f64,
    ne_y: f64,
    spacing_e: f64,
    spacing_n: f64,
    projection_scalar: f32,
    rotation_deg: f32,
    sun_elevation_deg: f32,
    sun_azimuth_deg: f32,
    view_elevation_deg: f32,
    view_azimuth_deg: f32,
    colormap_id: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> RasterHeader {
        RasterHeader {
            width: 100,
            height: 200,
            sw_x: 1.0,
            sw_y: 2.0,
            ne_x: 3.0,
            ne_y: 4.0,
            spacing_e: 0.5,
            spacing_n: 0.5,
            sample_type: SampleType::F32,
            projection_type: ProjectionType::Utm,
            ellipsoid_tag: 1,
            projection_scalar: 0.9996,
            hemisphere_north: true,
            rotation: RotationKind::None,
            rotation_deg: 0.0,
            display: DisplayHints::default(),
        }
    }

    #[test]
    fn round_trips_native_endian() {
        let header = sample_header();
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_LEN);
        let back = RasterHeader::read(&mut io::Cursor::new(buf)).unwrap();
        assert_eq!(back, header);
    }

    #[test]
    fn rejects_bad_magic() {
        let buf = vec![0u8; HEADER_LEN];
        assert!(RasterHeader::read(&mut io::Cursor::new(buf)).is_err());
    }

    #[test]
    fn rejects_truncated_header() {
        let buf = vec![b'O', b'M', b'G', b'1', ANY_ENDIAN_CANON];
        assert!(RasterHeader::read(&mut io::Cursor::new(buf)).is_err());
    }
}
