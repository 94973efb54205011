//! The PersistenceLayer: encodes `mapsheet-core` values
//! into fixed-size byte records and hands them to `storage::BackingStore`,
//! which owns only bytes and file layout (see `storage`'s module docs).
//!
//! Tile records are fixed-size, sized for `width*height` nodes at the
//! maximum allowed hypothesis (or binned-slot) count in effect when the
//! tile was last written — sparsity is represented by each node's own
//! live count, never by file-level sparsity.

use std::io::{self, Cursor};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use mapsheet_common::error::{MapSheetError, Result};
use mapsheet_common::{ProjectedBounds, Timestamp};
use projection::{Ellipsoid, ProjectionContext, ProjectionType};

use crate::algorithm::Algorithm;
use crate::hypothesis::Hypothesis;
use crate::node::{BinnedNode, HypothesisNode, Monitor, NodeState};
use crate::tile::Tile;
use crate::types::GridGeometry;

pub const HEADER_VERSION: u32 = 2;
const HEADER_MAGIC: &[u8; 4] = b"MSV2";
/// Canonical "any-endian" marker: a byte other than this one on read means the
/// file was written on a foreign-endian host and every multi-byte
/// field below it must be byte-swapped.
const ANY_ENDIAN_CANON: u8 = 0x5A;

/// The on-disk `header` file contents: projection
/// parameters, grid geometry, tile geometry, algorithm selector,
/// version.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapSheetHeader {
    pub version: u32,
    pub algorithm: Algorithm,
    pub projection_type: ProjectionType,
    pub ellipsoid_tag: u8,
    pub utm_zone: u8,
    pub hemisphere_north: bool,
    pub cen_lon_deg: f64,
    pub cen_lat_deg: f64,
    pub false_x: f64,
    pub false_y: f64,
    pub width_nodes: u32,
    pub height_nodes: u32,
    pub spacing_e: f64,
    pub spacing_n: f64,
    pub sw_x: f64,
    pub sw_y: f64,
    pub ne_x: f64,
    pub ne_y: f64,
    pub tile_width: u32,
    pub tile_height: u32,
    pub max_hypotheses: u32,
    pub binned_max_slots: u32,
}

impl MapSheetHeader {
    pub fn grid_geometry(&self) -> GridGeometry {
        GridGeometry::new(
            self.width_nodes,
            self.height_nodes,
            self.spacing_e,
            self.spacing_n,
            ProjectedBounds::new(self.sw_x, self.sw_y, self.ne_x, self.ne_y),
        )
    }

    pub fn build_projection(&self) -> Result<ProjectionContext> {
        let ellipsoid = Ellipsoid::from_tag(self.ellipsoid_tag)
            .ok_or_else(|| MapSheetError::persistence("unrecognized ellipsoid tag in header"))?;
        match self.projection_type {
            ProjectionType::Utm => {
                ProjectionContext::utm(self.utm_zone, self.hemisphere_north, ellipsoid)
            }
            ProjectionType::Mercator => ProjectionContext::mercator(
                self.cen_lon_deg,
                self.cen_lat_deg,
                self.false_x,
                self.false_y,
                ellipsoid,
            ),
            ProjectionType::PolarStereographic => ProjectionContext::polar_stereographic(),
        }
    }

    pub fn read(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 5 || &bytes[0..4] != HEADER_MAGIC {
            return Err(MapSheetError::persistence("missing MSV2 header magic"));
        }
        let foreign = bytes[4] != ANY_ENDIAN_CANON;
        let mut cur = Cursor::new(&bytes[5..]);
        let fields = if foreign {
            read_header_fields::<byteorder::LittleEndian>(&mut cur)
        } else {
            read_header_fields::<BigEndian>(&mut cur)
        }
        .map_err(|e| MapSheetError::persistence(format!("malformed mapsheet header: {e}")))?;

        if fields.version != HEADER_VERSION {
            return Err(MapSheetError::persistence(format!(
                "unsupported mapsheet header version {}",
                fields.version
            )));
        }

        Ok(MapSheetHeader {
            version: fields.version,
            algorithm: Algorithm::from_tag(fields.algorithm_tag)?,
            projection_type: ProjectionType::from_tag(fields.projection_tag).ok_or_else(|| {
                MapSheetError::persistence("unrecognized projection tag in header")
            })?,
            ellipsoid_tag: fields.ellipsoid_tag,
            utm_zone: fields.utm_zone,
            hemisphere_north: fields.hemisphere == 0,
            cen_lon_deg: fields.cen_lon_deg,
            cen_lat_deg: fields.cen_lat_deg,
            false_x: fields.false_x,
            false_y: fields.false_y,
            width_nodes: fields.width_nodes,
            height_nodes: fields.height_nodes,
            spacing_e: fields.spacing_e,
            spacing_n: fields.spacing_n,
            sw_x: fields.sw_x,
            sw_y: fields.sw_y,
            ne_x: fields.ne_x,
            ne_y: fields.ne_y,
            tile_width: fields.tile_width,
            tile_height: fields.tile_height,
            max_hypotheses: fields.max_hypotheses,
            binned_max_slots: fields.binned_max_slots,
        })
    }

    pub fn write(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(HEADER_MAGIC);
        buf.push(ANY_ENDIAN_CANON);
        buf.write_u32::<BigEndian>(self.version).unwrap();
        buf.push(self.algorithm.tag());
        buf.push(self.projection_type.tag());
        buf.push(self.ellipsoid_tag);
        buf.push(self.utm_zone);
        buf.push(if self.hemisphere_north { 0 } else { 1 });
        buf.write_f64::<BigEndian>(self.cen_lon_deg).unwrap();
        buf.write_f64::<BigEndian>(self.cen_lat_deg).unwrap();
        buf.write_f64::<BigEndian>(self.false_x).unwrap();
        buf.write_f64::<BigEndian>(self.false_y).unwrap();
        buf.write_u32::<BigEndian>(self.width_nodes).unwrap();
        buf.write_u32::<BigEndian>(self.height_nodes).unwrap();
        buf.write_f64::<BigEndian>(self.spacing_e).unwrap();
        buf.write_f64::<BigEndian>(self.spacing_n).unwrap();
        buf.write_f64::<BigEndian>(self.sw_x).unwrap();
        buf.write_f64::<BigEndian>(self.sw_y).unwrap();
        buf.write_f64::<BigEndian>(self.ne_x).unwrap();
        buf.write_f64::<BigEndian>(self.ne_y).unwrap();
        buf.write_u32::<BigEndian>(self.tile_width).unwrap();
        buf.write_u32::<BigEndian>(self.tile_height).unwrap();
        buf.write_u32::<BigEndian>(self.max_hypotheses).unwrap();
        buf.write_u32::<BigEndian>(self.binned_max_slots).unwrap();
        buf
    }
}

struct HeaderFields {
    version: u32,
    algorithm_tag: u8,
    projection_tag: u8,
    ellipsoid_tag: u8,
    utm_zone: u8,
    hemisphere: u8,
    cen_lon_deg: f64,
    cen_lat_deg: f64,
    false_x: f64,
    false_y: f64,
    width_nodes: u32,
    height_nodes: u32,
    spacing_e: f64,
    spacing_n: f64,
    sw_x: f64,
    sw_y: f64,
    ne_x: f64,
    ne_y: f64,
    tile_width: u32,
    tile_height: u32,
    max_hypotheses: u32,
    binned_max_slots: u32,
}

fn read_header_fields<E: byteorder::ByteOrder>(cur: &mut Cursor<&[u8]>) -> io::Result<HeaderFields> {
    let version = cur.read_u32::<E>()?;
    let algorithm_tag = cur.read_u8()?;
    let projection_tag = cur.read_u8()?;
    let ellipsoid_tag = cur.read_u8()?;
    let utm_zone = cur.read_u8()?;
    let hemisphere = cur.read_u8()?;
    let cen_lon_deg = cur.read_f64::<E>()?;
    let cen_lat_deg = cur.read_f64::<E>()?;
    let false_x = cur.read_f64::<E>()?;
    let false_y = cur.read_f64::<E>()?;
    let width_nodes = cur.read_u32::<E>()?;
    let height_nodes = cur.read_u32::<E>()?;
    let spacing_e = cur.read_f64::<E>()?;
    let spacing_n = cur.read_f64::<E>()?;
    let sw_x = cur.read_f64::<E>()?;
    let sw_y = cur.read_f64::<E>()?;
    let ne_x = cur.read_f64::<E>()?;
    let ne_y = cur.read_f64::<E>()?;
    let tile_width = cur.read_u32::<E>()?;
    let tile_height = cur.read_u32::<E>()?;
    let max_hypotheses = cur.read_u32::<E>()?;
    let binned_max_slots = cur.read_u32::<E>()?;
    Ok(HeaderFields {
        version,
        algorithm_tag,
        projection_tag,
        ellipsoid_tag,
        utm_zone,
        hemisphere,
        cen_lon_deg,
        cen_lat_deg,
        false_x,
        false_y,
        width_nodes,
        height_nodes,
        spacing_e,
        spacing_n,
        sw_x,
        sw_y,
        ne_x,
        ne_y,
        tile_width,
        tile_height,
        max_hypotheses,
        binned_max_slots,
    })
}

/// Encodes/decodes individual `Tile`s to the fixed-size record layout,
/// sized from the header's `max_hypotheses`/`binned_max_slots`.
#[derive(Debug, Clone, Copy)]
pub struct TileCodec {
    pub algorithm: Algorithm,
    pub max_hypotheses: u32,
    pub binned_max_slots: u32,
}

const HYPOTHESIS_RECORD_LEN: usize = 8 + 8 + 4 + 8 + 8 + 8; // z, v, n, sample_variance_sum, first_touch, last_touch

impl TileCodec {
    fn node_record_len(&self) -> usize {
        match self.algorithm {
            Algorithm::BinnedMean | Algorithm::BinnedMedian => {
                8 + 4 + (self.binned_max_slots as usize) * 4
            }
            _ => {
                4 + 1
                    + 8
                    + 8
                    + 4
                    + 1
                    + 8
                    + 8
                    + 8
                    + (self.max_hypotheses as usize) * HYPOTHESIS_RECORD_LEN
            }
        }
    }

    pub fn encode(&self, tile: &Tile) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(tile.nodes.len() * self.node_record_len());
        for node in &tile.nodes {
            self.encode_node(&mut buf, node)?;
        }
        Ok(buf)
    }

    pub fn decode(
        &self,
        bytes: &[u8],
        tc: u32,
        tr: u32,
        width: u32,
        height: u32,
        active_cols: u32,
        active_rows: u32,
    ) -> Result<Tile> {
        let expected = (width as usize) * (height as usize) * self.node_record_len();
        if bytes.len() != expected {
            return Err(MapSheetError::persistence(format!(
                "truncated tile ({tc},{tr}): expected {expected} bytes, found {}",
                bytes.len()
            )));
        }
        let mut cur = Cursor::new(bytes);
        let mut nodes = Vec::with_capacity((width as usize) * (height as usize));
        for _ in 0..(width as usize) * (height as usize) {
            nodes.push(self.decode_node(&mut cur)?);
        }
        Ok(Tile {
            tc,
            tr,
            width,
            height,
            active_cols,
            active_rows,
            nodes,
            last_touch: 0,
            dirty: false,
            resident: true,
        })
    }

    fn encode_node(&self, buf: &mut Vec<u8>, node: &NodeState) -> Result<()> {
        match node {
            NodeState::Hypothesis(h) => self.encode_hypothesis_node(buf, h),
            NodeState::Binned(b) => self.encode_binned_node(buf, b),
        }
    }

    fn encode_hypothesis_node(&self, buf: &mut Vec<u8>, h: &HypothesisNode) -> Result<()> {
        buf.write_u32::<BigEndian>(h.hypotheses.len() as u32).unwrap();
        match h.monitor {
            Some(m) => {
                buf.write_u8(1).unwrap();
                buf.write_f64::<BigEndian>(m.z).unwrap();
                buf.write_f64::<BigEndian>(m.variance).unwrap();
                buf.write_u32::<BigEndian>(m.count).unwrap();
            }
            None => {
                buf.write_u8(0).unwrap();
                buf.write_f64::<BigEndian>(0.0).unwrap();
                buf.write_f64::<BigEndian>(0.0).unwrap();
                buf.write_u32::<BigEndian>(0).unwrap();
            }
        }
        match h.predicted_depth {
            Some(p) => {
                buf.write_u8(1).unwrap();
                buf.write_f64::<BigEndian>(p).unwrap();
            }
            None => {
                buf.write_u8(0).unwrap();
                buf.write_f64::<BigEndian>(0.0).unwrap();
            }
        }
        let nomination = h.nomination.map(|n| n as i64).unwrap_or(-1);
        buf.write_i64::<BigEndian>(nomination).unwrap();
        buf.write_u64::<BigEndian>(h.write_epoch).unwrap();

        if h.hypotheses.len() as u32 > self.max_hypotheses {
            return Err(MapSheetError::persistence(
                "live hypothesis count exceeds the tile codec's configured capacity",
            ));
        }
        for i in 0..self.max_hypotheses as usize {
            let hy = h.hypotheses.get(i).copied().unwrap_or(Hypothesis {
                z: 0.0,
                variance: 0.0,
                n: 0,
                sample_variance_sum: 0.0,
                first_touch: Timestamp::new(0.0),
                last_touch: Timestamp::new(0.0),
            });
            buf.write_f64::<BigEndian>(hy.z).unwrap();
            buf.write_f64::<BigEndian>(hy.variance).unwrap();
            buf.write_u32::<BigEndian>(hy.n).unwrap();
            buf.write_f64::<BigEndian>(hy.sample_variance_sum).unwrap();
            buf.write_f64::<BigEndian>(hy.first_touch.seconds()).unwrap();
            buf.write_f64::<BigEndian>(hy.last_touch.seconds()).unwrap();
        }
        Ok(())
    }

    fn encode_binned_node(&self, buf: &mut Vec<u8>, b: &BinnedNode) -> Result<()> {
        buf.write_u64::<BigEndian>(b.total_seen).unwrap();
        buf.write_u32::<BigEndian>(b.depths.len() as u32).unwrap();
        for i in 0..self.binned_max_slots as usize {
            let d = b.depths.get(i).copied().unwrap_or(0.0);
            buf.write_f32::<BigEndian>(d).unwrap();
        }
        Ok(())
    }

    fn decode_node(&self, cur: &mut Cursor<&[u8]>) -> Result<NodeState> {
        match self.algorithm {
            Algorithm::BinnedMean | Algorithm::BinnedMedian => {
                Ok(NodeState::Binned(self.decode_binned_node(cur)?))
            }
            _ => Ok(NodeState::Hypothesis(self.decode_hypothesis_node(cur)?)),
        }
    }

    fn decode_hypothesis_node(&self, cur: &mut Cursor<&[u8]>) -> Result<HypothesisNode> {
        let n_hyp = read_u32(cur)?;
        let monitor_present = read_u8(cur)?;
        let monitor_z = read_f64(cur)?;
        let monitor_variance = read_f64(cur)?;
        let monitor_count = read_u32(cur)?;
        let monitor = if monitor_present != 0 {
            Some(Monitor {
                z: monitor_z,
                variance: monitor_variance,
                count: monitor_count,
            })
        } else {
            None
        };
        let predicted_present = read_u8(cur)?;
        let predicted_depth_raw = read_f64(cur)?;
        let predicted_depth = if predicted_present != 0 {
            Some(predicted_depth_raw)
        } else {
            None
        };
        let nomination_raw = read_i64(cur)?;
        let nomination = if nomination_raw < 0 {
            None
        } else {
            Some(nomination_raw as usize)
        };
        let write_epoch = read_u64(cur)?;

        let mut hypotheses = Vec::with_capacity(n_hyp as usize);
        for i in 0..self.max_hypotheses as usize {
            let z = read_f64(cur)?;
            let variance = read_f64(cur)?;
            let n = read_u32(cur)?;
            let sample_variance_sum = read_f64(cur)?;
            let first_touch = read_f64(cur)?;
            let last_touch = read_f64(cur)?;
            if (i as u32) < n_hyp {
                hypotheses.push(Hypothesis {
                    z,
                    variance,
                    n,
                    sample_variance_sum,
                    first_touch: Timestamp::new(first_touch),
                    last_touch: Timestamp::new(last_touch),
                });
            }
        }

        Ok(HypothesisNode {
            hypotheses,
            monitor,
            predicted_depth,
            nomination,
            write_epoch,
        })
    }

    fn decode_binned_node(&self, cur: &mut Cursor<&[u8]>) -> Result<BinnedNode> {
        let total_seen = read_u64(cur)?;
        let count = read_u32(cur)?;
        let mut depths = Vec::with_capacity(count as usize);
        for i in 0..self.binned_max_slots as usize {
            let d = read_f32(cur)?;
            if (i as u32) < count {
                depths.push(d);
            }
        }
        Ok(BinnedNode { depths, total_seen })
    }
}

fn read_u8(cur: &mut Cursor<&[u8]>) -> Result<u8> {
    cur.read_u8().map_err(|e| MapSheetError::persistence(format!("truncated tile: {e}")))
}
fn read_u32(cur: &mut Cursor<&[u8]>) -> Result<u32> {
    cur.read_u32::<BigEndian>()
        .map_err(|e| MapSheetError::persistence(format!("truncated tile: {e}")))
}
fn read_u64(cur: &mut Cursor<&[u8]>) -> Result<u64> {
    cur.read_u64::<BigEndian>()
        .map_err(|e| MapSheetError::persistence(format!("truncated tile: {e}")))
}
fn read_i64(cur: &mut Cursor<&[u8]>) -> Result<i64> {
    cur.read_i64::<BigEndian>()
        .map_err(|e| MapSheetError::persistence(format!("truncated tile: {e}")))
}
fn read_f32(cur: &mut Cursor<&[u8]>) -> Result<f32> {
    cur.read_f32::<BigEndian>()
        .map_err(|e| MapSheetError::persistence(format!("truncated tile: {e}")))
}
fn read_f64(cur: &mut Cursor<&[u8]>) -> Result<f64> {
    cur.read_f64::<BigEndian>()
        .map_err(|e| MapSheetError::persistence(format!("truncated tile: {e}")))
}

/// Serialize the per-node-coordinate nomination overrides file: a flat list of
/// `(col, row, nominated_index)` triples, big-endian.
pub fn encode_nominations(entries: &[(u32, u32, usize)]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(entries.len() * 12);
    buf.write_u32::<BigEndian>(entries.len() as u32).unwrap();
    for &(col, row, idx) in entries {
        buf.write_u32::<BigEndian>(col).unwrap();
        buf.write_u32::<BigEndian>(row).unwrap();
        buf.write_u32::<BigEndian>(idx as u32).unwrap();
    }
    buf
}

pub fn decode_nominations(bytes: &[u8]) -> Result<Vec<(u32, u32, usize)>> {
    let mut cur = Cursor::new(bytes);
    let count = read_u32(&mut cur)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let col = read_u32(&mut cur)?;
        let row = read_u32(&mut cur)?;
        let idx = read_u32(&mut cur)?;
        out.push((col, row, idx as usize));
    }
    Ok(out)
}

/// Encode a dense `width*height` u32 auxiliary grid (hit counts), row
/// major north-to-south, invalid cells carrying the published U32
/// sentinel.
pub fn encode_u32_grid(values: &[u32]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(values.len() * 4);
    for &v in values {
        buf.write_u32::<BigEndian>(v).unwrap();
    }
    buf
}

pub fn decode_u32_grid(bytes: &[u8], expected_len: usize) -> Result<Vec<u32>> {
    if bytes.len() != expected_len * 4 {
        return Err(MapSheetError::persistence("truncated auxiliary u32 grid"));
    }
    let mut cur = Cursor::new(bytes);
    (0..expected_len).map(|_| read_u32(&mut cur)).collect()
}

/// Encode a dense `width*height` u16 auxiliary grid (backscatter).
pub fn encode_u16_grid(values: &[u16]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(values.len() * 2);
    for &v in values {
        buf.write_u16::<BigEndian>(v).unwrap();
    }
    buf
}

pub fn decode_u16_grid(bytes: &[u8], expected_len: usize) -> Result<Vec<u16>> {
    if bytes.len() != expected_len * 2 {
        return Err(MapSheetError::persistence("truncated auxiliary u16 grid"));
    }
    let mut cur = Cursor::new(bytes);
    (0..expected_len)
        .map(|_| {
            cur.read_u16::<BigEndian>()
                .map_err(|e| MapSheetError::persistence(format!("truncated tile: {e}")))
        })
        .collect()
}
