//! BSP fragments: the node tree (0x21), leaf regions (0x22) and the
//! region-type tags (0x29).

use byteorder::{LittleEndian, ReadBytesExt};
use glam::Vec3;
use serde::Serialize;
use std::io;

use super::read::{self, DecodeContext, Reader};
use super::strings;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BspNode {
    pub normal:   Vec3,
    pub distance: f32,
    /// 0 for internal nodes, 1-based region id for leaves.
    pub region:   u32,
    /// 1-based node indices; 0 means no child.
    pub left:     u32,
    pub right:    u32,
}

impl BspNode {
    pub fn is_leaf(&self) -> bool {
        self.region > 0
    }
}

/// 0x21: flat BSP node array; node 0 is the root.
#[derive(Debug, Clone, PartialEq)]
pub struct BspTree {
    pub nodes: Vec<BspNode>,
}

impl BspTree {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        let count = r.read_u32::<LittleEndian>()? as usize;
        read::check_count(r, count, 28)?;
        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            nodes.push(BspNode {
                normal:   read::read_vec3(r)?,
                distance: r.read_f32::<LittleEndian>()?,
                region:   r.read_u32::<LittleEndian>()?,
                left:     r.read_u32::<LittleEndian>()?,
                right:    r.read_u32::<LittleEndian>()?,
            });
        }
        Ok(Self { nodes })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sphere {
    pub center: Vec3,
    pub radius: f32,
}

impl Sphere {
    pub fn contains(&self, point: Vec3) -> bool {
        self.center.distance(point) <= self.radius
    }
}

pub const REGION_HAS_SPHERE:   u32 = 0x001;
pub const REGION_HAS_MESH_REF: u32 = 0x100;

/// 0x22: one BSP leaf volume.  Most of the record (vertex lists, walls,
/// obstacles, visibility data) is skipped; only the sizes are load-bearing.
#[derive(Debug, Clone, PartialEq)]
pub struct BspRegion {
    pub flags:         u32,
    pub ambient_light: i32,
    pub sphere:        Option<Sphere>,
    /// 0x36 reference when the region carries its own geometry.
    pub mesh:          Option<i32>,
}

impl BspRegion {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        let flags = r.read_u32::<LittleEndian>()?;
        let ambient_light = r.read_i32::<LittleEndian>()?;
        let region_vertices = r.read_u32::<LittleEndian>()? as u64;
        let proximal_regions = r.read_u32::<LittleEndian>()? as u64;
        let render_vertices = r.read_u32::<LittleEndian>()? as u64;
        let walls = r.read_u32::<LittleEndian>()? as usize;
        let obstacles = r.read_u32::<LittleEndian>()? as usize;

        read::skip(r, region_vertices * 12)?;
        read::skip(r, proximal_regions * 8)?;
        read::skip(r, render_vertices * 12)?;
        skip_polygon_list(r, walls)?;
        skip_polygon_list(r, obstacles)?;

        let visibility_len = r.read_u32::<LittleEndian>()? as u64;
        read::skip(r, visibility_len)?;

        let sphere = if flags & REGION_HAS_SPHERE != 0 {
            let center = read::read_vec3(r)?;
            let radius = r.read_f32::<LittleEndian>()?;
            Some(Sphere { center, radius })
        } else {
            None
        };
        let mesh = if flags & REGION_HAS_MESH_REF != 0 {
            Some(r.read_i32::<LittleEndian>()?)
        } else {
            None
        };
        Ok(Self { flags, ambient_light, sphere, mesh })
    }
}

/// Walls and obstacles: `{u32 flags, u32 n, n × u32}` each.
fn skip_polygon_list(r: &mut Reader, count: usize) -> io::Result<()> {
    read::check_count(r, count, 8)?;
    for _ in 0..count {
        let _flags = r.read_u32::<LittleEndian>()?;
        let n = r.read_u32::<LittleEndian>()? as u64;
        read::skip(r, n * 4)?;
    }
    Ok(())
}

/// 0x29: tags a set of regions with a classification string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BspRegionType {
    pub flags:          u32,
    /// 0-based indices into the ordered list of 0x22 regions.
    pub regions:        Vec<u32>,
    pub classification: String,
}

impl BspRegionType {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        let flags = r.read_u32::<LittleEndian>()?;
        let count = r.read_u32::<LittleEndian>()? as usize;
        let regions = read::read_u32s(r, count)?;
        let len = r.read_u32::<LittleEndian>()? as usize;
        let classification = strings::decode_string(read::read_bytes(r, len)?);
        Ok(Self { flags, regions, classification })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wld::strings::{encode_bytes, StringTable};
    use std::io::Cursor;

    fn ctx_decode<T>(body: &[u8], f: fn(&mut Reader, &DecodeContext) -> io::Result<T>) -> T {
        let strings = StringTable::default();
        let ctx = DecodeContext { strings: &strings, legacy: false };
        f(&mut Cursor::new(body), &ctx).unwrap()
    }

    fn push_u32(buf: &mut Vec<u8>, v: u32) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    #[test]
    fn region_skips_to_sphere() {
        let mut body = Vec::new();
        push_u32(&mut body, REGION_HAS_SPHERE);
        push_u32(&mut body, 0);
        push_u32(&mut body, 2); // region vertices
        push_u32(&mut body, 1); // proximal
        push_u32(&mut body, 1); // render vertices
        push_u32(&mut body, 1); // walls
        push_u32(&mut body, 2); // obstacles
        body.extend_from_slice(&[0xEE; 24]);
        body.extend_from_slice(&[0xEE; 8]);
        body.extend_from_slice(&[0xEE; 12]);
        // one wall with three vertex indices
        push_u32(&mut body, 0);
        push_u32(&mut body, 3);
        body.extend_from_slice(&[0xEE; 12]);
        // two obstacles, one and zero indices
        push_u32(&mut body, 0);
        push_u32(&mut body, 1);
        body.extend_from_slice(&[0xEE; 4]);
        push_u32(&mut body, 0);
        push_u32(&mut body, 0);
        // visibility run
        push_u32(&mut body, 5);
        body.extend_from_slice(&[0xEE; 5]);
        for v in [1.0f32, 2.0, 3.0, 4.5] {
            body.extend_from_slice(&v.to_le_bytes());
        }

        let region = ctx_decode(&body, BspRegion::decode);
        let sphere = region.sphere.unwrap();
        assert_eq!(sphere.center, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(sphere.radius, 4.5);
        assert_eq!(region.mesh, None);
    }

    #[test]
    fn region_type_decodes_own_string() {
        let tag = encode_bytes(b"DRNTP00255000001_ZONE\0");
        let mut body = Vec::new();
        push_u32(&mut body, 0);
        push_u32(&mut body, 2);
        push_u32(&mut body, 4);
        push_u32(&mut body, 9);
        push_u32(&mut body, tag.len() as u32);
        body.extend_from_slice(&tag);

        let region_type = ctx_decode(&body, BspRegionType::decode);
        assert_eq!(region_type.regions, vec![4, 9]);
        assert_eq!(region_type.classification, "DRNTP00255000001_ZONE");
    }

    #[test]
    fn sphere_containment_is_inclusive() {
        let sphere = Sphere { center: Vec3::ZERO, radius: 5.0 };
        assert!(sphere.contains(Vec3::new(3.0, 4.0, 0.0)));
        assert!(!sphere.contains(Vec3::new(3.0, 4.0, 0.1)));
    }
}
