//! Mesh fragments: 0x36 and its reference 0x2D.
//!
//! Vertices are quantized: each axis is an `i16` scaled by `1 / 2^shift`
//! and offset by the mesh center.  UVs are 16-bit fixed point (÷256) in
//! legacy files and `f32` pairs in current ones.  Normals are signed bytes
//! ÷128.

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Vec2, Vec3};
use std::io;

use super::read::{self, DecodeContext, Reader};

/// Polygon flag marking a triangle that can be walked through.
pub const POLYGON_NON_SOLID: u16 = 0x0010;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Polygon {
    pub flags:    u16,
    pub vertices: [u16; 3],
}

impl Polygon {
    pub fn is_solid(&self) -> bool {
        self.flags & POLYGON_NON_SOLID == 0
    }
}

/// Contiguous run of triangles sharing one material-list slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderGroup {
    pub triangle_count: u16,
    pub material_index: u16,
}

/// "The next `count` vertices belong to bone `bone`."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexPiece {
    pub count: u16,
    pub bone:  u16,
}

/// 0x36: mesh.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub flags:         u32,
    /// 0x31 reference.
    pub material_list: i32,
    pub animation:     i32,
    pub center:        Vec3,
    pub max_distance:  f32,
    pub min:           Vec3,
    pub max:           Vec3,
    pub scale_shift:   i16,
    /// Raw quantized positions.
    pub raw_vertices:  Vec<[i16; 3]>,
    pub uvs:           Vec<Vec2>,
    pub normals:       Vec<Vec3>,
    pub colors:        Vec<u32>,
    pub polygons:      Vec<Polygon>,
    pub vertex_pieces: Vec<VertexPiece>,
    pub render_groups: Vec<RenderGroup>,
}

/// Position scale for a shift: `1 / 2^shift`.
pub fn dequantize_scale(shift: i16) -> f32 {
    2f32.powi(-(shift as i32))
}

impl Mesh {
    pub fn scale(&self) -> f32 {
        dequantize_scale(self.scale_shift)
    }

    /// Dequantized positions.
    pub fn positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        let scale = self.scale();
        self.raw_vertices.iter().map(move |v| {
            self.center + Vec3::new(v[0] as f32, v[1] as f32, v[2] as f32) * scale
        })
    }

    /// Bone index per vertex, expanded from the vertex-piece runs.  Vertices
    /// not covered by any run get bone 0.
    pub fn bone_indices(&self) -> Vec<u16> {
        let mut bones = Vec::with_capacity(self.raw_vertices.len());
        for piece in &self.vertex_pieces {
            let room = self.raw_vertices.len() - bones.len();
            bones.extend(std::iter::repeat(piece.bone).take((piece.count as usize).min(room)));
        }
        bones.resize(self.raw_vertices.len(), 0);
        bones
    }

    pub(crate) fn decode(r: &mut Reader, ctx: &DecodeContext) -> io::Result<Self> {
        let flags = r.read_u32::<LittleEndian>()?;
        let material_list = r.read_i32::<LittleEndian>()?;
        let animation = r.read_i32::<LittleEndian>()?;
        read::skip(r, 8)?; // two unused fragment references
        let center = read::read_vec3(r)?;
        read::skip(r, 12)?;
        let max_distance = r.read_f32::<LittleEndian>()?;
        let min = read::read_vec3(r)?;
        let max = read::read_vec3(r)?;

        let vertex_count = r.read_u16::<LittleEndian>()? as usize;
        let uv_count = r.read_u16::<LittleEndian>()? as usize;
        let normal_count = r.read_u16::<LittleEndian>()? as usize;
        let color_count = r.read_u16::<LittleEndian>()? as usize;
        let polygon_count = r.read_u16::<LittleEndian>()? as usize;
        let piece_count = r.read_u16::<LittleEndian>()? as usize;
        let group_count = r.read_u16::<LittleEndian>()? as usize;
        let _vertex_tex_count = r.read_u16::<LittleEndian>()?;
        let _size9 = r.read_u16::<LittleEndian>()?;
        let scale_shift = r.read_i16::<LittleEndian>()?;

        read::check_count(r, vertex_count, 6)?;
        let mut raw_vertices = Vec::with_capacity(vertex_count);
        for _ in 0..vertex_count {
            raw_vertices.push([
                r.read_i16::<LittleEndian>()?,
                r.read_i16::<LittleEndian>()?,
                r.read_i16::<LittleEndian>()?,
            ]);
        }

        let uv_size = if ctx.legacy { 4 } else { 8 };
        read::check_count(r, uv_count, uv_size)?;
        let mut uvs = Vec::with_capacity(uv_count);
        for _ in 0..uv_count {
            uvs.push(if ctx.legacy {
                Vec2::new(
                    r.read_i16::<LittleEndian>()? as f32 / 256.0,
                    r.read_i16::<LittleEndian>()? as f32 / 256.0,
                )
            } else {
                Vec2::new(r.read_f32::<LittleEndian>()?, r.read_f32::<LittleEndian>()?)
            });
        }

        read::check_count(r, normal_count, 3)?;
        let mut normals = Vec::with_capacity(normal_count);
        for _ in 0..normal_count {
            normals.push(Vec3::new(
                r.read_i8()? as f32 / 128.0,
                r.read_i8()? as f32 / 128.0,
                r.read_i8()? as f32 / 128.0,
            ));
        }

        let colors = read::read_u32s(r, color_count)?;

        read::check_count(r, polygon_count, 8)?;
        let mut polygons = Vec::with_capacity(polygon_count);
        for _ in 0..polygon_count {
            polygons.push(Polygon {
                flags:    r.read_u16::<LittleEndian>()?,
                vertices: [
                    r.read_u16::<LittleEndian>()?,
                    r.read_u16::<LittleEndian>()?,
                    r.read_u16::<LittleEndian>()?,
                ],
            });
        }

        read::check_count(r, piece_count, 4)?;
        let mut vertex_pieces = Vec::with_capacity(piece_count);
        for _ in 0..piece_count {
            vertex_pieces.push(VertexPiece {
                count: r.read_u16::<LittleEndian>()?,
                bone:  r.read_u16::<LittleEndian>()?,
            });
        }

        read::check_count(r, group_count, 4)?;
        let mut render_groups = Vec::with_capacity(group_count);
        for _ in 0..group_count {
            render_groups.push(RenderGroup {
                triangle_count: r.read_u16::<LittleEndian>()?,
                material_index: r.read_u16::<LittleEndian>()?,
            });
        }

        Ok(Self {
            flags,
            material_list,
            animation,
            center,
            max_distance,
            min,
            max,
            scale_shift,
            raw_vertices,
            uvs,
            normals,
            colors,
            polygons,
            vertex_pieces,
            render_groups,
        })
    }
}

/// 0x2D: reference to a 0x36, used by skeleton bones and actors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshRef {
    pub mesh:  i32,
    pub flags: u32,
}

impl MeshRef {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        Ok(Self {
            mesh:  r.read_i32::<LittleEndian>()?,
            flags: r.read_u32::<LittleEndian>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh_with(raw: Vec<[i16; 3]>, center: Vec3, shift: i16) -> Mesh {
        Mesh {
            flags: 0,
            material_list: 0,
            animation: 0,
            center,
            max_distance: 0.0,
            min: Vec3::ZERO,
            max: Vec3::ZERO,
            scale_shift: shift,
            raw_vertices: raw,
            uvs: Vec::new(),
            normals: Vec::new(),
            colors: Vec::new(),
            polygons: Vec::new(),
            vertex_pieces: Vec::new(),
            render_groups: Vec::new(),
        }
    }

    #[test]
    fn dequantizes_relative_to_center() {
        let mesh = mesh_with(vec![[128, -64, 0]], Vec3::new(10.0, 0.0, -1.0), 6);
        let p: Vec<Vec3> = mesh.positions().collect();
        assert_eq!(p[0], Vec3::new(12.0, -1.0, -1.0));
    }

    #[test]
    fn vertex_pieces_expand_to_bone_indices() {
        let mut mesh = mesh_with(vec![[0; 3]; 5], Vec3::ZERO, 0);
        mesh.vertex_pieces = vec![
            VertexPiece { count: 2, bone: 3 },
            VertexPiece { count: 2, bone: 1 },
        ];
        assert_eq!(mesh.bone_indices(), vec![3, 3, 1, 1, 0]);

        // Runs that claim more vertices than exist are clipped.
        mesh.vertex_pieces = vec![VertexPiece { count: 9, bone: 7 }];
        assert_eq!(mesh.bone_indices(), vec![7; 5]);
    }

    #[test]
    fn polygon_solidity_flag() {
        assert!(Polygon { flags: 0, vertices: [0, 1, 2] }.is_solid());
        assert!(!Polygon { flags: POLYGON_NON_SOLID, vertices: [0, 1, 2] }.is_solid());
    }
}
