//! Skeleton and track fragments: 0x10, 0x11, 0x12, 0x13.

use byteorder::{LittleEndian, ReadBytesExt};
use glam::{Mat4, Quat, Vec3};
use std::io;

use super::read::{self, DecodeContext, Reader};

pub const SKELETON_HAS_PARAMS:      u32 = 0x001;
pub const SKELETON_HAS_RADIUS:      u32 = 0x002;
pub const SKELETON_HAS_MESH_LIST:   u32 = 0x200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bone {
    pub name:     String,
    pub flags:    u32,
    /// 0x13 reference.
    pub track:    i32,
    /// 0x2D reference, often 0.
    pub mesh:     i32,
    /// 0-based indices into the same skeleton.
    pub children: Vec<u32>,
    /// Derived from every bone's child list; -1 for roots.
    pub parent:   i32,
}

/// 0x10: skeleton hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct SkeletonHierarchy {
    pub flags:             u32,
    pub polygon_animation: i32,
    pub bounding_radius:   Option<f32>,
    pub bones:             Vec<Bone>,
    /// Explicit 0x2D list, present when `SKELETON_HAS_MESH_LIST` is set.
    pub meshes:            Vec<i32>,
}

impl SkeletonHierarchy {
    pub fn parent_of(&self, bone: usize) -> Option<usize> {
        let parent = self.bones.get(bone)?.parent;
        usize::try_from(parent).ok()
    }

    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.bones.iter().enumerate().filter(|(_, b)| b.parent < 0).map(|(i, _)| i)
    }

    pub(crate) fn decode(r: &mut Reader, ctx: &DecodeContext) -> io::Result<Self> {
        let flags = r.read_u32::<LittleEndian>()?;
        let bone_count = r.read_u32::<LittleEndian>()? as usize;
        let polygon_animation = r.read_i32::<LittleEndian>()?;
        if flags & SKELETON_HAS_PARAMS != 0 {
            read::skip(r, 12)?;
        }
        let bounding_radius = if flags & SKELETON_HAS_RADIUS != 0 {
            Some(r.read_f32::<LittleEndian>()?)
        } else {
            None
        };

        read::check_count(r, bone_count, 20)?;
        let mut bones = Vec::with_capacity(bone_count);
        for _ in 0..bone_count {
            let name = ctx.strings.lookup(r.read_i32::<LittleEndian>()?).to_owned();
            let flags = r.read_u32::<LittleEndian>()?;
            let track = r.read_i32::<LittleEndian>()?;
            let mesh = r.read_i32::<LittleEndian>()?;
            let child_count = r.read_u32::<LittleEndian>()? as usize;
            let children = read::read_u32s(r, child_count)?;
            bones.push(Bone { name, flags, track, mesh, children, parent: -1 });
        }

        let meshes = if flags & SKELETON_HAS_MESH_LIST != 0 {
            let count = r.read_u32::<LittleEndian>()? as usize;
            let meshes = read::read_i32s(r, count)?;
            read::skip(r, count as u64 * 4)?;
            meshes
        } else {
            Vec::new()
        };

        derive_parents(&mut bones);
        Ok(Self { flags, polygon_animation, bounding_radius, bones, meshes })
    }
}

/// Fill `parent` on every bone by inverting the child lists.  Out-of-range,
/// self-referencing and doubly-claimed children are ignored, and any chain
/// that still loops is cut at the first bone the walk reaches twice, so
/// bones hanging off a cycle keep their parents.
pub fn derive_parents(bones: &mut [Bone]) {
    let len = bones.len();
    let mut parents = vec![-1i32; len];
    for (index, bone) in bones.iter().enumerate() {
        for &child in &bone.children {
            let child = child as usize;
            if child >= len || child == index {
                tracing::warn!("bone {index} lists invalid child {child}");
                continue;
            }
            if parents[child] >= 0 {
                tracing::warn!("bone {child} claimed by both {} and {index}", parents[child]);
                continue;
            }
            parents[child] = index as i32;
        }
    }

    // walk[b] is the 1-based walk that first reached b; bones reached by an
    // earlier walk already lead to a root.
    let mut walk = vec![0usize; len];
    for start in 0..len {
        if walk[start] != 0 {
            continue;
        }
        let stamp = start + 1;
        walk[start] = stamp;
        let mut cursor = start;
        while let Ok(parent) = usize::try_from(parents[cursor]) {
            if walk[parent] == stamp {
                tracing::warn!("bone {parent} closes a parent cycle; treating it as a root");
                parents[parent] = -1;
                break;
            }
            if walk[parent] != 0 {
                break;
            }
            walk[parent] = stamp;
            cursor = parent;
        }
    }

    for (bone, parent) in bones.iter_mut().zip(parents) {
        bone.parent = parent;
    }
}

/// 0x11: reference to a 0x10.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkeletonHierarchyRef {
    pub skeleton: i32,
    pub flags:    u32,
}

impl SkeletonHierarchyRef {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        Ok(Self {
            skeleton: r.read_i32::<LittleEndian>()?,
            flags:    r.read_u32::<LittleEndian>()?,
        })
    }
}

/// One bone transform.  Frame 0 of every track is the rest pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackFrame {
    pub translation: Vec3,
    pub rotation:    Quat,
    pub scale:       f32,
}

impl Default for TrackFrame {
    fn default() -> Self {
        Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY, scale: 1.0 }
    }
}

impl TrackFrame {
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(Vec3::splat(self.scale), self.rotation, self.translation)
    }

    /// Legacy layout: eight `i16`: rotation w, x, y, z, shift x, y, z and
    /// the shared denominator, all divided by 256.
    fn read_compressed(r: &mut Reader) -> io::Result<Self> {
        let mut raw = [0i16; 8];
        r.read_i16_into::<LittleEndian>(&mut raw)?;
        let [w, x, y, z, sx, sy, sz, denom] = raw.map(|v| v as f32 / 256.0);
        Ok(Self {
            translation: Vec3::new(sx, sy, sz),
            rotation:    normalized(Quat::from_xyzw(x, y, z, w)),
            scale:       denom,
        })
    }

    /// Current layout: eight `f32`: scale, translation, then w, x, y, z.
    fn read_uncompressed(r: &mut Reader) -> io::Result<Self> {
        let mut raw = [0f32; 8];
        r.read_f32_into::<LittleEndian>(&mut raw)?;
        let [scale, tx, ty, tz, w, x, y, z] = raw;
        Ok(Self {
            translation: Vec3::new(tx, ty, tz),
            rotation:    normalized(Quat::from_xyzw(x, y, z, w)),
            scale,
        })
    }
}

fn normalized(q: Quat) -> Quat {
    let len = q.length();
    if len > f32::EPSILON && len.is_finite() { q / len } else { Quat::IDENTITY }
}

/// 0x12: per-bone frame sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackDef {
    pub flags:  u32,
    pub frames: Vec<TrackFrame>,
}

impl TrackDef {
    /// Frame 0.
    pub fn rest(&self) -> Option<&TrackFrame> {
        self.frames.first()
    }

    pub(crate) fn decode(r: &mut Reader, ctx: &DecodeContext) -> io::Result<Self> {
        let flags = r.read_u32::<LittleEndian>()?;
        let frame_count = r.read_u32::<LittleEndian>()? as usize;
        let frame_size = if ctx.legacy { 16 } else { 32 };
        read::check_count(r, frame_count, frame_size)?;
        let mut frames = Vec::with_capacity(frame_count);
        for _ in 0..frame_count {
            frames.push(if ctx.legacy {
                TrackFrame::read_compressed(r)?
            } else {
                TrackFrame::read_uncompressed(r)?
            });
        }
        Ok(Self { flags, frames })
    }
}

pub const TRACK_HAS_SLEEP: u32 = 0x01;

/// 0x13: reference to a 0x12, bound to a bone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackRef {
    pub track: i32,
    pub flags: u32,
    pub sleep: Option<u32>,
}

impl TrackRef {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        let track = r.read_i32::<LittleEndian>()?;
        let flags = r.read_u32::<LittleEndian>()?;
        let sleep = if flags & TRACK_HAS_SLEEP != 0 {
            Some(r.read_u32::<LittleEndian>()?)
        } else {
            None
        };
        Ok(Self { track, flags, sleep })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wld::strings::StringTable;
    use std::io::Cursor;

    fn bone(children: Vec<u32>) -> Bone {
        Bone { name: String::new(), flags: 0, track: 0, mesh: 0, children, parent: 99 }
    }

    #[test]
    fn parents_are_inverted_child_lists() {
        let mut bones = vec![bone(vec![1, 2]), bone(vec![]), bone(vec![3]), bone(vec![])];
        derive_parents(&mut bones);
        let parents: Vec<i32> = bones.iter().map(|b| b.parent).collect();
        assert_eq!(parents, vec![-1, 0, 0, 2]);
    }

    #[test]
    fn invalid_children_are_ignored() {
        let mut bones = vec![bone(vec![0, 5, 1]), bone(vec![]), bone(vec![1])];
        derive_parents(&mut bones);
        assert_eq!(bones[0].parent, -1);
        assert_eq!(bones[1].parent, 0); // first claim wins
        assert_eq!(bones[2].parent, -1);
    }

    #[test]
    fn parent_cycle_is_cut() {
        let mut bones = vec![bone(vec![1]), bone(vec![0])];
        derive_parents(&mut bones);
        assert!(bones.iter().any(|b| b.parent == -1));
    }

    #[test]
    fn branch_into_cycle_keeps_its_parent() {
        // 0 -> 1 -> 2 -> 1: only the 1/2 loop is cut.
        let mut bones = vec![bone(vec![]), bone(vec![0, 2]), bone(vec![1])];
        derive_parents(&mut bones);
        let parents: Vec<i32> = bones.iter().map(|b| b.parent).collect();
        assert_eq!(parents, vec![1, -1, 1]);
    }

    #[test]
    fn every_walk_ends_at_a_root() {
        // Two disjoint loops plus a tail feeding the second one.
        let mut bones = vec![
            bone(vec![1]),
            bone(vec![0]),
            bone(vec![3]),
            bone(vec![4]),
            bone(vec![2, 5]),
            bone(vec![]),
        ];
        derive_parents(&mut bones);
        for start in 0..bones.len() {
            let mut cursor = bones[start].parent;
            let mut steps = 0;
            while cursor >= 0 {
                steps += 1;
                assert!(steps <= bones.len(), "bone {start} still loops");
                cursor = bones[cursor as usize].parent;
            }
        }
        assert_eq!(bones[5].parent, 4);
    }

    #[test]
    fn compressed_frame_divides_by_256() {
        let raw: [i16; 8] = [256, 0, 0, 0, 512, -256, 128, 256];
        let body: Vec<u8> = raw.iter().flat_map(|v| v.to_le_bytes()).collect();
        let frame = TrackFrame::read_compressed(&mut Cursor::new(&body[..])).unwrap();
        assert_eq!(frame.translation, Vec3::new(2.0, -1.0, 0.5));
        assert_eq!(frame.rotation, Quat::IDENTITY);
        assert_eq!(frame.scale, 1.0);
    }

    #[test]
    fn uncompressed_track_uses_current_layout() {
        let mut body = Vec::new();
        body.extend_from_slice(&0u32.to_le_bytes());
        body.extend_from_slice(&1u32.to_le_bytes());
        for v in [2.0f32, 1.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0] {
            body.extend_from_slice(&v.to_le_bytes());
        }
        let strings = StringTable::default();
        let ctx = DecodeContext { strings: &strings, legacy: false };
        let track = TrackDef::decode(&mut Cursor::new(&body[..]), &ctx).unwrap();
        let rest = track.rest().unwrap();
        assert_eq!(rest.scale, 2.0);
        assert_eq!(rest.translation, Vec3::new(1.0, 2.0, 3.0));
        // A zero quaternion degrades to identity.
        assert_eq!(rest.rotation, Quat::IDENTITY);
    }
}
