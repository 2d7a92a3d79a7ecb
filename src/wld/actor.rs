//! Actor definitions (0x14) and object placements (0x15).

use byteorder::{LittleEndian, ReadBytesExt};
use glam::Vec3;
use std::io;

use super::read::{self, DecodeContext, Reader};

pub const ACTOR_HAS_CURRENT_ACTION: u32 = 0x01;
pub const ACTOR_HAS_LOCATION:       u32 = 0x02;

/// Suffix carried by actor definition names.
pub const ACTORDEF_SUFFIX: &str = "_ACTORDEF";

/// 0x14: actor (object) definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorDef {
    pub flags:          u32,
    pub callback_name:  String,
    pub bounds:         i32,
    pub current_action: Option<u32>,
    /// Skeleton references, mesh references or sprite references.
    pub components:     Vec<i32>,
}

impl ActorDef {
    pub(crate) fn decode(r: &mut Reader, ctx: &DecodeContext) -> io::Result<Self> {
        let flags = r.read_u32::<LittleEndian>()?;
        let callback_name = ctx.strings.lookup(r.read_i32::<LittleEndian>()?).to_owned();
        let action_count = r.read_u32::<LittleEndian>()? as usize;
        let component_count = r.read_u32::<LittleEndian>()? as usize;
        let bounds = r.read_i32::<LittleEndian>()?;

        let current_action = if flags & ACTOR_HAS_CURRENT_ACTION != 0 {
            Some(r.read_u32::<LittleEndian>()?)
        } else {
            None
        };
        if flags & ACTOR_HAS_LOCATION != 0 {
            read::skip(r, 6 * 4 + 4)?;
        }

        // Per-action level-of-detail distances; not needed downstream.
        read::check_count(r, action_count, 8)?;
        for _ in 0..action_count {
            let lod_count = r.read_u32::<LittleEndian>()? as u64;
            let _unknown = r.read_u32::<LittleEndian>()?;
            read::skip(r, lod_count.saturating_mul(4))?;
        }

        let components = read::read_i32s(r, component_count)?;
        Ok(Self { flags, callback_name, bounds, current_action, components })
    }
}

/// Strip the actor-definition suffix and lowercase.
pub fn actor_key(name: &str) -> String {
    let upper = name.to_ascii_uppercase();
    let stem = upper.strip_suffix(ACTORDEF_SUFFIX).unwrap_or(&upper);
    stem.to_ascii_lowercase()
}

/// 0x15: a placed instance of an actor.
#[derive(Debug, Clone, PartialEq)]
pub struct ActorInstance {
    /// Referenced actor, suffix stripped and lowercased.
    pub actor_name:   String,
    pub flags:        u32,
    pub sphere:       i32,
    pub position:     Vec3,
    /// Degrees, converted from 1/512-turn units, in stored order.
    pub rotation:     Vec3,
    /// X, Y, Z (stored on disk as Y, X, Z).
    pub scale:        Vec3,
    pub vertex_color: i32,
}

/// Convert the on-disk angle unit (1/512 of a turn) to degrees.
pub fn angle_to_degrees(units: f32) -> f32 {
    units / 512.0 * 360.0
}

impl ActorInstance {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext, name: &str) -> io::Result<Self> {
        let flags = r.read_u32::<LittleEndian>()?;
        let sphere = r.read_i32::<LittleEndian>()?;
        let position = read::read_vec3(r)?;
        let raw_rotation = read::read_vec3(r)?;
        let scale_y = r.read_f32::<LittleEndian>()?;
        let scale_x = r.read_f32::<LittleEndian>()?;
        let scale_z = r.read_f32::<LittleEndian>()?;
        let vertex_color = r.read_i32::<LittleEndian>()?;
        Ok(Self {
            actor_name: actor_key(name),
            flags,
            sphere,
            position,
            rotation: Vec3::new(
                angle_to_degrees(raw_rotation.x),
                angle_to_degrees(raw_rotation.y),
                angle_to_degrees(raw_rotation.z),
            ),
            scale: Vec3::new(scale_x, scale_y, scale_z),
            vertex_color,
        })
    }
}
