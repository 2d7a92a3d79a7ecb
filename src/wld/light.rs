//! Light and camera fragments.  Decoded for completeness; nothing in the
//! geometry pipeline depends on them.

use byteorder::{LittleEndian, ReadBytesExt};
use glam::Vec3;
use std::io;

use super::read::{self, DecodeContext, Reader};

pub const LIGHT_HAS_CURRENT_FRAME: u32 = 0x01;
pub const LIGHT_HAS_SLEEP:         u32 = 0x02;
pub const LIGHT_HAS_LEVELS:        u32 = 0x04;
pub const LIGHT_HAS_COLORS:        u32 = 0x10;

/// 0x1B: light source definition.
#[derive(Debug, Clone, PartialEq)]
pub struct LightSource {
    pub flags:         u32,
    pub frame_count:   u32,
    pub current_frame: Option<u32>,
    pub sleep:         Option<u32>,
    pub levels:        Vec<f32>,
    pub colors:        Vec<Vec3>,
}

impl LightSource {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        let flags = r.read_u32::<LittleEndian>()?;
        let frame_count = r.read_u32::<LittleEndian>()?;
        let current_frame = if flags & LIGHT_HAS_CURRENT_FRAME != 0 {
            Some(r.read_u32::<LittleEndian>()?)
        } else {
            None
        };
        let sleep = if flags & LIGHT_HAS_SLEEP != 0 {
            Some(r.read_u32::<LittleEndian>()?)
        } else {
            None
        };
        let mut levels = Vec::new();
        if flags & LIGHT_HAS_LEVELS != 0 {
            read::check_count(r, frame_count as usize, 4)?;
            for _ in 0..frame_count {
                levels.push(r.read_f32::<LittleEndian>()?);
            }
        }
        let mut colors = Vec::new();
        if flags & LIGHT_HAS_COLORS != 0 {
            read::check_count(r, frame_count as usize, 12)?;
            for _ in 0..frame_count {
                colors.push(read::read_vec3(r)?);
            }
        }
        Ok(Self { flags, frame_count, current_frame, sleep, levels, colors })
    }
}

/// 0x1C: reference to a 0x1B.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightSourceRef {
    pub light: i32,
    pub flags: u32,
}

impl LightSourceRef {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        Ok(Self {
            light: r.read_i32::<LittleEndian>()?,
            flags: r.read_u32::<LittleEndian>()?,
        })
    }
}

/// 0x28: positioned light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub light:    i32,
    pub flags:    u32,
    pub position: Vec3,
    pub radius:   f32,
}

impl PointLight {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        Ok(Self {
            light:    r.read_i32::<LittleEndian>()?,
            flags:    r.read_u32::<LittleEndian>()?,
            position: read::read_vec3(r)?,
            radius:   r.read_f32::<LittleEndian>()?,
        })
    }
}

/// 0x2A: ambient light applied to a list of regions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AmbientLight {
    pub light:   i32,
    pub flags:   u32,
    pub regions: Vec<u32>,
}

impl AmbientLight {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        let light = r.read_i32::<LittleEndian>()?;
        let flags = r.read_u32::<LittleEndian>()?;
        let count = r.read_u32::<LittleEndian>()? as usize;
        Ok(Self { light, flags, regions: read::read_u32s(r, count)? })
    }
}

/// 0x35: zone-wide ambient color, BGRA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalAmbientLight {
    pub color: u32,
}

impl GlobalAmbientLight {
    pub fn rgba(&self) -> [u8; 4] {
        let [b, g, r, a] = self.color.to_le_bytes();
        [r, g, b, a]
    }

    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        Ok(Self { color: r.read_u32::<LittleEndian>()? })
    }
}

/// 0x08: camera.  Only the flags are understood.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Camera {
    pub flags: u32,
}

impl Camera {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        Ok(Self { flags: r.read_u32::<LittleEndian>()? })
    }
}

/// 0x09: reference to a 0x08.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraRef {
    pub camera: i32,
    pub flags:  u32,
}

impl CameraRef {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        Ok(Self {
            camera: r.read_i32::<LittleEndian>()?,
            flags:  r.read_u32::<LittleEndian>()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn global_ambient_is_bgra() {
        let light = GlobalAmbientLight { color: u32::from_le_bytes([10, 20, 30, 255]) };
        assert_eq!(light.rgba(), [30, 20, 10, 255]);
    }
}
