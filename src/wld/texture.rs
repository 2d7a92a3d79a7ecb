//! Texture and material fragments: 0x03, 0x04, 0x05, 0x30, 0x31.

use byteorder::{LittleEndian, ReadBytesExt};
use serde::Serialize;
use std::io;

use super::read::{self, DecodeContext, Reader};
use super::strings;

/// 0x03: one or more texture filenames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmapName {
    pub filenames: Vec<String>,
}

impl BitmapName {
    /// First filename, or `""`.
    pub fn filename(&self) -> &str {
        self.filenames.first().map(String::as_str).unwrap_or("")
    }

    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        // Old writers store zero for a single name.
        let count = (r.read_u32::<LittleEndian>()? as usize).max(1);
        read::check_count(r, count, 2)?;
        let mut filenames = Vec::with_capacity(count);
        for _ in 0..count {
            let len = r.read_u16::<LittleEndian>()? as usize;
            let encoded = read::read_bytes(r, len)?;
            filenames.push(strings::decode_string(encoded).to_ascii_lowercase());
        }
        Ok(Self { filenames })
    }
}

pub const BITMAP_HAS_CURRENT_FRAME: u32 = 0x04;
pub const BITMAP_ANIMATED:          u32 = 0x08;

/// 0x04: texture info; lists the 0x03 frames of a possibly animated texture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitmapInfo {
    pub flags:         u32,
    pub current_frame: Option<u32>,
    /// Frame delay in milliseconds, present when animated.
    pub delay_ms:      Option<u32>,
    pub frames:        Vec<i32>,
}

impl BitmapInfo {
    pub fn is_animated(&self) -> bool {
        self.flags & BITMAP_ANIMATED != 0
    }

    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        let flags = r.read_u32::<LittleEndian>()?;
        let count = r.read_u32::<LittleEndian>()? as usize;
        let current_frame = if flags & BITMAP_HAS_CURRENT_FRAME != 0 {
            Some(r.read_u32::<LittleEndian>()?)
        } else {
            None
        };
        let delay_ms = if flags & BITMAP_ANIMATED != 0 {
            Some(r.read_u32::<LittleEndian>()?)
        } else {
            None
        };
        let frames = read::read_i32s(r, count)?;
        Ok(Self { flags, current_frame, delay_ms, frames })
    }
}

/// 0x05: reference to a 0x04.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapInfoRef {
    pub bitmap_info: i32,
    pub flags:       u32,
}

impl BitmapInfoRef {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        Ok(Self {
            bitmap_info: r.read_i32::<LittleEndian>()?,
            flags:       r.read_u32::<LittleEndian>()?,
        })
    }
}

/// How a material is blended, derived from its render-parameter word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum MaterialCategory {
    Diffuse,
    Transparent25,
    Transparent50,
    Transparent75,
    TransparentMasked,
    TransparentAdditive,
    Boundary,
    Invisible,
    #[default]
    Unknown,
}

pub const RENDER_VISIBLE: u32 = 0x8000_0000;

impl MaterialCategory {
    pub fn from_params(params: u32) -> Self {
        if params & RENDER_VISIBLE == 0 {
            return if params == 0 { Self::Invisible } else { Self::Boundary };
        }
        match params & !RENDER_VISIBLE {
            0x01 | 0x02 | 0x14 | 0x15 => Self::Diffuse,
            0x05 => Self::Transparent25,
            0x09 => Self::Transparent50,
            0x0A => Self::Transparent75,
            0x13 => Self::TransparentMasked,
            0x0B | 0x17 => Self::TransparentAdditive,
            _ => Self::Unknown,
        }
    }

    pub fn is_drawn(self) -> bool {
        !matches!(self, Self::Boundary | Self::Invisible)
    }
}

pub const MATERIAL_HAS_PAIR: u32 = 0x02;

/// 0x30: material.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub flags:          u32,
    pub render_params:  u32,
    pub category:       MaterialCategory,
    pub rgb_pen:        u32,
    pub brightness:     f32,
    pub scaled_ambient: f32,
    /// 0x05 reference; may be 0.
    pub bitmap_info:    i32,
}

impl Material {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        let flags = r.read_u32::<LittleEndian>()?;
        let render_params = r.read_u32::<LittleEndian>()?;
        let rgb_pen = r.read_u32::<LittleEndian>()?;
        let brightness = r.read_f32::<LittleEndian>()?;
        let scaled_ambient = r.read_f32::<LittleEndian>()?;
        let bitmap_info = r.read_i32::<LittleEndian>()?;
        if flags & MATERIAL_HAS_PAIR != 0 {
            read::skip(r, 8)?;
        }
        Ok(Self {
            flags,
            render_params,
            category: MaterialCategory::from_params(render_params),
            rgb_pen,
            brightness,
            scaled_ambient,
            bitmap_info,
        })
    }
}

/// 0x31: ordered list of 0x30 references indexed by mesh render groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialList {
    pub flags:     u32,
    pub materials: Vec<i32>,
}

impl MaterialList {
    pub(crate) fn decode(r: &mut Reader, _ctx: &DecodeContext) -> io::Result<Self> {
        let flags = r.read_u32::<LittleEndian>()?;
        let count = r.read_u32::<LittleEndian>()? as usize;
        Ok(Self { flags, materials: read::read_i32s(r, count)? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wld::strings::{encode_bytes, StringTable};
    use std::io::Cursor;

    #[test]
    fn category_table() {
        assert_eq!(MaterialCategory::from_params(0), MaterialCategory::Invisible);
        assert_eq!(MaterialCategory::from_params(0x0000_0013), MaterialCategory::Boundary);
        assert_eq!(MaterialCategory::from_params(0x8000_0001), MaterialCategory::Diffuse);
        assert_eq!(MaterialCategory::from_params(0x8000_0005), MaterialCategory::Transparent25);
        assert_eq!(MaterialCategory::from_params(0x8000_0009), MaterialCategory::Transparent50);
        assert_eq!(MaterialCategory::from_params(0x8000_000A), MaterialCategory::Transparent75);
        assert_eq!(MaterialCategory::from_params(0x8000_0013), MaterialCategory::TransparentMasked);
        assert_eq!(MaterialCategory::from_params(0x8000_0017), MaterialCategory::TransparentAdditive);
        assert_eq!(MaterialCategory::from_params(0x8000_0099), MaterialCategory::Unknown);
    }

    #[test]
    fn bitmap_name_decodes_xor_filename() {
        let name = encode_bytes(b"GRASS.BMP\0");
        let mut body = Vec::new();
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend_from_slice(&(name.len() as u16).to_le_bytes());
        body.extend_from_slice(&name);

        let strings = StringTable::default();
        let ctx = DecodeContext { strings: &strings, legacy: false };
        let decoded = BitmapName::decode(&mut Cursor::new(&body[..]), &ctx).unwrap();
        assert_eq!(decoded.filename(), "grass.bmp");
    }

    #[test]
    fn animated_bitmap_info_reads_delay_before_frames() {
        let mut body = Vec::new();
        body.extend_from_slice(&BITMAP_ANIMATED.to_le_bytes());
        body.extend_from_slice(&2u32.to_le_bytes());
        body.extend_from_slice(&150u32.to_le_bytes());
        body.extend_from_slice(&1i32.to_le_bytes());
        body.extend_from_slice(&2i32.to_le_bytes());

        let strings = StringTable::default();
        let ctx = DecodeContext { strings: &strings, legacy: false };
        let info = BitmapInfo::decode(&mut Cursor::new(&body[..]), &ctx).unwrap();
        assert!(info.is_animated());
        assert_eq!(info.delay_ms, Some(150));
        assert_eq!(info.frames, vec![1, 2]);
    }
}
