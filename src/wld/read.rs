//! Little-endian helpers shared by the fragment decoders.

use byteorder::{LittleEndian, ReadBytesExt};
use glam::Vec3;
use std::io::{self, Cursor, Seek, SeekFrom};

use super::strings::StringTable;

pub type Reader<'a> = Cursor<&'a [u8]>;

/// State a fragment decoder needs besides the byte stream.
pub struct DecodeContext<'a> {
    pub strings: &'a StringTable,
    /// Legacy files use 16-bit UVs and compressed track frames.
    pub legacy:  bool,
}

pub fn remaining(r: &Reader) -> usize {
    r.get_ref().len().saturating_sub(r.position() as usize)
}

/// Capacity to reserve for `count` elements of at least `min_size` bytes,
/// clamped to what the stream can still hold.
pub fn capacity(r: &Reader, count: usize, min_size: usize) -> usize {
    count.min(remaining(r) / min_size.max(1))
}

/// Fail early when a header count cannot possibly fit in the stream.
pub fn check_count(r: &Reader, count: usize, min_size: usize) -> io::Result<()> {
    if count.saturating_mul(min_size) > remaining(r) {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{count} elements of {min_size} bytes exceed the fragment stream"),
        ));
    }
    Ok(())
}

pub fn skip(r: &mut Reader, bytes: u64) -> io::Result<()> {
    let target = r.position().saturating_add(bytes);
    if target > r.get_ref().len() as u64 {
        return Err(io::ErrorKind::UnexpectedEof.into());
    }
    r.seek(SeekFrom::Start(target))?;
    Ok(())
}

pub fn read_vec3(r: &mut Reader) -> io::Result<Vec3> {
    Ok(Vec3::new(
        r.read_f32::<LittleEndian>()?,
        r.read_f32::<LittleEndian>()?,
        r.read_f32::<LittleEndian>()?,
    ))
}

pub fn read_u32s(r: &mut Reader, count: usize) -> io::Result<Vec<u32>> {
    check_count(r, count, 4)?;
    (0..count).map(|_| r.read_u32::<LittleEndian>()).collect()
}

pub fn read_i32s(r: &mut Reader, count: usize) -> io::Result<Vec<i32>> {
    check_count(r, count, 4)?;
    (0..count).map(|_| r.read_i32::<LittleEndian>()).collect()
}

pub fn read_bytes<'a>(r: &mut Reader<'a>, len: usize) -> io::Result<&'a [u8]> {
    let start = r.position() as usize;
    let end = start.checked_add(len).ok_or(io::ErrorKind::InvalidData)?;
    let data: &'a [u8] = *r.get_ref();
    let bytes = data.get(start..end).ok_or(io::ErrorKind::UnexpectedEof)?;
    r.set_position(end as u64);
    Ok(bytes)
}
