use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Read, Write};

use super::PfsError;

pub const MAGIC: &[u8; 4] = b"PFS ";
/// Archive without a filename directory; every entry gets a synthesized name.
pub const VERSION_1: u32 = 0x0001_0000;
/// Archive carrying a filename directory record.
pub const VERSION_2: u32 = 0x0002_0000;
pub const HEADER_SIZE: usize = 12;
pub const RECORD_SIZE: usize = 12;
/// CRC slot of the filename directory record.
pub const NAME_DIRECTORY_CRC: u32 = 0xFFFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PfsHeader {
    pub directory_offset: u32,
    pub version:          u32,
}

impl PfsHeader {
    pub fn has_names(&self) -> bool {
        self.version == VERSION_2
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.directory_offset)?;
        writer.write_all(MAGIC)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> Result<Self, PfsError> {
        let directory_offset = reader.read_u32::<LittleEndian>()?;
        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(PfsError::InvalidMagic);
        }
        let version = reader.read_u32::<LittleEndian>()?;
        if version != VERSION_1 && version != VERSION_2 {
            return Err(PfsError::UnsupportedVersion(version));
        }
        Ok(Self { directory_offset, version })
    }
}

/// One row of the archive index.  Only lives for the duration of a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryRecord {
    pub crc:               u32,
    pub offset:            u32,
    pub uncompressed_size: u32,
}

impl DirectoryRecord {
    pub fn is_name_directory(&self) -> bool {
        self.crc == NAME_DIRECTORY_CRC
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.crc)?;
        writer.write_u32::<LittleEndian>(self.offset)?;
        writer.write_u32::<LittleEndian>(self.uncompressed_size)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            crc:               reader.read_u32::<LittleEndian>()?,
            offset:            reader.read_u32::<LittleEndian>()?,
            uncompressed_size: reader.read_u32::<LittleEndian>()?,
        })
    }
}

/// Read the count-prefixed directory at the reader's current position.
pub fn read_directory<R: Read>(mut reader: R, available: usize) -> Result<Vec<DirectoryRecord>, PfsError> {
    let count = reader.read_u32::<LittleEndian>()? as usize;
    // A count that cannot fit in the remaining bytes is a lie; refuse it
    // before allocating.
    if count.saturating_mul(RECORD_SIZE) > available.saturating_sub(4) {
        return Err(PfsError::DirectoryOverflow { count });
    }
    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        records.push(DirectoryRecord::read(&mut reader)?);
    }
    Ok(records)
}

/// Parse a decompressed filename directory: `u32 count`, then
/// `count × { u32 len, len bytes }`.  Names come back lowercased with
/// trailing NULs removed.
pub fn parse_name_directory(bytes: &[u8]) -> Result<Vec<String>, PfsError> {
    let mut cursor = io::Cursor::new(bytes);
    let count = cursor.read_u32::<LittleEndian>()? as usize;
    let mut names = Vec::with_capacity(count.min(bytes.len() / 4));
    for _ in 0..count {
        let len = cursor.read_u32::<LittleEndian>()? as usize;
        let start = cursor.position() as usize;
        let raw = bytes
            .get(start..start.saturating_add(len))
            .ok_or(PfsError::Io(io::ErrorKind::UnexpectedEof.into()))?;
        cursor.set_position((start + len) as u64);
        let trimmed = match raw.iter().position(|&b| b == 0) {
            Some(end) => &raw[..end],
            None      => raw,
        };
        names.push(String::from_utf8_lossy(trimmed).to_ascii_lowercase());
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_roundtrip_and_magic_check() {
        let header = PfsHeader { directory_offset: 0x40, version: VERSION_2 };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert_eq!(buf.len(), HEADER_SIZE);
        assert_eq!(&buf[4..8], b"PFS ");
        assert_eq!(PfsHeader::read(&buf[..]).unwrap(), header);

        buf[4] = b'X';
        assert!(matches!(PfsHeader::read(&buf[..]), Err(PfsError::InvalidMagic)));
    }

    #[test]
    fn rejects_unknown_version() {
        let header = PfsHeader { directory_offset: 0, version: 0x0003_0000 };
        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();
        assert!(matches!(
            PfsHeader::read(&buf[..]),
            Err(PfsError::UnsupportedVersion(0x0003_0000))
        ));
    }

    #[test]
    fn name_directory_strips_nul_and_lowercases() {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(2).unwrap();
        for name in [&b"Gfaydark.WLD\0"[..], &b"tree.bmp\0"[..]] {
            buf.write_u32::<LittleEndian>(name.len() as u32).unwrap();
            buf.extend_from_slice(name);
        }
        let names = parse_name_directory(&buf).unwrap();
        assert_eq!(names, vec!["gfaydark.wld".to_string(), "tree.bmp".to_string()]);
    }

    #[test]
    fn directory_count_larger_than_buffer_is_rejected() {
        let mut buf = Vec::new();
        buf.write_u32::<LittleEndian>(1_000_000).unwrap();
        let err = read_directory(&buf[..], buf.len()).unwrap_err();
        assert!(matches!(err, PfsError::DirectoryOverflow { count: 1_000_000 }));
    }
}
