//! PFS archive container, the compressed package that carries zone files.
//!
//! ```no_run
//! use zonekit::pfs;
//!
//! let archive = pfs::load("gfaydark.s3d")?;
//! for entry in archive.entries() {
//!     println!("{} ({} bytes)", entry.name, entry.data.len());
//! }
//! let wld = archive.get("gfaydark.wld");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Layout
//! A 12-byte header (`u32 directory offset`, magic `"PFS "`, `u32 version`)
//! points at a count-prefixed directory of `{crc, offset, size}` records.
//! Version 2 archives carry one extra record, flagged by an all-ones CRC,
//! whose payload lists the filenames; the others are matched to names by
//! hashing each filename with [`crc::filename_crc`].

pub mod chunk;
pub mod crc;
pub mod header;
pub mod writer;

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Cursor, Write};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use self::header::{DirectoryRecord, PfsHeader};

pub use self::writer::{PackOptions, PfsWriter};

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum PfsError {
    #[error("Invalid magic number")]
    InvalidMagic,
    #[error("Unsupported version: {0:#010x}")]
    UnsupportedVersion(u32),
    #[error("Directory claims {count} records, more than the archive can hold")]
    DirectoryOverflow { count: usize },
    #[error("Corrupt data in chunk at offset {offset:#x}: {reason}")]
    CorruptData { offset: u64, reason: String },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Entries ───────────────────────────────────────────────────────────────────

/// One decompressed file recovered from the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub crc:  u32,
    pub data: Vec<u8>,
}

/// Lightweight descriptor used by listings.
#[derive(Debug, Clone, Serialize)]
pub struct EntryInfo {
    pub name: String,
    pub crc:  String,
    pub size: usize,
}

impl From<&ArchiveEntry> for EntryInfo {
    fn from(e: &ArchiveEntry) -> Self {
        EntryInfo {
            name: e.name.clone(),
            crc:  hex::encode(e.crc.to_be_bytes()),
            size: e.data.len(),
        }
    }
}

/// Name given to entries whose CRC matched no filename.
pub fn synthesized_name(crc: u32) -> String {
    hex::encode(crc.to_be_bytes())
}

// ── Archive ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Archive {
    version: u32,
    entries: Vec<ArchiveEntry>,
}

/// Read and decode the archive at `path`.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Archive, PfsError> {
    let bytes = std::fs::read(path.as_ref())?;
    Archive::from_bytes(&bytes)
}

impl Archive {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PfsError> {
        let header = PfsHeader::read(Cursor::new(bytes))?;

        let dir_start = header.directory_offset as usize;
        let dir_bytes = bytes
            .get(dir_start..)
            .ok_or(PfsError::Io(io::ErrorKind::UnexpectedEof.into()))?;
        let records = header::read_directory(Cursor::new(dir_bytes), dir_bytes.len())?;

        // Pull out the filename directory first so data records can be named.
        let mut names: HashMap<u32, String> = HashMap::new();
        let mut data_records: Vec<DirectoryRecord> = Vec::with_capacity(records.len());
        for record in records {
            if header.has_names() && record.is_name_directory() {
                let raw = chunk::decompress_record(bytes, record.offset, record.uncompressed_size)?;
                for name in header::parse_name_directory(&raw)? {
                    names.insert(crc::filename_crc(&name), name);
                }
            } else {
                data_records.push(record);
            }
        }
        data_records.sort_by_key(|r| r.offset);

        let mut entries = Vec::with_capacity(data_records.len());
        for record in data_records {
            let data = chunk::decompress_record(bytes, record.offset, record.uncompressed_size)?;
            let name = match names.get(&record.crc) {
                Some(name) => name.clone(),
                None => {
                    if header.has_names() {
                        tracing::warn!("no filename for crc {:08x}", record.crc);
                    }
                    synthesized_name(record.crc)
                }
            };
            entries.push(ArchiveEntry { name, crc: record.crc, data });
        }

        tracing::debug!(
            "decoded PFS v{} archive: {} entries, {} names",
            header.version >> 16,
            entries.len(),
            names.len()
        );
        Ok(Self { version: header.version, entries })
    }

    pub fn version(&self) -> u32 { self.version }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn entries(&self) -> &[ArchiveEntry] { &self.entries }

    pub fn into_entries(self) -> Vec<ArchiveEntry> { self.entries }

    pub fn list(&self) -> Vec<EntryInfo> {
        self.entries.iter().map(EntryInfo::from).collect()
    }

    /// Case-insensitive lookup by filename.
    pub fn get(&self, name: &str) -> Option<&ArchiveEntry> {
        self.entries.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Entries whose name ends with `extension` (e.g. `".wld"`).
    pub fn with_extension<'a>(&'a self, extension: &'a str) -> impl Iterator<Item = &'a ArchiveEntry> + 'a {
        self.entries.iter().filter(move |e| {
            e.name.len() >= extension.len()
                && e.name[e.name.len() - extension.len()..].eq_ignore_ascii_case(extension)
        })
    }

    /// Write every entry into `dest`, creating it if necessary.
    pub fn extract_all<P: AsRef<Path>>(&self, dest: P) -> io::Result<()> {
        let dest = dest.as_ref();
        if !dest.exists() { std::fs::create_dir_all(dest)?; }
        for entry in &self.entries {
            // Entry names are flat; refuse anything that would escape `dest`.
            let file_name = Path::new(&entry.name)
                .file_name()
                .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData,
                    format!("unusable entry name: {}", entry.name)))?;
            File::create(dest.join(file_name))?.write_all(&entry.data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pack(version: u32, files: &[(&str, &[u8])]) -> Vec<u8> {
        let opts = PackOptions { version, ..PackOptions::default() };
        let mut writer = PfsWriter::new(Cursor::new(Vec::new()), opts);
        for (name, data) in files {
            writer.add_file(name, data).unwrap();
        }
        writer.finalize().unwrap().into_inner()
    }

    #[test]
    fn named_entries_are_recovered() {
        let bytes = pack(header::VERSION_2, &[
            ("gfaydark.wld", b"scene graph"),
            ("Tree.BMP",     b"pixels"),
        ]);
        let archive = Archive::from_bytes(&bytes).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.get("gfaydark.wld").unwrap().data, b"scene graph");
        // Names are stored lowercased; lookup ignores case.
        assert_eq!(archive.get("TREE.bmp").unwrap().name, "tree.bmp");
    }

    #[test]
    fn version_one_synthesizes_names() {
        let bytes = pack(header::VERSION_1, &[("objects.wld", b"abc")]);
        let archive = Archive::from_bytes(&bytes).unwrap();
        assert_eq!(archive.entries()[0].name, "613159e6");
        assert_eq!(archive.entries()[0].data, b"abc");
    }

    #[test]
    fn unmatched_crc_falls_back_to_hex_name() {
        let mut bytes = pack(header::VERSION_2, &[("lights.wld", b"light")]);
        // Corrupt the CRC of the first directory record (the data record).
        let dir = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        bytes[dir + 4..dir + 8].copy_from_slice(&0x1234_5678u32.to_le_bytes());
        let archive = Archive::from_bytes(&bytes).unwrap();
        assert_eq!(archive.entries()[0].name, "12345678");
    }

    #[test]
    fn bad_magic_is_a_format_error() {
        let mut bytes = pack(header::VERSION_2, &[("a.txt", b"a")]);
        bytes[5] = b'Z';
        assert!(matches!(Archive::from_bytes(&bytes), Err(PfsError::InvalidMagic)));
    }

    #[test]
    fn with_extension_filters_case_insensitively() {
        let bytes = pack(header::VERSION_2, &[
            ("zone.wld", b"1"),
            ("objects.WLD", b"2"),
            ("tex.bmp", b"3"),
        ]);
        let archive = Archive::from_bytes(&bytes).unwrap();
        assert_eq!(archive.with_extension(".wld").count(), 2);
    }
}
