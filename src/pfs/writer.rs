//! Archive writer.
//!
//! Files are appended one at a time as chunked zlib records.  On
//! `finalize()` the filename directory (version 2 only) and the record
//! directory are written at the end and the header is patched in place at
//! offset 0.

use std::io::{self, Seek, SeekFrom, Write};

use super::chunk::{compress_record, DEFAULT_CHUNK_SIZE};
use super::crc::filename_crc;
use super::header::{DirectoryRecord, PfsHeader, HEADER_SIZE, NAME_DIRECTORY_CRC, VERSION_2};

/// Default zlib level.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Configuration for [`PfsWriter`].
#[derive(Debug, Clone)]
pub struct PackOptions {
    /// Maximum uncompressed bytes per chunk.
    pub chunk_size: usize,
    /// zlib level, 0-9.
    pub level:      u32,
    /// `VERSION_1` writes no filename directory.
    pub version:    u32,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            level:      DEFAULT_COMPRESSION_LEVEL,
            version:    VERSION_2,
        }
    }
}

pub struct PfsWriter<W: Write + Seek> {
    writer:  W,
    options: PackOptions,
    records: Vec<DirectoryRecord>,
    names:   Vec<String>,
    /// Placeholder header written.
    started: bool,
}

impl<W: Write + Seek> PfsWriter<W> {
    pub fn new(writer: W, options: PackOptions) -> Self {
        Self { writer, options, records: Vec::new(), names: Vec::new(), started: false }
    }

    fn ensure_started(&mut self) -> io::Result<()> {
        if !self.started {
            self.writer.seek(SeekFrom::Start(0))?;
            self.writer.write_all(&[0u8; HEADER_SIZE])?; // patched on finalize
            self.started = true;
        }
        Ok(())
    }

    fn write_record(&mut self, crc: u32, data: &[u8]) -> io::Result<()> {
        self.ensure_started()?;
        let offset = self.writer.stream_position()?;
        let offset = u32::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "archive exceeds 4 GiB"))?;
        let payload = compress_record(data, self.options.chunk_size, self.options.level)?;
        self.writer.write_all(&payload)?;
        self.records.push(DirectoryRecord {
            crc,
            offset,
            uncompressed_size: data.len() as u32,
        });
        Ok(())
    }

    /// Append one file.  The name is stored lowercased.
    pub fn add_file(&mut self, name: &str, data: &[u8]) -> io::Result<()> {
        let name = name.to_ascii_lowercase();
        self.write_record(filename_crc(&name), data)?;
        self.names.push(name);
        Ok(())
    }

    /// Write the directories, patch the header and hand back the sink.
    pub fn finalize(mut self) -> io::Result<W> {
        self.ensure_started()?;

        if self.options.version == VERSION_2 {
            let mut listing = Vec::new();
            listing.extend_from_slice(&(self.names.len() as u32).to_le_bytes());
            for name in &self.names {
                listing.extend_from_slice(&(name.len() as u32 + 1).to_le_bytes());
                listing.extend_from_slice(name.as_bytes());
                listing.push(0);
            }
            self.write_record(NAME_DIRECTORY_CRC, &listing)?;
        }

        let directory_offset = self.writer.stream_position()? as u32;
        self.writer.write_all(&(self.records.len() as u32).to_le_bytes())?;
        for record in &self.records {
            record.write(&mut self.writer)?;
        }

        let end = self.writer.stream_position()?;
        self.writer.seek(SeekFrom::Start(0))?;
        PfsHeader { directory_offset, version: self.options.version }.write(&mut self.writer)?;
        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;
        Ok(self.writer)
    }
}
