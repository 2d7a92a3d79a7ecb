//! Chunked deflate payloads.
//!
//! A data record is a run of chunks, each prefixed by
//! `u32 compressed_len, u32 uncompressed_len`.  Chunks are normally
//! zlib-wrapped; a few packers emitted raw deflate streams, so a chunk that
//! does not inflate to its declared length through the zlib decoder is
//! retried as raw deflate before giving up.

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::{self, Cursor, Read, Write};

use super::PfsError;

pub const CHUNK_HEADER_SIZE: usize = 8;
/// Largest uncompressed chunk the stock packer produces.
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

/// Inflate `data` expecting exactly `expected` bytes.  Returns the reason
/// of the last failure when neither decoder produces the declared length.
pub fn inflate_chunk(data: &[u8], expected: usize) -> Result<Vec<u8>, String> {
    match inflate_with(ZlibDecoder::new(data), expected) {
        Ok(out) => return Ok(out),
        Err(e)  => tracing::debug!("zlib inflate failed ({e}), retrying as raw deflate"),
    }
    inflate_with(DeflateDecoder::new(data), expected)
}

fn inflate_with<R: Read>(decoder: R, expected: usize) -> Result<Vec<u8>, String> {
    let mut out = Vec::with_capacity(expected);
    // One byte of slack so an oversized stream is detected, not truncated.
    decoder
        .take(expected as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| e.to_string())?;
    if out.len() != expected {
        return Err(format!("inflated {} bytes, expected {expected}", out.len()));
    }
    Ok(out)
}

/// Decompress the record starting at `offset` until `total` bytes have been
/// produced.
pub fn decompress_record(archive: &[u8], offset: u32, total: u32) -> Result<Vec<u8>, PfsError> {
    let total = total as usize;
    let mut out = Vec::with_capacity(total.min(archive.len().saturating_mul(16)));
    let mut cursor = Cursor::new(archive);
    cursor.set_position(offset as u64);

    while out.len() < total {
        let chunk_offset = cursor.position();
        let corrupt = |reason: String| PfsError::CorruptData { offset: chunk_offset, reason };

        let compressed_len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| corrupt("chunk header past end of archive".into()))? as usize;
        let uncompressed_len = cursor
            .read_u32::<LittleEndian>()
            .map_err(|_| corrupt("chunk header past end of archive".into()))? as usize;

        if uncompressed_len == 0 {
            return Err(corrupt("chunk declares zero uncompressed bytes".into()));
        }
        if out.len() + uncompressed_len > total {
            return Err(corrupt(format!(
                "chunk overflows record: {} + {uncompressed_len} > {total}",
                out.len()
            )));
        }

        let start = cursor.position() as usize;
        let payload = archive
            .get(start..start.saturating_add(compressed_len))
            .ok_or_else(|| corrupt(format!("{compressed_len} compressed bytes past end of archive")))?;
        cursor.set_position((start + compressed_len) as u64);

        let inflated = inflate_chunk(payload, uncompressed_len).map_err(corrupt)?;
        out.extend_from_slice(&inflated);
    }

    Ok(out)
}

/// Compress `data` into zlib-wrapped chunks of at most `chunk_size`
/// uncompressed bytes, each with its length prefix.
pub fn compress_record(data: &[u8], chunk_size: usize, level: u32) -> io::Result<Vec<u8>> {
    let mut out = Vec::new();
    for chunk in data.chunks(chunk_size.max(1)) {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level.min(9)));
        encoder.write_all(chunk)?;
        let compressed = encoder.finish()?;
        out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
        out.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(&compressed);
    }
    Ok(out)
}
