//! Filename hash used by the PFS directory.
//!
//! A plain MSB-first CRC-32 over polynomial `0x04C11DB7`, initial value 0 and
//! no final XOR.  The input is the lowercased filename followed by a single
//! NUL byte.  It only pairs directory records with names; it is never used
//! to check payload integrity.

pub const POLYNOMIAL: u32 = 0x04C1_1DB7;

static TABLE: [u32; 256] = build_table();

const fn build_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ POLYNOMIAL
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

#[inline]
fn update(crc: u32, byte: u8) -> u32 {
    (crc << 8) ^ TABLE[(((crc >> 24) ^ byte as u32) & 0xFF) as usize]
}

/// Hash a filename the way the archive directory does.
pub fn filename_crc(name: &str) -> u32 {
    let crc = name
        .bytes()
        .map(|b| b.to_ascii_lowercase())
        .fold(0u32, update);
    update(crc, 0)
}
