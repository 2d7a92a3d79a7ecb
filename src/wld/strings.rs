//! The obfuscated string table and the XOR scheme shared with inline strings.

/// Repeating key applied to the string table, texture filenames and
/// region-type classification strings.
pub const XOR_KEY: [u8; 8] = [0x95, 0x3A, 0xC5, 0x2A, 0x95, 0x7A, 0x95, 0x6A];

/// XOR `bytes` with [`XOR_KEY`], key position restarting at the first byte.
pub fn decode_bytes(bytes: &[u8]) -> Vec<u8> {
    bytes
        .iter()
        .zip(XOR_KEY.iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}

/// Encoding is the same operation; kept separate for readability at call sites.
pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    decode_bytes(bytes)
}

/// Decode an inline obfuscated string, dropping everything from the first NUL.
pub fn decode_string(bytes: &[u8]) -> String {
    let plain = decode_bytes(bytes);
    let end = plain.iter().position(|&b| b == 0).unwrap_or(plain.len());
    String::from_utf8_lossy(&plain[..end]).into_owned()
}

/// Decoded string blob.  Names are addressed by negated byte offset.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    bytes: Vec<u8>,
}

impl StringTable {
    pub fn from_obfuscated(raw: &[u8]) -> Self {
        Self { bytes: decode_bytes(raw) }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// String at `-reference`.  Zero, positive and out-of-range references
    /// give `""`.
    pub fn lookup(&self, reference: i32) -> &str {
        if reference >= 0 {
            return "";
        }
        let start = reference.unsigned_abs() as usize;
        let Some(tail) = self.bytes.get(start..) else {
            return "";
        };
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        std::str::from_utf8(&tail[..end]).unwrap_or("")
    }

    /// Negative reference of the first string equal to `name`.
    pub fn find(&self, name: &str) -> Option<i32> {
        let needle = name.as_bytes();
        let mut start = 0usize;
        while start < self.bytes.len() {
            let end = self.bytes[start..]
                .iter()
                .position(|&b| b == 0)
                .map_or(self.bytes.len(), |p| start + p);
            if start > 0 && &self.bytes[start..end] == needle {
                return i32::try_from(start).ok().map(|s| -s);
            }
            start = end + 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(plain: &[u8]) -> StringTable {
        StringTable::from_obfuscated(&encode_bytes(plain))
    }

    #[test]
    fn lookup_by_negative_offset() {
        let strings = table(b"\0TREE_DMSPRITEDEF\0ELF_HS_DEF\0");
        assert_eq!(strings.lookup(-1), "TREE_DMSPRITEDEF");
        assert_eq!(strings.lookup(-18), "ELF_HS_DEF");
        // Mid-string offsets just see the tail.
        assert_eq!(strings.lookup(-6), "DMSPRITEDEF");
    }

    #[test]
    fn lookup_never_fails() {
        let strings = table(b"\0ABC\0");
        assert_eq!(strings.lookup(0), "");
        assert_eq!(strings.lookup(5), "");
        assert_eq!(strings.lookup(-100), "");
        assert_eq!(strings.lookup(i32::MIN), "");
    }

    #[test]
    fn key_cycles_past_eight_bytes() {
        let plain = b"0123456789abcdef";
        let encoded = encode_bytes(plain);
        assert_eq!(encoded[0], b'0' ^ 0x95);
        assert_eq!(encoded[8], b'8' ^ 0x95);
        assert_eq!(decode_bytes(&encoded), plain);
    }

    #[test]
    fn find_returns_negative_reference() {
        let strings = table(b"\0A_DEF\0B_DEF\0");
        assert_eq!(strings.find("B_DEF"), Some(-7));
        assert_eq!(strings.find("missing"), None);
    }

    #[test]
    fn inline_string_stops_at_nul() {
        let encoded = encode_bytes(b"SPRITE.BMP\0\0\0");
        assert_eq!(decode_string(&encoded), "SPRITE.BMP");
    }
}
