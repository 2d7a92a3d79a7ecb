//! Minimal WLD writer: fragment bodies are supplied pre-encoded.  Handles
//! the header, the obfuscated string table and fragment framing.

use std::collections::HashMap;

use super::strings;
use super::{MAGIC, VERSION_CURRENT, VERSION_LEGACY};

pub struct WldBuilder {
    legacy:      bool,
    strings:     Vec<u8>,
    offsets:     HashMap<String, i32>,
    fragments:   Vec<(u32, i32, Vec<u8>)>,
    bsp_regions: u32,
}

impl WldBuilder {
    pub fn new(legacy: bool) -> Self {
        Self {
            legacy,
            // Offset 0 is reserved for "no name".
            strings: vec![0],
            offsets: HashMap::new(),
            fragments: Vec::new(),
            bsp_regions: 0,
        }
    }

    /// Intern `s` in the string table and return its (negative) reference.
    pub fn string(&mut self, s: &str) -> i32 {
        if s.is_empty() {
            return 0;
        }
        if let Some(&reference) = self.offsets.get(s) {
            return reference;
        }
        let reference = -(self.strings.len() as i32);
        self.strings.extend_from_slice(s.as_bytes());
        self.strings.push(0);
        self.offsets.insert(s.to_owned(), reference);
        reference
    }

    /// Append a fragment and return its 1-based index.  `body` excludes the
    /// leading name reference.
    pub fn push(&mut self, tag: u32, name: &str, body: Vec<u8>) -> usize {
        let name_ref = self.string(name);
        if tag == 0x22 {
            self.bsp_regions += 1;
        }
        self.fragments.push((tag, name_ref, body));
        self.fragments.len()
    }

    pub fn finish(&self) -> Vec<u8> {
        // Pad the table to a 4-byte boundary, as stock files do.
        let mut table = self.strings.clone();
        while table.len() % 4 != 0 {
            table.push(0);
        }
        let version = if self.legacy { VERSION_LEGACY } else { VERSION_CURRENT };

        let mut out = Vec::new();
        for word in [
            MAGIC,
            version,
            self.fragments.len() as u32,
            self.bsp_regions,
            0,
            table.len() as u32,
            self.offsets.len() as u32,
        ] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.extend_from_slice(&strings::encode_bytes(&table));

        for (tag, name_ref, body) in &self.fragments {
            out.extend_from_slice(&(body.len() as u32 + 4).to_le_bytes());
            out.extend_from_slice(&tag.to_le_bytes());
            out.extend_from_slice(&name_ref.to_le_bytes());
            out.extend_from_slice(body);
        }
        out
    }
}
