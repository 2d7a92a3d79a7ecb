//! WLD scene-graph decoder.
//!
//! # Layout
//! ```text
//! u32 magic 0x54503D02
//! u32 version               0x00015500 legacy | 0x1000C800 current
//! u32 fragment count
//! u32 bsp region count
//! u32 max object bytes
//! u32 string table size
//! u32 string count
//! [string table size] obfuscated string table
//! fragment count × { u32 size, u32 type, [size] body }
//! ```
//!
//! Every body starts with an `i32` name reference.  The stream position is
//! reset to `body start + size` after each fragment no matter how much the
//! type decoder consumed, so a layout this crate only partly understands
//! cannot desynchronise the records that follow it.

pub mod actor;
pub mod bsp;
pub mod fragment;
pub mod light;
pub mod mesh;
pub mod read;
pub mod skeleton;
pub mod strings;
pub mod texture;
pub mod writer;

use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::{self, Cursor};
use thiserror::Error;

pub use self::fragment::{Fragment, FragmentBody, FragmentKind, FragmentType};
pub use self::strings::StringTable;
pub use self::writer::WldBuilder;

use self::read::{DecodeContext, Reader};

pub const MAGIC: u32 = 0x5450_3D02;
pub const VERSION_LEGACY: u32 = 0x0001_5500;
pub const VERSION_CURRENT: u32 = 0x1000_C800;
pub const HEADER_SIZE: usize = 28;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum WldError {
    #[error("Invalid magic number: {0:#010x}")]
    InvalidMagic(u32),
    #[error("Unsupported version: {0:#010x}")]
    UnsupportedVersion(u32),
    #[error("String table of {size} bytes runs past the end of the file")]
    StringTableOverflow { size: usize },
    #[error("Fragment {index} header runs past the end of the file")]
    Truncated { index: usize },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Failure to interpret a fragment reference.  Always local: best-effort
/// graph walks catch it and degrade.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("Null fragment reference")]
    Null,
    #[error("Fragment {index} out of range ({len} fragments)")]
    OutOfRange { index: usize, len: usize },
    #[error("No fragment named {0:?}")]
    UnknownName(String),
    #[error("Fragment {index} is {found}, expected {expected}")]
    TypeMismatch { index: usize, expected: FragmentKind, found: FragmentKind },
}

// ── Header ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WldHeader {
    pub version:           u32,
    pub fragment_count:    u32,
    pub bsp_region_count:  u32,
    pub max_object_bytes:  u32,
    pub string_table_size: u32,
    pub string_count:      u32,
}

impl WldHeader {
    pub fn is_legacy(&self) -> bool {
        self.version == VERSION_LEGACY
    }

    pub fn read(r: &mut Reader) -> Result<Self, WldError> {
        let magic = r.read_u32::<LittleEndian>()?;
        if magic != MAGIC {
            return Err(WldError::InvalidMagic(magic));
        }
        let version = r.read_u32::<LittleEndian>()?;
        if version != VERSION_LEGACY && version != VERSION_CURRENT {
            return Err(WldError::UnsupportedVersion(version));
        }
        Ok(Self {
            version,
            fragment_count:    r.read_u32::<LittleEndian>()?,
            bsp_region_count:  r.read_u32::<LittleEndian>()?,
            max_object_bytes:  r.read_u32::<LittleEndian>()?,
            string_table_size: r.read_u32::<LittleEndian>()?,
            string_count:      r.read_u32::<LittleEndian>()?,
        })
    }
}

// ── Decoded file ──────────────────────────────────────────────────────────────

/// A decoded scene graph.  Immutable once built, so it can be shared freely
/// between readers.
#[derive(Debug, Clone)]
pub struct Wld {
    header:    WldHeader,
    strings:   StringTable,
    fragments: Vec<Fragment>,
    by_name:   HashMap<String, usize>,
}

/// Signature of a fragment body decoder: type tag, stream positioned just
/// after the name reference, context, resolved name.
pub(crate) type BodyDecoder<'f> =
    dyn FnMut(u32, &mut Reader, &DecodeContext, &str) -> io::Result<FragmentBody> + 'f;

impl Wld {
    pub fn parse(bytes: &[u8]) -> Result<Self, WldError> {
        Self::parse_with(bytes, &mut decode_body)
    }

    pub(crate) fn parse_with(bytes: &[u8], decode: &mut BodyDecoder<'_>) -> Result<Self, WldError> {
        let mut r = Cursor::new(bytes);
        let header = WldHeader::read(&mut r)?;

        let table_size = header.string_table_size as usize;
        let table = read::read_bytes(&mut r, table_size)
            .map_err(|_| WldError::StringTableOverflow { size: table_size })?;
        let strings = StringTable::from_obfuscated(table);

        let ctx = DecodeContext { strings: &strings, legacy: header.is_legacy() };
        let count = header.fragment_count as usize;
        let mut fragments = Vec::with_capacity(read::capacity(&r, count, 8));

        for index in 1..=count {
            let size = r.read_u32::<LittleEndian>().map_err(|_| WldError::Truncated { index })?;
            let tag = r.read_u32::<LittleEndian>().map_err(|_| WldError::Truncated { index })?;
            let start = r.position();

            let fragment = match r.read_i32::<LittleEndian>() {
                Ok(name_ref) => {
                    let name = strings.lookup(name_ref).to_owned();
                    let body = match decode(tag, &mut r, &ctx, &name) {
                        Ok(FragmentBody::Unknown { .. }) => FragmentBody::Unknown { type_tag: tag, size },
                        Ok(body) => body,
                        Err(e) => {
                            tracing::warn!(
                                "fragment {index} ({}) {name:?} failed to decode: {e}",
                                FragmentKind::from_tag(tag)
                            );
                            FragmentBody::Unknown { type_tag: tag, size }
                        }
                    };
                    Fragment { name, body }
                }
                Err(_) => Fragment {
                    name: String::new(),
                    body: FragmentBody::Unknown { type_tag: tag, size },
                },
            };
            fragments.push(fragment);

            r.set_position(start + size as u64);
        }

        if r.position() as usize > bytes.len() {
            tracing::warn!("last fragment claims {} bytes past end of file", r.position() as usize - bytes.len());
        }

        let mut by_name = HashMap::new();
        for (i, f) in fragments.iter().enumerate() {
            if !f.name.is_empty() {
                by_name.entry(f.name.clone()).or_insert(i + 1);
            }
        }

        tracing::debug!(
            "decoded WLD v{:#x}: {} fragments, {} bytes of strings",
            header.version,
            fragments.len(),
            strings.len()
        );
        Ok(Self { header, strings, fragments, by_name })
    }

    pub fn header(&self) -> &WldHeader { &self.header }

    pub fn is_legacy(&self) -> bool { self.header.is_legacy() }

    pub fn strings(&self) -> &StringTable { &self.strings }

    pub fn len(&self) -> usize { self.fragments.len() }

    pub fn is_empty(&self) -> bool { self.fragments.is_empty() }

    pub fn fragments(&self) -> &[Fragment] { &self.fragments }

    /// Fragment at a 1-based index.
    pub fn fragment(&self, index: usize) -> Result<&Fragment, LookupError> {
        if index == 0 {
            return Err(LookupError::Null);
        }
        self.fragments
            .get(index - 1)
            .ok_or(LookupError::OutOfRange { index, len: self.fragments.len() })
    }

    /// Interpret fragment `index` as `T`.
    pub fn get<T: FragmentType>(&self, index: usize) -> Result<&T, LookupError> {
        let fragment = self.fragment(index)?;
        fragment.as_type::<T>().ok_or(LookupError::TypeMismatch {
            index,
            expected: T::KIND,
            found: fragment.kind(),
        })
    }

    /// 1-based index of a named fragment.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    /// Turn an on-disk reference into a 1-based index: positive values are
    /// indices, negative values name a fragment through the string table.
    pub fn resolve(&self, reference: i32) -> Result<usize, LookupError> {
        match reference {
            0 => Err(LookupError::Null),
            r if r > 0 => Ok(r as usize),
            r => {
                let name = self.strings.lookup(r);
                self.index_of(name).ok_or_else(|| LookupError::UnknownName(name.to_owned()))
            }
        }
    }

    /// Resolve `reference` and interpret it as `T`.
    pub fn get_ref<T: FragmentType>(&self, reference: i32) -> Result<&T, LookupError> {
        self.get(self.resolve(reference)?)
    }

    /// All fragments of one kind, in file order, with their 1-based index.
    pub fn fragments_of_kind(&self, kind: FragmentKind) -> Vec<(usize, &Fragment)> {
        self.fragments
            .iter()
            .enumerate()
            .filter(|(_, f)| f.kind() == kind)
            .map(|(i, f)| (i + 1, f))
            .collect()
    }

    /// Typed variant of [`Wld::fragments_of_kind`].
    pub fn iter<'a, T: FragmentType + 'a>(&'a self) -> impl Iterator<Item = (usize, &'a Fragment, &'a T)> + 'a {
        self.fragments
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.as_type::<T>().map(|t| (i + 1, f, t)))
    }

    /// Number of fragments per kind, sorted by kind.
    pub fn kind_histogram(&self) -> Vec<(FragmentKind, usize)> {
        let mut counts: HashMap<FragmentKind, usize> = HashMap::new();
        for f in &self.fragments {
            *counts.entry(f.kind()).or_insert(0) += 1;
        }
        let mut counts: Vec<_> = counts.into_iter().collect();
        counts.sort();
        counts
    }
}

/// Stock dispatch from type tag to decoder.
pub(crate) fn decode_body(tag: u32, r: &mut Reader, ctx: &DecodeContext, name: &str) -> io::Result<FragmentBody> {
    use FragmentBody as B;
    Ok(match FragmentKind::from_tag(tag) {
        FragmentKind::BitmapName           => B::BitmapName(texture::BitmapName::decode(r, ctx)?),
        FragmentKind::BitmapInfo           => B::BitmapInfo(texture::BitmapInfo::decode(r, ctx)?),
        FragmentKind::BitmapInfoRef        => B::BitmapInfoRef(texture::BitmapInfoRef::decode(r, ctx)?),
        FragmentKind::Camera               => B::Camera(light::Camera::decode(r, ctx)?),
        FragmentKind::CameraRef            => B::CameraRef(light::CameraRef::decode(r, ctx)?),
        FragmentKind::SkeletonHierarchy    => B::SkeletonHierarchy(skeleton::SkeletonHierarchy::decode(r, ctx)?),
        FragmentKind::SkeletonHierarchyRef => B::SkeletonHierarchyRef(skeleton::SkeletonHierarchyRef::decode(r, ctx)?),
        FragmentKind::TrackDef             => B::TrackDef(skeleton::TrackDef::decode(r, ctx)?),
        FragmentKind::TrackRef             => B::TrackRef(skeleton::TrackRef::decode(r, ctx)?),
        FragmentKind::ActorDef             => B::ActorDef(actor::ActorDef::decode(r, ctx)?),
        FragmentKind::ActorInstance        => B::ActorInstance(actor::ActorInstance::decode(r, ctx, name)?),
        FragmentKind::LightSource          => B::LightSource(light::LightSource::decode(r, ctx)?),
        FragmentKind::LightSourceRef       => B::LightSourceRef(light::LightSourceRef::decode(r, ctx)?),
        FragmentKind::BspTree              => B::BspTree(bsp::BspTree::decode(r, ctx)?),
        FragmentKind::BspRegion            => B::BspRegion(bsp::BspRegion::decode(r, ctx)?),
        FragmentKind::PointLight           => B::PointLight(light::PointLight::decode(r, ctx)?),
        FragmentKind::BspRegionType        => B::BspRegionType(bsp::BspRegionType::decode(r, ctx)?),
        FragmentKind::AmbientLight         => B::AmbientLight(light::AmbientLight::decode(r, ctx)?),
        FragmentKind::MeshRef              => B::MeshRef(mesh::MeshRef::decode(r, ctx)?),
        FragmentKind::Material             => B::Material(texture::Material::decode(r, ctx)?),
        FragmentKind::MaterialList         => B::MaterialList(texture::MaterialList::decode(r, ctx)?),
        FragmentKind::GlobalAmbientLight   => B::GlobalAmbientLight(light::GlobalAmbientLight::decode(r, ctx)?),
        FragmentKind::Mesh                 => B::Mesh(mesh::Mesh::decode(r, ctx)?),
        FragmentKind::Unknown => {
            tracing::debug!("unknown fragment type 0x{tag:02x} ({name:?})");
            B::Unknown { type_tag: tag, size: 0 }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;

    fn material_list_body(refs: &[i32]) -> Vec<u8> {
        let mut body = Vec::new();
        body.write_u32::<LittleEndian>(0).unwrap();
        body.write_u32::<LittleEndian>(refs.len() as u32).unwrap();
        for r in refs {
            body.write_i32::<LittleEndian>(*r).unwrap();
        }
        body
    }

    #[test]
    fn rejects_bad_magic_and_version() {
        let mut bytes = WldBuilder::new(false).finish();
        bytes[0] = 0;
        assert!(matches!(Wld::parse(&bytes), Err(WldError::InvalidMagic(_))));

        let mut bytes = WldBuilder::new(false).finish();
        bytes[4..8].copy_from_slice(&0xDEADu32.to_le_bytes());
        assert!(matches!(Wld::parse(&bytes), Err(WldError::UnsupportedVersion(0xDEAD))));
    }

    #[test]
    fn unknown_tags_become_placeholders() {
        let mut b = WldBuilder::new(false);
        b.push(0x77, "MYSTERY", vec![1, 2, 3, 4, 5]);
        b.push(0x31, "LIST", material_list_body(&[1]));
        let wld = Wld::parse(&b.finish()).unwrap();

        let first = wld.fragment(1).unwrap();
        assert_eq!(first.name, "MYSTERY");
        assert_eq!(first.kind(), FragmentKind::Unknown);
        assert_eq!(wld.get::<texture::MaterialList>(2).unwrap().materials, vec![1]);
    }

    #[test]
    fn miscounting_decoder_does_not_desync_the_stream() {
        let mut b = WldBuilder::new(false);
        b.push(0x31, "FIRST", material_list_body(&[7]));
        b.push(0x31, "MIDDLE", material_list_body(&[8, 9]));
        b.push(0x31, "LAST", material_list_body(&[10]));
        let bytes = b.finish();

        for skew in [-8i64, 4, 64] {
            // Stand-in decoder that reads the right fields for most fragments
            // but consumes `skew` extra (or fewer) bytes on the middle one.
            let mut calls = 0;
            let wld = Wld::parse_with(&bytes, &mut |tag, r, ctx, name| {
                calls += 1;
                let body = decode_body(tag, r, ctx, name)?;
                if calls == 2 {
                    let pos = r.position() as i64 + skew;
                    r.set_position(pos.max(0) as u64);
                    let _ = r.read_u32::<LittleEndian>();
                }
                Ok(body)
            })
            .unwrap();
            assert_eq!(wld.len(), 3);
            assert_eq!(wld.fragment(3).unwrap().name, "LAST");
            assert_eq!(wld.get::<texture::MaterialList>(3).unwrap().materials, vec![10]);
        }
    }

    #[test]
    fn truncated_body_degrades_to_placeholder() {
        let mut b = WldBuilder::new(false);
        // Claims 50 materials but carries one.
        let mut body = material_list_body(&[1]);
        body[4..8].copy_from_slice(&50u32.to_le_bytes());
        b.push(0x31, "SHORT", body);
        b.push(0x31, "OK", material_list_body(&[2]));
        let wld = Wld::parse(&b.finish()).unwrap();
        assert_eq!(wld.fragment(1).unwrap().kind(), FragmentKind::Unknown);
        assert_eq!(wld.get::<texture::MaterialList>(2).unwrap().materials, vec![2]);
    }

    #[test]
    fn lookups_are_typed_and_local() {
        let mut b = WldBuilder::new(false);
        b.push(0x31, "LIST", material_list_body(&[]));
        let wld = Wld::parse(&b.finish()).unwrap();

        assert_eq!(wld.fragment(0).unwrap_err(), LookupError::Null);
        assert_eq!(wld.fragment(2).unwrap_err(), LookupError::OutOfRange { index: 2, len: 1 });
        assert_eq!(
            wld.get::<texture::Material>(1).unwrap_err(),
            LookupError::TypeMismatch {
                index: 1,
                expected: FragmentKind::Material,
                found: FragmentKind::MaterialList,
            }
        );
    }

    #[test]
    fn negative_references_resolve_by_name() {
        let mut b = WldBuilder::new(false);
        b.push(0x31, "FIRST_MDF", material_list_body(&[]));
        b.push(0x31, "SECOND_MDF", material_list_body(&[]));
        let reference = b.string("SECOND_MDF");
        let wld = Wld::parse(&b.finish()).unwrap();

        assert_eq!(wld.resolve(reference).unwrap(), 2);
        assert_eq!(wld.resolve(1).unwrap(), 1);
        assert!(wld.get_ref::<texture::MaterialList>(reference).is_ok());
    }

    #[test]
    fn fragments_of_kind_keeps_file_order() {
        let mut b = WldBuilder::new(false);
        b.push(0x31, "A", material_list_body(&[]));
        b.push(0x77, "X", vec![]);
        b.push(0x31, "B", material_list_body(&[]));
        let wld = Wld::parse(&b.finish()).unwrap();

        let lists: Vec<(usize, &str)> = wld
            .fragments_of_kind(FragmentKind::MaterialList)
            .into_iter()
            .map(|(i, f)| (i, f.name.as_str()))
            .collect();
        assert_eq!(lists, vec![(1, "A"), (3, "B")]);
        assert_eq!(wld.iter::<texture::MaterialList>().count(), 2);
    }
}
