//! The closed set of fragment kinds and the tagged body type.

use serde::Serialize;

use super::actor::{ActorDef, ActorInstance};
use super::bsp::{BspRegion, BspRegionType, BspTree};
use super::light::{AmbientLight, Camera, CameraRef, GlobalAmbientLight, LightSource, LightSourceRef, PointLight};
use super::mesh::{Mesh, MeshRef};
use super::skeleton::{SkeletonHierarchy, SkeletonHierarchyRef, TrackDef, TrackRef};
use super::texture::{BitmapInfo, BitmapInfoRef, BitmapName, Material, MaterialList};

macro_rules! fragment_kinds {
    ($($variant:ident = $tag:literal),* $(,)?) => {
        /// Kind tag of a fragment, one per known on-disk type plus `Unknown`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum FragmentKind {
            $($variant,)*
            Unknown,
        }

        impl FragmentKind {
            pub fn from_tag(tag: u32) -> Self {
                match tag {
                    $($tag => FragmentKind::$variant,)*
                    _ => FragmentKind::Unknown,
                }
            }

            /// On-disk type tag; `None` for `Unknown`.
            pub fn tag(self) -> Option<u32> {
                match self {
                    $(FragmentKind::$variant => Some($tag),)*
                    FragmentKind::Unknown => None,
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(FragmentKind::$variant => stringify!($variant),)*
                    FragmentKind::Unknown => "Unknown",
                }
            }
        }

        /// Decoded payload of one fragment.
        #[derive(Debug, Clone)]
        pub enum FragmentBody {
            $($variant($variant),)*
            /// Unrecognised tag, or a known tag whose decoder ran off the end
            /// of the stream.  Only the tag and declared size are kept.
            Unknown { type_tag: u32, size: u32 },
        }

        impl FragmentBody {
            pub fn kind(&self) -> FragmentKind {
                match self {
                    $(FragmentBody::$variant(_) => FragmentKind::$variant,)*
                    FragmentBody::Unknown { .. } => FragmentKind::Unknown,
                }
            }
        }

        $(
            impl FragmentType for $variant {
                const KIND: FragmentKind = FragmentKind::$variant;

                fn from_body(body: &FragmentBody) -> Option<&Self> {
                    match body {
                        FragmentBody::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )*
    };
}

/// Typed view used by `Wld::get` to interpret fragment N as `T`.
pub trait FragmentType: Sized {
    const KIND: FragmentKind;
    fn from_body(body: &FragmentBody) -> Option<&Self>;
}

fragment_kinds! {
    BitmapName           = 0x03,
    BitmapInfo           = 0x04,
    BitmapInfoRef        = 0x05,
    Camera               = 0x08,
    CameraRef            = 0x09,
    SkeletonHierarchy    = 0x10,
    SkeletonHierarchyRef = 0x11,
    TrackDef             = 0x12,
    TrackRef             = 0x13,
    ActorDef             = 0x14,
    ActorInstance        = 0x15,
    LightSource          = 0x1B,
    LightSourceRef       = 0x1C,
    BspTree              = 0x21,
    BspRegion            = 0x22,
    PointLight           = 0x28,
    BspRegionType        = 0x29,
    AmbientLight         = 0x2A,
    MeshRef              = 0x2D,
    Material             = 0x30,
    MaterialList         = 0x31,
    GlobalAmbientLight   = 0x35,
    Mesh                 = 0x36,
}

impl std::fmt::Display for FragmentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.tag() {
            Some(tag) => write!(f, "{} (0x{tag:02x})", self.name()),
            None      => f.write_str(self.name()),
        }
    }
}

/// One record of the scene graph.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub name: String,
    pub body: FragmentBody,
}

impl Fragment {
    pub fn kind(&self) -> FragmentKind {
        self.body.kind()
    }

    pub fn as_type<T: FragmentType>(&self) -> Option<&T> {
        T::from_body(&self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip_through_kind() {
        for tag in 0..0x40u32 {
            let kind = FragmentKind::from_tag(tag);
            match kind.tag() {
                Some(back) => assert_eq!(back, tag),
                None       => assert_eq!(kind, FragmentKind::Unknown),
            }
        }
        assert_eq!(FragmentKind::from_tag(0x36), FragmentKind::Mesh);
        assert_eq!(FragmentKind::from_tag(0x99), FragmentKind::Unknown);
    }

    #[test]
    fn display_includes_tag() {
        assert_eq!(FragmentKind::BspTree.to_string(), "BspTree (0x21)");
        assert_eq!(FragmentKind::Unknown.to_string(), "Unknown");
    }
}
