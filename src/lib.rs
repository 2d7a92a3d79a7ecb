pub mod pfs;
pub mod wld;
pub mod skeleton;
pub mod geometry;

pub use pfs::{Archive, ArchiveEntry, PfsError};
pub use wld::{Fragment, FragmentBody, FragmentKind, LookupError, Wld, WldError};
pub use skeleton::{BoneNaming, Skeleton};
pub use geometry::{extract_mesh, SpatialClassifier, ZoneMesh};
