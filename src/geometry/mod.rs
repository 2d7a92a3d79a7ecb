//! Derived zone data: the combined renderable mesh and the BSP point
//! classifier.  Both are built from a decoded [`Wld`](crate::wld::Wld) and
//! treat broken references as absent data.

pub mod mesh;
pub mod spatial;

pub use self::mesh::{extract_mesh, placements, DrawGroup, MaterialInfo, Placement, TextureAnimation, ZoneMesh};
pub use self::spatial::{ClassifierOptions, RegionInfo, RegionTag, SpatialClassifier, ZoneLine};
