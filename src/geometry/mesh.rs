//! Combined mesh assembly.
//!
//! Every 0x36 mesh in the file is appended to one set of vertex buffers.
//! Each mesh's render groups consume its polygons in order and become
//! [`DrawGroup`]s over the combined index buffer, with the texture and
//! blend category resolved through the material chain:
//!
//! ```text
//! MaterialList → Material → BitmapInfoRef → BitmapInfo → BitmapName
//! ```

use glam::{Vec2, Vec3};
use serde::Serialize;

use crate::wld::actor::ActorInstance;
use crate::wld::mesh::Mesh;
use crate::wld::texture::{BitmapInfo, BitmapInfoRef, BitmapName, Material, MaterialCategory, MaterialList};
use crate::wld::{LookupError, Wld};

// ── Output types ──────────────────────────────────────────────────────────────

/// Ordered texture frames of an animated material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextureAnimation {
    pub frames:   Vec<String>,
    pub delay_ms: u32,
}

/// What one render group resolves to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaterialInfo {
    /// Texture filename, `""` when any link of the chain is missing.
    pub texture:   String,
    pub category:  MaterialCategory,
    pub animation: Option<TextureAnimation>,
}

/// A contiguous index range drawn with one material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawGroup {
    pub first_index: u32,
    pub index_count: u32,
    pub texture:     String,
    pub category:    MaterialCategory,
    pub animation:   Option<TextureAnimation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ZoneMesh {
    pub positions:    Vec<Vec3>,
    pub uvs:          Vec<Vec2>,
    pub normals:      Vec<Vec3>,
    /// Bone per vertex, from the vertex-piece runs.  0 for static meshes.
    pub bone_indices: Vec<u16>,
    /// Three per triangle.
    pub indices:      Vec<u32>,
    /// One per triangle.
    pub solid:        Vec<bool>,
    pub groups:       Vec<DrawGroup>,
}

impl ZoneMesh {
    pub fn vertex_count(&self) -> usize { self.positions.len() }

    pub fn triangle_count(&self) -> usize { self.solid.len() }

    /// Append one decoded mesh.
    pub fn append(&mut self, wld: &Wld, mesh: &Mesh) {
        let base = self.positions.len() as u32;
        let vertex_count = mesh.raw_vertices.len();

        self.positions.extend(mesh.positions());
        self.uvs.extend(mesh.uvs.iter().copied().take(vertex_count));
        self.uvs.resize(self.positions.len(), Vec2::ZERO);
        self.normals.extend(mesh.normals.iter().copied().take(vertex_count));
        self.normals.resize(self.positions.len(), Vec3::ZERO);
        self.bone_indices.extend(mesh.bone_indices());

        let mut polygons = mesh.polygons.iter();
        let mut push_range = |zone: &mut ZoneMesh, count: usize, material: MaterialInfo| {
            let first_index = zone.indices.len() as u32;
            for polygon in polygons.by_ref().take(count) {
                if polygon.vertices.iter().any(|&v| v as usize >= vertex_count) {
                    tracing::debug!("dropping triangle {:?} outside {vertex_count} vertices", polygon.vertices);
                    continue;
                }
                zone.indices.extend(polygon.vertices.iter().map(|&v| base + v as u32));
                zone.solid.push(polygon.is_solid());
            }
            let index_count = zone.indices.len() as u32 - first_index;
            if index_count > 0 {
                zone.groups.push(DrawGroup {
                    first_index,
                    index_count,
                    texture: material.texture,
                    category: material.category,
                    animation: material.animation,
                });
            }
        };

        for group in &mesh.render_groups {
            let material = resolve_material(wld, mesh.material_list, group.material_index as usize);
            push_range(self, group.triangle_count as usize, material);
        }
        // Polygons no render group claims are still geometry.
        push_range(self, usize::MAX, MaterialInfo::default());
    }
}

// ── Extraction ────────────────────────────────────────────────────────────────

/// Combine every mesh in `wld`, in file order.
pub fn extract_mesh(wld: &Wld) -> ZoneMesh {
    let mut zone = ZoneMesh::default();
    for (_, _, mesh) in wld.iter::<Mesh>() {
        zone.append(wld, mesh);
    }
    tracing::debug!(
        "assembled {} vertices, {} triangles in {} draw groups",
        zone.vertex_count(),
        zone.triangle_count(),
        zone.groups.len()
    );
    zone
}

/// Resolve entry `index` of the material list `list_ref`.  Never fails:
/// any broken link degrades to an empty texture, and to
/// `MaterialCategory::Unknown` when the material itself is unreachable.
pub fn resolve_material(wld: &Wld, list_ref: i32, index: usize) -> MaterialInfo {
    let material = match lookup_material(wld, list_ref, index) {
        Ok(material) => material,
        Err(e) => {
            if e != LookupError::Null {
                tracing::debug!("material {index} of list {list_ref}: {e}");
            }
            return MaterialInfo::default();
        }
    };

    let mut info = MaterialInfo { category: material.category, ..MaterialInfo::default() };
    match lookup_bitmap_info(wld, material.bitmap_info) {
        Ok(bitmap) => {
            let frames = frame_names(wld, bitmap);
            info.texture = frames.first().cloned().unwrap_or_default();
            if bitmap.is_animated() && frames.len() > 1 {
                info.animation = Some(TextureAnimation {
                    frames,
                    delay_ms: bitmap.delay_ms.unwrap_or(0),
                });
            }
        }
        Err(LookupError::Null) => {}
        Err(e) => tracing::debug!("texture of material {index} of list {list_ref}: {e}"),
    }
    info
}

fn lookup_material(wld: &Wld, list_ref: i32, index: usize) -> Result<&Material, LookupError> {
    let list = wld.get_ref::<MaterialList>(list_ref)?;
    let material_ref = *list.materials.get(index).ok_or(LookupError::OutOfRange {
        index,
        len: list.materials.len(),
    })?;
    wld.get_ref::<Material>(material_ref)
}

fn lookup_bitmap_info(wld: &Wld, bitmap_ref: i32) -> Result<&BitmapInfo, LookupError> {
    let info_ref = wld.get_ref::<BitmapInfoRef>(bitmap_ref)?;
    wld.get_ref::<BitmapInfo>(info_ref.bitmap_info)
}

/// Filenames of every frame that resolves; broken frames are skipped.
fn frame_names(wld: &Wld, bitmap: &BitmapInfo) -> Vec<String> {
    bitmap
        .frames
        .iter()
        .filter_map(|&frame| wld.get_ref::<BitmapName>(frame).ok())
        .map(|name| name.filename().to_owned())
        .filter(|name| !name.is_empty())
        .collect()
}

// ── Placements ────────────────────────────────────────────────────────────────

/// One placed object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Placement {
    pub actor:    String,
    pub position: Vec3,
    /// Degrees.
    pub rotation: Vec3,
    pub scale:    Vec3,
}

impl From<&ActorInstance> for Placement {
    fn from(instance: &ActorInstance) -> Self {
        Self {
            actor:    instance.actor_name.clone(),
            position: instance.position,
            rotation: instance.rotation,
            scale:    instance.scale,
        }
    }
}

/// Every 0x15 object placement, in file order.
pub fn placements(wld: &Wld) -> Vec<Placement> {
    wld.iter::<ActorInstance>().map(|(_, _, instance)| Placement::from(instance)).collect()
}
