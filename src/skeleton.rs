//! Rest-pose evaluation for 0x10 skeleton hierarchies.
//!
//! World transforms are composed down the parent chain from frame 0 of each
//! bone's track:
//!
//! ```text
//! world(i) = world(parent(i)) · local(i)
//! local(i) = TrackRef → TrackDef → frames[0]
//! ```

use glam::Mat4;
use serde::Serialize;

use crate::wld::mesh::{Mesh, MeshRef};
use crate::wld::skeleton::{Bone, SkeletonHierarchy, TrackDef, TrackRef};
use crate::wld::{LookupError, Wld};

const HIERARCHY_SUFFIX: &str = "_HS_DEF";
const BONE_SUFFIX: &str = "_DAG";

/// Bone naming scheme, inferred from suffix lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BoneNaming {
    /// Short suffixes such as `pe`, `ch`, `ne`.
    Legacy,
    /// Descriptive suffixes such as `chest` or `head_point`.
    LongSuffix,
}

/// A skeleton bound to the file it came from.
#[derive(Debug, Clone, Copy)]
pub struct Skeleton<'a> {
    wld:       &'a Wld,
    index:     usize,
    name:      &'a str,
    hierarchy: &'a SkeletonHierarchy,
}

impl<'a> Skeleton<'a> {
    /// Bind the 0x10 fragment at 1-based `index`.
    pub fn new(wld: &'a Wld, index: usize) -> Result<Self, LookupError> {
        let hierarchy = wld.get::<SkeletonHierarchy>(index)?;
        let name = wld.fragment(index)?.name.as_str();
        Ok(Self { wld, index, name, hierarchy })
    }

    /// Every skeleton in the file, in file order.
    pub fn all(wld: &'a Wld) -> Vec<Self> {
        wld.iter::<SkeletonHierarchy>()
            .map(|(index, fragment, hierarchy)| Self {
                wld,
                index,
                name: fragment.name.as_str(),
                hierarchy,
            })
            .collect()
    }

    pub fn index(&self) -> usize { self.index }

    pub fn name(&self) -> &'a str { self.name }

    pub fn bones(&self) -> &'a [Bone] { &self.hierarchy.bones }

    pub fn hierarchy(&self) -> &'a SkeletonHierarchy { self.hierarchy }

    /// Frame-0 local transform of one bone.  Any missing link in the
    /// TrackRef → TrackDef chain yields identity.
    pub fn local_transform(&self, bone: usize) -> Mat4 {
        let Some(bone) = self.hierarchy.bones.get(bone) else {
            return Mat4::IDENTITY;
        };
        match self.rest_frame(bone.track) {
            Ok(Some(matrix)) => matrix,
            Ok(None) => Mat4::IDENTITY,
            Err(LookupError::Null) => Mat4::IDENTITY,
            Err(e) => {
                tracing::debug!("bone {:?} has no usable track: {e}", bone.name);
                Mat4::IDENTITY
            }
        }
    }

    fn rest_frame(&self, track_ref: i32) -> Result<Option<Mat4>, LookupError> {
        let track_ref = self.wld.get_ref::<TrackRef>(track_ref)?;
        let track = self.wld.get_ref::<TrackDef>(track_ref.track)?;
        Ok(track.rest().map(|frame| frame.to_mat4()))
    }

    /// World-space rest transform of every bone, in bone order.
    pub fn rest_pose(&self) -> Vec<Mat4> {
        let bones = &self.hierarchy.bones;
        let locals: Vec<Mat4> = (0..bones.len()).map(|i| self.local_transform(i)).collect();
        let mut world: Vec<Option<Mat4>> = vec![None; bones.len()];
        let mut on_chain = vec![false; bones.len()];

        for start in 0..bones.len() {
            if world[start].is_some() {
                continue;
            }
            // Walk up to the nearest resolved ancestor (or a root), then
            // resolve the collected chain top-down.
            let mut chain = vec![start];
            on_chain[start] = true;
            let mut base = Mat4::IDENTITY;
            let mut cursor = start;
            loop {
                let parent = bones[cursor].parent;
                let Ok(parent) = usize::try_from(parent) else { break };
                if parent >= bones.len() {
                    break;
                }
                if let Some(resolved) = world[parent] {
                    base = resolved;
                    break;
                }
                if on_chain[parent] {
                    tracing::warn!(
                        "skeleton {:?}: bone {cursor} closes a parent cycle; treating it as a root",
                        self.name
                    );
                    break;
                }
                on_chain[parent] = true;
                chain.push(parent);
                cursor = parent;
            }

            for &bone in chain.iter().rev() {
                base *= locals[bone];
                world[bone] = Some(base);
                on_chain[bone] = false;
            }
        }

        world.into_iter().map(|m| m.unwrap_or(Mat4::IDENTITY)).collect()
    }

    /// Model prefix used by this skeleton's bone names: the hierarchy name
    /// before `_HS_DEF`, else its first three characters.
    pub fn model_prefix(&self) -> &'a str {
        match self.name.find(HIERARCHY_SUFFIX) {
            Some(end) => &self.name[..end],
            None => self.name.get(..3).unwrap_or(self.name),
        }
    }

    pub fn naming_convention(&self) -> BoneNaming {
        classify_bone_names(self.model_prefix(), self.hierarchy.bones.iter().map(|b| b.name.as_str()))
    }

    /// Meshes skinned to this skeleton: the explicit mesh list when present,
    /// else the per-bone mesh references.  Broken references are skipped.
    pub fn meshes(&self) -> Vec<(usize, &'a Mesh)> {
        let refs: Vec<i32> = if self.hierarchy.meshes.is_empty() {
            self.hierarchy.bones.iter().map(|b| b.mesh).filter(|&m| m != 0).collect()
        } else {
            self.hierarchy.meshes.clone()
        };

        let mut meshes = Vec::new();
        for reference in refs {
            let resolved = self
                .wld
                .get_ref::<MeshRef>(reference)
                .and_then(|mesh_ref| self.wld.resolve(mesh_ref.mesh))
                .and_then(|index| Ok((index, self.wld.get::<Mesh>(index)?)));
            match resolved {
                Ok(mesh) => {
                    if !meshes.iter().any(|(i, _)| *i == mesh.0) {
                        meshes.push(mesh);
                    }
                }
                Err(e) => tracing::debug!("skeleton {:?}: skipping mesh reference {reference}: {e}", self.name),
            }
        }
        meshes
    }
}

/// Decide the naming scheme from bone names: strip `prefix` and the `_DAG`
/// suffix, then count the remaining stems longer than four characters.
pub fn classify_bone_names<'n>(prefix: &str, names: impl IntoIterator<Item = &'n str>) -> BoneNaming {
    let prefix = prefix.to_ascii_uppercase();
    let mut total = 0usize;
    let mut long = 0usize;
    for name in names {
        let upper = name.to_ascii_uppercase();
        let stem = upper.strip_suffix(BONE_SUFFIX).unwrap_or(&upper);
        let stem = stem.strip_prefix(prefix.as_str()).unwrap_or(stem);
        if stem.is_empty() {
            continue;
        }
        total += 1;
        if stem.len() > 4 {
            long += 1;
        }
    }
    if long * 2 > total { BoneNaming::LongSuffix } else { BoneNaming::Legacy }
}
