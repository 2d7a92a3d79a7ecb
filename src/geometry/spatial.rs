//! Point classification against the zone's BSP tree.
//!
//! Leaf regions are tagged by the 0x29 region-type fragments that list them.
//! A point is classified by walking the 0x21 node array from the root:
//! `dot(normal, p) >= distance` goes left, anything else goes right, and the
//! walk ends at the first node carrying a region id.

use glam::Vec3;
use serde::Serialize;
use std::collections::HashMap;

use crate::wld::bsp::{BspNode, BspRegionType, BspTree, Sphere};
use crate::wld::{FragmentBody, FragmentKind, Wld};

pub const DEFAULT_MAX_DEPTH: usize = 1024;

// ── Region tags ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RegionTag {
    Water,
    Lava,
    ZoneLine,
    Pvp,
    Slippery,
    Ice,
    GenericWater,
    Unknown,
}

/// Checked in order; `DRNTP` must come before `DRN`.
const PREFIXES: &[(&str, RegionTag)] = &[
    ("WTN_", RegionTag::Water),
    ("WT_", RegionTag::Water),
    ("LAN_", RegionTag::Lava),
    ("LA_", RegionTag::Lava),
    ("DRNTP", RegionTag::ZoneLine),
    ("DRP_", RegionTag::Pvp),
    ("SLN_", RegionTag::Slippery),
    ("DRN", RegionTag::Ice),
    ("VWN_", RegionTag::GenericWater),
];

impl RegionTag {
    /// Tag for a classification string, case-insensitive.
    pub fn from_classification(classification: &str) -> Self {
        let upper = classification.to_ascii_uppercase();
        PREFIXES
            .iter()
            .find(|(prefix, _)| upper.starts_with(prefix))
            .map(|&(_, tag)| tag)
            .unwrap_or(RegionTag::Unknown)
    }
}

/// Destination parameters carried by a zone-line classification string.
/// The values are passed through uninterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneLine {
    pub param1: u32,
    pub param2: u32,
}

impl ZoneLine {
    /// Characters `[5, 10)` and `[10, 16)` as decimal; anything that does not
    /// parse reads as 0.
    pub fn parse(classification: &str) -> Self {
        let field = |range: std::ops::Range<usize>| {
            classification.get(range).and_then(|s| s.parse::<u32>().ok()).unwrap_or(0)
        };
        Self { param1: field(5..10), param2: field(10..16) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegionInfo {
    pub tag:            RegionTag,
    pub classification: String,
    pub zone_line:      Option<ZoneLine>,
}

impl RegionInfo {
    pub fn from_classification(classification: &str) -> Self {
        let tag = RegionTag::from_classification(classification);
        Self {
            tag,
            classification: classification.to_owned(),
            zone_line: (tag == RegionTag::ZoneLine).then(|| ZoneLine::parse(classification)),
        }
    }
}

// ── Classifier ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassifierOptions {
    /// Upper bound on nodes visited per query.
    pub max_depth: usize,
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH }
    }
}

/// Read-only point classifier; safe to share between threads.
#[derive(Debug, Clone, Default)]
pub struct SpatialClassifier {
    nodes:   Vec<BspNode>,
    /// 1-based region id → info.
    regions: HashMap<u32, RegionInfo>,
    /// 1-based region id → bounding sphere, for regions that have one.
    spheres: HashMap<u32, Sphere>,
    options: ClassifierOptions,
}

impl SpatialClassifier {
    pub fn build(wld: &Wld) -> Self {
        Self::with_options(wld, ClassifierOptions::default())
    }

    pub fn with_options(wld: &Wld, options: ClassifierOptions) -> Self {
        let nodes = match wld.iter::<BspTree>().next() {
            Some((_, _, tree)) => tree.nodes.clone(),
            None => {
                tracing::debug!("no BSP tree; point classification disabled");
                Vec::new()
            }
        };

        // Region ids count every 0x22 on disk, including ones that failed to
        // decode, so later ids stay aligned with the 0x29 indices.
        let spheres = wld
            .fragments()
            .iter()
            .filter_map(|f| match &f.body {
                FragmentBody::BspRegion(region) => Some(region.sphere),
                FragmentBody::Unknown { type_tag, .. }
                    if FragmentKind::from_tag(*type_tag) == FragmentKind::BspRegion => Some(None),
                _ => None,
            })
            .zip(1u32..)
            .filter_map(|(sphere, id)| sphere.map(|s| (id, s)))
            .collect();

        let mut regions = HashMap::new();
        for (_, _, region_type) in wld.iter::<BspRegionType>() {
            let info = RegionInfo::from_classification(&region_type.classification);
            for &index in &region_type.regions {
                let Some(id) = index.checked_add(1) else {
                    tracing::warn!("region index {index} out of range; ignoring {:?}", info.classification);
                    continue;
                };
                if regions.contains_key(&id) {
                    tracing::debug!("region {id} already tagged; ignoring {:?}", info.classification);
                    continue;
                }
                regions.insert(id, info.clone());
            }
        }

        tracing::debug!("classifier: {} nodes, {} tagged regions", nodes.len(), regions.len());
        Self { nodes, regions, spheres, options }
    }

    pub fn options(&self) -> ClassifierOptions { self.options }

    pub fn region(&self, id: u32) -> Option<&RegionInfo> {
        self.regions.get(&id)
    }

    /// Leaf region id containing `point`.  `None` when the tree is empty, a
    /// child link is 0 or out of range, or the walk exceeds `max_depth`.
    pub fn leaf_at(&self, point: Vec3) -> Option<u32> {
        let mut index = 0usize;
        for _ in 0..self.options.max_depth {
            let node = self.nodes.get(index)?;
            if node.is_leaf() {
                return Some(node.region);
            }
            let child = if node.normal.dot(point) >= node.distance { node.left } else { node.right };
            if child == 0 {
                return None;
            }
            index = child as usize - 1;
        }
        tracing::warn!("BSP walk for {point} exceeded {} nodes", self.options.max_depth);
        None
    }

    pub fn classify(&self, point: Vec3) -> Option<&RegionInfo> {
        self.leaf_at(point).and_then(|id| self.regions.get(&id))
    }

    /// Zone-line regions that carry a bounding sphere, by region id.
    pub fn zone_line_spheres(&self) -> Vec<(u32, Sphere, &RegionInfo)> {
        let mut spheres: Vec<_> = self
            .regions
            .iter()
            .filter(|(_, info)| info.tag == RegionTag::ZoneLine)
            .filter_map(|(&id, info)| self.spheres.get(&id).map(|&s| (id, s, info)))
            .collect();
        spheres.sort_by_key(|(id, _, _)| *id);
        spheres
    }

    /// Sphere-containment fallback for when the BSP walk is unusable.
    pub fn zone_line_at_sphere(&self, point: Vec3) -> Option<&RegionInfo> {
        self.zone_line_spheres()
            .into_iter()
            .find(|(_, sphere, _)| sphere.contains(point))
            .map(|(_, _, info)| info)
    }
}
