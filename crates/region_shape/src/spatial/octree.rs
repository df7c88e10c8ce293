//! Octree spatial partitioning structure
//!
//! Efficiently divides 3D space into hierarchical regions for fast
//! spatial queries. Each node subdivides into 8 octants when entry
//! density exceeds a threshold. Entries are bounding spheres keyed by a
//! `u32` index; an entry lives in the node containing its center, so
//! queries expand node bounds by the largest entry radius.

use serde::{Deserialize, Serialize};

use crate::foundation::math::Vec3;
use crate::physics::collision::{Aabb, RayCast};

/// Configuration for octree behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OctreeConfig {
    /// Maximum entries per node before subdivision
    pub max_entries_per_node: usize,

    /// Maximum subdivision depth
    pub max_depth: u32,

    /// Minimum node size (prevents excessive subdivision)
    pub min_node_size: f32,
}

impl Default for OctreeConfig {
    fn default() -> Self {
        Self {
            max_entries_per_node: 8,
            max_depth: 8,
            min_node_size: 1.0,
        }
    }
}

/// Entry stored in octree with position and radius
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OctreeEntry {
    /// Caller-defined key
    pub index: u32,
    /// Center of the bounding sphere
    pub position: Vec3,
    /// Radius of the bounding sphere
    pub radius: f32,
}

/// Single node in the octree hierarchy
#[derive(Debug, Clone)]
pub struct OctreeNode {
    /// Bounds of this node
    pub bounds: Aabb,

    /// Entries contained in this node (if leaf)
    pub entries: Vec<OctreeEntry>,

    /// Child nodes (8 octants), None if this is a leaf
    pub children: Option<Box<[OctreeNode; 8]>>,

    /// Depth in the tree (0 = root)
    pub depth: u32,
}

impl OctreeNode {
    /// Create a new leaf node
    pub fn new(bounds: Aabb, depth: u32) -> Self {
        Self {
            bounds,
            entries: Vec::new(),
            children: None,
            depth,
        }
    }

    /// Check if this node is a leaf (has no children)
    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    /// Get the octant index (0-7) for a position within this node's bounds
    ///
    /// Bit 0 is set for +X, bit 1 for +Y, bit 2 for +Z.
    fn octant_index(&self, position: Vec3) -> usize {
        let center = self.bounds.center();
        let x_bit = usize::from(position.x >= center.x);
        let y_bit = usize::from(position.y >= center.y);
        let z_bit = usize::from(position.z >= center.z);
        (z_bit << 2) | (y_bit << 1) | x_bit
    }

    /// Subdivide this node into 8 children
    fn subdivide(&mut self) {
        if self.children.is_some() {
            return;
        }

        let center = self.bounds.center();
        let quarter_extents = self.bounds.extents() * 0.5;
        let depth = self.depth + 1;

        let children: [OctreeNode; 8] = std::array::from_fn(|octant| {
            let sign = |bit: usize| if octant & bit != 0 { 1.0 } else { -1.0 };
            let child_center = center + quarter_extents.component_mul(&Vec3::new(sign(1), sign(2), sign(4)));
            OctreeNode::new(Aabb::from_center_extents(child_center, quarter_extents), depth)
        });
        self.children = Some(Box::new(children));

        // Redistribute existing entries to children
        let entries = std::mem::take(&mut self.entries);
        for entry in entries {
            let octant = self.octant_index(entry.position);
            if let Some(children) = self.children.as_mut() {
                children[octant].entries.push(entry);
            }
        }
    }

    /// Insert an entry into this node
    pub fn insert(&mut self, entry: OctreeEntry, config: &OctreeConfig) -> bool {
        if !self.bounds.contains_point(entry.position) {
            return false;
        }

        if self.is_leaf() {
            let should_subdivide = self.entries.len() >= config.max_entries_per_node
                && self.depth < config.max_depth
                && self.bounds.extents().x > config.min_node_size;

            if !should_subdivide {
                self.entries.push(entry);
                return true;
            }
            self.subdivide();
        }

        let octant = self.octant_index(entry.position);
        self.children
            .as_mut()
            .is_some_and(|children| children[octant].insert(entry, config))
    }

    /// Query all entries whose sphere overlaps `bounds`
    pub fn query_aabb(&self, bounds: &Aabb, max_entry_radius: f32, results: &mut Vec<OctreeEntry>) {
        if !self.bounds.expanded_by(Vec3::repeat(max_entry_radius)).overlaps(bounds) {
            return;
        }

        for entry in &self.entries {
            let closest_point = bounds.closest_point(entry.position);
            if (closest_point - entry.position).magnitude_squared() <= entry.radius * entry.radius {
                results.push(*entry);
            }
        }

        if let Some(ref children) = self.children {
            for child in children.iter() {
                child.query_aabb(bounds, max_entry_radius, results);
            }
        }
    }

    /// Query all entries in nodes the ray segment passes through
    ///
    /// Node bounds are expanded by `max_entry_radius` so entries stored in a
    /// neighboring node that extend into this node's space are still found.
    pub fn query_ray(&self, ray: &RayCast, max_entry_radius: f32, results: &mut Vec<OctreeEntry>) {
        let expanded_bounds = self.bounds.expanded_by(Vec3::repeat(max_entry_radius));
        if expanded_bounds.ray_fraction(ray).is_none() {
            return;
        }

        results.extend_from_slice(&self.entries);

        if let Some(ref children) = self.children {
            for child in children.iter() {
                child.query_ray(ray, max_entry_radius, results);
            }
        }
    }

    /// Get all leaf nodes
    pub fn leaves<'a>(&'a self, leaves: &mut Vec<&'a OctreeNode>) {
        if self.is_leaf() {
            leaves.push(self);
        } else if let Some(ref children) = self.children {
            for child in children.iter() {
                child.leaves(leaves);
            }
        }
    }

    /// Count total entries in this node and all children
    pub fn count_entries(&self) -> usize {
        let below: usize = self
            .children
            .as_ref()
            .map_or(0, |children| children.iter().map(OctreeNode::count_entries).sum());
        self.entries.len() + below
    }
}

/// Octree spatial partitioning structure
#[derive(Debug, Clone)]
pub struct Octree {
    /// Root node containing the entire indexed space
    pub root: OctreeNode,

    /// Configuration
    config: OctreeConfig,

    /// Cached maximum entry radius in the tree (grows on insert)
    max_entry_radius: f32,
}

impl Octree {
    /// Create a new octree with given bounds
    pub fn new(bounds: Aabb, config: OctreeConfig) -> Self {
        Self {
            root: OctreeNode::new(bounds, 0),
            config,
            max_entry_radius: 0.0,
        }
    }

    /// Bounds of the root node
    pub fn bounds(&self) -> Aabb {
        self.root.bounds
    }

    /// Largest entry radius inserted so far
    pub fn max_entry_radius(&self) -> f32 {
        self.max_entry_radius
    }

    /// Insert an entry; false when its center lies outside the octree
    pub fn insert(&mut self, index: u32, position: Vec3, radius: f32) -> bool {
        let inserted = self.root.insert(OctreeEntry { index, position, radius }, &self.config);
        if inserted {
            self.max_entry_radius = self.max_entry_radius.max(radius);
        }
        inserted
    }

    /// Query all entries whose sphere overlaps `bounds`
    pub fn query_aabb(&self, bounds: &Aabb) -> Vec<OctreeEntry> {
        let mut results = Vec::new();
        self.root.query_aabb(bounds, self.max_entry_radius, &mut results);
        results
    }

    /// Query all entries that potentially intersect a ray segment
    ///
    /// Returns entries in octree nodes the segment passes through. For
    /// actual intersection testing each entry still needs its own test.
    pub fn query_ray(&self, ray: &RayCast) -> Vec<OctreeEntry> {
        let mut results = Vec::new();
        self.root.query_ray(ray, self.max_entry_radius, &mut results);
        results
    }

    /// Get all leaf nodes
    pub fn leaves(&self) -> Vec<&OctreeNode> {
        let mut leaves = Vec::new();
        self.root.leaves(&mut leaves);
        leaves
    }

    /// Get total entry count
    pub fn len(&self) -> usize {
        self.root.count_entries()
    }

    /// True when nothing was inserted
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
