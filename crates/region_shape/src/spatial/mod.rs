//! Spatial indexing for sparse children
//!
//! Defines the [`IndexedShapeCollector`] capability a region shape pulls its
//! children from, plus an octree-backed implementation of it.

mod indexed_shape;
mod octree;
mod octree_collector;

pub use indexed_shape::{
    pack_grid_index, unpack_grid_index, CollectorError, IndexedShape, IndexedShapeCollector,
    IndexedShapes, GRID_AXIS_BITS, GRID_AXIS_CELLS,
};
pub use octree::{Octree, OctreeConfig, OctreeEntry, OctreeNode};
pub use octree_collector::{OctreeShapeCollector, OctreeShapeCollectorBuilder};
