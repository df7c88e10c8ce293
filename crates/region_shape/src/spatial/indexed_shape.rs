//! Children supplied on demand
//!
//! An [`IndexedShape`] is one child of a sparse compound: a shape handle, the
//! opaque index the compound writes into sub-shape paths, and the child's
//! center of mass in the compound's local frame. Children never carry a
//! rotation of their own.

use std::sync::Arc;

use crate::foundation::math::{translation, Isometry, Quat, Vec3};
use crate::physics::collision::{Aabb, RayCast, Shape};

/// Bits per axis when an index is packed as grid coordinates
pub const GRID_AXIS_BITS: u32 = 9;

/// Cells per axis of the packed grid
pub const GRID_AXIS_CELLS: u32 = 1 << GRID_AXIS_BITS;

const GRID_AXIS_MASK: u32 = GRID_AXIS_CELLS - 1;

/// Pack grid coordinates into an index (x in bits 0..9, y in 9..18, z in 18..27)
pub fn pack_grid_index(x: u32, y: u32, z: u32) -> Result<u32, CollectorError> {
    if x >= GRID_AXIS_CELLS || y >= GRID_AXIS_CELLS || z >= GRID_AXIS_CELLS {
        return Err(CollectorError::GridCoordinateOutOfRange { x, y, z });
    }
    Ok(x | (y << GRID_AXIS_BITS) | (z << (2 * GRID_AXIS_BITS)))
}

/// Unpack an index produced by [`pack_grid_index`]
pub const fn unpack_grid_index(index: u32) -> (u32, u32, u32) {
    (
        index & GRID_AXIS_MASK,
        (index >> GRID_AXIS_BITS) & GRID_AXIS_MASK,
        (index >> (2 * GRID_AXIS_BITS)) & GRID_AXIS_MASK,
    )
}

/// One child of a sparse compound
#[derive(Debug, Clone)]
pub struct IndexedShape {
    shape: Option<Arc<dyn Shape>>,
    index: u32,
    position_com: [f32; 3],
}

impl IndexedShape {
    /// Child at an explicit local center-of-mass position
    pub fn new(shape: Option<Arc<dyn Shape>>, index: u32, position_com: Vec3) -> Self {
        Self {
            shape,
            index,
            position_com: position_com.into(),
        }
    }

    /// Child placed at the center of its packed grid cell
    ///
    /// The grid's origin sits at `-half_extent`, so cell `(x, y, z)` is
    /// centered on `(x, y, z) + 0.5 - half_extent`.
    pub fn from_grid_index(shape: Option<Arc<dyn Shape>>, index: u32, half_extent: Vec3) -> Self {
        let (x, y, z) = unpack_grid_index(index);
        #[allow(clippy::cast_precision_loss)]
        let cell = Vec3::new(x as f32, y as f32, z as f32);
        Self::new(shape, index, cell + Vec3::repeat(0.5) - half_extent)
    }

    /// Sentinel returned for indices that do not resolve
    pub const fn null() -> Self {
        Self {
            shape: None,
            index: 0,
            position_com: [0.0; 3],
        }
    }

    /// The child shape, `None` for the sentinel
    pub fn shape(&self) -> Option<&Arc<dyn Shape>> {
        self.shape.as_ref()
    }

    /// True for the sentinel
    pub const fn is_null(&self) -> bool {
        self.shape.is_none()
    }

    /// Opaque index written into sub-shape paths
    pub const fn index(&self) -> u32 {
        self.index
    }

    /// Center of mass in the compound's local frame
    pub fn position_com(&self) -> Vec3 {
        Vec3::from(self.position_com)
    }

    /// Children are never rotated
    pub fn rotation(&self) -> Quat {
        Quat::identity()
    }

    /// Child placement given the compound's scale
    ///
    /// The full child transform is this translation followed by `scale`.
    pub fn local_transform_no_scale(&self, scale: Vec3) -> Isometry {
        translation(scale.component_mul(&self.position_com()))
    }

    /// Child bounds in the compound's local frame
    pub fn local_bounds(&self) -> Option<Aabb> {
        self.shape
            .as_ref()
            .map(|shape| shape.local_bounds().translated(self.position_com()))
    }

    /// Ray moved into the child's frame
    pub fn ray_to_local(&self, ray: &RayCast) -> RayCast {
        RayCast::new(ray.origin - self.position_com(), ray.direction)
    }
}

impl Default for IndexedShape {
    fn default() -> Self {
        Self::null()
    }
}

/// Children returned by a collector call
pub type IndexedShapes = Vec<IndexedShape>;

/// Supplies the children of a sparse compound on demand
///
/// All boxes and rays are in the compound's local, unscaled frame. Calls
/// are synchronous and may come from any number of threads at once.
pub trait IndexedShapeCollector: Send + Sync {
    /// Every child overlapping `bounds`
    ///
    /// Must not miss a child; extra children are filtered by the caller.
    fn collect_at(&self, bounds: &Aabb) -> IndexedShapes;

    /// Best single candidate for a first-hit ray cast
    fn cast_ray(&self, ray: &RayCast) -> Option<IndexedShape>;

    /// Every child the ray segment may touch
    fn collect_cast_ray(&self, ray: &RayCast) -> IndexedShapes;

    /// Child with `index`, or the null sentinel
    fn shape_at(&self, index: u32) -> IndexedShape;
}

/// Errors raised while building collectors and indices
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectorError {
    /// A packed grid coordinate does not fit in its bits
    #[error("grid coordinate ({x}, {y}, {z}) exceeds {max} cells per axis", max = GRID_AXIS_CELLS)]
    GridCoordinateOutOfRange {
        /// X cell
        x: u32,
        /// Y cell
        y: u32,
        /// Z cell
        z: u32,
    },

    /// Two children share an index
    #[error("duplicate child index {0}")]
    DuplicateIndex(u32),

    /// A child was added without a shape
    #[error("child {0} has no shape")]
    NullShape(u32),

    /// A child lies outside the collector's bounds
    #[error("child {0} lies outside the collector bounds")]
    OutOfBounds(u32),
}
