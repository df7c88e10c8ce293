//! Octree-backed [`IndexedShapeCollector`]
//!
//! Children are indexed by the bounding sphere of their local bounds. The
//! collector is immutable once built, so any number of threads can query it.

use std::collections::HashMap;

use crate::physics::collision::{Aabb, RayCast, RayCastResult, SubShapeIdCreator};

use super::indexed_shape::{CollectorError, IndexedShape, IndexedShapeCollector, IndexedShapes};
use super::octree::{Octree, OctreeConfig};

/// Builds an [`OctreeShapeCollector`]
#[derive(Debug, Clone)]
pub struct OctreeShapeCollectorBuilder {
    bounds: Aabb,
    config: OctreeConfig,
    shapes: Vec<IndexedShape>,
}

impl OctreeShapeCollectorBuilder {
    /// Builder for children inside `bounds` (compound-local frame)
    pub fn new(bounds: Aabb, config: OctreeConfig) -> Self {
        Self {
            bounds,
            config,
            shapes: Vec::new(),
        }
    }

    /// Add a child
    #[must_use]
    pub fn with_shape(mut self, shape: IndexedShape) -> Self {
        self.shapes.push(shape);
        self
    }

    /// Add a child in place
    pub fn add_shape(&mut self, shape: IndexedShape) -> &mut Self {
        self.shapes.push(shape);
        self
    }

    /// Validate the children and build the index
    pub fn build(self) -> Result<OctreeShapeCollector, CollectorError> {
        let mut octree = Octree::new(self.bounds, self.config);
        let mut shapes = HashMap::with_capacity(self.shapes.len());

        for shape in self.shapes {
            let index = shape.index();
            let bounds = shape.local_bounds().ok_or(CollectorError::NullShape(index))?;
            if shapes.contains_key(&index) {
                return Err(CollectorError::DuplicateIndex(index));
            }
            if !octree.insert(index, bounds.center(), bounds.extents().norm()) {
                return Err(CollectorError::OutOfBounds(index));
            }
            shapes.insert(index, shape);
        }

        log::debug!(
            "Built octree shape collector: {} children, {} leaves, max radius {:.3}",
            shapes.len(),
            octree.leaves().len(),
            octree.max_entry_radius()
        );
        Ok(OctreeShapeCollector { octree, shapes })
    }
}

/// Immutable collector answering queries from an octree
#[derive(Debug, Clone)]
pub struct OctreeShapeCollector {
    octree: Octree,
    shapes: HashMap<u32, IndexedShape>,
}

impl OctreeShapeCollector {
    /// Number of children
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// True when the collector holds no children
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Bounds covered by the index
    pub fn bounds(&self) -> Aabb {
        self.octree.bounds()
    }

    fn resolve<I>(&self, indices: I) -> impl Iterator<Item = &IndexedShape>
    where
        I: IntoIterator<Item = u32>,
    {
        indices.into_iter().filter_map(|index| self.shapes.get(&index))
    }
}

impl IndexedShapeCollector for OctreeShapeCollector {
    fn collect_at(&self, bounds: &Aabb) -> IndexedShapes {
        let candidates = self.octree.query_aabb(bounds).into_iter().map(|e| e.index);
        self.resolve(candidates)
            .filter(|child| child.local_bounds().is_some_and(|b| b.overlaps(bounds)))
            .cloned()
            .collect()
    }

    fn cast_ray(&self, ray: &RayCast) -> Option<IndexedShape> {
        let mut best: Option<(f32, &IndexedShape)> = None;
        let candidates = self.octree.query_ray(ray).into_iter().map(|e| e.index);
        for child in self.resolve(candidates) {
            let Some(shape) = child.shape() else {
                continue;
            };
            let mut hit = RayCastResult::default();
            if shape.cast_ray(&child.ray_to_local(ray), &SubShapeIdCreator::new(), &mut hit)
                && best.map_or(true, |(fraction, _)| hit.fraction < fraction)
            {
                best = Some((hit.fraction, child));
            }
        }
        best.map(|(_, child)| child.clone())
    }

    fn collect_cast_ray(&self, ray: &RayCast) -> IndexedShapes {
        let candidates = self.octree.query_ray(ray).into_iter().map(|e| e.index);
        self.resolve(candidates)
            .filter(|child| child.local_bounds().is_some_and(|b| b.ray_fraction(ray).is_some()))
            .cloned()
            .collect()
    }

    fn shape_at(&self, index: u32) -> IndexedShape {
        self.shapes.get(&index).cloned().unwrap_or_else(IndexedShape::null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::physics::collision::{BoxShapeSettings, Shape, ShapeSettings, SphereShapeSettings};
    use std::sync::Arc;

    fn bounds() -> Aabb {
        Aabb::from_center_extents(Vec3::zeros(), Vec3::repeat(16.0))
    }

    fn cube() -> Arc<dyn Shape> {
        BoxShapeSettings::new(Vec3::repeat(0.5)).create().unwrap()
    }

    fn collector() -> OctreeShapeCollector {
        OctreeShapeCollectorBuilder::new(bounds(), OctreeConfig::default())
            .with_shape(IndexedShape::new(Some(cube()), 1, Vec3::new(0.0, 0.0, 0.0)))
            .with_shape(IndexedShape::new(Some(cube()), 2, Vec3::new(0.0, 0.0, 4.0)))
            .with_shape(IndexedShape::new(Some(cube()), 3, Vec3::new(8.0, 8.0, 8.0)))
            .build()
            .unwrap()
    }

    fn sorted(shapes: &[IndexedShape]) -> Vec<u32> {
        let mut indices: Vec<u32> = shapes.iter().map(IndexedShape::index).collect();
        indices.sort_unstable();
        indices
    }

    #[test]
    fn test_build_validation() {
        crate::foundation::logging::init_for_tests();
        let duplicate = OctreeShapeCollectorBuilder::new(bounds(), OctreeConfig::default())
            .with_shape(IndexedShape::new(Some(cube()), 1, Vec3::zeros()))
            .with_shape(IndexedShape::new(Some(cube()), 1, Vec3::new(2.0, 0.0, 0.0)))
            .build();
        assert_eq!(duplicate.unwrap_err(), CollectorError::DuplicateIndex(1));

        let null = OctreeShapeCollectorBuilder::new(bounds(), OctreeConfig::default())
            .with_shape(IndexedShape::new(None, 9, Vec3::zeros()))
            .build();
        assert_eq!(null.unwrap_err(), CollectorError::NullShape(9));

        let outside = OctreeShapeCollectorBuilder::new(bounds(), OctreeConfig::default())
            .with_shape(IndexedShape::new(Some(cube()), 4, Vec3::new(40.0, 0.0, 0.0)))
            .build();
        assert_eq!(outside.unwrap_err(), CollectorError::OutOfBounds(4));
    }

    #[test]
    fn test_collect_at_returns_overlapping_children() {
        let collector = collector();
        assert_eq!(collector.len(), 3);

        let near_origin = Aabb::from_center_extents(Vec3::new(0.0, 0.0, 2.0), Vec3::repeat(2.0));
        assert_eq!(sorted(&collector.collect_at(&near_origin)), vec![1, 2]);

        let empty_space = Aabb::from_center_extents(Vec3::new(-8.0, -8.0, -8.0), Vec3::repeat(1.0));
        assert!(collector.collect_at(&empty_space).is_empty());
    }

    #[test]
    fn test_ray_queries() {
        let collector = collector();
        let ray = RayCast::new(Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, -20.0));

        assert_eq!(sorted(&collector.collect_cast_ray(&ray)), vec![1, 2]);
        // Nearest child along the ray
        assert_eq!(collector.cast_ray(&ray).map(|c| c.index()), Some(2));

        let short = RayCast::new(Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, -2.0));
        assert!(collector.collect_cast_ray(&short).is_empty());
        assert!(collector.cast_ray(&short).is_none());
    }

    #[test]
    fn test_cast_ray_requires_real_hit() {
        // The sphere's box touches the ray but the sphere itself does not
        let ball: Arc<dyn Shape> = SphereShapeSettings::new(1.0).create().unwrap();
        let collector = OctreeShapeCollectorBuilder::new(bounds(), OctreeConfig::default())
            .with_shape(IndexedShape::new(Some(ball), 5, Vec3::zeros()))
            .build()
            .unwrap();
        let corner_ray = RayCast::new(Vec3::new(0.95, 0.95, 10.0), Vec3::new(0.0, 0.0, -20.0));

        assert_eq!(collector.collect_cast_ray(&corner_ray).len(), 1);
        assert!(collector.cast_ray(&corner_ray).is_none());
    }

    #[test]
    fn test_shape_at() {
        let collector = collector();
        assert_eq!(collector.shape_at(3).index(), 3);
        assert!(collector.shape_at(42).is_null());
    }
}
