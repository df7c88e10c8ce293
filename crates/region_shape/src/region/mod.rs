//! Sparse compound shape
//!
//! A [`RegionShape`] covers the box `(-half_extent, +half_extent)` in its
//! local frame and never stores its children. Each query asks the shared
//! [`IndexedShapeCollector`] for the children touching the queried region
//! and recurses into them. Results name a child by pushing its opaque index
//! onto the sub-shape path as one [`SUB_SHAPE_INDEX_BITS`]-wide field.
//!
//! Everything that would need the full child set (volume, mass, statistics,
//! triangle enumeration) is deliberately degenerate.

mod registration;
mod visitors;
mod walk;

#[cfg(test)]
mod tests;

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::foundation::math::{reciprocal, Isometry, Quat, Vec3};
use crate::physics::collision::{
    Aabb, CollidePointResult, CollisionCollector, MassProperties, PhysicsMaterial, Plane, RayCast,
    RayCastResult, RayCastSettings, Shape, ShapeFilter, ShapeResult, ShapeSettings, ShapeStats,
    ShapeSubType, SoftBodyVertex, SubShapeId, SubShapeIdCreator, SubmergedVolume, TransformedShape,
    Triangle,
};
use crate::spatial::IndexedShapeCollector;

pub use walk::SubShapeVisitor;

use visitors::{CastRayCollectVisitor, CastRayVisitor, CollidePointVisitor};

/// Width of the path field a region shape pushes per level
pub const SUB_SHAPE_INDEX_BITS: u32 = 32;

/// Inner radius reported by every region shape
pub const DEFAULT_INNER_RADIUS: f32 = 0.5;

/// Builds a [`RegionShape`] once and hands out the same instance afterwards
pub struct RegionShapeSettings {
    collector: Arc<dyn IndexedShapeCollector>,
    half_extent: Vec3,
    cached: OnceLock<ShapeResult<RegionShape>>,
}

impl RegionShapeSettings {
    /// Settings for a region covering `(-half_extent, +half_extent)`
    pub fn new(collector: Arc<dyn IndexedShapeCollector>, half_extent: Vec3) -> Self {
        Self {
            collector,
            half_extent,
            cached: OnceLock::new(),
        }
    }

    /// Collector the shape will query
    pub fn collector(&self) -> &Arc<dyn IndexedShapeCollector> {
        &self.collector
    }

    /// Half extent of the region
    pub const fn half_extent(&self) -> Vec3 {
        self.half_extent
    }
}

impl ShapeSettings for RegionShapeSettings {
    type Shape = RegionShape;

    fn create(&self) -> ShapeResult<RegionShape> {
        self.cached
            .get_or_init(|| Ok(Arc::new(RegionShape::new(self.collector.clone(), self.half_extent))))
            .clone()
    }
}

impl fmt::Debug for RegionShapeSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionShapeSettings")
            .field("half_extent", &self.half_extent)
            .field("created", &self.cached.get().is_some())
            .finish_non_exhaustive()
    }
}

/// Compound shape whose children come from an [`IndexedShapeCollector`]
///
/// The local bounds must enclose every child the collector can report;
/// children outside them are invisible to spatial queries.
pub struct RegionShape {
    collector: Arc<dyn IndexedShapeCollector>,
    half_extent: Vec3,
}

impl RegionShape {
    /// Region covering `(-half_extent, +half_extent)`
    pub fn new(collector: Arc<dyn IndexedShapeCollector>, half_extent: Vec3) -> Self {
        log::debug!("Created region shape with half extent {:?}", half_extent.as_slice());
        Self {
            collector,
            half_extent,
        }
    }

    /// Collector this shape queries
    pub fn collector(&self) -> &Arc<dyn IndexedShapeCollector> {
        &self.collector
    }

    /// Half extent of the region
    pub const fn half_extent(&self) -> Vec3 {
        self.half_extent
    }

    /// Bits pushed onto the sub-shape path per level
    pub const fn sub_shape_id_bits(&self) -> u32 {
        SUB_SHAPE_INDEX_BITS
    }

    /// Pop the child index from the front of `sub_shape_id`
    ///
    /// Returns the index and the remaining path inside that child.
    pub fn sub_shape_index_from_id(&self, sub_shape_id: SubShapeId) -> (u32, SubShapeId) {
        sub_shape_id.pop_id(self.sub_shape_id_bits())
    }

    /// Path to child `index` below `parent`
    pub fn sub_shape_id_from_index(&self, index: u32, parent: &SubShapeIdCreator) -> SubShapeIdCreator {
        parent.push_id(index, self.sub_shape_id_bits())
    }

    /// Resolve the children overlapping `world_bounds` into world-space leaves
    ///
    /// This is the pass callers run before asking for triangles.
    pub fn collect_transformed_shapes(
        &self,
        world_bounds: &Aabb,
        center_of_mass_transform: &Isometry,
        scale: Vec3,
        creator: &SubShapeIdCreator,
        filter: &dyn ShapeFilter,
    ) -> Vec<TransformedShape> {
        let local = world_bounds
            .transformed(&center_of_mass_transform.inverse())
            .scaled(reciprocal(scale));
        let bounds = self.local_bounds();
        if !local.overlaps(&bounds) {
            return Vec::new();
        }

        self.collector
            .collect_at(&local.intersection(&bounds))
            .into_iter()
            .filter_map(|child| {
                let shape = child.shape()?.clone();
                let child_creator = self.sub_shape_id_from_index(child.index(), creator);
                filter
                    .should_collide(shape.as_ref(), child_creator.id())
                    .then(|| TransformedShape {
                        center_of_mass_transform: center_of_mass_transform
                            * child.local_transform_no_scale(scale),
                        shape,
                        scale,
                        sub_shape_id_creator: child_creator,
                    })
            })
            .collect()
    }

    /// First-hit ray cast over every child the region box lets through
    ///
    /// Unlike [`Shape::cast_ray`], which trusts the collector's single
    /// candidate, this walks all children overlapping the ray.
    pub fn cast_ray_walk(&self, ray: &RayCast, creator: &SubShapeIdCreator, hit: &mut RayCastResult) -> bool {
        let mut visitor = CastRayVisitor::new(self, ray, creator, hit);
        self.walk_sub_shapes(&mut visitor);
        visitor.return_value()
    }

    /// Multi-hit ray cast through the bounding-box traversal
    pub fn cast_ray_collect_walk(
        &self,
        ray: &RayCast,
        settings: &RayCastSettings,
        creator: &SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<RayCastResult>,
        filter: &dyn ShapeFilter,
    ) {
        let mut visitor = CastRayCollectVisitor::new(self, ray, settings, creator, collector, filter);
        self.walk_sub_shapes(&mut visitor);
    }
}

impl fmt::Debug for RegionShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegionShape")
            .field("half_extent", &self.half_extent)
            .finish_non_exhaustive()
    }
}

impl Shape for RegionShape {
    fn sub_type(&self) -> ShapeSubType {
        ShapeSubType::Region
    }

    fn local_bounds(&self) -> Aabb {
        Aabb::new(-self.half_extent, self.half_extent)
    }

    fn inner_radius(&self) -> f32 {
        DEFAULT_INNER_RADIUS
    }

    fn mass_properties(&self) -> MassProperties {
        MassProperties::default()
    }

    fn volume(&self) -> f32 {
        0.0
    }

    fn submerged_volume(&self, _center_of_mass_transform: &Isometry, _scale: Vec3, _surface: &Plane) -> SubmergedVolume {
        SubmergedVolume::default()
    }

    fn stats(&self) -> ShapeStats {
        ShapeStats::default()
    }

    fn sub_shape_id_bits_recursive(&self) -> u32 {
        self.sub_shape_id_bits()
    }

    fn material(&self, sub_shape_id: SubShapeId) -> Arc<PhysicsMaterial> {
        let (index, remainder) = self.sub_shape_index_from_id(sub_shape_id);
        let child = self.collector.shape_at(index);
        child
            .shape()
            .map_or_else(PhysicsMaterial::default_material, |shape| shape.material(remainder))
    }

    fn surface_normal(&self, sub_shape_id: SubShapeId, local_surface_position: Vec3) -> Vec3 {
        let (index, remainder) = self.sub_shape_index_from_id(sub_shape_id);
        let child = self.collector.shape_at(index);
        // Children are never rotated, so the normal needs no transform back
        child.shape().map_or_else(Vec3::zeros, |shape| {
            shape.surface_normal(remainder, local_surface_position - child.position_com())
        })
    }

    fn cast_ray(&self, ray: &RayCast, creator: &SubShapeIdCreator, hit: &mut RayCastResult) -> bool {
        // Only the collector's candidate is tested; a miss is final
        let Some(child) = self.collector.cast_ray(ray) else {
            return false;
        };
        let Some(shape) = child.shape() else {
            return false;
        };
        let child_creator = self.sub_shape_id_from_index(child.index(), creator);
        shape.cast_ray(&child.ray_to_local(ray), &child_creator, hit)
    }

    fn cast_ray_collect(
        &self,
        ray: &RayCast,
        settings: &RayCastSettings,
        creator: &SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<RayCastResult>,
        filter: &dyn ShapeFilter,
    ) {
        for child in self.collector.collect_cast_ray(ray) {
            let Some(shape) = child.shape() else {
                continue;
            };
            let child_creator = self.sub_shape_id_from_index(child.index(), creator);
            shape.cast_ray_collect(&child.ray_to_local(ray), settings, &child_creator, collector, filter);
            if collector.should_early_out() {
                break;
            }
        }
    }

    fn collide_point(
        &self,
        point: Vec3,
        creator: &SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<CollidePointResult>,
        filter: &dyn ShapeFilter,
    ) {
        let mut visitor = CollidePointVisitor::new(self, point, creator, collector, filter);
        self.walk_sub_shapes(&mut visitor);
    }

    fn collide_soft_body_vertices(
        &self,
        center_of_mass_transform: &Isometry,
        scale: Vec3,
        vertices: &mut [SoftBodyVertex],
        colliding_shape_index: i32,
    ) {
        let Some(world) = Aabb::from_points(vertices.iter().map(|v| v.position)) else {
            return;
        };
        let local = world
            .transformed(&center_of_mass_transform.inverse())
            .scaled(reciprocal(scale));
        let bounds = self.local_bounds();
        if !local.overlaps(&bounds) {
            return;
        }

        // Every overlapping child sees the whole batch
        for child in self.collector.collect_at(&local.intersection(&bounds)) {
            if let Some(shape) = child.shape() {
                let child_transform = center_of_mass_transform * child.local_transform_no_scale(scale);
                shape.collide_soft_body_vertices(&child_transform, scale, vertices, colliding_shape_index);
            }
        }
    }

    fn collect_triangles(
        &self,
        _bounds: &Aabb,
        _position_com: Vec3,
        _rotation: Quat,
        _scale: Vec3,
        _triangles: &mut Vec<Triangle>,
    ) {
        panic!("cannot enumerate triangles of a region shape, resolve its leaves with collect_transformed_shapes first");
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
