//! Per-query traversal visitors
//!
//! Each visitor decides whether the region box is worth opening, which box to
//! hand the collector, and what to do with every child it gets back. All
//! boxes are in the region's local, unscaled frame.

use crate::foundation::math::{reciprocal, Vec3};
use crate::physics::collision::{
    Aabb, CastTarget, CollidePointResult, CollideShapeResult, CollideShapeSettings, CollisionCollector,
    CollisionDispatch, RayCast, RayCastResult, RayCastSettings, Shape, ShapeCast, ShapeCastResult,
    ShapeCastSettings, ShapeFilter, ShapePair, SubShapeIdCreator,
};
use crate::spatial::IndexedShape;

use super::walk::SubShapeVisitor;
use super::RegionShape;

/// Region is the first operand of an overlap query
pub(crate) struct CollideCompoundVsShapeVisitor<'a> {
    dispatch: &'a CollisionDispatch,
    pair: ShapePair<'a>,
    settings: &'a CollideShapeSettings,
    collector: &'a mut dyn CollisionCollector<CollideShapeResult>,
    filter: &'a dyn ShapeFilter,
    bounds_of1: Aabb,
    bounds_of2_in_1: Aabb,
    sub_shape_bits: u32,
}

impl<'a> CollideCompoundVsShapeVisitor<'a> {
    pub(crate) fn new(
        dispatch: &'a CollisionDispatch,
        region: &RegionShape,
        pair: ShapePair<'a>,
        settings: &'a CollideShapeSettings,
        collector: &'a mut dyn CollisionCollector<CollideShapeResult>,
        filter: &'a dyn ShapeFilter,
    ) -> Self {
        let transform_2_to_1 = pair.transform1.inverse() * pair.transform2;
        let bounds_of2_in_1 = pair
            .shape2
            .local_bounds()
            .scaled(pair.scale2)
            .transformed(&transform_2_to_1)
            .expanded_by(Vec3::repeat(settings.max_separation_distance))
            .scaled(reciprocal(pair.scale1));

        Self {
            dispatch,
            pair,
            settings,
            collector,
            filter,
            bounds_of1: region.local_bounds(),
            bounds_of2_in_1,
            sub_shape_bits: region.sub_shape_id_bits(),
        }
    }
}

impl SubShapeVisitor for CollideCompoundVsShapeVisitor<'_> {
    fn test_bounds(&self) -> bool {
        self.bounds_of1.overlaps(&self.bounds_of2_in_1)
    }

    fn query_bounds(&self) -> Aabb {
        self.bounds_of2_in_1.intersection(&self.bounds_of1)
    }

    fn visit_shape(&mut self, child: &IndexedShape, index: u32) {
        let Some(shape) = child.shape() else {
            return;
        };
        let pair = ShapePair {
            shape1: shape.as_ref(),
            transform1: self.pair.transform1 * child.local_transform_no_scale(self.pair.scale1),
            creator1: self.pair.creator1.push_id(index, self.sub_shape_bits),
            ..self.pair
        };
        self.dispatch
            .collide_shape_vs_shape(&pair, self.settings, &mut *self.collector, self.filter);
    }

    fn should_abort(&self) -> bool {
        self.collector.should_early_out()
    }
}

/// Region is the second operand of an overlap query
pub(crate) struct CollideShapeVsCompoundVisitor<'a> {
    dispatch: &'a CollisionDispatch,
    pair: ShapePair<'a>,
    settings: &'a CollideShapeSettings,
    collector: &'a mut dyn CollisionCollector<CollideShapeResult>,
    filter: &'a dyn ShapeFilter,
    bounds_of2: Aabb,
    bounds_of1_in_2: Aabb,
    sub_shape_bits: u32,
}

impl<'a> CollideShapeVsCompoundVisitor<'a> {
    pub(crate) fn new(
        dispatch: &'a CollisionDispatch,
        region: &RegionShape,
        pair: ShapePair<'a>,
        settings: &'a CollideShapeSettings,
        collector: &'a mut dyn CollisionCollector<CollideShapeResult>,
        filter: &'a dyn ShapeFilter,
    ) -> Self {
        let transform_1_to_2 = pair.transform2.inverse() * pair.transform1;
        let bounds_of1_in_2 = pair
            .shape1
            .local_bounds()
            .scaled(pair.scale1)
            .transformed(&transform_1_to_2)
            .expanded_by(Vec3::repeat(settings.max_separation_distance))
            .scaled(reciprocal(pair.scale2));

        Self {
            dispatch,
            pair,
            settings,
            collector,
            filter,
            bounds_of2: region.local_bounds(),
            bounds_of1_in_2,
            sub_shape_bits: region.sub_shape_id_bits(),
        }
    }
}

impl SubShapeVisitor for CollideShapeVsCompoundVisitor<'_> {
    fn test_bounds(&self) -> bool {
        self.bounds_of2.overlaps(&self.bounds_of1_in_2)
    }

    fn query_bounds(&self) -> Aabb {
        self.bounds_of1_in_2.intersection(&self.bounds_of2)
    }

    fn visit_shape(&mut self, child: &IndexedShape, index: u32) {
        let Some(shape) = child.shape() else {
            return;
        };
        let pair = ShapePair {
            shape2: shape.as_ref(),
            transform2: self.pair.transform2 * child.local_transform_no_scale(self.pair.scale2),
            creator2: self.pair.creator2.push_id(index, self.sub_shape_bits),
            ..self.pair
        };
        self.dispatch
            .collide_shape_vs_shape(&pair, self.settings, &mut *self.collector, self.filter);
    }

    fn should_abort(&self) -> bool {
        self.collector.should_early_out()
    }
}

/// A shape swept against a region target
///
/// The cast arrives in the region's center-of-mass space.
pub(crate) struct CastShapeVsCompoundVisitor<'a> {
    dispatch: &'a CollisionDispatch,
    cast: ShapeCast<'a>,
    settings: &'a ShapeCastSettings,
    target: CastTarget<'a>,
    collector: &'a mut dyn CollisionCollector<ShapeCastResult>,
    filter: &'a dyn ShapeFilter,
    bounds_of2: Aabb,
    swept_bounds: Aabb,
    sub_shape_bits: u32,
}

impl<'a> CastShapeVsCompoundVisitor<'a> {
    pub(crate) fn new(
        dispatch: &'a CollisionDispatch,
        region: &RegionShape,
        cast: ShapeCast<'a>,
        settings: &'a ShapeCastSettings,
        target: CastTarget<'a>,
        collector: &'a mut dyn CollisionCollector<ShapeCastResult>,
        filter: &'a dyn ShapeFilter,
    ) -> Self {
        Self {
            dispatch,
            swept_bounds: cast.swept_bounds().scaled(reciprocal(target.scale)),
            cast,
            settings,
            target,
            collector,
            filter,
            bounds_of2: region.local_bounds(),
            sub_shape_bits: region.sub_shape_id_bits(),
        }
    }
}

impl SubShapeVisitor for CastShapeVsCompoundVisitor<'_> {
    fn test_bounds(&self) -> bool {
        self.bounds_of2.overlaps(&self.swept_bounds)
    }

    fn query_bounds(&self) -> Aabb {
        self.swept_bounds.intersection(&self.bounds_of2)
    }

    fn visit_shape(&mut self, child: &IndexedShape, index: u32) {
        let Some(shape) = child.shape() else {
            return;
        };
        let local = child.local_transform_no_scale(self.target.scale);
        let cast = self.cast.post_transformed(&local.inverse());
        let target = CastTarget {
            shape: shape.as_ref(),
            center_of_mass_transform: self.target.center_of_mass_transform * local,
            creator2: self.target.creator2.push_id(index, self.sub_shape_bits),
            ..self.target
        };
        self.dispatch
            .cast_shape_vs_shape_local_space(&cast, self.settings, &target, &mut *self.collector, self.filter);
    }

    fn should_abort(&self) -> bool {
        self.collector.should_early_out()
    }
}

/// First-hit ray cast over every child the ray's box selects
pub(crate) struct CastRayVisitor<'a> {
    ray: &'a RayCast,
    creator: &'a SubShapeIdCreator,
    hit: &'a mut RayCastResult,
    bounds: Aabb,
    sub_shape_bits: u32,
    return_value: bool,
}

impl<'a> CastRayVisitor<'a> {
    pub(crate) fn new(
        region: &RegionShape,
        ray: &'a RayCast,
        creator: &'a SubShapeIdCreator,
        hit: &'a mut RayCastResult,
    ) -> Self {
        Self {
            ray,
            creator,
            hit,
            bounds: region.local_bounds(),
            sub_shape_bits: region.sub_shape_id_bits(),
            return_value: false,
        }
    }

    /// True when any child improved the hit
    pub(crate) const fn return_value(&self) -> bool {
        self.return_value
    }
}

impl SubShapeVisitor for CastRayVisitor<'_> {
    fn test_bounds(&self) -> bool {
        self.bounds
            .ray_fraction(self.ray)
            .is_some_and(|fraction| fraction < self.hit.fraction)
    }

    fn query_bounds(&self) -> Aabb {
        self.ray.bounds().intersection(&self.bounds)
    }

    fn visit_shape(&mut self, child: &IndexedShape, index: u32) {
        let Some(shape) = child.shape() else {
            return;
        };
        let creator = self.creator.push_id(index, self.sub_shape_bits);
        if shape.cast_ray(&child.ray_to_local(self.ray), &creator, self.hit) {
            self.return_value = true;
        }
    }

    fn should_abort(&self) -> bool {
        self.hit.fraction <= 0.0
    }
}

/// Multi-hit ray cast over every child the ray's box selects
pub(crate) struct CastRayCollectVisitor<'a> {
    ray: &'a RayCast,
    settings: &'a RayCastSettings,
    creator: &'a SubShapeIdCreator,
    collector: &'a mut dyn CollisionCollector<RayCastResult>,
    filter: &'a dyn ShapeFilter,
    bounds: Aabb,
    sub_shape_bits: u32,
}

impl<'a> CastRayCollectVisitor<'a> {
    pub(crate) fn new(
        region: &RegionShape,
        ray: &'a RayCast,
        settings: &'a RayCastSettings,
        creator: &'a SubShapeIdCreator,
        collector: &'a mut dyn CollisionCollector<RayCastResult>,
        filter: &'a dyn ShapeFilter,
    ) -> Self {
        Self {
            ray,
            settings,
            creator,
            collector,
            filter,
            bounds: region.local_bounds(),
            sub_shape_bits: region.sub_shape_id_bits(),
        }
    }
}

impl SubShapeVisitor for CastRayCollectVisitor<'_> {
    fn test_bounds(&self) -> bool {
        self.bounds
            .ray_fraction(self.ray)
            .is_some_and(|fraction| fraction < self.collector.early_out_fraction())
    }

    fn query_bounds(&self) -> Aabb {
        self.ray.bounds().intersection(&self.bounds)
    }

    fn visit_shape(&mut self, child: &IndexedShape, index: u32) {
        let Some(shape) = child.shape() else {
            return;
        };
        let creator = self.creator.push_id(index, self.sub_shape_bits);
        shape.cast_ray_collect(
            &child.ray_to_local(self.ray),
            self.settings,
            &creator,
            &mut *self.collector,
            self.filter,
        );
    }

    fn should_abort(&self) -> bool {
        self.collector.should_early_out()
    }
}

/// Point containment
pub(crate) struct CollidePointVisitor<'a> {
    point: Vec3,
    creator: &'a SubShapeIdCreator,
    collector: &'a mut dyn CollisionCollector<CollidePointResult>,
    filter: &'a dyn ShapeFilter,
    bounds: Aabb,
    sub_shape_bits: u32,
}

impl<'a> CollidePointVisitor<'a> {
    pub(crate) fn new(
        region: &RegionShape,
        point: Vec3,
        creator: &'a SubShapeIdCreator,
        collector: &'a mut dyn CollisionCollector<CollidePointResult>,
        filter: &'a dyn ShapeFilter,
    ) -> Self {
        Self {
            point,
            creator,
            collector,
            filter,
            bounds: region.local_bounds(),
            sub_shape_bits: region.sub_shape_id_bits(),
        }
    }
}

impl SubShapeVisitor for CollidePointVisitor<'_> {
    fn test_bounds(&self) -> bool {
        self.bounds.contains_point(self.point)
    }

    fn query_bounds(&self) -> Aabb {
        Aabb::new(self.point, self.point)
    }

    fn visit_shape(&mut self, child: &IndexedShape, index: u32) {
        let Some(shape) = child.shape() else {
            return;
        };
        let creator = self.creator.push_id(index, self.sub_shape_bits);
        shape.collide_point(
            self.point - child.position_com(),
            &creator,
            &mut *self.collector,
            self.filter,
        );
    }

    fn should_abort(&self) -> bool {
        self.collector.should_early_out()
    }
}

