//! Region entries in the collision dispatch table

use crate::foundation::math::reciprocal;
use crate::physics::collision::{
    downcast_shape, CastTarget, CollideShapeResult, CollideShapeSettings, CollisionCollector, CollisionDispatch,
    Shape, ShapeCast, ShapeCastResult, ShapeCastSettings, ShapeFilter, ShapePair, ShapeSubType,
};

use super::visitors::{CastShapeVsCompoundVisitor, CollideCompoundVsShapeVisitor, CollideShapeVsCompoundVisitor};
use super::RegionShape;

impl RegionShape {
    /// Install the region handlers against every sub type, in both orders
    ///
    /// Installing again overwrites the same entries. Returns true only the
    /// first time for a given dispatch table.
    pub fn register(dispatch: &mut CollisionDispatch) -> bool {
        for sub_type in ShapeSubType::ALL {
            dispatch.register_cast_shape(ShapeSubType::Region, sub_type, cast_compound_vs_shape);
            dispatch.register_cast_shape(sub_type, ShapeSubType::Region, cast_shape_vs_compound);
            dispatch.register_collide_shape(ShapeSubType::Region, sub_type, collide_compound_vs_shape);
            dispatch.register_collide_shape(sub_type, ShapeSubType::Region, collide_shape_vs_compound);
        }

        let first = dispatch.mark_extension_registered(ShapeSubType::Region);
        if first {
            log::debug!(
                "Registered region shape handlers ({} collide, {} cast)",
                dispatch.num_collide_handlers(),
                dispatch.num_cast_handlers()
            );
        }
        first
    }
}

fn collide_compound_vs_shape(
    dispatch: &CollisionDispatch,
    pair: &ShapePair<'_>,
    settings: &CollideShapeSettings,
    collector: &mut dyn CollisionCollector<CollideShapeResult>,
    filter: &dyn ShapeFilter,
) {
    let Some(region) = downcast_shape::<RegionShape>(pair.shape1) else {
        log::error!("Region collide handler called with {} as first shape", pair.shape1.sub_type());
        return;
    };
    let mut visitor = CollideCompoundVsShapeVisitor::new(dispatch, region, *pair, settings, collector, filter);
    region.walk_sub_shapes(&mut visitor);
}

fn collide_shape_vs_compound(
    dispatch: &CollisionDispatch,
    pair: &ShapePair<'_>,
    settings: &CollideShapeSettings,
    collector: &mut dyn CollisionCollector<CollideShapeResult>,
    filter: &dyn ShapeFilter,
) {
    let Some(region) = downcast_shape::<RegionShape>(pair.shape2) else {
        log::error!("Region collide handler called with {} as second shape", pair.shape2.sub_type());
        return;
    };
    let mut visitor = CollideShapeVsCompoundVisitor::new(dispatch, region, *pair, settings, collector, filter);
    region.walk_sub_shapes(&mut visitor);
}

fn cast_shape_vs_compound(
    dispatch: &CollisionDispatch,
    cast: &ShapeCast<'_>,
    settings: &ShapeCastSettings,
    target: &CastTarget<'_>,
    collector: &mut dyn CollisionCollector<ShapeCastResult>,
    filter: &dyn ShapeFilter,
) {
    let Some(region) = downcast_shape::<RegionShape>(target.shape) else {
        log::error!("Region cast handler called with {} as target", target.shape.sub_type());
        return;
    };
    let mut visitor = CastShapeVsCompoundVisitor::new(dispatch, region, *cast, settings, *target, collector, filter);
    region.walk_sub_shapes(&mut visitor);
}

/// Sweep every child of a moving region against the target
///
/// The cast is in the target's center-of-mass space. Each child becomes a
/// cast of its own, with the child's index written into the moving path.
fn cast_compound_vs_shape(
    dispatch: &CollisionDispatch,
    cast: &ShapeCast<'_>,
    settings: &ShapeCastSettings,
    target: &CastTarget<'_>,
    collector: &mut dyn CollisionCollector<ShapeCastResult>,
    filter: &dyn ShapeFilter,
) {
    let Some(region) = downcast_shape::<RegionShape>(cast.shape) else {
        log::error!("Region cast handler called with {} as moving shape", cast.shape.sub_type());
        return;
    };

    // Target in the region's start frame, swept backwards by the motion
    let to_region = cast.center_of_mass_start.inverse();
    let target_bounds = target
        .shape
        .local_bounds()
        .scaled(target.scale)
        .transformed(&to_region);
    let motion = to_region.transform_vector(&cast.direction);
    let swept = target_bounds.union(&target_bounds.translated(-motion));

    let region_bounds = region.local_bounds().scaled(cast.scale);
    if !swept.overlaps(&region_bounds) {
        return;
    }

    let query = swept.intersection(&region_bounds).scaled(reciprocal(cast.scale));
    for child in region.collector().collect_at(&query) {
        let Some(shape) = child.shape() else {
            continue;
        };
        let child_cast = ShapeCast::new(
            shape.as_ref(),
            cast.scale,
            cast.center_of_mass_start * child.local_transform_no_scale(cast.scale),
            cast.direction,
        );
        let child_target = CastTarget {
            creator1: region.sub_shape_id_from_index(child.index(), &target.creator1),
            ..*target
        };
        dispatch.cast_shape_vs_shape_local_space(&child_cast, settings, &child_target, collector, filter);
        if collector.should_early_out() {
            break;
        }
    }
}
