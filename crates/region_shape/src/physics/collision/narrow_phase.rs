//! Narrow-phase handlers for the convex leaves
//!
//! Overlap: sphere-sphere, sphere-box, box-sphere and box-box (separating
//! axis test). Casts: sphere against sphere, sphere against box and box
//! against sphere. Contacts are reported in world space with the
//! penetration axis pointing from shape 1 towards shape 2.

use crate::foundation::math::{normalize_or, translation, Isometry, Point3, Vec3};

use super::collector::{CollideShapeResult, CollisionCollector, HitFraction, ShapeCastResult};
use super::convex::{box_closest_surface, ray_sphere_fraction, BoxShape, SphereShape};
use super::dispatch::{downcast_shape, CastTarget, CollisionDispatch, ShapePair};
use super::primitives::{Aabb, RayCast};
use super::shape::{CollideShapeSettings, ShapeCast, ShapeCastSettings, ShapeFilter, ShapeSubType};

/// Conservative advancement stops within this distance of the surface
const CAST_TOLERANCE: f32 = 1.0e-4;

const MAX_CAST_ITERATIONS: usize = 32;

/// Install every convex leaf handler
pub fn register_convex_handlers(dispatch: &mut CollisionDispatch) {
    use ShapeSubType::{Box, Sphere};

    dispatch.register_collide_shape(Sphere, Sphere, collide_sphere_vs_sphere);
    dispatch.register_collide_shape(Sphere, Box, collide_sphere_vs_box);
    dispatch.register_collide_shape(Box, Sphere, collide_box_vs_sphere);
    dispatch.register_collide_shape(Box, Box, collide_box_vs_box);

    dispatch.register_cast_shape(Sphere, Sphere, cast_sphere_vs_sphere);
    dispatch.register_cast_shape(Sphere, Box, cast_sphere_vs_box);
    dispatch.register_cast_shape(Box, Sphere, cast_box_vs_sphere);
}

/// Forwards overlap results with shape 1 and shape 2 exchanged
struct SwappingCollector<'c> {
    inner: &'c mut dyn CollisionCollector<CollideShapeResult>,
}

impl CollisionCollector<CollideShapeResult> for SwappingCollector<'_> {
    fn add_hit(&mut self, hit: CollideShapeResult) {
        self.inner.add_hit(hit.swapped());
    }

    fn early_out_fraction(&self) -> f32 {
        self.inner.early_out_fraction()
    }

    fn should_early_out(&self) -> bool {
        self.inner.should_early_out()
    }
}

fn report_contact(
    pair: &ShapePair<'_>,
    settings: &CollideShapeSettings,
    collector: &mut dyn CollisionCollector<CollideShapeResult>,
    contact_point_on2: Vec3,
    penetration_axis: Vec3,
    penetration_depth: f32,
) {
    if penetration_depth < -settings.max_separation_distance {
        return;
    }
    let result = CollideShapeResult {
        contact_point_on1: contact_point_on2 + penetration_axis * penetration_depth,
        contact_point_on2,
        penetration_axis,
        penetration_depth,
        sub_shape_id1: pair.creator1.id(),
        sub_shape_id2: pair.creator2.id(),
    };
    if result.hit_fraction() < collector.early_out_fraction() {
        collector.add_hit(result);
    }
}

fn collide_sphere_vs_sphere(
    _dispatch: &CollisionDispatch,
    pair: &ShapePair<'_>,
    settings: &CollideShapeSettings,
    collector: &mut dyn CollisionCollector<CollideShapeResult>,
    _filter: &dyn ShapeFilter,
) {
    let (Some(sphere1), Some(sphere2)) = (
        downcast_shape::<SphereShape>(pair.shape1),
        downcast_shape::<SphereShape>(pair.shape2),
    ) else {
        log::error!("Sphere vs sphere handler called with {:?}", pair);
        return;
    };

    let center1 = pair.transform1.translation.vector;
    let center2 = pair.transform2.translation.vector;
    let radius1 = sphere1.scaled_radius(pair.scale1);
    let radius2 = sphere2.scaled_radius(pair.scale2);

    let delta = center2 - center1;
    let axis = normalize_or(delta, Vec3::x());
    let depth = radius1 + radius2 - delta.norm();
    report_contact(pair, settings, collector, center2 - axis * radius2, axis, depth);
}

fn collide_sphere_vs_box(
    _dispatch: &CollisionDispatch,
    pair: &ShapePair<'_>,
    settings: &CollideShapeSettings,
    collector: &mut dyn CollisionCollector<CollideShapeResult>,
    _filter: &dyn ShapeFilter,
) {
    let (Some(sphere), Some(cuboid)) = (
        downcast_shape::<SphereShape>(pair.shape1),
        downcast_shape::<BoxShape>(pair.shape2),
    ) else {
        log::error!("Sphere vs box handler called with {:?}", pair);
        return;
    };

    let center = pair.transform1.translation.vector;
    let radius = sphere.scaled_radius(pair.scale1);
    let half_extent = cuboid.scaled_half_extent(pair.scale2);

    let local_center = pair.transform2.inverse_transform_point(&Point3::from(center)).coords;
    let (surface, normal, penetration) = box_closest_surface(half_extent, local_center);

    let axis = -pair.transform2.transform_vector(&normal);
    let on2 = pair.transform2.transform_point(&Point3::from(surface)).coords;
    report_contact(pair, settings, collector, on2, axis, radius + penetration);
}

fn collide_box_vs_sphere(
    dispatch: &CollisionDispatch,
    pair: &ShapePair<'_>,
    settings: &CollideShapeSettings,
    collector: &mut dyn CollisionCollector<CollideShapeResult>,
    filter: &dyn ShapeFilter,
) {
    let mut swapping = SwappingCollector { inner: collector };
    collide_sphere_vs_box(dispatch, &pair.swapped(), settings, &mut swapping, filter);
}

fn collide_box_vs_box(
    _dispatch: &CollisionDispatch,
    pair: &ShapePair<'_>,
    settings: &CollideShapeSettings,
    collector: &mut dyn CollisionCollector<CollideShapeResult>,
    _filter: &dyn ShapeFilter,
) {
    let (Some(box1), Some(box2)) = (
        downcast_shape::<BoxShape>(pair.shape1),
        downcast_shape::<BoxShape>(pair.shape2),
    ) else {
        log::error!("Box vs box handler called with {:?}", pair);
        return;
    };

    let rotation1 = pair.transform1.rotation.to_rotation_matrix().into_inner();
    let rotation2 = pair.transform2.rotation.to_rotation_matrix().into_inner();
    let half1 = box1.scaled_half_extent(pair.scale1);
    let half2 = box2.scaled_half_extent(pair.scale2);
    let delta = pair.transform2.translation.vector - pair.transform1.translation.vector;

    let axes1: [Vec3; 3] = std::array::from_fn(|i| rotation1.column(i).into_owned());
    let axes2: [Vec3; 3] = std::array::from_fn(|i| rotation2.column(i).into_owned());

    let mut candidates = Vec::with_capacity(15);
    candidates.extend_from_slice(&axes1);
    candidates.extend_from_slice(&axes2);
    for a in &axes1 {
        for b in &axes2 {
            candidates.push(a.cross(b));
        }
    }

    // Separating axis test, keeping the axis of least overlap
    let mut best: Option<(f32, Vec3)> = None;
    for candidate in candidates {
        let Some(axis) = candidate.try_normalize(1.0e-6) else {
            continue;
        };
        let extent1: f32 = (0..3).map(|i| half1[i] * axis.dot(&axes1[i]).abs()).sum();
        let extent2: f32 = (0..3).map(|i| half2[i] * axis.dot(&axes2[i]).abs()).sum();
        let distance = delta.dot(&axis);
        let overlap = extent1 + extent2 - distance.abs();
        if overlap < -settings.max_separation_distance {
            return;
        }
        if best.map_or(true, |(least, _)| overlap < least) {
            best = Some((overlap, if distance < 0.0 { -axis } else { axis }));
        }
    }
    let Some((depth, axis)) = best else {
        return;
    };

    // Deepest corner of box 2 along the axis
    let on2 = pair.transform2.translation.vector
        + (0..3)
            .map(|i| {
                let sign = if axis.dot(&axes2[i]) > 0.0 { -1.0 } else { 1.0 };
                axes2[i] * (half2[i] * sign)
            })
            .sum::<Vec3>();
    report_contact(pair, settings, collector, on2, axis, depth);
}

/// Sweep a sphere against a box at the origin
///
/// Returns the first fraction at which the sphere touches the box. The
/// expanded box gives a lower bound that conservative advancement refines
/// around edges and corners.
fn sweep_sphere_vs_box(half_extent: Vec3, origin: Vec3, direction: Vec3, radius: f32) -> Option<f32> {
    let expanded = Aabb::from_center_extents(Vec3::zeros(), half_extent + Vec3::repeat(radius));
    let mut fraction = expanded.ray_fraction(&RayCast::new(origin, direction))?;
    let speed = direction.norm();

    for _ in 0..MAX_CAST_ITERATIONS {
        let (_, _, penetration) = box_closest_surface(half_extent, origin + direction * fraction);
        let gap = -penetration - radius;
        if gap <= CAST_TOLERANCE {
            return Some(fraction);
        }
        if speed <= f32::EPSILON {
            return None;
        }
        fraction += gap / speed;
        if fraction > 1.0 {
            return None;
        }
    }
    None
}

fn report_cast(
    target: &CastTarget<'_>,
    collector: &mut dyn CollisionCollector<ShapeCastResult>,
    fraction: f32,
    local_on1: Vec3,
    local_on2: Vec3,
    local_axis: Vec3,
    penetration_depth: f32,
) {
    let to_world = &target.center_of_mass_transform;
    let result = ShapeCastResult {
        fraction,
        contact_point_on1: to_world.transform_point(&Point3::from(local_on1)).coords,
        contact_point_on2: to_world.transform_point(&Point3::from(local_on2)).coords,
        penetration_axis: to_world.transform_vector(&local_axis),
        penetration_depth,
        sub_shape_id1: target.creator1.id(),
        sub_shape_id2: target.creator2.id(),
    };
    if result.hit_fraction() < collector.early_out_fraction() {
        collector.add_hit(result);
    }
}

fn cast_sphere_vs_sphere(
    _dispatch: &CollisionDispatch,
    cast: &ShapeCast<'_>,
    _settings: &ShapeCastSettings,
    target: &CastTarget<'_>,
    collector: &mut dyn CollisionCollector<ShapeCastResult>,
    _filter: &dyn ShapeFilter,
) {
    let (Some(moving), Some(fixed)) = (
        downcast_shape::<SphereShape>(cast.shape),
        downcast_shape::<SphereShape>(target.shape),
    ) else {
        log::error!("Sphere vs sphere cast called with {:?} against {:?}", cast, target);
        return;
    };

    let start = cast.center_of_mass_start.translation.vector;
    let moving_radius = moving.scaled_radius(cast.scale);
    let fixed_radius = fixed.scaled_radius(target.scale);
    let combined = moving_radius + fixed_radius;

    let Some(fraction) = ray_sphere_fraction(start, cast.direction, combined) else {
        return;
    };
    let center = start + cast.direction * fraction;
    let axis = normalize_or(-center, normalize_or(cast.direction, Vec3::x()));
    let depth = if fraction > 0.0 { 0.0 } else { combined - center.norm() };
    report_cast(
        target,
        collector,
        fraction,
        center + axis * moving_radius,
        -axis * fixed_radius,
        axis,
        depth,
    );
}

fn cast_sphere_vs_box(
    _dispatch: &CollisionDispatch,
    cast: &ShapeCast<'_>,
    _settings: &ShapeCastSettings,
    target: &CastTarget<'_>,
    collector: &mut dyn CollisionCollector<ShapeCastResult>,
    _filter: &dyn ShapeFilter,
) {
    let (Some(moving), Some(fixed)) = (
        downcast_shape::<SphereShape>(cast.shape),
        downcast_shape::<BoxShape>(target.shape),
    ) else {
        log::error!("Sphere vs box cast called with {:?} against {:?}", cast, target);
        return;
    };

    let start = cast.center_of_mass_start.translation.vector;
    let radius = moving.scaled_radius(cast.scale);
    let half_extent = fixed.scaled_half_extent(target.scale);

    let Some(fraction) = sweep_sphere_vs_box(half_extent, start, cast.direction, radius) else {
        return;
    };
    let center = start + cast.direction * fraction;
    let (surface, normal, penetration) = box_closest_surface(half_extent, center);
    let axis = -normal;
    let depth = if fraction > 0.0 { 0.0 } else { radius + penetration };
    report_cast(target, collector, fraction, center + axis * radius, surface, axis, depth);
}

fn cast_box_vs_sphere(
    _dispatch: &CollisionDispatch,
    cast: &ShapeCast<'_>,
    _settings: &ShapeCastSettings,
    target: &CastTarget<'_>,
    collector: &mut dyn CollisionCollector<ShapeCastResult>,
    _filter: &dyn ShapeFilter,
) {
    let (Some(moving), Some(fixed)) = (
        downcast_shape::<BoxShape>(cast.shape),
        downcast_shape::<SphereShape>(target.shape),
    ) else {
        log::error!("Box vs sphere cast called with {:?} against {:?}", cast, target);
        return;
    };

    // Sweep the sphere backwards in the frame of the moving box
    let box_start = cast.center_of_mass_start;
    let half_extent = moving.scaled_half_extent(cast.scale);
    let radius = fixed.scaled_radius(target.scale);
    let sphere_start = box_start.inverse_transform_point(&Point3::origin()).coords;
    let relative_direction = box_start.inverse_transform_vector(&-cast.direction);

    let Some(fraction) = sweep_sphere_vs_box(half_extent, sphere_start, relative_direction, radius) else {
        return;
    };
    let (surface, normal, penetration) =
        box_closest_surface(half_extent, sphere_start + relative_direction * fraction);

    let box_at_contact: Isometry = translation(cast.direction * fraction) * box_start;
    let on1 = box_at_contact.transform_point(&Point3::from(surface)).coords;
    let axis = box_start.transform_vector(&normal);
    let depth = if fraction > 0.0 { 0.0 } else { radius + penetration };
    report_cast(target, collector, fraction, on1, -axis * radius, axis, depth);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{rotation_translation, Quat};
    use crate::physics::collision::{
        AcceptAllShapeFilter, AllHitCollector, BoxShapeSettings, ClosestHitCollector, Shape,
        ShapeSettings, SphereShapeSettings,
    };
    use approx::assert_relative_eq;
    use std::sync::Arc;

    fn sphere(radius: f32) -> Arc<SphereShape> {
        SphereShapeSettings::new(radius).create().unwrap()
    }

    fn cuboid(half: f32) -> Arc<BoxShape> {
        BoxShapeSettings::new(Vec3::repeat(half)).create().unwrap()
    }

    fn collide(
        shape1: &dyn Shape,
        at1: Isometry,
        shape2: &dyn Shape,
        at2: Isometry,
        settings: &CollideShapeSettings,
    ) -> Vec<CollideShapeResult> {
        let pair = ShapePair::new(shape1, at1, Vec3::repeat(1.0), shape2, at2, Vec3::repeat(1.0));
        let mut hits = AllHitCollector::new();
        CollisionDispatch::new().collide_shape_vs_shape(&pair, settings, &mut hits, &AcceptAllShapeFilter);
        hits.hits
    }

    #[test]
    fn test_sphere_vs_sphere_depth_and_axis() {
        let hits = collide(
            &*sphere(1.0),
            translation(Vec3::zeros()),
            &*sphere(1.0),
            translation(Vec3::new(1.5, 0.0, 0.0)),
            &CollideShapeSettings::default(),
        );
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].penetration_depth, 0.5);
        assert_relative_eq!(hits[0].penetration_axis, Vec3::x());
        assert_relative_eq!(hits[0].contact_point_on1, Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(hits[0].contact_point_on2, Vec3::new(0.5, 0.0, 0.0));
    }

    #[test]
    fn test_max_separation_reports_near_miss() {
        let settings = CollideShapeSettings { max_separation_distance: 0.5 };
        let hits = collide(
            &*sphere(1.0),
            translation(Vec3::zeros()),
            &*sphere(1.0),
            translation(Vec3::new(2.25, 0.0, 0.0)),
            &settings,
        );
        assert_relative_eq!(hits[0].penetration_depth, -0.25);

        let none = collide(
            &*sphere(1.0),
            translation(Vec3::zeros()),
            &*sphere(1.0),
            translation(Vec3::new(2.25, 0.0, 0.0)),
            &CollideShapeSettings::default(),
        );
        assert!(none.is_empty());
    }

    #[test]
    fn test_sphere_box_both_orders_agree() {
        let ball = sphere(1.0);
        let cube = cuboid(1.0);
        let at_ball = translation(Vec3::new(0.0, 1.5, 0.0));
        let at_cube = translation(Vec3::zeros());

        let forward = collide(&*ball, at_ball, &*cube, at_cube, &CollideShapeSettings::default());
        let backward = collide(&*cube, at_cube, &*ball, at_ball, &CollideShapeSettings::default());

        assert_relative_eq!(forward[0].penetration_depth, 0.5);
        assert_relative_eq!(forward[0].penetration_axis, -Vec3::y());
        assert_relative_eq!(backward[0].penetration_axis, Vec3::y());
        assert_relative_eq!(backward[0].contact_point_on1, forward[0].contact_point_on2);
    }

    #[test]
    fn test_box_vs_box_rotated() {
        let cube = cuboid(1.0);
        let rotated = rotation_translation(
            Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_4),
            Vec3::new(2.2, 0.0, 0.0),
        );
        // Corner reaches 2.2 - sqrt(2) = 0.786 < 1
        let hits = collide(&*cube, translation(Vec3::zeros()), &*cube, rotated, &CollideShapeSettings::default());
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].penetration_depth, 1.0 - (2.2 - 2.0_f32.sqrt()), epsilon = 1.0e-4);
        assert_relative_eq!(hits[0].penetration_axis, Vec3::x(), epsilon = 1.0e-4);

        let apart = rotation_translation(
            Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_4),
            Vec3::new(2.5, 0.0, 0.0),
        );
        assert!(collide(&*cube, translation(Vec3::zeros()), &*cube, apart, &CollideShapeSettings::default()).is_empty());
    }

    #[test]
    fn test_sphere_cast_against_sphere() {
        let ball = sphere(1.0);
        let target_shape = sphere(1.0);
        let cast = ShapeCast::new(&*ball, Vec3::repeat(1.0), translation(Vec3::new(-10.0, 0.0, 0.0)), Vec3::new(20.0, 0.0, 0.0));
        let target = CastTarget::new(&*target_shape, Vec3::repeat(1.0), translation(Vec3::new(0.0, 0.0, 0.0)));

        let mut closest = ClosestHitCollector::new();
        CollisionDispatch::new().cast_shape_vs_shape_world_space(
            &cast,
            &ShapeCastSettings::default(),
            &target,
            &mut closest,
            &AcceptAllShapeFilter,
        );
        let hit = closest.hit.unwrap();
        assert_relative_eq!(hit.fraction, 0.4, epsilon = 1.0e-5);
        assert_relative_eq!(hit.penetration_axis, Vec3::x(), epsilon = 1.0e-5);
        assert_relative_eq!(hit.contact_point_on2, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1.0e-5);
    }

    #[test]
    fn test_sphere_cast_against_box_corner() {
        let ball = sphere(0.5);
        let cube = cuboid(1.0);
        // Diagonal approach towards the (+x, +y) edge
        let cast = ShapeCast::new(&*ball, Vec3::repeat(1.0), translation(Vec3::new(5.0, 5.0, 0.0)), Vec3::new(-8.0, -8.0, 0.0));
        let target = CastTarget::new(&*cube, Vec3::repeat(1.0), translation(Vec3::zeros()));

        let mut closest = ClosestHitCollector::new();
        CollisionDispatch::new().cast_shape_vs_shape_local_space(
            &cast,
            &ShapeCastSettings::default(),
            &target,
            &mut closest,
            &AcceptAllShapeFilter,
        );
        let hit = closest.hit.unwrap();
        // Center stops 0.5 away from the edge at (1, 1)
        let stop = 1.0 + 0.5 / 2.0_f32.sqrt();
        assert_relative_eq!(hit.fraction, (5.0 - stop) / 8.0, epsilon = 1.0e-3);
    }

    #[test]
    fn test_box_cast_against_sphere_matches_reverse() {
        let cube = cuboid(1.0);
        let ball = sphere(1.0);
        let cast = ShapeCast::new(&*cube, Vec3::repeat(1.0), translation(Vec3::new(0.0, 10.0, 0.0)), Vec3::new(0.0, -20.0, 0.0));
        let target = CastTarget::new(&*ball, Vec3::repeat(1.0), translation(Vec3::zeros()));

        let mut closest = ClosestHitCollector::new();
        CollisionDispatch::new().cast_shape_vs_shape_local_space(
            &cast,
            &ShapeCastSettings::default(),
            &target,
            &mut closest,
            &AcceptAllShapeFilter,
        );
        let hit = closest.hit.unwrap();
        assert_relative_eq!(hit.fraction, 0.4, epsilon = 1.0e-4);
        assert_relative_eq!(hit.contact_point_on1, Vec3::new(0.0, 1.0, 0.0), epsilon = 1.0e-3);
        assert_relative_eq!(hit.penetration_axis, -Vec3::y(), epsilon = 1.0e-4);
    }

    #[test]
    fn test_cast_miss_reports_nothing() {
        let ball = sphere(1.0);
        let cube = cuboid(1.0);
        let cast = ShapeCast::new(&*ball, Vec3::repeat(1.0), translation(Vec3::new(-10.0, 5.0, 0.0)), Vec3::new(20.0, 0.0, 0.0));
        let target = CastTarget::new(&*cube, Vec3::repeat(1.0), translation(Vec3::zeros()));

        let mut hits = AllHitCollector::new();
        CollisionDispatch::new().cast_shape_vs_shape_local_space(
            &cast,
            &ShapeCastSettings::default(),
            &target,
            &mut hits,
            &AcceptAllShapeFilter,
        );
        assert!(hits.hits.is_empty());
    }
}
