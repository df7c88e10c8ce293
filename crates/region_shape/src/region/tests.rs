use super::*;
use super::visitors::CastRayVisitor;
use crate::foundation::math::translation;
use crate::physics::collision::{
    AcceptAllShapeFilter, AllHitCollector, AnyHitCollector, BoxShapeSettings, CastTarget, ClosestHitCollector, CollideShapeResult,
    CollideShapeSettings, CollisionDispatch, ShapeCast, ShapeCastResult, ShapeCastSettings, ShapePair,
    SphereShapeSettings,
};
use crate::spatial::{IndexedShape, IndexedShapes, OctreeConfig, OctreeShapeCollectorBuilder};
use approx::assert_relative_eq;
use std::sync::atomic::{AtomicUsize, Ordering};

const HALF: f32 = 10.0;
const CHILD: u32 = 7;

fn cube(half: f32) -> Arc<dyn Shape> {
    BoxShapeSettings::new(Vec3::repeat(half)).create().unwrap()
}

fn ball(radius: f32) -> Arc<dyn Shape> {
    SphereShapeSettings::new(radius).create().unwrap()
}

fn ones() -> Vec3 {
    Vec3::repeat(1.0)
}

/// Brute-force collector that counts how often it is asked for children
#[derive(Default)]
struct TestCollector {
    children: Vec<IndexedShape>,
    ignore_bounds: bool,
    no_ray_hint: bool,
    collect_calls: AtomicUsize,
}

impl TestCollector {
    fn with(children: Vec<IndexedShape>) -> Self {
        Self {
            children,
            ..Self::default()
        }
    }

    fn collect_calls(&self) -> usize {
        self.collect_calls.load(Ordering::SeqCst)
    }
}

impl IndexedShapeCollector for TestCollector {
    fn collect_at(&self, bounds: &Aabb) -> IndexedShapes {
        self.collect_calls.fetch_add(1, Ordering::SeqCst);
        self.children
            .iter()
            .filter(|c| self.ignore_bounds || c.local_bounds().is_some_and(|b| b.overlaps(bounds)))
            .cloned()
            .collect()
    }

    fn cast_ray(&self, ray: &RayCast) -> Option<IndexedShape> {
        if self.no_ray_hint {
            return None;
        }
        self.children
            .iter()
            .filter_map(|c| {
                let mut hit = RayCastResult::default();
                c.shape()?
                    .cast_ray(&c.ray_to_local(ray), &SubShapeIdCreator::new(), &mut hit)
                    .then_some((hit.fraction, c))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, c)| c.clone())
    }

    fn collect_cast_ray(&self, ray: &RayCast) -> IndexedShapes {
        self.children
            .iter()
            .filter(|c| c.local_bounds().is_some_and(|b| b.ray_fraction(ray).is_some()))
            .cloned()
            .collect()
    }

    fn shape_at(&self, index: u32) -> IndexedShape {
        self.children
            .iter()
            .find(|c| c.index() == index)
            .cloned()
            .unwrap_or_default()
    }
}

/// Counts how many leaves a query tests, ignoring checks against the region itself
#[derive(Default)]
struct CountingFilter {
    leaf_tests: AtomicUsize,
}

impl CountingFilter {
    fn leaf_tests(&self) -> usize {
        self.leaf_tests.load(Ordering::SeqCst)
    }
}

impl ShapeFilter for CountingFilter {
    fn should_collide(&self, _shape: &dyn Shape, _sub_shape_id: SubShapeId) -> bool {
        self.leaf_tests.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn should_collide_pair(&self, shape1: &dyn Shape, _: SubShapeId, shape2: &dyn Shape, _: SubShapeId) -> bool {
        if shape1.sub_type() != ShapeSubType::Region && shape2.sub_type() != ShapeSubType::Region {
            self.leaf_tests.fetch_add(1, Ordering::SeqCst);
        }
        true
    }
}

/// Wraps a visitor and counts the children it is handed
struct CountingVisitor<V> {
    inner: V,
    visits: usize,
}

impl<V: SubShapeVisitor> SubShapeVisitor for CountingVisitor<V> {
    fn test_bounds(&self) -> bool {
        self.inner.test_bounds()
    }

    fn query_bounds(&self) -> Aabb {
        self.inner.query_bounds()
    }

    fn visit_shape(&mut self, child: &IndexedShape, index: u32) {
        self.visits += 1;
        self.inner.visit_shape(child, index);
    }

    fn should_abort(&self) -> bool {
        self.inner.should_abort()
    }
}

/// Two unit cubes around the origin that overlap on x in [-0.3, 0.5]
fn overlapping_region() -> RegionShape {
    let children = vec![
        IndexedShape::new(Some(cube(0.5)), 1, Vec3::zeros()),
        IndexedShape::new(Some(cube(0.5)), 2, Vec3::new(0.2, 0.0, 0.0)),
    ];
    RegionShape::new(Arc::new(TestCollector::with(children)), Vec3::repeat(HALF))
}

fn single_child() -> IndexedShape {
    IndexedShape::new(Some(cube(0.5)), CHILD, Vec3::new(1.0, 2.0, 3.0))
}

fn octree_region(children: Vec<IndexedShape>) -> Arc<RegionShape> {
    let mut builder = OctreeShapeCollectorBuilder::new(
        Aabb::from_center_extents(Vec3::zeros(), Vec3::repeat(HALF)),
        OctreeConfig::default(),
    );
    for child in children {
        builder.add_shape(child);
    }
    let collector = builder.build().unwrap();
    RegionShapeSettings::new(Arc::new(collector), Vec3::repeat(HALF))
        .create()
        .unwrap()
}

fn dispatch() -> CollisionDispatch {
    let mut dispatch = CollisionDispatch::new();
    RegionShape::register(&mut dispatch);
    dispatch
}

fn collide(
    dispatch: &CollisionDispatch,
    shape1: &dyn Shape,
    transform1: Isometry,
    scale1: Vec3,
    shape2: &dyn Shape,
    transform2: Isometry,
    scale2: Vec3,
) -> Vec<CollideShapeResult> {
    let pair = ShapePair::new(shape1, transform1, scale1, shape2, transform2, scale2);
    let mut hits = AllHitCollector::new();
    dispatch.collide_shape_vs_shape(&pair, &CollideShapeSettings::default(), &mut hits, &AcceptAllShapeFilter);
    hits.hits
}

fn cast(
    dispatch: &CollisionDispatch,
    cast: &ShapeCast<'_>,
    target: &CastTarget<'_>,
) -> Option<ShapeCastResult> {
    let mut hit = ClosestHitCollector::new();
    dispatch.cast_shape_vs_shape_world_space(cast, &ShapeCastSettings::default(), target, &mut hit, &AcceptAllShapeFilter);
    hit.hit
}

fn down_ray() -> RayCast {
    RayCast::new(Vec3::new(1.0, 2.0, 100.0), Vec3::new(0.0, 0.0, -200.0))
}

#[test]
fn test_empty_region_reports_nothing() {
    let region = octree_region(Vec::new());
    let dispatch = dispatch();
    let creator = SubShapeIdCreator::new();

    let mut hit = RayCastResult::default();
    assert!(!region.cast_ray(&down_ray(), &creator, &mut hit));
    assert!(!region.cast_ray_walk(&down_ray(), &creator, &mut hit));

    let mut rays = AllHitCollector::new();
    region.cast_ray_collect(&down_ray(), &RayCastSettings::default(), &creator, &mut rays, &AcceptAllShapeFilter);
    assert!(!rays.had_hit());

    let mut points = AllHitCollector::new();
    region.collide_point(Vec3::zeros(), &creator, &mut points, &AcceptAllShapeFilter);
    assert!(!points.had_hit());

    let sphere = ball(1.0);
    let hits = collide(&dispatch, &*sphere, translation(Vec3::zeros()), ones(), &*region, Isometry::identity(), ones());
    assert!(hits.is_empty());

    let sweep = ShapeCast::new(&*sphere, ones(), translation(Vec3::new(0.0, 0.0, 20.0)), Vec3::new(0.0, 0.0, -40.0));
    assert!(cast(&dispatch, &sweep, &CastTarget::new(&*region, ones(), Isometry::identity())).is_none());
}

#[test]
fn test_single_child_ray_hit_names_child_index() {
    let region = octree_region(vec![single_child()]);
    let mut hit = RayCastResult::default();

    assert!(region.cast_ray(&down_ray(), &SubShapeIdCreator::new(), &mut hit));
    // Enters the child's top face at z = 3.5
    assert_relative_eq!(hit.fraction, (100.0 - 3.5) / 200.0, epsilon = 1.0e-6);
    assert_eq!(hit.sub_shape_id.len(), SUB_SHAPE_INDEX_BITS);

    let (index, remainder) = region.sub_shape_index_from_id(hit.sub_shape_id);
    assert_eq!(index, CHILD);
    assert!(remainder.is_empty());

    let normal = region.surface_normal(hit.sub_shape_id, down_ray().point_at(hit.fraction));
    assert_relative_eq!(normal, Vec3::z());
}

#[test]
fn test_ray_paths_agree() {
    let region = octree_region(vec![single_child()]);
    let creator = SubShapeIdCreator::new();

    let mut walked = RayCastResult::default();
    assert!(region.cast_ray_walk(&down_ray(), &creator, &mut walked));
    assert_relative_eq!(walked.fraction, 0.4825, epsilon = 1.0e-6);
    assert_eq!(region.sub_shape_index_from_id(walked.sub_shape_id).0, CHILD);

    let mut collected = AllHitCollector::new();
    region.cast_ray_collect(&down_ray(), &RayCastSettings::default(), &creator, &mut collected, &AcceptAllShapeFilter);
    assert_eq!(collected.hits.len(), 1);
    assert_relative_eq!(collected.hits[0].fraction, walked.fraction, epsilon = 1.0e-6);

    let mut walked_all = AllHitCollector::new();
    region.cast_ray_collect_walk(&down_ray(), &RayCastSettings::default(), &creator, &mut walked_all, &AcceptAllShapeFilter);
    assert_eq!(walked_all.hits, collected.hits);
}

#[test]
fn test_single_hit_ray_trusts_collector_candidate() {
    let collector = Arc::new(TestCollector {
        no_ray_hint: true,
        ..TestCollector::with(vec![single_child()])
    });
    let region = RegionShape::new(collector, Vec3::repeat(HALF));
    let creator = SubShapeIdCreator::new();

    let mut hit = RayCastResult::default();
    assert!(!region.cast_ray(&down_ray(), &creator, &mut hit));
    assert_eq!(hit, RayCastResult::default());

    let mut all = AllHitCollector::new();
    region.cast_ray_collect(&down_ray(), &RayCastSettings::default(), &creator, &mut all, &AcceptAllShapeFilter);
    assert_eq!(all.hits.len(), 1);

    assert!(region.cast_ray_walk(&down_ray(), &creator, &mut hit));
}

#[test]
fn test_filter_sees_full_path() {
    struct RejectChild(u32);

    impl ShapeFilter for RejectChild {
        fn should_collide(&self, _shape: &dyn Shape, sub_shape_id: SubShapeId) -> bool {
            sub_shape_id.pop_id(SUB_SHAPE_INDEX_BITS).0 != self.0
        }
    }

    let region = octree_region(vec![
        single_child(),
        IndexedShape::new(Some(cube(0.5)), 8, Vec3::new(1.0, 2.0, -3.0)),
    ]);
    let mut all = AllHitCollector::new();
    region.cast_ray_collect(&down_ray(), &RayCastSettings::default(), &SubShapeIdCreator::new(), &mut all, &RejectChild(CHILD));

    assert_eq!(all.hits.len(), 1);
    assert_eq!(region.sub_shape_index_from_id(all.hits[0].sub_shape_id).0, 8);
}

#[test]
fn test_collide_point() {
    let region = octree_region(vec![single_child()]);
    let creator = SubShapeIdCreator::new();

    let mut inside = AllHitCollector::new();
    region.collide_point(Vec3::new(1.2, 2.0, 3.3), &creator, &mut inside, &AcceptAllShapeFilter);
    assert_eq!(inside.hits.len(), 1);
    assert_eq!(region.sub_shape_index_from_id(inside.hits[0].sub_shape_id).0, CHILD);

    let mut empty_space = AllHitCollector::new();
    region.collide_point(Vec3::new(-5.0, -5.0, -5.0), &creator, &mut empty_space, &AcceptAllShapeFilter);
    assert!(!empty_space.had_hit());
}

#[test]
fn test_collide_with_region_in_both_orders() {
    let region = octree_region(vec![single_child()]);
    let sphere = ball(0.5);
    let dispatch = dispatch();
    let sphere_at = translation(Vec3::new(1.0, 2.0, 3.8));

    let forward = collide(&dispatch, &*sphere, sphere_at, ones(), &*region, Isometry::identity(), ones());
    assert_eq!(forward.len(), 1);
    assert_relative_eq!(forward[0].penetration_depth, 0.2, epsilon = 1.0e-5);
    assert!(forward[0].sub_shape_id1.is_empty());
    assert_eq!(region.sub_shape_index_from_id(forward[0].sub_shape_id2).0, CHILD);

    let backward = collide(&dispatch, &*region, Isometry::identity(), ones(), &*sphere, sphere_at, ones());
    assert_eq!(backward.len(), 1);
    assert_relative_eq!(backward[0].penetration_depth, 0.2, epsilon = 1.0e-5);
    assert_relative_eq!(backward[0].penetration_axis, -forward[0].penetration_axis, epsilon = 1.0e-5);
    assert_eq!(region.sub_shape_index_from_id(backward[0].sub_shape_id1).0, CHILD);
    assert!(backward[0].sub_shape_id2.is_empty());
}

#[test]
fn test_collide_with_scaled_region() {
    let region = octree_region(vec![single_child()]);
    let sphere = ball(0.5);
    let dispatch = dispatch();

    // Scale 2 moves the child to (2, 4, 6) and doubles it
    let hits = collide(
        &dispatch,
        &*sphere,
        translation(Vec3::new(2.0, 4.0, 7.3)),
        ones(),
        &*region,
        Isometry::identity(),
        Vec3::repeat(2.0),
    );
    assert_eq!(hits.len(), 1);
    assert_relative_eq!(hits[0].penetration_depth, 0.2, epsilon = 1.0e-5);
    assert_relative_eq!(hits[0].contact_point_on2, Vec3::new(2.0, 4.0, 7.0), epsilon = 1.0e-5);
}

#[test]
fn test_region_against_region() {
    let a = octree_region(vec![single_child()]);
    let b = octree_region(vec![IndexedShape::new(Some(ball(0.5)), 3, Vec3::zeros())]);
    let dispatch = dispatch();

    // b's sphere sits at (1, 2, 3.8) in a's frame
    let hits = collide(
        &dispatch,
        &*a,
        Isometry::identity(),
        ones(),
        &*b,
        translation(Vec3::new(1.0, 2.0, 3.8)),
        ones(),
    );
    assert_eq!(hits.len(), 1);
    assert_eq!(a.sub_shape_index_from_id(hits[0].sub_shape_id1).0, CHILD);
    assert_eq!(b.sub_shape_index_from_id(hits[0].sub_shape_id2).0, 3);
}

#[test]
fn test_cast_shape_against_region() {
    let region = octree_region(vec![single_child()]);
    let sphere = ball(0.5);
    let dispatch = dispatch();

    let sweep = ShapeCast::new(&*sphere, ones(), translation(Vec3::new(1.0, 2.0, 10.0)), Vec3::new(0.0, 0.0, -10.0));
    let hit = cast(&dispatch, &sweep, &CastTarget::new(&*region, ones(), Isometry::identity())).unwrap();

    assert_relative_eq!(hit.fraction, 0.6, epsilon = 1.0e-4);
    assert_relative_eq!(hit.contact_point_on2, Vec3::new(1.0, 2.0, 3.5), epsilon = 1.0e-4);
    assert_eq!(region.sub_shape_index_from_id(hit.sub_shape_id2).0, CHILD);
}

#[test]
fn test_cast_region_against_shape_names_child_index() {
    let region = octree_region(vec![
        IndexedShape::new(Some(cube(0.5)), 2, Vec3::new(-6.0, -6.0, 3.0)),
        single_child(),
    ]);
    let sphere = ball(0.5);
    let dispatch = dispatch();

    let sweep = ShapeCast::new(&*region, ones(), Isometry::identity(), Vec3::new(0.0, 0.0, -10.0));
    let target = CastTarget::new(&*sphere, ones(), translation(Vec3::new(1.0, 2.0, -3.0)));
    let hit = cast(&dispatch, &sweep, &target).unwrap();

    assert_relative_eq!(hit.fraction, 0.5, epsilon = 1.0e-4);
    assert_eq!(region.sub_shape_index_from_id(hit.sub_shape_id1).0, CHILD);
    assert!(hit.sub_shape_id2.is_empty());
}

#[test]
fn test_soft_body_vertices() {
    let region = octree_region(vec![single_child()]);
    let mut vertices = [
        SoftBodyVertex::new(Vec3::new(1.0, 2.0, 3.2), 1.0),
        SoftBodyVertex::new(Vec3::new(1.0, 2.0, 3.0), 0.0),
    ];

    region.collide_soft_body_vertices(&Isometry::identity(), ones(), &mut vertices, 4);

    assert_eq!(vertices[0].colliding_shape_index, 4);
    assert_relative_eq!(vertices[0].largest_penetration, 0.3, epsilon = 1.0e-5);
    // Pinned vertices are left alone
    assert_eq!(vertices[1].colliding_shape_index, -1);

    let mut none: [SoftBodyVertex; 0] = [];
    region.collide_soft_body_vertices(&Isometry::identity(), ones(), &mut none, 4);
}

#[test]
fn test_queries_outside_region_skip_collector() {
    let collector = Arc::new(TestCollector::with(vec![single_child()]));
    let region = RegionShape::new(collector.clone(), Vec3::repeat(HALF));
    let dispatch = dispatch();
    let creator = SubShapeIdCreator::new();
    let far = Vec3::new(30.0, 0.0, 0.0);

    let mut points = AllHitCollector::new();
    region.collide_point(far, &creator, &mut points, &AcceptAllShapeFilter);

    let outside_ray = RayCast::new(Vec3::new(30.0, 30.0, 30.0), Vec3::new(10.0, 0.0, 0.0));
    let mut hit = RayCastResult::default();
    region.cast_ray_walk(&outside_ray, &creator, &mut hit);
    let mut rays = AllHitCollector::new();
    region.cast_ray_collect_walk(&outside_ray, &RayCastSettings::default(), &creator, &mut rays, &AcceptAllShapeFilter);

    let sphere = ball(1.0);
    collide(&dispatch, &*sphere, translation(far), ones(), &region, Isometry::identity(), ones());
    collide(&dispatch, &region, Isometry::identity(), ones(), &*sphere, translation(far), ones());
    let sweep = ShapeCast::new(&*sphere, ones(), translation(far), Vec3::new(0.0, 10.0, 0.0));
    cast(&dispatch, &sweep, &CastTarget::new(&region, ones(), Isometry::identity()));
    let sweep = ShapeCast::new(&region, ones(), Isometry::identity(), Vec3::new(0.0, 5.0, 0.0));
    cast(&dispatch, &sweep, &CastTarget::new(&*sphere, ones(), translation(far)));

    let mut vertices = [SoftBodyVertex::new(far, 1.0)];
    region.collide_soft_body_vertices(&Isometry::identity(), ones(), &mut vertices, 0);

    let leaves = region.collect_transformed_shapes(
        &Aabb::from_center_extents(far, ones()),
        &Isometry::identity(),
        ones(),
        &creator,
        &AcceptAllShapeFilter,
    );

    assert!(leaves.is_empty());
    assert!(!points.had_hit() && !rays.had_hit());
    assert_eq!(vertices[0].colliding_shape_index, -1);
    assert_eq!(collector.collect_calls(), 0);

    region.collide_point(Vec3::new(1.0, 2.0, 3.0), &creator, &mut points, &AcceptAllShapeFilter);
    assert_eq!(collector.collect_calls(), 1);
    assert!(points.had_hit());
}

#[test]
fn test_children_outside_region_box_are_invisible() {
    // The collector hands out everything, including a child beyond the box
    let collector = Arc::new(TestCollector {
        ignore_bounds: true,
        ..TestCollector::with(vec![IndexedShape::new(Some(cube(0.5)), 1, Vec3::new(12.0, 0.0, 0.0))])
    });
    let region = RegionShape::new(collector.clone(), Vec3::repeat(HALF));

    let mut points = AllHitCollector::new();
    region.collide_point(Vec3::new(12.0, 0.0, 0.0), &SubShapeIdCreator::new(), &mut points, &AcceptAllShapeFilter);

    assert!(!points.had_hit());
    assert_eq!(collector.collect_calls(), 0);
}

#[test]
fn test_material_and_normal_resolution() {
    let material = Arc::new(PhysicsMaterial::new("rock", [120, 110, 100, 255]));
    let rock: Arc<dyn Shape> = BoxShapeSettings::new(Vec3::repeat(0.5))
        .with_material(material.clone())
        .create()
        .unwrap();
    let region = octree_region(vec![IndexedShape::new(Some(rock), CHILD, Vec3::new(1.0, 2.0, 3.0))]);
    let creator = SubShapeIdCreator::new();

    let id = region.sub_shape_id_from_index(CHILD, &creator).id();
    assert!(Arc::ptr_eq(&region.material(id), &material));
    assert_relative_eq!(region.surface_normal(id, Vec3::new(1.5, 2.0, 3.0)), Vec3::x());

    // Unknown children fall back instead of failing
    let missing = region.sub_shape_id_from_index(999, &creator).id();
    assert!(Arc::ptr_eq(&region.material(missing), &PhysicsMaterial::default_material()));
    assert_relative_eq!(region.surface_normal(missing, Vec3::zeros()), Vec3::zeros());
}

#[test]
fn test_sub_shape_path_round_trip() {
    let region = octree_region(Vec::new());
    for index in [0, 1, CHILD, 0x0123_4567, u32::MAX] {
        let creator = region.sub_shape_id_from_index(index, &SubShapeIdCreator::new());
        assert_eq!(creator.num_bits_written(), region.sub_shape_id_bits());

        let (decoded, remainder) = region.sub_shape_index_from_id(creator.id());
        assert_eq!(decoded, index);
        assert!(remainder.is_empty());
    }
}

#[test]
#[should_panic(expected = "sub-shape path overflow")]
fn test_nested_region_overflows_path() {
    let inner: Arc<dyn Shape> = octree_region(vec![single_child()]);
    let outer = RegionShape::new(
        Arc::new(TestCollector::with(vec![IndexedShape::new(Some(inner), 1, Vec3::zeros())])),
        Vec3::repeat(2.0 * HALF),
    );
    let mut hit = RayCastResult::default();
    outer.cast_ray_walk(&down_ray(), &SubShapeIdCreator::new(), &mut hit);
}

#[test]
#[should_panic(expected = "cannot enumerate triangles")]
fn test_collect_triangles_is_unsupported() {
    let region = octree_region(vec![single_child()]);
    let mut triangles = Vec::new();
    region.collect_triangles(&region.local_bounds(), Vec3::zeros(), Quat::identity(), ones(), &mut triangles);
}

#[test]
fn test_collect_transformed_shapes() {
    let region = octree_region(vec![single_child()]);
    let placement = translation(Vec3::new(100.0, 0.0, 0.0));
    let scale = Vec3::repeat(2.0);
    let world_box = Aabb::from_center_extents(Vec3::new(102.0, 4.0, 6.0), ones());

    let leaves = region.collect_transformed_shapes(&world_box, &placement, scale, &SubShapeIdCreator::new(), &AcceptAllShapeFilter);
    assert_eq!(leaves.len(), 1);

    let leaf = &leaves[0];
    assert_relative_eq!(leaf.center_of_mass_transform.translation.vector, Vec3::new(102.0, 4.0, 6.0));
    assert_relative_eq!(leaf.scale, scale);
    assert_eq!(region.sub_shape_index_from_id(leaf.sub_shape_id_creator.id()).0, CHILD);

    let mut hit = RayCastResult::default();
    let ray = RayCast::new(Vec3::new(102.0, 4.0, 20.0), Vec3::new(0.0, 0.0, -20.0));
    assert!(leaf.cast_ray(&ray, &mut hit));
    assert_relative_eq!(hit.fraction, (20.0 - 7.0) / 20.0, epsilon = 1.0e-5);
}

#[test]
fn test_degenerate_aggregates() {
    let region = octree_region(vec![single_child()]);

    assert_eq!(region.sub_type(), ShapeSubType::Region);
    assert_relative_eq!(region.local_bounds().max, Vec3::repeat(HALF));
    assert_relative_eq!(region.inner_radius(), DEFAULT_INNER_RADIUS);
    assert_relative_eq!(region.volume(), 0.0);
    assert_eq!(region.mass_properties(), MassProperties::default());
    assert_eq!(region.stats(), ShapeStats::default());
    assert_eq!(region.sub_shape_id_bits_recursive(), SUB_SHAPE_INDEX_BITS);

    let surface = Plane::new(Vec3::y(), 100.0);
    assert_eq!(region.submerged_volume(&Isometry::identity(), ones(), &surface), SubmergedVolume::default());
}

#[test]
fn test_settings_create_is_idempotent() {
    let collector: Arc<dyn IndexedShapeCollector> = Arc::new(TestCollector::default());
    let settings = RegionShapeSettings::new(collector, Vec3::repeat(HALF));

    let first = settings.create().unwrap();
    let second = settings.create().unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(format!("{settings:?}").contains("created: true"));
}

#[test]
fn test_register_installs_handlers_once() {
    crate::foundation::logging::init_for_tests();
    let mut dispatch = CollisionDispatch::new();
    let collide_before = dispatch.num_collide_handlers();
    let cast_before = dispatch.num_cast_handlers();

    assert!(RegionShape::register(&mut dispatch));
    // Region against each of the three sub types, both orders, (Region, Region) once
    assert_eq!(dispatch.num_collide_handlers(), collide_before + 5);
    assert_eq!(dispatch.num_cast_handlers(), cast_before + 5);
    for sub_type in ShapeSubType::ALL {
        assert!(dispatch.collide_handler(ShapeSubType::Region, sub_type).is_some());
        assert!(dispatch.collide_handler(sub_type, ShapeSubType::Region).is_some());
        assert!(dispatch.cast_handler(ShapeSubType::Region, sub_type).is_some());
        assert!(dispatch.cast_handler(sub_type, ShapeSubType::Region).is_some());
    }

    assert!(!RegionShape::register(&mut dispatch));
    assert_eq!(dispatch.num_collide_handlers(), collide_before + 5);
    assert!(dispatch.is_extension_registered(ShapeSubType::Region));
}

#[test]
fn test_concurrent_queries_share_collector() {
    crate::foundation::logging::init_for_tests();
    let collector = OctreeShapeCollectorBuilder::new(
        Aabb::from_center_extents(Vec3::zeros(), Vec3::repeat(HALF)),
        OctreeConfig::default(),
    )
    .with_shape(IndexedShape::new(Some(cube(0.5)), 1, Vec3::new(-5.0, 0.0, 0.0)))
    .with_shape(IndexedShape::new(Some(cube(0.5)), 2, Vec3::new(5.0, 0.0, 0.0)))
    .build()
    .unwrap();
    let collector: Arc<dyn IndexedShapeCollector> = Arc::new(collector);
    let left = RegionShape::new(collector.clone(), Vec3::repeat(HALF));
    let right = RegionShape::new(collector, Vec3::repeat(HALF));

    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..200 {
                let mut points = AllHitCollector::new();
                left.collide_point(Vec3::new(-5.0, 0.0, 0.0), &SubShapeIdCreator::new(), &mut points, &AcceptAllShapeFilter);
                assert_eq!(points.hits.len(), 1);
                assert_eq!(left.sub_shape_index_from_id(points.hits[0].sub_shape_id).0, 1);
            }
        });
        scope.spawn(|| {
            let ray = RayCast::new(Vec3::new(5.0, 0.0, 20.0), Vec3::new(0.0, 0.0, -40.0));
            for _ in 0..200 {
                let mut hit = RayCastResult::default();
                assert!(right.cast_ray(&ray, &SubShapeIdCreator::new(), &mut hit));
                assert_relative_eq!(hit.fraction, 19.5 / 40.0, epsilon = 1.0e-6);
                assert_eq!(right.sub_shape_index_from_id(hit.sub_shape_id).0, 2);
            }
        });
    });
}

#[test]
fn test_any_hit_stops_after_first_child() {
    let region = overlapping_region();
    let dispatch = dispatch();
    let creator = SubShapeIdCreator::new();
    let inside = Vec3::new(0.1, 0.0, 0.0);
    let ray = RayCast::new(Vec3::new(0.1, 0.0, 5.0), Vec3::new(0.0, 0.0, -10.0));
    let sphere = ball(0.5);

    // Both children are reachable when the sink wants everything
    let filter = CountingFilter::default();
    let mut all = AllHitCollector::new();
    region.collide_point(inside, &creator, &mut all, &filter);
    assert_eq!(all.hits.len(), 2);
    assert_eq!(filter.leaf_tests(), 2);

    let filter = CountingFilter::default();
    let mut any = AnyHitCollector::new();
    region.collide_point(inside, &creator, &mut any, &filter);
    assert!(any.had_hit());
    assert_eq!(filter.leaf_tests(), 1);

    let filter = CountingFilter::default();
    let mut any = AnyHitCollector::new();
    region.cast_ray_collect(&ray, &RayCastSettings::default(), &creator, &mut any, &filter);
    assert!(any.had_hit());
    assert_eq!(filter.leaf_tests(), 1);

    let filter = CountingFilter::default();
    let mut any = AnyHitCollector::new();
    region.cast_ray_collect_walk(&ray, &RayCastSettings::default(), &creator, &mut any, &filter);
    assert!(any.had_hit());
    assert_eq!(filter.leaf_tests(), 1);

    let settings = CollideShapeSettings::default();
    let pair = ShapePair::new(&*sphere, translation(inside), ones(), &region, Isometry::identity(), ones());
    let filter = CountingFilter::default();
    let mut any = AnyHitCollector::new();
    dispatch.collide_shape_vs_shape(&pair, &settings, &mut any, &filter);
    assert!(any.had_hit());
    assert_eq!(filter.leaf_tests(), 1);

    let pair = ShapePair::new(&region, Isometry::identity(), ones(), &*sphere, translation(inside), ones());
    let filter = CountingFilter::default();
    let mut any = AnyHitCollector::new();
    dispatch.collide_shape_vs_shape(&pair, &settings, &mut any, &filter);
    assert!(any.had_hit());
    assert_eq!(filter.leaf_tests(), 1);

    let sweep = ShapeCast::new(&*sphere, ones(), translation(ray.origin), ray.direction);
    let target = CastTarget::new(&region, ones(), Isometry::identity());
    let filter = CountingFilter::default();
    let mut any = AnyHitCollector::new();
    dispatch.cast_shape_vs_shape_world_space(&sweep, &ShapeCastSettings::default(), &target, &mut any, &filter);
    assert!(any.had_hit());
    assert_eq!(filter.leaf_tests(), 1);
}

#[test]
fn test_moving_region_stops_on_sink_early_out() {
    let region = overlapping_region();
    let sphere = ball(0.5);
    let dispatch = dispatch();
    let settings = ShapeCastSettings::default();

    // Both cubes reach the sphere after moving 2 units down
    let sweep = ShapeCast::new(&region, ones(), Isometry::identity(), Vec3::new(0.0, 0.0, -10.0));
    let target = CastTarget::new(&*sphere, ones(), translation(Vec3::new(0.1, 0.0, -3.0)));

    let filter = CountingFilter::default();
    let mut all = AllHitCollector::new();
    dispatch.cast_shape_vs_shape_world_space(&sweep, &settings, &target, &mut all, &filter);
    assert_eq!(all.hits.len(), 2);
    assert_eq!(filter.leaf_tests(), 2);

    let filter = CountingFilter::default();
    let mut any = AnyHitCollector::new();
    dispatch.cast_shape_vs_shape_world_space(&sweep, &settings, &target, &mut any, &filter);
    let hit = any.hit.unwrap();
    assert_relative_eq!(hit.fraction, 0.2, epsilon = 1.0e-4);
    assert_eq!(region.sub_shape_index_from_id(hit.sub_shape_id1).0, 1);
    assert_eq!(filter.leaf_tests(), 1);
}

#[test]
fn test_ray_walk_stops_at_zero_fraction() {
    let region = overlapping_region();
    let creator = SubShapeIdCreator::new();

    // Entering from above, both children can still improve the hit
    let from_above = RayCast::new(Vec3::new(0.1, 0.0, 5.0), Vec3::new(0.0, 0.0, -10.0));
    let mut hit = RayCastResult::default();
    let mut walk = CountingVisitor {
        inner: CastRayVisitor::new(&region, &from_above, &creator, &mut hit),
        visits: 0,
    };
    region.walk_sub_shapes(&mut walk);
    assert!(walk.inner.return_value());
    assert_eq!(walk.visits, 2);
    assert_relative_eq!(hit.fraction, 0.45, epsilon = 1.0e-5);

    // Starting inside the first child ends the walk there
    let from_inside = RayCast::new(Vec3::new(0.1, 0.0, 0.0), Vec3::new(0.0, 0.0, 5.0));
    let mut hit = RayCastResult::default();
    let mut walk = CountingVisitor {
        inner: CastRayVisitor::new(&region, &from_inside, &creator, &mut hit),
        visits: 0,
    };
    region.walk_sub_shapes(&mut walk);
    assert!(walk.inner.return_value());
    assert_eq!(walk.visits, 1);
    assert_relative_eq!(hit.fraction, 0.0);
    assert_eq!(region.sub_shape_index_from_id(hit.sub_shape_id).0, 1);

    let mut hit = RayCastResult::default();
    assert!(region.cast_ray_walk(&from_inside, &creator, &mut hit));
    assert_relative_eq!(hit.fraction, 0.0);
}
