//! Region shape demo
//!
//! Scatters boxes and spheres over a sparse grid, wraps them in a region
//! shape and runs every query family against it. Pass a `.toml` or `.ron`
//! file to override the defaults.

use std::collections::HashSet;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use region_shape::config::ConfigFormat;
use region_shape::foundation::logging;
use region_shape::foundation::math::translation;
use region_shape::physics::collision::{AcceptAllShapeFilter, CastTarget, ShapePair, SoftBodyVertex};
use region_shape::prelude::*;
use region_shape::spatial::{pack_grid_index, unpack_grid_index, GRID_AXIS_CELLS};

/// Demo settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct DemoConfig {
    /// Seed for the child scatter
    seed: u64,
    /// Number of children to try to place
    child_count: usize,
    /// Half extent of the region, one grid cell per unit
    half_extent: f32,
    /// Spatial index tuning
    octree: OctreeConfig,
    /// Query defaults
    queries: QuerySettings,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            child_count: 256,
            half_extent: 32.0,
            octree: OctreeConfig::default(),
            queries: QuerySettings::default(),
        }
    }
}

impl Config for DemoConfig {}

/// Children placed by the scatter, with the collector indexing them
struct Scene {
    collector: OctreeShapeCollector,
    placed: Vec<(u32, Vec3)>,
}

fn scatter(config: &DemoConfig, rng: &mut StdRng) -> Result<Scene, Box<dyn std::error::Error>> {
    let half = Vec3::repeat(config.half_extent);
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let cells = ((2.0 * config.half_extent) as u32).clamp(1, GRID_AXIS_CELLS);

    let cube: Arc<dyn Shape> = BoxShapeSettings::new(Vec3::repeat(0.4)).create()?;
    let ball: Arc<dyn Shape> = SphereShapeSettings::new(0.45).create()?;

    let mut builder = OctreeShapeCollectorBuilder::new(Aabb::new(-half, half), config.octree.clone());
    let mut used = HashSet::new();
    let mut placed = Vec::with_capacity(config.child_count);

    for _ in 0..config.child_count {
        let index = pack_grid_index(rng.gen_range(0..cells), rng.gen_range(0..cells), rng.gen_range(0..cells))?;
        if !used.insert(index) {
            continue;
        }
        let shape = if rng.gen_bool(0.5) { cube.clone() } else { ball.clone() };
        let child = IndexedShape::from_grid_index(Some(shape), index, half);
        placed.push((index, child.position_com()));
        builder.add_shape(child);
    }

    Ok(Scene {
        collector: builder.build()?,
        placed,
    })
}

fn describe(index: u32) -> String {
    let (x, y, z) = unpack_grid_index(index);
    format!("#{index} at cell ({x}, {y}, {z})")
}

fn run_queries(config: &DemoConfig, placed: &[(u32, Vec3)], region: &RegionShape, rng: &mut StdRng) {
    let mut dispatch = CollisionDispatch::new();
    RegionShape::register(&mut dispatch);

    let creator = SubShapeIdCreator::new();
    let filter = AcceptAllShapeFilter;
    let Some(&(target_index, target)) = placed.first() else {
        log::warn!("No children placed, nothing to query");
        return;
    };
    log::info!("Probing child {}", describe(target_index));

    // Single-hit ray straight down onto the target column
    let height = config.half_extent + 10.0;
    let ray = RayCast::new(Vec3::new(target.x, target.y, height), Vec3::new(0.0, 0.0, -2.0 * height));
    let mut hit = RayCastResult::default();
    if region.cast_ray(&ray, &creator, &mut hit) {
        let (index, _) = region.sub_shape_index_from_id(hit.sub_shape_id);
        log::info!("Ray hit {} at fraction {:.4}", describe(index), hit.fraction);
    } else {
        log::info!("Ray missed");
    }

    // Every hit along the region's diagonal
    let diagonal = RayCast::new(Vec3::repeat(-height), Vec3::repeat(2.0 * height));
    let mut hits = AllHitCollector::new();
    region.cast_ray_collect(&diagonal, &config.queries.ray_cast, &creator, &mut hits, &filter);
    hits.sort();
    log::info!("Diagonal ray crossed {} children", hits.hits.len());

    let mut points = AllHitCollector::new();
    region.collide_point(target, &creator, &mut points, &filter);
    log::info!("Point at target center is inside {} children", points.hits.len());

    let probe: Arc<dyn Shape> = match SphereShapeSettings::new(1.5).create() {
        Ok(probe) => probe,
        Err(e) => {
            log::error!("Failed to create probe: {}", e);
            return;
        }
    };
    let ones = Vec3::repeat(1.0);

    let pair = ShapePair::new(&*probe, translation(target), ones, region, Isometry::identity(), ones);
    let mut contacts = AllHitCollector::new();
    dispatch.collide_shape_vs_shape(&pair, &config.queries.collide_shape, &mut contacts, &filter);
    let deepest = contacts
        .hits
        .iter()
        .map(|c| c.penetration_depth)
        .fold(f32::MIN, f32::max);
    log::info!("Probe overlaps {} children, deepest {:.3}", contacts.hits.len(), deepest);

    let sweep = ShapeCast::new(&*probe, ones, translation(Vec3::new(target.x, target.y, height)), Vec3::new(0.0, 0.0, -2.0 * height));
    let mut first = ClosestHitCollector::new();
    dispatch.cast_shape_vs_shape_world_space(
        &sweep,
        &config.queries.shape_cast,
        &CastTarget::new(region, ones, Isometry::identity()),
        &mut first,
        &filter,
    );
    match first.hit {
        Some(hit) => {
            let (index, _) = region.sub_shape_index_from_id(hit.sub_shape_id2);
            log::info!("Probe sweep first touches {} at fraction {:.4}", describe(index), hit.fraction);
        }
        None => log::info!("Probe sweep hit nothing"),
    }

    let mut cloth: Vec<SoftBodyVertex> = (0..16)
        .map(|_| {
            let jitter = Vec3::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
            SoftBodyVertex::new(target + jitter, 1.0)
        })
        .collect();
    region.collide_soft_body_vertices(&Isometry::identity(), ones, &mut cloth, 0);
    let touching = cloth.iter().filter(|v| v.largest_penetration > 0.0).count();
    log::info!("{} of {} soft-body vertices penetrate a child", touching, cloth.len());

    let window = Aabb::from_center_extents(target, Vec3::repeat(2.0));
    let leaves = region.collect_transformed_shapes(&window, &Isometry::identity(), ones, &creator, &filter);
    log::info!("{} leaves resolved around the target", leaves.len());
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config = match std::env::args().nth(1) {
        Some(path) => DemoConfig::load_from_file(path)?,
        None => DemoConfig::default(),
    };
    log::debug!("Demo configuration:\n{}", config.render(ConfigFormat::Toml)?);

    let mut rng = StdRng::seed_from_u64(config.seed);
    let scene = scatter(&config, &mut rng)?;
    log::info!(
        "Indexed {} children in a region of half extent {}",
        scene.collector.len(),
        config.half_extent
    );

    let region = RegionShapeSettings::new(Arc::new(scene.collector), Vec3::repeat(config.half_extent)).create()?;
    run_queries(&config, &scene.placed, &region, &mut rng);

    Ok(())
}
