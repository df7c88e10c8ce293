//! # Region Shape
//!
//! A sparse compound collision shape whose children are never stored up
//! front. Every query asks an [`IndexedShapeCollector`](spatial::IndexedShapeCollector)
//! for the children overlapping the region it touches, then recurses into
//! them through the ordinary shape-vs-shape machinery.
//!
//! ## Features
//!
//! - **Sparse children**: chunked grids, trees or procedural generators can
//!   back the shape through four collector operations
//! - **Full shape surface**: ray casts, point tests, shape overlap, swept casts,
//!   soft-body vertices, material and normal lookup
//! - **Symmetric dispatch**: registers (region, any) and (any, region) handlers
//!   into an explicit [`CollisionDispatch`](physics::collision::CollisionDispatch)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use region_shape::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bounds = Aabb::new(Vec3::new(-16.0, -16.0, -16.0), Vec3::new(16.0, 16.0, 16.0));
//!     let child: Arc<dyn Shape> = BoxShapeSettings::new(Vec3::new(0.5, 0.5, 0.5)).create()?;
//!     let collector = OctreeShapeCollectorBuilder::new(bounds, OctreeConfig::default())
//!         .with_shape(IndexedShape::new(Some(child), 7, Vec3::new(1.0, 2.0, 3.0)))
//!         .build()?;
//!
//!     let region = RegionShapeSettings::new(Arc::new(collector), Vec3::new(16.0, 16.0, 16.0)).create()?;
//!
//!     let mut dispatch = CollisionDispatch::new();
//!     RegionShape::register(&mut dispatch);
//!
//!     let ray = RayCast::new(Vec3::new(1.0, 2.0, 100.0), Vec3::new(0.0, 0.0, -200.0));
//!     let mut hit = RayCastResult::default();
//!     if region.cast_ray(&ray, &SubShapeIdCreator::default(), &mut hit) {
//!         println!("hit child {}", region.sub_shape_index_from_id(hit.sub_shape_id).0);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod physics;
pub mod region;
pub mod spatial;

/// Common imports for crate users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, QuerySettings},
        foundation::math::{Isometry, Quat, Vec3},
        physics::collision::{
            Aabb, AllHitCollector, AnyHitCollector, BoxShape, BoxShapeSettings,
            ClosestHitCollector, CollideShapeResult, CollideShapeSettings, CollidePointResult,
            CollisionCollector, CollisionDispatch, RayCast, RayCastResult, RayCastSettings,
            Shape, ShapeCast, ShapeCastResult, ShapeCastSettings, ShapeSettings, ShapeSubType,
            SphereShape, SphereShapeSettings, SubShapeId, SubShapeIdCreator,
        },
        region::{RegionShape, RegionShapeSettings},
        spatial::{
            IndexedShape, IndexedShapeCollector, OctreeConfig, OctreeShapeCollector,
            OctreeShapeCollectorBuilder,
        },
    };
}
