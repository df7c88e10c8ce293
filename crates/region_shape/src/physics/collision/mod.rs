//! Collision model
//!
//! Shapes live in center-of-mass space and are placed in the world by an
//! [`Isometry`](crate::foundation::math::Isometry) plus a per-axis scale
//! supplied at query time.
//!
//! # Module Organization
//!
//! - [`primitives`] - Boxes, ray segments, planes and triangles
//! - [`sub_shape_id`] - Bit-packed paths locating a leaf inside compounds
//! - [`collector`] - Query results and result sinks
//! - [`shape`] - The [`Shape`] contract and its settings types
//! - [`convex`] - Sphere and box leaves
//! - [`dispatch`] - Pairwise handler registry
//! - [`narrow_phase`] - Handlers for the convex leaves

pub mod collector;
pub mod convex;
pub mod dispatch;
pub mod narrow_phase;
pub mod primitives;
pub mod shape;
pub mod sub_shape_id;

// Re-export commonly used types
pub use collector::{
    AllHitCollector, AnyHitCollector, ClosestHitCollector, CollidePointResult, CollideShapeResult,
    CollisionCollector, HitFraction, RayCastResult, ShapeCastResult,
};
pub use convex::{BoxShape, BoxShapeSettings, SphereShape, SphereShapeSettings};
pub use dispatch::{downcast_shape, CastShapeFn, CastTarget, CollideShapeFn, CollisionDispatch, ShapePair};
pub use primitives::{Aabb, Plane, RayCast, Triangle};
pub use shape::{
    AcceptAllShapeFilter, CollideShapeSettings, MassProperties, PhysicsMaterial, RayCastSettings,
    Shape, ShapeCast, ShapeCastSettings, ShapeError, ShapeFilter, ShapeResult, ShapeSettings,
    ShapeStats, ShapeSubType, SoftBodyVertex, SubmergedVolume, TransformedShape,
};
pub use sub_shape_id::{SubShapeId, SubShapeIdCreator, MAX_SUB_SHAPE_ID_BITS};
