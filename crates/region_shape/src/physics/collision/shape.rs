//! Collision shape contract
//!
//! Shapes live in their own center-of-mass space. Queries hand them rays and
//! points already expressed in that space; overlap and cast queries pass the
//! center-of-mass transform and a per-axis scale alongside the shape.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

use serde::{Deserialize, Serialize};

use crate::foundation::math::{reciprocal, Isometry, Mat3, Quat, Vec3};

use super::collector::{CollidePointResult, CollisionCollector, RayCastResult};
use super::primitives::{Aabb, Plane, RayCast, Triangle};
use super::sub_shape_id::{SubShapeId, SubShapeIdCreator};

/// Concrete shape kinds known to the collision dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShapeSubType {
    /// [`SphereShape`](super::SphereShape)
    Sphere,
    /// [`BoxShape`](super::BoxShape)
    Box,
    /// [`RegionShape`](crate::region::RegionShape)
    Region,
}

impl ShapeSubType {
    /// Every sub type, in registration order
    pub const ALL: [Self; 3] = [Self::Sphere, Self::Box, Self::Region];
}

impl fmt::Display for ShapeSubType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sphere => "Sphere",
            Self::Box => "Box",
            Self::Region => "Region",
        };
        f.write_str(name)
    }
}

/// Surface material attached to leaf shapes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhysicsMaterial {
    /// Display name
    pub name: String,
    /// RGBA debug color
    pub color: [u8; 4],
}

impl PhysicsMaterial {
    /// Creates a new material
    pub fn new(name: impl Into<String>, color: [u8; 4]) -> Self {
        Self {
            name: name.into(),
            color,
        }
    }

    /// Material shared by every shape without one of its own
    pub fn default_material() -> Arc<Self> {
        static DEFAULT: OnceLock<Arc<PhysicsMaterial>> = OnceLock::new();
        DEFAULT
            .get_or_init(|| Arc::new(Self::new("Default", [128, 128, 128, 255])))
            .clone()
    }
}

/// Mass and inertia about the center of mass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProperties {
    /// Mass in kg
    pub mass: f32,
    /// Inertia tensor
    pub inertia: Mat3,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self {
            mass: 0.0,
            inertia: Mat3::zeros(),
        }
    }
}

/// Memory and geometry statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShapeStats {
    /// Approximate heap + inline size
    pub size_bytes: usize,
    /// Triangles the shape would produce
    pub num_triangles: u32,
}

/// Buoyancy query output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubmergedVolume {
    /// Total volume of the shape
    pub total_volume: f32,
    /// Volume below the surface plane
    pub submerged_volume: f32,
    /// Centroid of the submerged part, in world space
    pub center_of_buoyancy: Vec3,
}

impl Default for SubmergedVolume {
    fn default() -> Self {
        Self {
            total_volume: 0.0,
            submerged_volume: 0.0,
            center_of_buoyancy: Vec3::zeros(),
        }
    }
}

/// Soft-body particle tested against rigid shapes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoftBodyVertex {
    /// World-space position
    pub position: Vec3,
    /// Inverse mass; zero marks a pinned vertex that is skipped
    pub inv_mass: f32,
    /// Closest contact plane found so far, in world space
    pub collision_plane: Plane,
    /// Penetration of that plane, `-f32::MAX` when none was found
    pub largest_penetration: f32,
    /// Index of the shape that produced the plane, `-1` when none
    pub colliding_shape_index: i32,
}

impl SoftBodyVertex {
    /// Vertex at `position` with no contact yet
    pub fn new(position: Vec3, inv_mass: f32) -> Self {
        Self {
            position,
            inv_mass,
            collision_plane: Plane::default(),
            largest_penetration: -f32::MAX,
            colliding_shape_index: -1,
        }
    }

    /// Keep `plane` if it penetrates deeper than the current one
    pub fn update_contact(&mut self, plane: Plane, penetration: f32, colliding_shape_index: i32) {
        if penetration > self.largest_penetration {
            self.collision_plane = plane;
            self.largest_penetration = penetration;
            self.colliding_shape_index = colliding_shape_index;
        }
    }
}

/// Settings for multi-hit ray casts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RayCastSettings {
    /// Report a hit at fraction 0 when the ray starts inside a convex shape
    pub treat_convex_as_solid: bool,
}

impl Default for RayCastSettings {
    fn default() -> Self {
        Self {
            treat_convex_as_solid: true,
        }
    }
}

/// Settings for shape overlap queries
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CollideShapeSettings {
    /// Shapes closer than this are reported with a negative penetration depth
    pub max_separation_distance: f32,
}

/// Settings for swept shape casts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapeCastSettings {
    /// Report the deepest point instead of the first contact when starting in overlap
    pub return_deepest_point: bool,
}

/// A shape moving along `direction` from `center_of_mass_start`
#[derive(Clone, Copy)]
pub struct ShapeCast<'a> {
    /// Moving shape
    pub shape: &'a dyn Shape,
    /// Scale of the moving shape
    pub scale: Vec3,
    /// Start transform of the moving shape's center of mass
    pub center_of_mass_start: Isometry,
    /// Translation over the full cast
    pub direction: Vec3,
    /// Bounds of the shape at its start transform
    pub shape_world_bounds: Aabb,
}

impl<'a> ShapeCast<'a> {
    /// Creates a cast and computes the start bounds
    pub fn new(shape: &'a dyn Shape, scale: Vec3, center_of_mass_start: Isometry, direction: Vec3) -> Self {
        Self {
            shape,
            scale,
            center_of_mass_start,
            direction,
            shape_world_bounds: shape.world_space_bounds(&center_of_mass_start, scale),
        }
    }

    /// Same cast expressed in another frame
    pub fn post_transformed(&self, transform: &Isometry) -> Self {
        Self::new(
            self.shape,
            self.scale,
            transform * self.center_of_mass_start,
            transform.transform_vector(&self.direction),
        )
    }

    /// Bounds covering the start and end of the cast
    pub fn swept_bounds(&self) -> Aabb {
        self.shape_world_bounds
            .union(&self.shape_world_bounds.translated(self.direction))
    }
}

impl fmt::Debug for ShapeCast<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapeCast")
            .field("shape", &self.shape.sub_type())
            .field("scale", &self.scale)
            .field("center_of_mass_start", &self.center_of_mass_start)
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

/// Decides which leaf shapes take part in a query
pub trait ShapeFilter: Send + Sync {
    /// Filter a single shape
    fn should_collide(&self, _shape: &dyn Shape, _sub_shape_id: SubShapeId) -> bool {
        true
    }

    /// Filter a pair of shapes before they are tested against each other
    fn should_collide_pair(
        &self,
        _shape1: &dyn Shape,
        _sub_shape_id1: SubShapeId,
        _shape2: &dyn Shape,
        _sub_shape_id2: SubShapeId,
    ) -> bool {
        true
    }
}

/// Filter that accepts everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllShapeFilter;

impl ShapeFilter for AcceptAllShapeFilter {}

/// A leaf shape resolved to world space
#[derive(Debug, Clone)]
pub struct TransformedShape {
    /// The leaf shape
    pub shape: Arc<dyn Shape>,
    /// World transform of the leaf's center of mass
    pub center_of_mass_transform: Isometry,
    /// Scale of the leaf
    pub scale: Vec3,
    /// Path from the root shape to this leaf
    pub sub_shape_id_creator: SubShapeIdCreator,
}

impl TransformedShape {
    /// World-space bounds of the leaf
    pub fn world_space_bounds(&self) -> Aabb {
        self.shape
            .world_space_bounds(&self.center_of_mass_transform, self.scale)
    }

    /// Cast a world-space ray against the leaf
    pub fn cast_ray(&self, ray: &RayCast, hit: &mut RayCastResult) -> bool {
        let local = ray.transformed(&self.center_of_mass_transform.inverse());
        // Fractions survive the unscale since origin and direction shrink together
        let inv_scale = reciprocal(self.scale);
        let unscaled = RayCast::new(local.origin.component_mul(&inv_scale), local.direction.component_mul(&inv_scale));
        self.shape.cast_ray(&unscaled, &self.sub_shape_id_creator, hit)
    }
}

/// Errors raised while building shapes
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    /// Sphere radius must be positive and finite
    #[error("invalid sphere radius: {0}")]
    InvalidRadius(f32),

    /// Box half extents must be positive and finite
    #[error("invalid box half extent: ({x}, {y}, {z})")]
    InvalidHalfExtent {
        /// X component
        x: f32,
        /// Y component
        y: f32,
        /// Z component
        z: f32,
    },

    /// Density must be positive and finite
    #[error("invalid density: {0}")]
    InvalidDensity(f32),
}

/// Result of building a shape from its settings
pub type ShapeResult<S> = Result<Arc<S>, ShapeError>;

/// Settings object that builds a shape
pub trait ShapeSettings {
    /// Shape produced by these settings
    type Shape: Shape;

    /// Build the shape
    fn create(&self) -> ShapeResult<Self::Shape>;
}

/// Queryable collision shape
pub trait Shape: Any + Send + Sync + fmt::Debug {
    /// Concrete kind, used as the dispatch key
    fn sub_type(&self) -> ShapeSubType;

    /// Bounds in center-of-mass space
    fn local_bounds(&self) -> Aabb;

    /// Bounds after applying scale then the center-of-mass transform
    fn world_space_bounds(&self, center_of_mass_transform: &Isometry, scale: Vec3) -> Aabb {
        self.local_bounds().scaled(scale).transformed(center_of_mass_transform)
    }

    /// Radius of the biggest sphere that fits entirely inside the shape
    fn inner_radius(&self) -> f32;

    /// Mass and inertia
    fn mass_properties(&self) -> MassProperties;

    /// Volume of the shape
    fn volume(&self) -> f32;

    /// Volume below `surface` (normal pointing out of the fluid)
    fn submerged_volume(&self, _center_of_mass_transform: &Isometry, _scale: Vec3, _surface: &Plane) -> SubmergedVolume {
        SubmergedVolume::default()
    }

    /// Memory and geometry statistics
    fn stats(&self) -> ShapeStats;

    /// Bits this shape and its descendants need in a sub-shape path
    fn sub_shape_id_bits_recursive(&self) -> u32 {
        0
    }

    /// Material of the leaf addressed by `sub_shape_id`
    fn material(&self, sub_shape_id: SubShapeId) -> Arc<PhysicsMaterial>;

    /// Outward surface normal at `local_surface_position`
    fn surface_normal(&self, sub_shape_id: SubShapeId, local_surface_position: Vec3) -> Vec3;

    /// First hit along `ray`
    ///
    /// Updates `hit` and returns true only when the hit is closer than
    /// `hit.fraction`.
    fn cast_ray(&self, ray: &RayCast, creator: &SubShapeIdCreator, hit: &mut RayCastResult) -> bool;

    /// Every hit along `ray`, reported into `collector`
    fn cast_ray_collect(
        &self,
        ray: &RayCast,
        settings: &RayCastSettings,
        creator: &SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<RayCastResult>,
        filter: &dyn ShapeFilter,
    );

    /// Report a hit when `point` lies inside the shape
    fn collide_point(
        &self,
        point: Vec3,
        creator: &SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<CollidePointResult>,
        filter: &dyn ShapeFilter,
    );

    /// Update each vertex with its deepest contact plane against this shape
    fn collide_soft_body_vertices(
        &self,
        center_of_mass_transform: &Isometry,
        scale: Vec3,
        vertices: &mut [SoftBodyVertex],
        colliding_shape_index: i32,
    );

    /// Append the triangles of this shape that touch `bounds`
    fn collect_triangles(
        &self,
        bounds: &Aabb,
        position_com: Vec3,
        rotation: Quat,
        scale: Vec3,
        triangles: &mut Vec<Triangle>,
    );

    /// Downcasting support for dispatch handlers
    fn as_any(&self) -> &dyn Any;
}
