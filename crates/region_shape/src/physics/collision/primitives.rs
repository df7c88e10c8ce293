//! Primitive geometry used by collision queries
//!
//! Provides axis-aligned boxes, ray segments, planes and triangles with the
//! handful of intersection helpers the shape queries need.

use crate::foundation::math::{Isometry, Point3, Vec3};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner of the bounding box
    pub min: Vec3,
    /// Maximum corner of the bounding box
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max points
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Create an AABB centered at a point with given extents
    pub fn from_center_extents(center: Vec3, extents: Vec3) -> Self {
        Self {
            min: center - extents,
            max: center + extents,
        }
    }

    /// Smallest box enclosing all `points`, `None` when there are none
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vec3>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        Some(points.fold(Self::new(first, first), |bounds, p| {
            Self::new(bounds.min.inf(&p), bounds.max.sup(&p))
        }))
    }

    /// Get the center of the AABB
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get the extents (half-size) of the AABB
    pub fn extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// True when min <= max on every axis
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Check if this AABB contains a point
    pub fn contains_point(&self, point: Vec3) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y &&
        point.z >= self.min.z && point.z <= self.max.z
    }

    /// Check if this AABB overlaps another AABB (touching counts)
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Box scaled per axis about the origin; negative scales stay well-formed
    pub fn scaled(&self, scale: Vec3) -> Self {
        let a = self.min.component_mul(&scale);
        let b = self.max.component_mul(&scale);
        Self::new(a.inf(&b), a.sup(&b))
    }

    /// Box enclosing this box after a rigid transform
    pub fn transformed(&self, transform: &Isometry) -> Self {
        let center = transform.transform_point(&Point3::from(self.center())).coords;
        let abs_rotation = transform.rotation.to_rotation_matrix().matrix().abs();
        Self::from_center_extents(center, abs_rotation * self.extents())
    }

    /// Box grown by `amount` on every side
    pub fn expanded_by(&self, amount: Vec3) -> Self {
        Self::new(self.min - amount, self.max + amount)
    }

    /// Box moved by `offset`
    pub fn translated(&self, offset: Vec3) -> Self {
        Self::new(self.min + offset, self.max + offset)
    }

    /// Smallest box enclosing both boxes
    pub fn union(&self, other: &Aabb) -> Self {
        Self::new(self.min.inf(&other.min), self.max.sup(&other.max))
    }

    /// Overlapping region of both boxes; invalid when they are disjoint
    pub fn intersection(&self, other: &Aabb) -> Self {
        Self::new(self.min.sup(&other.min), self.max.inf(&other.max))
    }

    /// Closest point inside the box
    pub fn closest_point(&self, point: Vec3) -> Vec3 {
        point.sup(&self.min).inf(&self.max)
    }

    /// Test ray intersection with this AABB using slab method
    ///
    /// `ray_dir` need not be normalized; the returned parameter is in units of
    /// `ray_dir`. Returns the entry parameter (0 if the origin is inside), or
    /// `None` if the infinite ray misses or the box is behind it.
    pub fn intersect_ray(&self, ray_origin: Vec3, ray_dir: Vec3) -> Option<f32> {
        let mut t_enter = f32::NEG_INFINITY;
        let mut t_exit = f32::INFINITY;

        for axis in 0..3 {
            let origin = ray_origin[axis];
            let dir = ray_dir[axis];
            if dir.abs() < f32::EPSILON * f32::EPSILON {
                // Parallel to this slab: must start inside it
                if origin < self.min[axis] || origin > self.max[axis] {
                    return None;
                }
                continue;
            }

            let inv = 1.0 / dir;
            let t1 = (self.min[axis] - origin) * inv;
            let t2 = (self.max[axis] - origin) * inv;
            t_enter = t_enter.max(t1.min(t2));
            t_exit = t_exit.min(t1.max(t2));
        }

        if t_exit >= t_enter && t_exit >= 0.0 {
            Some(t_enter.max(0.0))
        } else {
            None
        }
    }

    /// Entry fraction of a ray segment, `None` if the segment misses the box
    pub fn ray_fraction(&self, ray: &RayCast) -> Option<f32> {
        self.intersect_ray(ray.origin, ray.direction)
            .filter(|&fraction| fraction <= 1.0)
    }
}

/// A ray segment: `origin + fraction * direction` with `fraction` in `[0, 1]`
///
/// The length of `direction` is the length of the ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCast {
    /// Start of the ray
    pub origin: Vec3,
    /// Direction and length of the ray
    pub direction: Vec3,
}

impl RayCast {
    /// Creates a new ray segment
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Get the point at `fraction` along the ray
    pub fn point_at(&self, fraction: f32) -> Vec3 {
        self.origin + self.direction * fraction
    }

    /// Ray expressed in another frame
    pub fn transformed(&self, transform: &Isometry) -> Self {
        Self {
            origin: transform.transform_point(&Point3::from(self.origin)).coords,
            direction: transform.transform_vector(&self.direction),
        }
    }

    /// Bounding box of the segment
    pub fn bounds(&self) -> Aabb {
        let end = self.origin + self.direction;
        Aabb::new(self.origin.inf(&end), self.origin.sup(&end))
    }
}

/// Plane defined by normal and distance: `normal · x + distance = 0`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    /// Normal vector (should be normalized)
    pub normal: Vec3,
    /// Signed offset from the origin
    pub distance: f32,
}

impl Plane {
    /// Creates a new plane
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Plane through `point` with the given normal
    pub fn from_point_and_normal(point: Vec3, normal: Vec3) -> Self {
        Self {
            normal,
            distance: -normal.dot(&point),
        }
    }

    /// Signed distance from the plane to `point` (positive on the normal side)
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(&point) + self.distance
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self::new(Vec3::y(), 0.0)
    }
}

/// A triangle produced by leaf geometry enumeration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triangle {
    /// First vertex
    pub v0: Vec3,
    /// Second vertex
    pub v1: Vec3,
    /// Third vertex
    pub v2: Vec3,
}

impl Triangle {
    /// Creates a new triangle
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        Self { v0, v1, v2 }
    }

    /// Calculates the normal of the triangle (right-hand rule)
    pub fn normal(&self) -> Vec3 {
        let edge1 = self.v1 - self.v0;
        let edge2 = self.v2 - self.v0;
        edge1.cross(&edge2).normalize()
    }

    /// Calculates the centroid (center point) of the triangle
    pub fn centroid(&self) -> Vec3 {
        (self.v0 + self.v1 + self.v2) / 3.0
    }

    /// Bounding box of the three vertices
    pub fn bounds(&self) -> Aabb {
        Aabb::new(
            self.v0.inf(&self.v1).inf(&self.v2),
            self.v0.sup(&self.v1).sup(&self.v2),
        )
    }
}
