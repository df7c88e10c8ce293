//! Convex leaf shapes
//!
//! Spheres and boxes, centered on their center of mass. Both answer every
//! query of the [`Shape`] contract directly from their analytic geometry.

use std::any::Any;
use std::f32::consts::PI;
use std::sync::Arc;

use crate::foundation::math::{normalize_or, uniform_scale, Isometry, Mat3, Point3, Quat, Vec3};

use super::collector::{CollidePointResult, CollisionCollector, RayCastResult};
use super::primitives::{Aabb, Plane, RayCast, Triangle};
use super::shape::{
    MassProperties, PhysicsMaterial, RayCastSettings, Shape, ShapeError, ShapeFilter, ShapeResult,
    ShapeSettings, ShapeStats, ShapeSubType, SoftBodyVertex, SubmergedVolume,
};
use super::sub_shape_id::{SubShapeId, SubShapeIdCreator};

/// Default density in kg/m^3
pub const DEFAULT_DENSITY: f32 = 1000.0;

fn validate_density(density: f32) -> Result<(), ShapeError> {
    if density.is_finite() && density > 0.0 {
        Ok(())
    } else {
        Err(ShapeError::InvalidDensity(density))
    }
}

/// Entry and exit fractions of a ray against a sphere at the origin
///
/// `None` when the infinite line misses the sphere.
fn ray_sphere_interval(origin: Vec3, direction: Vec3, radius: f32) -> Option<(f32, f32)> {
    let a = direction.norm_squared();
    let b = origin.dot(&direction);
    let c = origin.norm_squared() - radius * radius;
    if a <= f32::EPSILON * f32::EPSILON {
        return (c <= 0.0).then_some((0.0, 0.0));
    }
    let discriminant = b * b - a * c;
    if discriminant < 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    Some(((-b - root) / a, (-b + root) / a))
}

/// Entry fraction of a ray segment against a sphere at the origin
///
/// Returns 0 when the origin is inside, `None` when the segment misses.
pub(crate) fn ray_sphere_fraction(origin: Vec3, direction: Vec3, radius: f32) -> Option<f32> {
    let (enter, exit) = ray_sphere_interval(origin, direction, radius)?;
    if exit < 0.0 || enter > 1.0 {
        return None;
    }
    Some(enter.max(0.0))
}

/// Places local-space triangles in world space and keeps those touching `bounds`
fn emit_triangles(
    local: &[[Vec3; 3]],
    bounds: &Aabb,
    position_com: Vec3,
    rotation: Quat,
    scale: Vec3,
    triangles: &mut Vec<Triangle>,
) {
    let place = |v: Vec3| position_com + rotation * v.component_mul(&scale);
    triangles.extend(
        local
            .iter()
            .map(|[a, b, c]| Triangle::new(place(*a), place(*b), place(*c)))
            .filter(|triangle| triangle.bounds().overlaps(bounds)),
    );
}

/// Settings for [`SphereShape`]
#[derive(Debug, Clone)]
pub struct SphereShapeSettings {
    /// Radius of the sphere
    pub radius: f32,
    /// Surface material, default material when `None`
    pub material: Option<Arc<PhysicsMaterial>>,
    /// Density used for mass properties
    pub density: f32,
}

impl SphereShapeSettings {
    /// Settings for a sphere of `radius`
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            material: None,
            density: DEFAULT_DENSITY,
        }
    }

    /// Attach a material
    #[must_use]
    pub fn with_material(mut self, material: Arc<PhysicsMaterial>) -> Self {
        self.material = Some(material);
        self
    }
}

impl ShapeSettings for SphereShapeSettings {
    type Shape = SphereShape;

    fn create(&self) -> ShapeResult<SphereShape> {
        if !(self.radius.is_finite() && self.radius > 0.0) {
            return Err(ShapeError::InvalidRadius(self.radius));
        }
        validate_density(self.density)?;
        Ok(Arc::new(SphereShape {
            radius: self.radius,
            material: self.material.clone(),
            density: self.density,
        }))
    }
}

/// Sphere centered on its center of mass
///
/// Only uniform scale is supported; the x component of the scale is used.
#[derive(Debug, Clone)]
pub struct SphereShape {
    radius: f32,
    material: Option<Arc<PhysicsMaterial>>,
    density: f32,
}

impl SphereShape {
    /// Radius before scaling
    pub const fn radius(&self) -> f32 {
        self.radius
    }

    /// Radius after applying `scale`
    pub fn scaled_radius(&self, scale: Vec3) -> f32 {
        self.radius * uniform_scale(scale)
    }
}

impl Shape for SphereShape {
    fn sub_type(&self) -> ShapeSubType {
        ShapeSubType::Sphere
    }

    fn local_bounds(&self) -> Aabb {
        Aabb::from_center_extents(Vec3::zeros(), Vec3::repeat(self.radius))
    }

    fn world_space_bounds(&self, center_of_mass_transform: &Isometry, scale: Vec3) -> Aabb {
        Aabb::from_center_extents(
            center_of_mass_transform.translation.vector,
            Vec3::repeat(self.scaled_radius(scale)),
        )
    }

    fn inner_radius(&self) -> f32 {
        self.radius
    }

    fn mass_properties(&self) -> MassProperties {
        let mass = self.volume() * self.density;
        MassProperties {
            mass,
            inertia: Mat3::from_diagonal_element(0.4 * mass * self.radius * self.radius),
        }
    }

    fn volume(&self) -> f32 {
        4.0 / 3.0 * PI * self.radius.powi(3)
    }

    fn submerged_volume(&self, center_of_mass_transform: &Isometry, scale: Vec3, surface: &Plane) -> SubmergedVolume {
        let center = center_of_mass_transform.translation.vector;
        let radius = self.scaled_radius(scale);
        let total_volume = 4.0 / 3.0 * PI * radius.powi(3);

        // Height of the cap below the surface
        let depth = (radius - surface.signed_distance(center)).clamp(0.0, 2.0 * radius);
        if depth <= 0.0 {
            return SubmergedVolume {
                total_volume,
                submerged_volume: 0.0,
                center_of_buoyancy: Vec3::zeros(),
            };
        }
        if depth >= 2.0 * radius {
            return SubmergedVolume {
                total_volume,
                submerged_volume: total_volume,
                center_of_buoyancy: center,
            };
        }

        let submerged_volume = PI * depth * depth * (3.0 * radius - depth) / 3.0;
        let centroid_offset = 3.0 * (2.0 * radius - depth).powi(2) / (4.0 * (3.0 * radius - depth));
        SubmergedVolume {
            total_volume,
            submerged_volume,
            center_of_buoyancy: center - surface.normal * centroid_offset,
        }
    }

    fn stats(&self) -> ShapeStats {
        ShapeStats {
            size_bytes: std::mem::size_of::<Self>(),
            num_triangles: 8,
        }
    }

    fn material(&self, _sub_shape_id: SubShapeId) -> Arc<PhysicsMaterial> {
        self.material.clone().unwrap_or_else(PhysicsMaterial::default_material)
    }

    fn surface_normal(&self, _sub_shape_id: SubShapeId, local_surface_position: Vec3) -> Vec3 {
        normalize_or(local_surface_position, Vec3::y())
    }

    fn cast_ray(&self, ray: &RayCast, creator: &SubShapeIdCreator, hit: &mut RayCastResult) -> bool {
        match ray_sphere_fraction(ray.origin, ray.direction, self.radius) {
            Some(fraction) if fraction < hit.fraction => {
                hit.fraction = fraction;
                hit.sub_shape_id = creator.id();
                true
            }
            _ => false,
        }
    }

    fn cast_ray_collect(
        &self,
        ray: &RayCast,
        settings: &RayCastSettings,
        creator: &SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<RayCastResult>,
        filter: &dyn ShapeFilter,
    ) {
        if !filter.should_collide(self, creator.id()) {
            return;
        }
        let Some((enter, exit)) = ray_sphere_interval(ray.origin, ray.direction, self.radius) else {
            return;
        };
        if exit < 0.0 || enter > 1.0 {
            return;
        }

        let fraction = if enter >= 0.0 {
            enter
        } else if settings.treat_convex_as_solid {
            0.0
        } else if exit <= 1.0 {
            exit
        } else {
            return;
        };

        if fraction < collector.early_out_fraction() {
            collector.add_hit(RayCastResult {
                fraction,
                sub_shape_id: creator.id(),
            });
        }
    }

    fn collide_point(
        &self,
        point: Vec3,
        creator: &SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<CollidePointResult>,
        filter: &dyn ShapeFilter,
    ) {
        if filter.should_collide(self, creator.id()) && point.norm_squared() <= self.radius * self.radius {
            collector.add_hit(CollidePointResult {
                sub_shape_id: creator.id(),
            });
        }
    }

    fn collide_soft_body_vertices(
        &self,
        center_of_mass_transform: &Isometry,
        scale: Vec3,
        vertices: &mut [SoftBodyVertex],
        colliding_shape_index: i32,
    ) {
        let center = center_of_mass_transform.translation.vector;
        let radius = self.scaled_radius(scale);

        for vertex in vertices.iter_mut().filter(|v| v.inv_mass > 0.0) {
            let offset = vertex.position - center;
            let normal = normalize_or(offset, Vec3::y());
            let penetration = radius - offset.norm();
            let plane = Plane::from_point_and_normal(center + normal * radius, normal);
            vertex.update_contact(plane, penetration, colliding_shape_index);
        }
    }

    fn collect_triangles(
        &self,
        bounds: &Aabb,
        position_com: Vec3,
        rotation: Quat,
        scale: Vec3,
        triangles: &mut Vec<Triangle>,
    ) {
        let r = self.radius;
        let (px, nx) = (Vec3::new(r, 0.0, 0.0), Vec3::new(-r, 0.0, 0.0));
        let (py, ny) = (Vec3::new(0.0, r, 0.0), Vec3::new(0.0, -r, 0.0));
        let (pz, nz) = (Vec3::new(0.0, 0.0, r), Vec3::new(0.0, 0.0, -r));

        // Octahedron with outward winding
        let local = [
            [px, py, pz], [py, nx, pz], [nx, ny, pz], [ny, px, pz],
            [py, px, nz], [nx, py, nz], [ny, nx, nz], [px, ny, nz],
        ];
        let uniform = Vec3::repeat(uniform_scale(scale));
        emit_triangles(&local, bounds, position_com, rotation, uniform, triangles);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Settings for [`BoxShape`]
#[derive(Debug, Clone)]
pub struct BoxShapeSettings {
    /// Half the size of the box along each axis
    pub half_extent: Vec3,
    /// Surface material, default material when `None`
    pub material: Option<Arc<PhysicsMaterial>>,
    /// Density used for mass properties
    pub density: f32,
}

impl BoxShapeSettings {
    /// Settings for a box with `half_extent`
    pub fn new(half_extent: Vec3) -> Self {
        Self {
            half_extent,
            material: None,
            density: DEFAULT_DENSITY,
        }
    }

    /// Attach a material
    #[must_use]
    pub fn with_material(mut self, material: Arc<PhysicsMaterial>) -> Self {
        self.material = Some(material);
        self
    }
}

impl ShapeSettings for BoxShapeSettings {
    type Shape = BoxShape;

    fn create(&self) -> ShapeResult<BoxShape> {
        let h = self.half_extent;
        if !h.iter().all(|c| c.is_finite() && *c > 0.0) {
            return Err(ShapeError::InvalidHalfExtent { x: h.x, y: h.y, z: h.z });
        }
        validate_density(self.density)?;
        Ok(Arc::new(BoxShape {
            half_extent: h,
            material: self.material.clone(),
            density: self.density,
        }))
    }
}

/// Axis-aligned box centered on its center of mass
#[derive(Debug, Clone)]
pub struct BoxShape {
    half_extent: Vec3,
    material: Option<Arc<PhysicsMaterial>>,
    density: f32,
}

impl BoxShape {
    /// Half extent before scaling
    pub const fn half_extent(&self) -> Vec3 {
        self.half_extent
    }

    /// Half extent after applying `scale`
    pub fn scaled_half_extent(&self, scale: Vec3) -> Vec3 {
        self.half_extent.component_mul(&scale.abs())
    }

    fn corners(&self) -> [Vec3; 8] {
        let h = self.half_extent;
        std::array::from_fn(|i| {
            Vec3::new(
                if i & 1 == 0 { -h.x } else { h.x },
                if i & 2 == 0 { -h.y } else { h.y },
                if i & 4 == 0 { -h.z } else { h.z },
            )
        })
    }
}

/// Closest surface point of a box at the origin and the penetration of `point`
///
/// Returns `(surface_point, outward_normal, penetration)`; penetration is
/// positive inside the box.
pub(crate) fn box_closest_surface(half_extent: Vec3, point: Vec3) -> (Vec3, Vec3, f32) {
    let clamped = point.sup(&-half_extent).inf(&half_extent);
    let outside = point - clamped;
    let distance = outside.norm();
    if distance > 0.0 {
        return (clamped, outside / distance, -distance);
    }

    // Inside: leave through the nearest face
    let depths = half_extent - point.abs();
    let axis = depths.imin();
    let sign = if point[axis] >= 0.0 { 1.0 } else { -1.0 };
    let mut normal = Vec3::zeros();
    normal[axis] = sign;
    let mut surface = point;
    surface[axis] = sign * half_extent[axis];
    (surface, normal, depths[axis])
}

impl Shape for BoxShape {
    fn sub_type(&self) -> ShapeSubType {
        ShapeSubType::Box
    }

    fn local_bounds(&self) -> Aabb {
        Aabb::from_center_extents(Vec3::zeros(), self.half_extent)
    }

    fn inner_radius(&self) -> f32 {
        self.half_extent.min()
    }

    fn mass_properties(&self) -> MassProperties {
        let mass = self.volume() * self.density;
        let sq = self.half_extent.component_mul(&self.half_extent);
        MassProperties {
            mass,
            inertia: Mat3::from_diagonal(&Vec3::new(
                mass / 3.0 * (sq.y + sq.z),
                mass / 3.0 * (sq.x + sq.z),
                mass / 3.0 * (sq.x + sq.y),
            )),
        }
    }

    fn volume(&self) -> f32 {
        8.0 * self.half_extent.x * self.half_extent.y * self.half_extent.z
    }

    fn stats(&self) -> ShapeStats {
        ShapeStats {
            size_bytes: std::mem::size_of::<Self>(),
            num_triangles: 12,
        }
    }

    fn material(&self, _sub_shape_id: SubShapeId) -> Arc<PhysicsMaterial> {
        self.material.clone().unwrap_or_else(PhysicsMaterial::default_material)
    }

    fn surface_normal(&self, _sub_shape_id: SubShapeId, local_surface_position: Vec3) -> Vec3 {
        let relative = local_surface_position.component_div(&self.half_extent).abs();
        let axis = relative.imax();
        let mut normal = Vec3::zeros();
        normal[axis] = if local_surface_position[axis] >= 0.0 { 1.0 } else { -1.0 };
        normal
    }

    fn cast_ray(&self, ray: &RayCast, creator: &SubShapeIdCreator, hit: &mut RayCastResult) -> bool {
        match self.local_bounds().ray_fraction(ray) {
            Some(fraction) if fraction < hit.fraction => {
                hit.fraction = fraction;
                hit.sub_shape_id = creator.id();
                true
            }
            _ => false,
        }
    }

    fn cast_ray_collect(
        &self,
        ray: &RayCast,
        settings: &RayCastSettings,
        creator: &SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<RayCastResult>,
        filter: &dyn ShapeFilter,
    ) {
        if !filter.should_collide(self, creator.id()) {
            return;
        }
        let bounds = self.local_bounds();
        let Some(fraction) = bounds.ray_fraction(ray) else {
            return;
        };

        let fraction = if fraction > 0.0 || settings.treat_convex_as_solid {
            fraction
        } else {
            // Started inside: report where the ray leaves the box
            let end = ray.point_at(1.0);
            let reversed = RayCast::new(end, -ray.direction);
            match bounds.ray_fraction(&reversed) {
                Some(from_end) if from_end > 0.0 => 1.0 - from_end,
                _ => return,
            }
        };

        if fraction < collector.early_out_fraction() {
            collector.add_hit(RayCastResult {
                fraction,
                sub_shape_id: creator.id(),
            });
        }
    }

    fn collide_point(
        &self,
        point: Vec3,
        creator: &SubShapeIdCreator,
        collector: &mut dyn CollisionCollector<CollidePointResult>,
        filter: &dyn ShapeFilter,
    ) {
        if filter.should_collide(self, creator.id()) && self.local_bounds().contains_point(point) {
            collector.add_hit(CollidePointResult {
                sub_shape_id: creator.id(),
            });
        }
    }

    fn collide_soft_body_vertices(
        &self,
        center_of_mass_transform: &Isometry,
        scale: Vec3,
        vertices: &mut [SoftBodyVertex],
        colliding_shape_index: i32,
    ) {
        let half_extent = self.scaled_half_extent(scale);
        let inverse = center_of_mass_transform.inverse();

        for vertex in vertices.iter_mut().filter(|v| v.inv_mass > 0.0) {
            let local = inverse.transform_point(&Point3::from(vertex.position)).coords;
            let (surface, normal, penetration) = box_closest_surface(half_extent, local);
            let world_point = center_of_mass_transform.transform_point(&Point3::from(surface)).coords;
            let world_normal = center_of_mass_transform.transform_vector(&normal);
            let plane = Plane::from_point_and_normal(world_point, world_normal);
            vertex.update_contact(plane, penetration, colliding_shape_index);
        }
    }

    fn collect_triangles(
        &self,
        bounds: &Aabb,
        position_com: Vec3,
        rotation: Quat,
        scale: Vec3,
        triangles: &mut Vec<Triangle>,
    ) {
        let c = self.corners();
        // Two triangles per face, counter-clockwise seen from outside
        let local = [
            [c[0], c[4], c[6]], [c[0], c[6], c[2]], // -X
            [c[1], c[3], c[7]], [c[1], c[7], c[5]], // +X
            [c[0], c[1], c[5]], [c[0], c[5], c[4]], // -Y
            [c[2], c[6], c[7]], [c[2], c[7], c[3]], // +Y
            [c[0], c[2], c[3]], [c[0], c[3], c[1]], // -Z
            [c[4], c[5], c[7]], [c[4], c[7], c[6]], // +Z
        ];
        emit_triangles(&local, bounds, position_com, rotation, scale, triangles);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
