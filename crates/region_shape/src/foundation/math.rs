//! Math utilities and types
//!
//! Provides the nalgebra aliases used by the collision model. Shapes are
//! placed by a centre-of-mass [`Isometry`] (rotation + translation); scale is
//! always carried separately as a per-axis [`Vec3`].

pub use nalgebra::{Matrix3, Quaternion, Unit, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Rigid transform (rotation followed by translation)
pub type Isometry = nalgebra::Isometry3<f32>;

/// Translation-only transform
pub type Translation = nalgebra::Translation3<f32>;

/// Create an isometry that only translates
pub fn translation(offset: Vec3) -> Isometry {
    Isometry::from_parts(Translation::from(offset), Quat::identity())
}

/// Create an isometry from a rotation and a translation
pub fn rotation_translation(rotation: Quat, offset: Vec3) -> Isometry {
    Isometry::from_parts(Translation::from(offset), rotation)
}

/// Scale factor used by shapes that only support uniform scaling (spheres)
pub fn uniform_scale(scale: Vec3) -> f32 {
    scale.x.abs()
}

/// Component-wise reciprocal, leaving zero components at zero
pub fn reciprocal(v: Vec3) -> Vec3 {
    v.map(|c| if c != 0.0 { 1.0 / c } else { 0.0 })
}

/// Normalize `v`, falling back to `fallback` for near-zero vectors
pub fn normalize_or(v: Vec3, fallback: Vec3) -> Vec3 {
    v.try_normalize(1.0e-12).unwrap_or(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_translation_moves_points_only() {
        let iso = translation(Vec3::new(1.0, 2.0, 3.0));
        let p = iso.transform_point(&Point3::new(1.0, 1.0, 1.0));
        assert_relative_eq!(p.coords, Vec3::new(2.0, 3.0, 4.0));
        assert_relative_eq!(iso.transform_vector(&Vec3::x()), Vec3::x());
    }

    #[test]
    fn test_reciprocal_keeps_zero() {
        let r = reciprocal(Vec3::new(2.0, 0.0, -4.0));
        assert_relative_eq!(r, Vec3::new(0.5, 0.0, -0.25));
    }

    #[test]
    fn test_normalize_or_fallback() {
        assert_relative_eq!(normalize_or(Vec3::zeros(), Vec3::y()), Vec3::y());
        assert_relative_eq!(normalize_or(Vec3::new(0.0, 0.0, 3.0), Vec3::y()), Vec3::z());
    }
}
