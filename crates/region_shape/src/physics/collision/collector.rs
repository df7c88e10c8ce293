//! Query results and result sinks
//!
//! Every query family reports into a [`CollisionCollector`]. A collector can
//! tighten the search with [`early_out_fraction`](CollisionCollector::early_out_fraction)
//! and stop it entirely with [`should_early_out`](CollisionCollector::should_early_out).

use crate::foundation::math::Vec3;

use super::sub_shape_id::SubShapeId;

/// Value used to order hits: lower is better
pub trait HitFraction {
    /// Fraction used to compare this hit against others
    fn hit_fraction(&self) -> f32;
}

/// Sink receiving query results
pub trait CollisionCollector<R> {
    /// Record a hit
    fn add_hit(&mut self, hit: R);

    /// Hits at or beyond this fraction cannot improve the result
    fn early_out_fraction(&self) -> f32 {
        f32::MAX
    }

    /// True when the query should stop visiting further candidates
    fn should_early_out(&self) -> bool {
        false
    }
}

/// Ray hit
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayCastResult {
    /// Hit position as a fraction of the ray direction
    pub fraction: f32,
    /// Path to the leaf that was hit
    pub sub_shape_id: SubShapeId,
}

impl Default for RayCastResult {
    fn default() -> Self {
        Self {
            fraction: 1.0 + f32::EPSILON,
            sub_shape_id: SubShapeId::EMPTY,
        }
    }
}

impl HitFraction for RayCastResult {
    fn hit_fraction(&self) -> f32 {
        self.fraction
    }
}

/// Point containment hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CollidePointResult {
    /// Path to the leaf containing the point
    pub sub_shape_id: SubShapeId,
}

impl HitFraction for CollidePointResult {
    fn hit_fraction(&self) -> f32 {
        0.0
    }
}

/// Overlap between two shapes, in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollideShapeResult {
    /// Deepest point of shape 1 inside shape 2
    pub contact_point_on1: Vec3,
    /// Deepest point of shape 2 inside shape 1
    pub contact_point_on2: Vec3,
    /// Unit direction from shape 1 towards shape 2
    pub penetration_axis: Vec3,
    /// Penetration depth, negative when separated within the allowed distance
    pub penetration_depth: f32,
    /// Path to the leaf of shape 1
    pub sub_shape_id1: SubShapeId,
    /// Path to the leaf of shape 2
    pub sub_shape_id2: SubShapeId,
}

impl CollideShapeResult {
    /// Same contact seen from the other shape
    pub fn swapped(&self) -> Self {
        Self {
            contact_point_on1: self.contact_point_on2,
            contact_point_on2: self.contact_point_on1,
            penetration_axis: -self.penetration_axis,
            penetration_depth: self.penetration_depth,
            sub_shape_id1: self.sub_shape_id2,
            sub_shape_id2: self.sub_shape_id1,
        }
    }
}

impl HitFraction for CollideShapeResult {
    fn hit_fraction(&self) -> f32 {
        -self.penetration_depth
    }
}

/// First contact of a swept shape, in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapeCastResult {
    /// Fraction of the cast direction travelled before contact
    pub fraction: f32,
    /// Contact point on the moving shape
    pub contact_point_on1: Vec3,
    /// Contact point on the target shape
    pub contact_point_on2: Vec3,
    /// Unit direction from the moving shape towards the target
    pub penetration_axis: Vec3,
    /// Penetration depth at `fraction` (zero for a touching contact)
    pub penetration_depth: f32,
    /// Path to the leaf of the moving shape
    pub sub_shape_id1: SubShapeId,
    /// Path to the leaf of the target shape
    pub sub_shape_id2: SubShapeId,
}

impl HitFraction for ShapeCastResult {
    fn hit_fraction(&self) -> f32 {
        if self.fraction > 0.0 {
            self.fraction
        } else {
            -self.penetration_depth
        }
    }
}

/// Collects every hit
#[derive(Debug, Clone)]
pub struct AllHitCollector<R> {
    /// Hits in the order they were reported
    pub hits: Vec<R>,
}

impl<R> AllHitCollector<R> {
    /// Creates an empty collector
    pub const fn new() -> Self {
        Self { hits: Vec::new() }
    }

    /// True when at least one hit was reported
    pub fn had_hit(&self) -> bool {
        !self.hits.is_empty()
    }
}

impl<R: HitFraction> AllHitCollector<R> {
    /// Order hits from best to worst
    pub fn sort(&mut self) {
        self.hits
            .sort_by(|a, b| a.hit_fraction().total_cmp(&b.hit_fraction()));
    }
}

impl<R> Default for AllHitCollector<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> CollisionCollector<R> for AllHitCollector<R> {
    fn add_hit(&mut self, hit: R) {
        self.hits.push(hit);
    }
}

/// Keeps only the best hit
#[derive(Debug, Clone)]
pub struct ClosestHitCollector<R> {
    /// Best hit so far
    pub hit: Option<R>,
}

impl<R> ClosestHitCollector<R> {
    /// Creates an empty collector
    pub const fn new() -> Self {
        Self { hit: None }
    }

    /// True when a hit was reported
    pub const fn had_hit(&self) -> bool {
        self.hit.is_some()
    }
}

impl<R> Default for ClosestHitCollector<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: HitFraction> CollisionCollector<R> for ClosestHitCollector<R> {
    fn add_hit(&mut self, hit: R) {
        let better = self
            .hit
            .as_ref()
            .map_or(true, |best| hit.hit_fraction() < best.hit_fraction());
        if better {
            self.hit = Some(hit);
        }
    }

    fn early_out_fraction(&self) -> f32 {
        self.hit.as_ref().map_or(f32::MAX, HitFraction::hit_fraction)
    }
}

/// Stops the query after the first hit
#[derive(Debug, Clone)]
pub struct AnyHitCollector<R> {
    /// First hit reported
    pub hit: Option<R>,
}

impl<R> AnyHitCollector<R> {
    /// Creates an empty collector
    pub const fn new() -> Self {
        Self { hit: None }
    }

    /// True when a hit was reported
    pub const fn had_hit(&self) -> bool {
        self.hit.is_some()
    }
}

impl<R> Default for AnyHitCollector<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> CollisionCollector<R> for AnyHitCollector<R> {
    fn add_hit(&mut self, hit: R) {
        if self.hit.is_none() {
            self.hit = Some(hit);
        }
    }

    fn early_out_fraction(&self) -> f32 {
        if self.hit.is_some() {
            -f32::MAX
        } else {
            f32::MAX
        }
    }

    fn should_early_out(&self) -> bool {
        self.hit.is_some()
    }
}
