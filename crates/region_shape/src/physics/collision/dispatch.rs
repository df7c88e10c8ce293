//! Pairwise collision dispatch
//!
//! Overlap and cast queries between two shapes are routed through a table
//! keyed by the pair of [`ShapeSubType`]s. The table is an ordinary value
//! owned by whoever runs queries, so independent engines can carry
//! different registrations. Handlers receive the registry itself and use it
//! to recurse into child shapes.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::foundation::math::{Isometry, Vec3};

use super::collector::{CollideShapeResult, CollisionCollector, ShapeCastResult};
use super::narrow_phase;
use super::shape::{CollideShapeSettings, Shape, ShapeCast, ShapeCastSettings, ShapeFilter, ShapeSubType};
use super::sub_shape_id::SubShapeIdCreator;

/// Two shapes placed in world space for an overlap query
#[derive(Clone, Copy)]
pub struct ShapePair<'a> {
    /// First shape
    pub shape1: &'a dyn Shape,
    /// Second shape
    pub shape2: &'a dyn Shape,
    /// Scale of the first shape
    pub scale1: Vec3,
    /// Scale of the second shape
    pub scale2: Vec3,
    /// Center-of-mass transform of the first shape
    pub transform1: Isometry,
    /// Center-of-mass transform of the second shape
    pub transform2: Isometry,
    /// Path to the first shape
    pub creator1: SubShapeIdCreator,
    /// Path to the second shape
    pub creator2: SubShapeIdCreator,
}

impl<'a> ShapePair<'a> {
    /// Pair of two root shapes
    pub fn new(
        shape1: &'a dyn Shape,
        transform1: Isometry,
        scale1: Vec3,
        shape2: &'a dyn Shape,
        transform2: Isometry,
        scale2: Vec3,
    ) -> Self {
        Self {
            shape1,
            shape2,
            scale1,
            scale2,
            transform1,
            transform2,
            creator1: SubShapeIdCreator::new(),
            creator2: SubShapeIdCreator::new(),
        }
    }

    /// The same pair with the operands exchanged
    pub fn swapped(&self) -> Self {
        Self {
            shape1: self.shape2,
            shape2: self.shape1,
            scale1: self.scale2,
            scale2: self.scale1,
            transform1: self.transform2,
            transform2: self.transform1,
            creator1: self.creator2,
            creator2: self.creator1,
        }
    }
}

impl fmt::Debug for ShapePair<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapePair")
            .field("shape1", &self.shape1.sub_type())
            .field("shape2", &self.shape2.sub_type())
            .field("transform1", &self.transform1)
            .field("transform2", &self.transform2)
            .finish_non_exhaustive()
    }
}

/// Static shape a cast is tested against
#[derive(Clone, Copy)]
pub struct CastTarget<'a> {
    /// Target shape
    pub shape: &'a dyn Shape,
    /// Scale of the target
    pub scale: Vec3,
    /// Center-of-mass transform of the target, used to report world-space results
    pub center_of_mass_transform: Isometry,
    /// Path to the moving shape
    pub creator1: SubShapeIdCreator,
    /// Path to the target shape
    pub creator2: SubShapeIdCreator,
}

impl<'a> CastTarget<'a> {
    /// Root target shape
    pub fn new(shape: &'a dyn Shape, scale: Vec3, center_of_mass_transform: Isometry) -> Self {
        Self {
            shape,
            scale,
            center_of_mass_transform,
            creator1: SubShapeIdCreator::new(),
            creator2: SubShapeIdCreator::new(),
        }
    }
}

impl fmt::Debug for CastTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CastTarget")
            .field("shape", &self.shape.sub_type())
            .field("scale", &self.scale)
            .field("center_of_mass_transform", &self.center_of_mass_transform)
            .finish_non_exhaustive()
    }
}

/// Overlap handler for one ordered pair of sub types
pub type CollideShapeFn = fn(
    &CollisionDispatch,
    &ShapePair<'_>,
    &CollideShapeSettings,
    &mut dyn CollisionCollector<CollideShapeResult>,
    &dyn ShapeFilter,
);

/// Cast handler for one ordered pair of sub types
///
/// The cast is expressed in the target's center-of-mass space.
pub type CastShapeFn = fn(
    &CollisionDispatch,
    &ShapeCast<'_>,
    &ShapeCastSettings,
    &CastTarget<'_>,
    &mut dyn CollisionCollector<ShapeCastResult>,
    &dyn ShapeFilter,
);

/// Downcast a shape to its concrete type
pub fn downcast_shape<T: Shape>(shape: &dyn Shape) -> Option<&T> {
    shape.as_any().downcast_ref::<T>()
}

/// Registry of pairwise overlap and cast handlers
#[derive(Clone)]
pub struct CollisionDispatch {
    collide: HashMap<(ShapeSubType, ShapeSubType), CollideShapeFn>,
    cast: HashMap<(ShapeSubType, ShapeSubType), CastShapeFn>,
    extensions: HashSet<ShapeSubType>,
}

impl CollisionDispatch {
    /// Registry with the convex leaf handlers installed
    pub fn new() -> Self {
        let mut dispatch = Self::empty();
        narrow_phase::register_convex_handlers(&mut dispatch);
        dispatch
    }

    /// Registry without any handler
    pub fn empty() -> Self {
        Self {
            collide: HashMap::new(),
            cast: HashMap::new(),
            extensions: HashSet::new(),
        }
    }

    /// Install an overlap handler, returning the one it replaces
    pub fn register_collide_shape(
        &mut self,
        type1: ShapeSubType,
        type2: ShapeSubType,
        handler: CollideShapeFn,
    ) -> Option<CollideShapeFn> {
        self.collide.insert((type1, type2), handler)
    }

    /// Install a cast handler, returning the one it replaces
    pub fn register_cast_shape(
        &mut self,
        type1: ShapeSubType,
        type2: ShapeSubType,
        handler: CastShapeFn,
    ) -> Option<CastShapeFn> {
        self.cast.insert((type1, type2), handler)
    }

    /// Overlap handler for a pair, if any
    pub fn collide_handler(&self, type1: ShapeSubType, type2: ShapeSubType) -> Option<CollideShapeFn> {
        self.collide.get(&(type1, type2)).copied()
    }

    /// Cast handler for a pair, if any
    pub fn cast_handler(&self, type1: ShapeSubType, type2: ShapeSubType) -> Option<CastShapeFn> {
        self.cast.get(&(type1, type2)).copied()
    }

    /// Number of overlap handlers
    pub fn num_collide_handlers(&self) -> usize {
        self.collide.len()
    }

    /// Number of cast handlers
    pub fn num_cast_handlers(&self) -> usize {
        self.cast.len()
    }

    /// Record that `sub_type` installed its handlers
    ///
    /// Returns true the first time a sub type is recorded.
    pub fn mark_extension_registered(&mut self, sub_type: ShapeSubType) -> bool {
        self.extensions.insert(sub_type)
    }

    /// True when `sub_type` already installed its handlers
    pub fn is_extension_registered(&self, sub_type: ShapeSubType) -> bool {
        self.extensions.contains(&sub_type)
    }

    /// Collide two shapes placed in world space
    pub fn collide_shape_vs_shape(
        &self,
        pair: &ShapePair<'_>,
        settings: &CollideShapeSettings,
        collector: &mut dyn CollisionCollector<CollideShapeResult>,
        filter: &dyn ShapeFilter,
    ) {
        if !filter.should_collide_pair(pair.shape1, pair.creator1.id(), pair.shape2, pair.creator2.id()) {
            return;
        }

        let key = (pair.shape1.sub_type(), pair.shape2.sub_type());
        match self.collide.get(&key) {
            Some(handler) => handler(self, pair, settings, collector, filter),
            None => log::debug!("No collide handler for {} vs {}", key.0, key.1),
        }
    }

    /// Cast a shape expressed in the target's center-of-mass space
    pub fn cast_shape_vs_shape_local_space(
        &self,
        cast: &ShapeCast<'_>,
        settings: &ShapeCastSettings,
        target: &CastTarget<'_>,
        collector: &mut dyn CollisionCollector<ShapeCastResult>,
        filter: &dyn ShapeFilter,
    ) {
        if !filter.should_collide_pair(cast.shape, target.creator1.id(), target.shape, target.creator2.id()) {
            return;
        }

        let key = (cast.shape.sub_type(), target.shape.sub_type());
        match self.cast.get(&key) {
            Some(handler) => handler(self, cast, settings, target, collector, filter),
            None => log::debug!("No cast handler for {} vs {}", key.0, key.1),
        }
    }

    /// Cast a shape expressed in world space
    pub fn cast_shape_vs_shape_world_space(
        &self,
        cast: &ShapeCast<'_>,
        settings: &ShapeCastSettings,
        target: &CastTarget<'_>,
        collector: &mut dyn CollisionCollector<ShapeCastResult>,
        filter: &dyn ShapeFilter,
    ) {
        let local = cast.post_transformed(&target.center_of_mass_transform.inverse());
        self.cast_shape_vs_shape_local_space(&local, settings, target, collector, filter);
    }
}

impl fmt::Debug for CollisionDispatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut collide: Vec<_> = self.collide.keys().collect();
        collide.sort();
        let mut cast: Vec<_> = self.cast.keys().collect();
        cast.sort();
        f.debug_struct("CollisionDispatch")
            .field("collide", &collide)
            .field("cast", &cast)
            .field("extensions", &self.extensions)
            .finish()
    }
}

impl Default for CollisionDispatch {
    fn default() -> Self {
        Self::new()
    }
}
