//! Bounding-box traversal shared by every region query

use crate::physics::collision::Aabb;
use crate::spatial::IndexedShape;

use super::RegionShape;

/// One query's view of a region traversal
///
/// Boxes are in the region's local, unscaled frame.
pub trait SubShapeVisitor {
    /// Cheap rejection against the region box; false skips the collector
    fn test_bounds(&self) -> bool;

    /// Box handed to [`IndexedShapeCollector::collect_at`](crate::spatial::IndexedShapeCollector::collect_at)
    fn query_bounds(&self) -> Aabb;

    /// Called once per collected child, null children included
    fn visit_shape(&mut self, child: &IndexedShape, index: u32);

    /// Stop visiting the remaining children
    fn should_abort(&self) -> bool;
}

impl RegionShape {
    /// Drive `visitor` over the children its query box selects
    pub fn walk_sub_shapes<V: SubShapeVisitor>(&self, visitor: &mut V) {
        if !visitor.test_bounds() {
            return;
        }

        let bounds = visitor.query_bounds();
        let children = self.collector().collect_at(&bounds);
        log::trace!("Region walk visiting {} children", children.len());

        for child in &children {
            visitor.visit_shape(child, child.index());
            if visitor.should_abort() {
                break;
            }
        }
    }
}
