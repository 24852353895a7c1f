use assert2::debug_assert;

use super::{CompressedNodeLink, InnerNode, NodeLink, TriangleBvh, TriangleIdx, TriangleIdxRange};
use crate::{
    geometry::{FloatType, Ray, WorldBox},
    scene::{HitRecord, Object},
};

/// Reusable traversal stack, so that repeated queries don't allocate.
#[derive(Clone, Default)]
#[repr(transparent)]
pub struct StackCache {
    stack: Vec<(CompressedNodeLink, FloatType)>,
}

impl Object for TriangleBvh {
    fn intersect(&self, ray: &Ray, max_t: FloatType, stack: &mut StackCache) -> Option<HitRecord> {
        debug_assert!(stack.stack.is_empty());
        if self.root.is_null() {
            return None;
        }

        let root_t1 = self.bounding_box.entry_distance(ray, max_t)?;
        stack.stack.push((self.root, root_t1));

        let mut best: Option<LeafHitRecord> = None;

        while let Some((link, node_t1)) = stack.stack.pop() {
            let best_t = best.as_ref().map_or(max_t, |b| b.t);
            if node_t1 > best_t {
                // If the node's minimum intersection distance is further away than the best
                // hit found so far, the node can't do any good any more and we can skip it.
                continue;
            }

            match link.decode() {
                NodeLink::Null => continue,
                NodeLink::Inner { index } => {
                    let node = &self.inner_nodes[index];
                    for (t1, link) in node.intersect(ray, best_t) {
                        stack.stack.push((link, t1));
                    }
                }
                NodeLink::Leaf { indices } => {
                    if let Some(hit) = self.intersect_triangles(indices, ray, best_t) {
                        best = Some(hit);
                    }
                }
            }
        }

        best.map(|best| HitRecord {
            t: best.t,
            point: ray.point_at(best.t),
            triangle_index: best.triangle_index,
        })
    }

    fn get_bounding_box(&self) -> WorldBox {
        self.bounding_box.clone()
    }
}

impl TriangleBvh {
    /// Finds the closest triangle of the leaf within `max_t`.
    fn intersect_triangles(
        &self,
        triangle_indices: TriangleIdxRange,
        ray: &Ray,
        max_t: FloatType,
    ) -> Option<LeafHitRecord> {
        let mut best: Option<LeafHitRecord> = None;

        for index in triangle_indices.iter() {
            let limit = best.as_ref().map_or(max_t, |b| b.t);
            if let Some(t) = self.triangles[index].intersect(ray, limit) {
                best = Some(LeafHitRecord {
                    t,
                    triangle_index: index,
                });
            }
        }

        best
    }
}

impl InnerNode {
    /// Intersect this inner node with a ray.
    /// Returns an iterator of intersecting non-null children: (t1, link to the child).
    /// t1 is the distance along the ray where the child box is entered, clamped to zero.
    fn intersect(
        &self,
        ray: &Ray,
        max_t: FloatType,
    ) -> impl Iterator<Item = (FloatType, CompressedNodeLink)> {
        self.child_bounds
            .iter()
            .zip(self.child_links.iter())
            .filter(|(_, link)| !link.is_null())
            .filter_map(move |(bounds, link)| Some((bounds.entry_distance(ray, max_t)?, *link)))
    }
}

#[derive(Clone, Debug)]
struct LeafHitRecord {
    t: FloatType,
    triangle_index: TriangleIdx,
}
