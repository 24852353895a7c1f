mod building;
mod node_link;
mod printing;
mod ray_bvh_intersection;

use crate::geometry::{Triangle, WorldBox, WorldPoint};

use index_vec::IndexVec;
use node_link::{CompressedNodeLink, NodeLink, TriangleIdxRange};

pub use building::SceneError;
pub use ray_bvh_intersection::StackCache;

const INNER_NODE_CHILDREN: usize = 4;
const LEAF_NODE_MAX_TRIANGLES: usize = CompressedNodeLink::MAX_COUNT as usize;

/// Bounding volume hierarchy over a static set of triangles.
/// The BVH owns the triangles, reordered so that every leaf covers a contiguous index range.
#[derive(Clone, Debug)]
pub struct TriangleBvh {
    bounding_box: WorldBox,
    root: CompressedNodeLink,

    inner_nodes: IndexVec<InnerNodeIdx, InnerNode>,
    triangles: IndexVec<TriangleIdx, Triangle<WorldPoint>>,
}

#[derive(Clone, Debug)]
struct InnerNode {
    child_bounds: [WorldBox; INNER_NODE_CHILDREN],
    child_links: [CompressedNodeLink; INNER_NODE_CHILDREN],
}

index_vec::define_index_type! {
    struct InnerNodeIdx = u32;
    MAX_INDEX = CompressedNodeLink::MAX_INDEX as usize;
    IMPL_RAW_CONVERSIONS = true;
}

index_vec::define_index_type! {
    /// Index of a triangle inside a built [`TriangleBvh`].
    pub struct TriangleIdx = u32;
    MAX_INDEX = CompressedNodeLink::MAX_INDEX as usize;
    IMPL_RAW_CONVERSIONS = true;
}

impl TriangleBvh {
    pub fn triangle(&self, index: TriangleIdx) -> &Triangle<WorldPoint> {
        &self.triangles[index]
    }

    pub fn triangles(&self) -> impl Iterator<Item = (TriangleIdx, &Triangle<WorldPoint>)> {
        self.triangles.iter_enumerated()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}
