use crate::{geometry::FloatType, util::Summary};

use super::{CompressedNodeLink, NodeLink, TriangleBvh};

impl TriangleBvh {
    /// Logs depth and leaf fill statistics of the tree at info level.
    pub fn log_statistics(&self) {
        let depth = self.depth_statistics_recursive(self.root);
        if depth.count == 0 {
            log::info!("BVH is empty");
            return;
        }
        let leaf = self.leaf_fill_statistics_recursive(self.root);

        log::info!("Triangles: {}", self.triangles.len());
        log::info!("Inner nodes: {}", self.inner_nodes.len());
        log::info!("Depth: {depth}");
        log::info!("Leaf node fill: {leaf}");
    }

    fn depth_statistics_recursive(&self, link: CompressedNodeLink) -> Summary {
        match link.decode() {
            NodeLink::Null => Summary::default(),
            NodeLink::Leaf { .. } => Summary::single(1.0),
            NodeLink::Inner { index } => self.inner_nodes[index]
                .child_links
                .iter()
                .map(|child| self.depth_statistics_recursive(*child))
                .fold(Summary::default(), |a, b| a.merge(&b))
                .shifted(1.0),
        }
    }

    fn leaf_fill_statistics_recursive(&self, link: CompressedNodeLink) -> Summary {
        match link.decode() {
            NodeLink::Null => Summary::default(),
            NodeLink::Leaf { indices } => Summary::single(indices.iter().count() as FloatType),
            NodeLink::Inner { index } => self.inner_nodes[index]
                .child_links
                .iter()
                .map(|child| self.leaf_fill_statistics_recursive(*child))
                .fold(Summary::default(), |a, b| a.merge(&b)),
        }
    }
}
