use super::{InnerNodeIdx, TriangleIdx};

/// Child reference of an inner node packed into 32 bits.
///
/// The low bits store the triangle count of a leaf, zero marks an inner node.
/// The remaining bits store the index of the first triangle or of the inner node.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq)]
pub(super) struct CompressedNodeLink(u32);

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum NodeLink {
    Null,
    Inner { index: InnerNodeIdx },
    Leaf { indices: TriangleIdxRange },
}

impl CompressedNodeLink {
    const COUNT_BITS: u32 = 3;
    const COUNT_MASK: u32 = (1 << Self::COUNT_BITS) - 1;

    pub const MAX_INDEX: u32 = (u32::MAX >> Self::COUNT_BITS) - 1;
    pub const MAX_COUNT: u32 = Self::COUNT_MASK;

    /// All index bits set, count zero. No inner node can have this index.
    pub const NULL: Self = Self(!Self::COUNT_MASK);

    pub fn leaf(first: TriangleIdx, count: usize) -> Self {
        Self::encode(&NodeLink::Leaf {
            indices: TriangleIdxRange::new(first, count as u32),
        })
    }

    pub fn inner(index: InnerNodeIdx) -> Self {
        Self::encode(&NodeLink::Inner { index })
    }

    /// Panics if the index or the leaf size don't fit.
    pub fn encode(link: &NodeLink) -> Self {
        match link {
            NodeLink::Null => Self::NULL,
            NodeLink::Inner { index } => Self::pack(index.raw(), 0),
            NodeLink::Leaf { indices } => {
                let count = indices.len();
                assert!(
                    (1..=Self::MAX_COUNT).contains(&count),
                    "Leaf can't hold {count} triangles"
                );
                Self::pack(indices.first.raw(), count)
            }
        }
    }

    fn pack(index: u32, count: u32) -> Self {
        assert!(index <= Self::MAX_INDEX, "Node index {index} out of range");
        Self((index << Self::COUNT_BITS) | count)
    }

    pub fn decode(self) -> NodeLink {
        if self.is_null() {
            return NodeLink::Null;
        }

        let index = self.0 >> Self::COUNT_BITS;
        match self.0 & Self::COUNT_MASK {
            0 => NodeLink::Inner {
                index: InnerNodeIdx::from_raw_unchecked(index),
            },
            count => NodeLink::Leaf {
                indices: TriangleIdxRange::new(TriangleIdx::from_raw_unchecked(index), count),
            },
        }
    }

    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

impl Default for CompressedNodeLink {
    fn default() -> Self {
        Self::NULL
    }
}

impl std::fmt::Debug for CompressedNodeLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x} ({:?})", self.0, self.decode())
    }
}

/// Contiguous run of triangles referenced by a leaf.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(super) struct TriangleIdxRange {
    pub first: TriangleIdx,
    pub end: TriangleIdx,
}

impl TriangleIdxRange {
    pub fn new(first: TriangleIdx, count: u32) -> TriangleIdxRange {
        TriangleIdxRange {
            first,
            end: first + (count as usize),
        }
    }

    pub fn len(&self) -> u32 {
        self.end.raw() - self.first.raw()
    }

    pub fn iter(&self) -> impl Iterator<Item = TriangleIdx> {
        (self.first.raw()..self.end.raw()).map(TriangleIdx::from_raw)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use assert2::{assert, let_assert};
    use proptest::prelude::*;
    use test_strategy::proptest;

    fn any_link() -> impl Strategy<Value = NodeLink> {
        prop_oneof![
            Just(NodeLink::Null),
            (0..=CompressedNodeLink::MAX_INDEX).prop_map(|index| NodeLink::Inner {
                index: InnerNodeIdx::from_raw(index)
            }),
            (0..=CompressedNodeLink::MAX_INDEX, 1..=CompressedNodeLink::MAX_COUNT).prop_map(
                |(first, count)| NodeLink::Leaf {
                    indices: TriangleIdxRange::new(TriangleIdx::from_raw(first), count)
                }
            ),
        ]
    }

    #[proptest]
    fn decodes_to_encoded(#[strategy(any_link())] link: NodeLink) {
        assert!(CompressedNodeLink::encode(&link).decode() == link);
    }

    #[test]
    fn leaf_covers_its_triangles() {
        let link = CompressedNodeLink::leaf(TriangleIdx::from_raw(12), 3);
        let_assert!(NodeLink::Leaf { indices } = link.decode());
        assert!(indices.iter().map(|i| i.raw()).collect::<Vec<_>>() == vec![12, 13, 14]);
    }

    #[test]
    fn default_is_null() {
        assert!(CompressedNodeLink::default().is_null());
        assert!(!CompressedNodeLink::inner(InnerNodeIdx::from_raw(0)).is_null());
    }

    #[test]
    #[should_panic]
    fn empty_leaf() {
        CompressedNodeLink::leaf(TriangleIdx::from_raw(0), 0);
    }

    #[test]
    #[should_panic]
    fn overfull_leaf() {
        CompressedNodeLink::leaf(
            TriangleIdx::from_raw(0),
            CompressedNodeLink::MAX_COUNT as usize + 1,
        );
    }

    #[test]
    #[should_panic]
    fn inner_index_out_of_range() {
        // Bypasses the range check of the index type itself
        CompressedNodeLink::inner(InnerNodeIdx::from_raw_unchecked(
            CompressedNodeLink::MAX_INDEX + 1,
        ));
    }
}
