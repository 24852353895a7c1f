use std::{array, fs, path::Path};

use crate::geometry::{FloatType, Triangle, WorldBox, WorldPoint, WorldVector};

use index_vec::IndexVec;
use indexmap::IndexMap;
use itertools::Itertools as _;
use morton_encoding::morton_encode;
use thiserror::Error;

use super::{
    CompressedNodeLink, INNER_NODE_CHILDREN, InnerNode, LEAF_NODE_MAX_TRIANGLES, TriangleBvh,
    TriangleIdx,
};

/// Child bounding boxes are grown by this much on every side, so that rays hitting
/// triangles lying exactly in a box face don't get culled by rounding.
const BOX_PADDING: FloatType = 1e-6;

impl TriangleBvh {
    /// Loads a scene from a Wavefront OBJ file.
    /// Polygons are triangulated by the parser, other primitives are skipped.
    pub fn with_obj(p: impl AsRef<Path>) -> Result<TriangleBvh, SceneError> {
        let content = fs::read_to_string(p)?;
        let parsed = wavefront_obj::obj::parse(content)?;

        let (faces, vertices) = Self::load_obj(parsed);
        if faces.is_empty() {
            return Err(SceneError::EmptyMesh);
        }

        Self::from_indexed(&vertices, &faces)
    }

    fn load_obj(obj: wavefront_obj::obj::ObjSet) -> (Vec<[usize; 3]>, Vec<WorldPoint>) {
        let mut faces = Vec::new();
        let mut vertices = IndexMap::new();
        let mut skipped = 0usize;

        for (object_index, o) in obj.objects.into_iter().enumerate() {
            for geometry in o.geometry {
                for shape in geometry.shapes {
                    let wavefront_obj::obj::Primitive::Triangle(a, b, c) = shape.primitive else {
                        skipped += 1;
                        continue;
                    };

                    let mut handle_vertex = |vtindex: (usize, Option<usize>, Option<usize>)| {
                        let entry = vertices.entry((object_index, vtindex.0));
                        let index = entry.index();
                        entry.or_insert_with(|| {
                            let vertex = &o.vertices[vtindex.0];
                            WorldPoint::new(vertex.x, vertex.y, vertex.z)
                        });
                        index
                    };

                    faces.push([handle_vertex(a), handle_vertex(b), handle_vertex(c)]);
                }
            }
        }

        if skipped > 0 {
            log::warn!("Skipped {skipped} non-triangle primitives");
        }

        (faces, vertices.into_values().collect())
    }

    /// Builds the scene from a shared vertex array and triangles given as triples of vertex indices.
    pub fn from_indexed(
        vertices: &[WorldPoint],
        faces: &[[usize; 3]],
    ) -> Result<TriangleBvh, SceneError> {
        let triangles = faces
            .iter()
            .enumerate()
            .map(|(face, indices)| {
                let vertex = |index: usize| {
                    vertices
                        .get(index)
                        .copied()
                        .ok_or(SceneError::VertexIndexOutOfRange {
                            face,
                            index,
                            vertex_count: vertices.len(),
                        })
                };
                Ok(Triangle::new(
                    vertex(indices[0])?,
                    vertex(indices[1])?,
                    vertex(indices[2])?,
                ))
            })
            .collect::<Result<Vec<_>, SceneError>>()?;

        Self::build(triangles)
    }

    /// Builds the BVH, taking ownership of the triangles.
    /// An empty triangle list is valid and describes free space.
    pub fn build(mut triangles: Vec<Triangle<WorldPoint>>) -> Result<TriangleBvh, SceneError> {
        if let Some(index) = triangles.iter().position(Triangle::is_degenerate) {
            return Err(SceneError::DegenerateTriangle { index });
        }
        if triangles.len() > CompressedNodeLink::MAX_INDEX as usize {
            return Err(SceneError::TooManyTriangles {
                count: triangles.len(),
                max: CompressedNodeLink::MAX_INDEX as usize,
            });
        }

        morton_sort(&mut triangles);

        let mut bvh = TriangleBvh {
            bounding_box: bounds(&triangles),
            root: CompressedNodeLink::NULL,

            inner_nodes: IndexVec::new(),
            triangles: IndexVec::new(),
        };

        if !triangles.is_empty() {
            bvh.root = bvh.build_recursive(&triangles, 0);
        }
        bvh.triangles = IndexVec::from_vec(triangles);

        log::debug!(
            "Built BVH with {} triangles and {} inner nodes",
            bvh.triangles.len(),
            bvh.inner_nodes.len()
        );

        Ok(bvh)
    }

    fn build_recursive(
        &mut self,
        triangles: &[Triangle<WorldPoint>],
        offset: usize,
    ) -> CompressedNodeLink {
        if triangles.len() <= LEAF_NODE_MAX_TRIANGLES {
            CompressedNodeLink::leaf(TriangleIdx::from_usize(offset), triangles.len())
        } else {
            self.build_inner_node(triangles, offset)
        }
    }

    fn build_inner_node(
        &mut self,
        triangles: &[Triangle<WorldPoint>],
        offset: usize,
    ) -> CompressedNodeLink {
        let split_indices = split_triangles(triangles.len());

        let child_bounds = array::from_fn(|i| bounds(&triangles[split_indices[i]..split_indices[i + 1]]));
        let child_links = array::from_fn(|i| {
            let (start, end) = (split_indices[i], split_indices[i + 1]);
            if start == end {
                CompressedNodeLink::NULL
            } else {
                self.build_recursive(&triangles[start..end], offset + start)
            }
        });

        self.inner_nodes.push(InnerNode {
            child_bounds,
            child_links,
        });
        CompressedNodeLink::inner(self.inner_nodes.last_idx())
    }
}

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse file: {0}")]
    ParseError(#[from] wavefront_obj::ParseError),

    #[error("Scene file contains no triangles")]
    EmptyMesh,

    #[error("Triangle {index} is degenerate (zero area or non-finite coordinates)")]
    DegenerateTriangle { index: usize },

    #[error("Face {face} references vertex {index}, but there are only {vertex_count} vertices")]
    VertexIndexOutOfRange {
        face: usize,
        index: usize,
        vertex_count: usize,
    },

    #[error("Scene has {count} triangles, at most {max} are supported")]
    TooManyTriangles { count: usize, max: usize },
}

fn morton_sort(triangles: &mut [Triangle<WorldPoint>]) {
    const GRID_BITS: usize = 10;

    let centroids = triangles.iter().map(Triangle::centroid).collect_vec();
    let Some(centroid_bounds) = WorldBox::from_points(&centroids) else {
        return;
    };
    let min = centroid_bounds.min;
    let scale = centroid_bounds
        .size()
        .map(|x| ((1 << GRID_BITS) - 1) as FloatType / if x > 0.0 { x } else { 1.0 });

    triangles.sort_by_cached_key(|triangle| {
        let grid_coordinates: [u32; 3] = (triangle.centroid() - min)
            .component_mul(&scale)
            .map(|x| x.round() as u32)
            .into();

        morton_encode(grid_coordinates)
    });
}

/// Padded bounding box of the triangles, a zero sized box at origin if there are none.
fn bounds(triangles: &[Triangle<WorldPoint>]) -> WorldBox {
    let padding = WorldVector::repeat(BOX_PADDING);
    WorldBox::from_points(triangles.iter().flat_map(|t| t.iter()))
        .map(|b| WorldBox::new(b.min - padding, b.max + padding))
        .unwrap_or_else(|| WorldBox::new(WorldPoint::origin(), WorldPoint::origin()))
}

/// Return an array of indices in the triangle array, where the output bins should be split.
/// Array is one larger than INNER_NODE_CHILDREN, first item is always 0,
/// last item is always triangle_count.
fn split_triangles(triangle_count: usize) -> [usize; INNER_NODE_CHILDREN + 1] {
    array::from_fn::<_, { INNER_NODE_CHILDREN + 1 }, _>(|i| i * triangle_count / INNER_NODE_CHILDREN)
}
