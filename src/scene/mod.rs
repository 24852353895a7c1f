pub mod triangle_bvh;

use crate::geometry::{FloatType, Ray, WorldBox, WorldPoint};

pub use triangle_bvh::{SceneError, StackCache, TriangleBvh, TriangleIdx};

/// Nearest intersection of a ray with the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct HitRecord {
    /// Distance along the ray
    pub t: FloatType,
    pub point: WorldPoint,
    pub triangle_index: TriangleIdx,
}

/// Static geometry that can answer nearest-hit queries.
pub trait Object {
    /// Finds the nearest intersection within `max_t` along the ray.
    fn intersect(&self, ray: &Ray, max_t: FloatType, stack: &mut StackCache) -> Option<HitRecord>;
    fn get_bounding_box(&self) -> WorldBox;
}
