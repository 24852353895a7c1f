use crate::geometry::{EPSILON, FloatType, Ray};

use super::{Triangle, WorldPoint};

impl Triangle<WorldPoint> {
    /// Calculates ray intersection with the (two sided) triangle.
    /// Returns distance along the ray, if the intersection lies within `(EPSILON, max_t]`.
    /// Adapted from https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm#Rust_implementation
    pub fn intersect(&self, ray: &Ray, max_t: FloatType) -> Option<FloatType> {
        let [e1, e2] = self.edges();

        let ray_cross_e2 = ray.direction.cross(&e2);
        let det = e1.dot(&ray_cross_e2);

        if det.abs() < EPSILON {
            return None; // Ray is parallel to the triangle
        }

        let inv_det = 1.0 / det;
        let s = ray.origin - self[0];
        let u = inv_det * s.dot(&ray_cross_e2);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let s_cross_e1 = s.cross(&e1);
        let v = inv_det * ray.direction.dot(&s_cross_e1);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = inv_det * e2.dot(&s_cross_e1);
        (t > EPSILON && t <= max_t).then_some(t)
    }
}
