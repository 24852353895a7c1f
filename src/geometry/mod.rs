mod aabb;
mod ray_box_intersection;
mod ray_triangle_intersection;
mod triangle;

use nalgebra::{Point3, Unit, Vector3};

pub use aabb::{AABB, project_point};
pub use triangle::Triangle;

pub type FloatType = f64;

pub type WorldPoint = Point3<FloatType>;
pub type WorldVector = Vector3<FloatType>;
pub type WorldBox = AABB<WorldPoint>;

/// Tolerance for degenerate geometry and self-intersection rejection.
pub const EPSILON: FloatType = 1e-9;

#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub origin: WorldPoint,
    /// Normalized direction of the ray
    pub direction: Unit<WorldVector>,

    /// Componentwise inverse of the ray direction
    /// Zeros in direction get turned into positive infinity regardless of the sign of the zero
    pub inv_direction: WorldVector,
}

impl Ray {
    pub fn new(origin: WorldPoint, direction: WorldVector) -> Ray {
        let direction = Unit::new_normalize(direction);
        let inv_direction = direction.map(|x| {
            if x == 0.0 {
                FloatType::INFINITY
            } else {
                1.0 / x
            }
        });

        Ray {
            origin,
            direction,
            inv_direction,
        }
    }

    /// Ray starting at `from`, pointing at `to`.
    /// The points must not coincide.
    pub fn between(from: &WorldPoint, to: &WorldPoint) -> Ray {
        Ray::new(*from, to - from)
    }

    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction.as_ref() * distance
    }
}
