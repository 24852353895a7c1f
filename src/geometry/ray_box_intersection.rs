use crate::geometry::{FloatType, Ray, WorldBox, WorldPoint};

impl WorldBox {
    /// Distance along the ray at which it enters the box, if that happens within `[0, max_t]`.
    /// A ray starting inside the box enters it at zero.
    pub fn entry_distance(&self, ray: &Ray, max_t: FloatType) -> Option<FloatType> {
        // A ray parallel to a slab and starting on one of its planes produces 0 * inf = NaN,
        // such slabs don't limit the interval.
        let slab_t = |corner: &WorldPoint, fallback: FloatType| {
            (corner - ray.origin)
                .component_mul(&ray.inv_direction)
                .map(|t| if t.is_nan() { fallback } else { t })
        };
        let to_min = slab_t(&self.min, FloatType::NEG_INFINITY);
        let to_max = slab_t(&self.max, FloatType::INFINITY);

        let enter = to_min.zip_map(&to_max, FloatType::min).max().max(0.0);
        let exit = to_min.zip_map(&to_max, FloatType::max).min().min(max_t);

        (enter <= exit).then_some(enter)
    }
}

#[cfg(test)]
mod tests {
    use assert2::{assert, let_assert};
    use proptest::prop_assume;
    use test_case::test_case;
    use test_strategy::proptest;

    use crate::geometry::{
        Ray, WorldBox, WorldPoint, WorldVector,
        test::{nonzero_vector, world_point},
    };

    use super::*;

    fn unit_box() -> WorldBox {
        WorldBox::new(WorldPoint::new(5.0, 5.0, 5.0), WorldPoint::new(10.0, 10.0, 10.0))
    }

    #[proptest]
    fn ray_aimed_at_box_enters_on_surface(
        #[strategy(world_point())] origin: WorldPoint,
        #[strategy(nonzero_vector())] offset: WorldVector,
    ) {
        let b = unit_box();
        let target = b.center() + offset.map(|x| x.clamp(-2.0, 2.0));
        let direction = target - origin;
        prop_assume!(direction.norm() > 1e-3);

        let ray = Ray::new(origin, direction);
        let_assert!(Some(t) = b.entry_distance(&ray, FloatType::INFINITY));
        let p = ray.point_at(t);

        const TOLERANCE: FloatType = 1e-6;
        let inside = (0..3).all(|i| p[i] >= b.min[i] - TOLERANCE && p[i] <= b.max[i] + TOLERANCE);
        assert!(inside, "{p:?} must be in {b:?}");
        if t > 0.0 {
            let on_face = (0..3).any(|i| {
                (p[i] - b.min[i]).abs() <= TOLERANCE || (p[i] - b.max[i]).abs() <= TOLERANCE
            });
            assert!(on_face);
        }
    }

    #[test]
    fn starting_inside() {
        let ray = Ray::new(WorldPoint::new(7.0, 7.0, 7.0), WorldVector::new(1.0, 2.0, 3.0));
        assert!(unit_box().entry_distance(&ray, FloatType::INFINITY) == Some(0.0));
    }

    #[test]
    fn grazing_along_edge() {
        let ray = Ray::new(WorldPoint::new(5.0, 5.0, 0.0), WorldVector::z());
        assert!(unit_box().entry_distance(&ray, FloatType::INFINITY) == Some(5.0));
    }

    #[test]
    fn beyond_max_distance() {
        let ray = Ray::new(WorldPoint::new(7.0, 7.0, 0.0), WorldVector::z());
        assert!(unit_box().entry_distance(&ray, 4.9).is_none());
        assert!(unit_box().entry_distance(&ray, 5.0) == Some(5.0));
    }

    #[test]
    fn box_behind_ray() {
        let ray = Ray::new(WorldPoint::new(7.0, 7.0, 20.0), WorldVector::z());
        assert!(unit_box().entry_distance(&ray, FloatType::INFINITY).is_none());
    }

    #[test_case( 0.0,  7.0,  7.0,   0.0, 1.0, 0.0 ; "low x parallel")]
    #[test_case(12.0,  7.0,  7.0,   0.0, 1.0, 0.0 ; "high x parallel")]
    #[test_case( 7.0,  0.0,  7.0,   1.0, 0.0, 0.0 ; "low y parallel")]
    #[test_case( 7.0,  7.0, 12.0,   1.0, 0.0, 0.0 ; "high z parallel")]
    #[test_case( 0.0,  5.0,  7.0,   1.0, 0.0, 1.0 ; "past the corner")]
    #[test_case( 0.0,  0.0,  0.0,  -1.0, 1.0, 1.0 ; "away from the box")]
    fn misses(px: f64, py: f64, pz: f64, dx: f64, dy: f64, dz: f64) {
        let ray = Ray::new(WorldPoint::new(px, py, pz), WorldVector::new(dx, dy, dz));
        assert!(unit_box().entry_distance(&ray, FloatType::INFINITY).is_none());
    }
}
