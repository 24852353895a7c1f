use crate::{
    geometry::{EPSILON, FloatType, Ray, WorldPoint},
    scene::{Object as _, StackCache},
};

use super::Tracer;

/// Surface crossing found while marching along a segment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InterPoint {
    pub position: WorldPoint,
    /// Distance from the start of the segment
    pub distance: FloatType,
}

impl Tracer {
    /// Marches from `from` to `to`, collecting every surface crossed on the way.
    /// Returns None if the segment crosses more than `max_crossings` surfaces.
    pub fn penetrate(
        &self,
        from: &WorldPoint,
        to: &WorldPoint,
        max_crossings: usize,
        stack: &mut StackCache,
    ) -> Option<Vec<InterPoint>> {
        let length = (to - from).norm();
        let mut crossings = Vec::new();
        if length <= EPSILON {
            return Some(crossings);
        }

        let mut ray = Ray::between(from, to);
        let mut total = 0.0;

        while total < length {
            let remaining = length - total;
            let Some(hit) = self.bvh.intersect(&ray, remaining, stack) else {
                break;
            };
            if hit.t >= remaining - EPSILON {
                // Surface touching the endpoint
                break;
            }
            if crossings.len() == max_crossings {
                return None;
            }

            total += hit.t;
            crossings.push(InterPoint {
                position: hit.point,
                distance: total,
            });

            ray.origin = ray.point_at(hit.t + self.settings.surface_offset);
            total += self.settings.surface_offset;
        }

        Some(crossings)
    }

    /// True if the segment between the points crosses no surface.
    pub fn is_visible(&self, from: &WorldPoint, to: &WorldPoint, stack: &mut StackCache) -> bool {
        self.penetrate(from, to, 0, stack).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::{Triangle, WorldVector},
        tracer::{
            Record,
            test::{rectangle, tracer},
        },
    };
    use assert2::{assert, let_assert};
    use test_case::test_case;

    /// Parallel slabs in planes x = 1, 2, ..., count, each with two faces 0.2 apart.
    fn slabs(count: usize) -> Vec<Triangle<WorldPoint>> {
        (1..=count)
            .flat_map(|i| {
                let x = i as FloatType;
                [x, x + 0.2].into_iter().flat_map(|x| {
                    rectangle(
                        WorldPoint::new(x, -10.0, -10.0),
                        WorldVector::new(0.0, 20.0, 0.0),
                        WorldVector::new(0.0, 0.0, 20.0),
                    )
                })
            })
            .collect()
    }

    #[test]
    fn one_slab_two_crossings() {
        let tracer = tracer(slabs(1));
        let from = WorldPoint::new(0.0, 0.5, 0.5);
        let to = WorldPoint::new(3.0, 0.5, 0.5);

        let_assert!(Some(crossings) = tracer.penetrate(&from, &to, 50, &mut StackCache::default()));
        assert!(crossings.len() == 2);
        assert!((crossings[0].position.x - 1.0).abs() < 1e-9);
        assert!((crossings[1].position.x - 1.2).abs() < 1e-9);
        assert!((crossings[0].distance - 1.0).abs() < 1e-9);
        assert!((crossings[1].distance - 1.2).abs() < 1e-3);
    }

    #[test_case(0, 1 ; "no budget")]
    #[test_case(5, 3 ; "budget too small")]
    #[test_case(6, 3 ; "budget exactly")]
    #[test_case(10, 3 ; "budget larger")]
    fn budget_is_respected(budget: usize, slab_count: usize) {
        let tracer = tracer(slabs(slab_count));
        let from = WorldPoint::new(0.0, 0.5, 0.5);
        let to = WorldPoint::new(slab_count as FloatType + 1.0, 0.5, 0.5);

        let result = tracer.penetrate(&from, &to, budget, &mut StackCache::default());
        assert!(result.is_some() == (budget >= 2 * slab_count));
    }

    #[test]
    fn dense_slabs_have_no_direct_path() {
        let tracer = tracer(slabs(30));
        let tx = WorldPoint::new(0.0, 0.5, 0.5);
        let rx = WorldPoint::new(40.0, 0.5, 0.5);

        let records = tracer.trace(&tx, &rx);
        assert!(!records.iter().any(|r| matches!(r, Record::Direct { .. })));
    }

    #[test]
    fn endpoint_on_surface_is_not_a_crossing() {
        let tracer = tracer(slabs(1));
        let from = WorldPoint::new(0.0, 0.5, 0.5);
        let to = WorldPoint::new(1.0, 0.5, 0.5);

        let_assert!(Some(crossings) = tracer.penetrate(&from, &to, 50, &mut StackCache::default()));
        assert!(crossings.is_empty());
    }

    #[test]
    fn visibility() {
        let tracer = tracer(slabs(1));
        let mut stack = StackCache::default();
        let a = WorldPoint::new(0.0, 0.5, 0.5);
        let b = WorldPoint::new(0.5, 3.0, -1.0);
        let c = WorldPoint::new(2.0, 0.5, 0.5);

        assert!(tracer.is_visible(&a, &b, &mut stack));
        assert!(!tracer.is_visible(&a, &c, &mut stack));
    }
}
