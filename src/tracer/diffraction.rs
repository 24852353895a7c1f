use nalgebra::Unit;

use crate::{
    geometry::{AABB, EPSILON, FloatType, Ray, WorldPoint, WorldVector, project_point},
    scene::{Object as _, StackCache},
};

use super::Tracer;

/// Slack for the projected bounding rectangle test of edge search rays.
const RECTANGLE_MARGIN: FloatType = 1e-6;

impl Tracer {
    /// Searches for a chain of edges over which the signal can bend from `tx` to `rx`.
    /// Returns the edge points in order from tx to rx, or None if the search gives up.
    pub fn diffraction_edges(
        &self,
        tx: &WorldPoint,
        rx: &WorldPoint,
        stack: &mut StackCache,
    ) -> Option<Vec<WorldPoint>> {
        let edges = self.diffraction_edges_recursive(tx, rx, 0, stack)?;
        Some(merge_close_edges(edges, self.settings.edge_merge_distance))
    }

    fn diffraction_edges_recursive(
        &self,
        tx: &WorldPoint,
        rx: &WorldPoint,
        depth: usize,
        stack: &mut StackCache,
    ) -> Option<Vec<WorldPoint>> {
        if depth >= self.settings.max_diffraction_depth {
            log::trace!("Diffraction search from {tx} to {rx} ran out of depth");
            return None;
        }

        let tx_edge = self.find_edge(tx, rx, stack)?;
        let rx_edge = self.find_edge(rx, tx, stack)?;

        if self.is_visible(&tx_edge, &rx_edge, stack) {
            if (rx_edge - tx_edge).norm() < self.settings.edge_merge_distance {
                Some(vec![nalgebra::center(&tx_edge, &rx_edge)])
            } else {
                Some(vec![tx_edge, rx_edge])
            }
        } else {
            let inner = self.diffraction_edges_recursive(&tx_edge, &rx_edge, depth + 1, stack)?;

            let mut edges = Vec::with_capacity(inner.len() + 2);
            edges.push(tx_edge);
            edges.extend(inner);
            edges.push(rx_edge);
            Some(edges)
        }
    }

    /// Finds the edge of the obstacle between `origin` and `target`, as seen from `origin`.
    ///
    /// Bisects the angle between a ray going straight up (which must be clear) and a ray
    /// pointing at the target (which must be blocked). Rays only count as blocked if they
    /// hit inside the footprint of the two points.
    ///
    /// The edge is placed on the last clear ray, straight above the last blocked hit,
    /// so it never sits inside the obstacle however steep the rays are.
    fn find_edge(
        &self,
        origin: &WorldPoint,
        target: &WorldPoint,
        stack: &mut StackCache,
    ) -> Option<WorldPoint> {
        let up_axis = self.settings.up.iamax();
        let footprint = AABB::from_points(&[
            project_point(origin, up_axis),
            project_point(target, up_axis),
        ])?;

        let mut cast = |direction: &Unit<WorldVector>| {
            let ray = Ray::new(*origin, direction.into_inner());
            self.bvh
                .intersect(&ray, FloatType::INFINITY, stack)
                .map(|hit| (hit.t, project_point(&hit.point, up_axis)))
        };

        let mut miss = self.settings.up;
        if cast(&miss).is_some() {
            return None;
        }

        let mut hit = Unit::try_new(target - origin, EPSILON)?;
        let (mut hit_t, hit_point) = cast(&hit)?;
        let mut hit_position = origin + hit.into_inner() * hit_t;
        if !footprint.contains(&hit_point, RECTANGLE_MARGIN) {
            return None;
        }

        for _ in 0..self.settings.edge_scan_budget {
            if miss.angle(hit.as_ref()) < self.settings.edge_angle_tolerance {
                break;
            }
            let middle = Unit::try_new(miss.into_inner() + hit.into_inner(), EPSILON)?;

            match cast(&middle) {
                Some((t, point)) if footprint.contains(&point, RECTANGLE_MARGIN) => {
                    hit = middle;
                    hit_t = t;
                    hit_position = origin + middle.into_inner() * t;
                }
                _ => miss = middle,
            }
        }

        let up = self.settings.up.into_inner();
        let horizontal = |v: WorldVector| v - up * v.dot(&up);
        let miss_horizontal = horizontal(miss.into_inner());
        let reach = miss_horizontal.norm_squared();
        let t = if reach > EPSILON {
            horizontal(hit_position - origin).dot(&miss_horizontal).max(0.0) / reach
        } else {
            hit_t
        };

        Some(origin + miss.into_inner() * t + up * self.settings.surface_offset)
    }
}

/// Replaces runs of consecutive edges closer than `distance` with their midpoints.
fn merge_close_edges(edges: Vec<WorldPoint>, distance: FloatType) -> Vec<WorldPoint> {
    let mut merged: Vec<WorldPoint> = Vec::with_capacity(edges.len());
    for edge in edges {
        match merged.last_mut() {
            Some(last) if (edge - *last).norm() < distance => {
                *last = nalgebra::center(last, &edge);
            }
            _ => merged.push(edge),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        geometry::{Triangle, WorldVector},
        scene::TriangleBvh,
        tracer::{
            TraceSettings, TracerId,
            test::{ground, rectangle, tracer, wall},
        },
    };
    use assert2::{assert, let_assert};
    use test_case::test_case;

    /// Closed box building with the given footprint corners and height.
    fn building(
        min: (FloatType, FloatType),
        max: (FloatType, FloatType),
        height: FloatType,
    ) -> Vec<Triangle<WorldPoint>> {
        let (x0, z0) = min;
        let (x1, z1) = max;
        let dx = WorldVector::new(x1 - x0, 0.0, 0.0);
        let dz = WorldVector::new(0.0, 0.0, z1 - z0);
        let dy = WorldVector::new(0.0, height, 0.0);
        [
            rectangle(WorldPoint::new(x0, 0.0, z0), dx, dy),
            rectangle(WorldPoint::new(x0, 0.0, z1), dx, dy),
            rectangle(WorldPoint::new(x0, 0.0, z0), dz, dy),
            rectangle(WorldPoint::new(x1, 0.0, z0), dz, dy),
            rectangle(WorldPoint::new(x0, height, z0), dx, dz),
        ]
        .into_iter()
        .flatten()
        .collect()
    }

    #[test]
    fn single_wall_edge() {
        let tracer = tracer(wall());
        let mut stack = StackCache::default();
        let tx = WorldPoint::new(-10.0, 2.0, 0.0);
        let rx = WorldPoint::new(10.0, 2.0, 0.0);

        let_assert!(Some(edge) = tracer.find_edge(&tx, &rx, &mut stack));
        assert!((edge - WorldPoint::new(0.0, 10.0, 0.0)).norm() < 0.05);
    }

    #[test]
    fn visible_endpoints_have_no_edge() {
        let tracer = tracer(wall());
        let mut stack = StackCache::default();
        let tx = WorldPoint::new(-10.0, 2.0, 0.0);
        let rx = WorldPoint::new(-20.0, 2.0, 0.0);

        assert!(tracer.find_edge(&tx, &rx, &mut stack).is_none());
    }

    #[test]
    fn covered_endpoint_has_no_edge() {
        let mut triangles = wall();
        triangles.extend(rectangle(
            WorldPoint::new(-15.0, 5.0, -5.0),
            WorldVector::new(10.0, 0.0, 0.0),
            WorldVector::new(0.0, 0.0, 10.0),
        ));
        let tracer = tracer(triangles);
        let tx = WorldPoint::new(-10.0, 2.0, 0.0);
        let rx = WorldPoint::new(10.0, 2.0, 0.0);

        assert!(tracer.diffraction_edges(&tx, &rx, &mut StackCache::default()).is_none());
    }

    #[test]
    fn hits_outside_footprint_are_ignored() {
        // Tall wall behind the receiver is hit by rays passing over the low wall
        let mut triangles = wall();
        triangles.extend(rectangle(
            WorldPoint::new(15.0, 0.0, -50.0),
            WorldVector::new(0.0, 100.0, 0.0),
            WorldVector::new(0.0, 0.0, 100.0),
        ));
        let tracer = tracer(triangles);
        let tx = WorldPoint::new(-10.0, 2.0, 0.0);
        let rx = WorldPoint::new(10.0, 2.0, 0.0);

        let_assert!(Some(edges) = tracer.diffraction_edges(&tx, &rx, &mut StackCache::default()));
        for edge in edges {
            assert!((edge - WorldPoint::new(0.0, 10.0, 0.0)).norm() < 0.1);
        }
    }

    #[test]
    fn two_buildings_give_two_edges() {
        let mut triangles = ground();
        triangles.extend(building((-20.0, -10.0), (-10.0, 10.0), 10.0));
        triangles.extend(building((10.0, -10.0), (20.0, 10.0), 10.0));
        let tracer = tracer(triangles);
        let tx = WorldPoint::new(-30.0, 2.0, 0.0);
        let rx = WorldPoint::new(30.0, 2.0, 0.0);

        let_assert!(Some(edges) = tracer.diffraction_edges(&tx, &rx, &mut StackCache::default()));
        assert!(edges.len() == 2);
        assert!((edges[0] - WorldPoint::new(-20.0, 10.0, 0.0)).norm() < 0.1);
        assert!((edges[1] - WorldPoint::new(20.0, 10.0, 0.0)).norm() < 0.1);
    }

    #[test]
    fn steep_edge_stays_above_roof() {
        // Transmitter right next to a tall box, the first edge is seen almost straight up
        let mut triangles = ground();
        triangles.extend(building((-5.0, -5.0), (5.0, 5.0), 10.0));
        let tracer = tracer(triangles);
        let tx = WorldPoint::new(-6.0, 2.0, 0.0);
        let rx = WorldPoint::new(30.0, 1.5, 1.0);

        let_assert!(Some(edges) = tracer.diffraction_edges(&tx, &rx, &mut StackCache::default()));
        assert!(edges.len() == 2);
        for edge in &edges {
            assert!(edge.y >= 10.0);
        }
        assert!((edges[0].x + 5.0).abs() < 0.1);
        assert!((edges[1].x - 5.0).abs() < 0.1);
    }

    #[test]
    fn merging_close_edges() {
        let edges = vec![
            WorldPoint::new(0.0, 0.0, 0.0),
            WorldPoint::new(0.2, 0.0, 0.0),
            WorldPoint::new(5.0, 0.0, 0.0),
            WorldPoint::new(5.0, 0.4, 0.0),
        ];
        let merged = merge_close_edges(edges, 0.5);
        assert!(merged == vec![WorldPoint::new(0.1, 0.0, 0.0), WorldPoint::new(5.0, 0.2, 0.0)]);
    }

    #[test_case(0, false ; "no depth")]
    #[test_case(20, true ; "default depth")]
    fn depth_budget(depth: usize, found: bool) {
        let tracer = Tracer::new(
            TracerId(2),
            TriangleBvh::build(wall()).unwrap(),
            TraceSettings::builder().max_diffraction_depth(depth).build(),
        );
        let tx = WorldPoint::new(-10.0, 2.0, 0.0);
        let rx = WorldPoint::new(10.0, 2.0, 0.0);
        let edges = tracer.diffraction_edges(&tx, &rx, &mut StackCache::default());
        assert!(edges.is_some() == found);
    }
}
