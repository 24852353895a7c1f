use crate::{
    geometry::{EPSILON, Ray, Triangle, WorldPoint},
    scene::StackCache,
};

use super::{Record, Tracer, join_path};

impl Tracer {
    /// Specular single reflections off every triangle of the scene.
    ///
    /// A reflection point on an edge shared by coplanar triangles is reported once.
    pub(super) fn reflections(
        &self,
        tx: &WorldPoint,
        rx: &WorldPoint,
        stack: &mut StackCache,
    ) -> Vec<Record> {
        let mut found: Vec<(WorldPoint, Record)> = Vec::new();
        for (_, triangle) in self.bvh.triangles() {
            let Some((vertex, record)) = self.reflect(triangle, tx, rx, stack) else {
                continue;
            };
            let duplicate = found
                .iter()
                .any(|(other, _)| (other - vertex).norm() <= self.settings.surface_offset);
            if !duplicate {
                found.push((vertex, record));
            }
        }
        found.into_iter().map(|(_, record)| record).collect()
    }

    fn reflect(
        &self,
        triangle: &Triangle<WorldPoint>,
        tx: &WorldPoint,
        rx: &WorldPoint,
        stack: &mut StackCache,
    ) -> Option<(WorldPoint, Record)> {
        // Both endpoints must be strictly on the same side of the plane
        if triangle.signed_distance(tx) * triangle.signed_distance(rx) <= 0.0 {
            return None;
        }

        let mirror = triangle.mirror_point(tx);
        let distance = (rx - mirror).norm();
        if distance <= EPSILON {
            return None;
        }

        let ray = Ray::between(&mirror, rx);
        let t = triangle.intersect(&ray, distance)?;
        let reflection = ray.point_at(t);
        let nudged = ray.point_at(t + self.settings.surface_offset);

        let budget = self.settings.max_reflection_penetrations;
        let tx_side = self.penetrate(tx, &nudged, budget, stack)?;
        let rx_side = self.penetrate(&nudged, rx, budget, stack)?;

        let interior = tx_side
            .iter()
            .map(|c| c.position)
            .chain(std::iter::once(reflection))
            .chain(rx_side.iter().map(|c| c.position));

        let record = Record::SingleReflected {
            path: join_path(tx, interior, rx),
            reflection_index: 1 + tx_side.len(),
        };
        Some((reflection, record))
    }
}
