mod diffraction;
mod penetration;
mod reflection;

use bon::bon;
use nalgebra::Unit;

use crate::{
    geometry::{EPSILON, FloatType, Ray, WorldPoint, WorldVector},
    scene::{Object as _, StackCache, TriangleBvh},
};

pub use penetration::InterPoint;

/// Identifier of a tracer instance, assigned by whoever constructs it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TracerId(pub u32);

impl std::fmt::Display for TracerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tracer{}", self.0)
    }
}

/// Search budgets and tolerances of the path enumeration.
#[derive(Clone, Debug)]
pub struct TraceSettings {
    /// Surface crossings allowed on a direct path before it is given up.
    pub max_penetrations: usize,
    /// Surface crossings allowed on each leg of a reflected path.
    pub max_reflection_penetrations: usize,
    /// Angular gap (radians) at which the edge bisection stops.
    pub edge_angle_tolerance: FloatType,
    /// Bisection steps per edge.
    pub edge_scan_budget: usize,
    pub max_diffraction_depth: usize,
    /// Edge pairs closer than this are merged into their midpoint.
    pub edge_merge_distance: FloatType,
    /// How far past a surface a ray resumes.
    pub surface_offset: FloatType,
    /// Direction of the open sky.
    pub up: Unit<WorldVector>,
    pub diffraction: bool,
}

#[bon]
impl TraceSettings {
    #[builder]
    pub fn new(
        #[builder(default = 50)] max_penetrations: usize,
        #[builder(default = 4)] max_reflection_penetrations: usize,
        #[builder(default = 0.0017)] edge_angle_tolerance: FloatType,
        #[builder(default = 20)] edge_scan_budget: usize,
        #[builder(default = 20)] max_diffraction_depth: usize,
        #[builder(default = 0.5)] edge_merge_distance: FloatType,
        #[builder(default = 1e-4)] surface_offset: FloatType,
        #[builder(default = WorldVector::y())] up: WorldVector,
        #[builder(default = true)] diffraction: bool,
    ) -> Self {
        let up = Unit::try_new(up, EPSILON).expect("Up vector must be non-zero");

        assert!(edge_angle_tolerance > 0.0);
        assert!(edge_merge_distance >= 0.0);
        assert!(surface_offset > 0.0);

        TraceSettings {
            max_penetrations,
            max_reflection_penetrations,
            edge_angle_tolerance,
            edge_scan_budget,
            max_diffraction_depth,
            edge_merge_distance,
            surface_offset,
            up,
            diffraction,
        }
    }
}

impl Default for TraceSettings {
    fn default() -> Self {
        TraceSettings::builder().build()
    }
}

/// One propagation path between a transmitter and a receiver.
/// Every path starts at the transmitter and ends at the receiver.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    /// Straight segment, interior vertices are the surface crossings.
    Direct { path: Vec<WorldPoint> },
    /// Specular reflection off one triangle. `path[reflection_index]` lies on the reflecting
    /// plane, other interior vertices are surface crossings.
    SingleReflected {
        path: Vec<WorldPoint>,
        reflection_index: usize,
    },
    /// Path bent over obstacles, interior vertices are the diffraction edges.
    Diffracted { path: Vec<WorldPoint> },
}

impl Record {
    pub fn path(&self) -> &[WorldPoint] {
        match self {
            Record::Direct { path }
            | Record::SingleReflected { path, .. }
            | Record::Diffracted { path } => path,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Record::Direct { .. } => "direct",
            Record::SingleReflected { .. } => "reflected",
            Record::Diffracted { .. } => "diffracted",
        }
    }

    pub fn transmitter(&self) -> &WorldPoint {
        &self.path()[0]
    }

    pub fn receiver(&self) -> &WorldPoint {
        &self.path()[self.path().len() - 1]
    }

    /// Sum of the segment lengths.
    pub fn length(&self) -> FloatType {
        self.path()
            .windows(2)
            .map(|segment| (segment[1] - segment[0]).norm())
            .sum()
    }
}

/// Enumerates propagation paths through a static scene.
pub struct Tracer {
    id: TracerId,
    bvh: TriangleBvh,
    settings: TraceSettings,
}

impl Tracer {
    pub fn new(id: TracerId, bvh: TriangleBvh, settings: TraceSettings) -> Tracer {
        log::debug!(
            "Created {id} over {} triangles",
            bvh.triangle_count()
        );
        Tracer { id, bvh, settings }
    }

    pub fn id(&self) -> TracerId {
        self.id
    }

    pub fn bvh(&self) -> &TriangleBvh {
        &self.bvh
    }

    pub fn settings(&self) -> &TraceSettings {
        &self.settings
    }

    /// Finds all direct, single reflected and diffracted paths from `tx` to `rx`.
    pub fn trace(&self, tx: &WorldPoint, rx: &WorldPoint) -> Vec<Record> {
        self.trace_with_stack(tx, rx, &mut StackCache::default())
    }

    /// Like [`Tracer::trace`], reusing a caller owned traversal stack.
    pub fn trace_with_stack(
        &self,
        tx: &WorldPoint,
        rx: &WorldPoint,
        stack: &mut StackCache,
    ) -> Vec<Record> {
        let mut records = Vec::new();

        let direct = self.penetrate(tx, rx, self.settings.max_penetrations, stack);
        let obstructed = direct.as_ref().is_none_or(|crossings| !crossings.is_empty());
        if let Some(crossings) = direct {
            records.push(Record::Direct {
                path: join_path(tx, crossings.iter().map(|c| c.position), rx),
            });
        }

        records.extend(self.reflections(tx, rx, stack));

        if self.settings.diffraction && obstructed {
            if let Some(edges) = self.diffraction_edges(tx, rx, stack) {
                records.push(Record::Diffracted {
                    path: join_path(tx, edges, rx),
                });
            }
        }

        records
    }

    /// True if nothing in the scene lies straight above the point.
    pub fn is_outdoor(&self, p: &WorldPoint) -> bool {
        self.is_outdoor_with_stack(p, &mut StackCache::default())
    }

    pub fn is_outdoor_with_stack(&self, p: &WorldPoint, stack: &mut StackCache) -> bool {
        let ray = Ray::new(*p, self.settings.up.into_inner());
        self.bvh.intersect(&ray, FloatType::INFINITY, stack).is_none()
    }
}

fn join_path(
    tx: &WorldPoint,
    interior: impl IntoIterator<Item = WorldPoint>,
    rx: &WorldPoint,
) -> Vec<WorldPoint> {
    std::iter::once(*tx)
        .chain(interior)
        .chain(std::iter::once(*rx))
        .collect()
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::geometry::Triangle;
    use assert2::{assert, let_assert};

    /// Two triangles forming an axis aligned rectangle.
    /// `corner` is the minimum corner, the rectangle spans `u` and `v`.
    pub fn rectangle(
        corner: WorldPoint,
        u: WorldVector,
        v: WorldVector,
    ) -> [Triangle<WorldPoint>; 2] {
        [
            Triangle::new(corner, corner + u, corner + v),
            Triangle::new(corner + u, corner + u + v, corner + v),
        ]
    }

    /// Thin wall in the x = 0 plane, 10 high, 100 wide.
    pub fn wall() -> Vec<Triangle<WorldPoint>> {
        rectangle(
            WorldPoint::new(0.0, 0.0, -50.0),
            WorldVector::new(0.0, 10.0, 0.0),
            WorldVector::new(0.0, 0.0, 100.0),
        )
        .into()
    }

    /// Large ground plane at y = 0.
    pub fn ground() -> Vec<Triangle<WorldPoint>> {
        rectangle(
            WorldPoint::new(-500.0, 0.0, -500.0),
            WorldVector::new(1000.0, 0.0, 0.0),
            WorldVector::new(0.0, 0.0, 1000.0),
        )
        .into()
    }

    pub fn tracer(triangles: Vec<Triangle<WorldPoint>>) -> Tracer {
        Tracer::new(
            TracerId(0),
            TriangleBvh::build(triangles).unwrap(),
            TraceSettings::default(),
        )
    }

    #[test]
    fn empty_scene_has_single_direct_path() {
        let tracer = tracer(Vec::new());
        let tx = WorldPoint::new(0.0, 1.5, 0.0);
        let rx = WorldPoint::new(100.0, 1.5, 0.0);

        let records = tracer.trace(&tx, &rx);
        assert!(records == vec![Record::Direct { path: vec![tx, rx] }]);
        assert!((records[0].length() - 100.0).abs() < 1e-12);
    }

    #[test]
    fn ground_gives_direct_and_reflected() {
        let tracer = tracer(ground());
        let tx = WorldPoint::new(0.0, 10.0, 0.0);
        let rx = WorldPoint::new(40.0, 2.0, 0.0);

        let records = tracer.trace(&tx, &rx);
        assert!(records.len() == 2);
        assert!(records[0] == Record::Direct { path: vec![tx, rx] });

        let_assert!(Record::SingleReflected { path, reflection_index } = &records[1]);
        assert!(*reflection_index == 1);
        assert!(path.len() == 3);
        let reflection = path[*reflection_index];
        assert!(reflection.y.abs() < 1e-9);
        // tx is 5 times higher than rx, so the reflection point splits the distance 5:1
        assert!((reflection.x - 40.0 * 10.0 / 12.0).abs() < 1e-6);
    }

    #[test]
    fn wall_gives_crossing_and_diffraction() {
        let tracer = tracer(wall());
        let tx = WorldPoint::new(-10.0, 2.0, 0.0);
        let rx = WorldPoint::new(10.0, 2.0, 0.0);

        let records = tracer.trace(&tx, &rx);

        let_assert!(Some(Record::Direct { path }) = records.first());
        assert!(path.len() == 3);
        assert!(path[1].x.abs() < 1e-9);

        let_assert!(
            Some(Record::Diffracted { path }) = records
                .iter()
                .find(|r| matches!(r, Record::Diffracted { .. }))
        );
        assert!(path.len() >= 3);
        assert!(path[0] == tx);
        assert!(path[path.len() - 1] == rx);
        for edge in &path[1..path.len() - 1] {
            assert!((edge - WorldPoint::new(0.0, 10.0, 0.0)).norm() < 0.1);
        }
    }

    #[test]
    fn diffraction_can_be_disabled() {
        let tracer = Tracer::new(
            TracerId(1),
            TriangleBvh::build(wall()).unwrap(),
            TraceSettings::builder().diffraction(false).build(),
        );
        let records = tracer.trace(&WorldPoint::new(-10.0, 2.0, 0.0), &WorldPoint::new(10.0, 2.0, 0.0));
        assert!(!records.iter().any(|r| matches!(r, Record::Diffracted { .. })));
    }

    #[test]
    fn trace_is_deterministic() {
        let mut triangles = ground();
        triangles.extend(wall());
        let tracer = tracer(triangles);
        let tx = WorldPoint::new(-20.0, 3.0, 1.0);
        let rx = WorldPoint::new(15.0, 1.0, -2.0);

        assert!(tracer.trace(&tx, &rx) == tracer.trace(&tx, &rx));
    }

    #[test]
    fn concurrent_traces_agree() {
        let mut triangles = ground();
        triangles.extend(wall());
        let tracer = tracer(triangles);
        let tx = WorldPoint::new(-20.0, 3.0, 1.0);
        let rx = WorldPoint::new(15.0, 1.0, -2.0);
        let expected = tracer.trace(&tx, &rx);

        std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| tracer.trace(&tx, &rx)))
                .collect();
            for handle in handles {
                assert!(handle.join().unwrap() == expected);
            }
        });
    }

    #[test]
    fn outdoor_check() {
        let mut triangles = ground();
        // roof over the origin
        triangles.extend(rectangle(
            WorldPoint::new(-5.0, 5.0, -5.0),
            WorldVector::new(10.0, 0.0, 0.0),
            WorldVector::new(0.0, 0.0, 10.0),
        ));
        let tracer = tracer(triangles);

        assert!(!tracer.is_outdoor(&WorldPoint::new(0.0, 1.0, 0.0)));
        assert!(tracer.is_outdoor(&WorldPoint::new(20.0, 1.0, 0.0)));
        assert!(tracer.is_outdoor(&WorldPoint::new(0.0, 6.0, 0.0)));
    }

    #[test]
    fn record_accessors() {
        let tx = WorldPoint::new(0.0, 0.0, 0.0);
        let rx = WorldPoint::new(0.0, 0.0, 4.0);
        let record = Record::SingleReflected {
            path: vec![tx, WorldPoint::new(3.0, 0.0, 2.0), rx],
            reflection_index: 1,
        };
        assert!(*record.transmitter() == tx);
        assert!(*record.receiver() == rx);
        assert!((record.length() - 2.0 * 13.0f64.sqrt()).abs() < 1e-12);
    }
}
