use std::ops::{Index, Sub};

use nalgebra::{
    ClosedAddAssign, ClosedDivAssign, ClosedMulAssign, ClosedSubAssign, DefaultAllocator, DimName,
    OPoint, OVector, Scalar, Unit, allocator::Allocator,
};
use num_traits::Zero;

use super::{EPSILON, FloatType, WorldPoint, WorldVector};

#[derive(Clone, Debug, PartialEq)]
pub struct Triangle<Point>([Point; 3]);

impl<Point> Triangle<Point> {
    pub fn new(a: Point, b: Point, c: Point) -> Triangle<Point> {
        Triangle([a, b, c])
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item = &'a Point> {
        self.0.iter()
    }
}

impl<Point> Index<usize> for Triangle<Point> {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<T: Scalar, D: DimName> Triangle<OPoint<T, D>>
where
    DefaultAllocator: Allocator<D>,
    T: ClosedAddAssign + ClosedDivAssign + Zero + From<u16>,
{
    pub fn centroid(&self) -> OPoint<T, D> {
        OPoint {
            coords: self.0.iter().map(|p| &p.coords).sum::<OVector<T, D>>()
                / T::from(self.0.len() as u16),
        }
    }
}

impl<T: Scalar, D: DimName> Triangle<OPoint<T, D>>
where
    DefaultAllocator: Allocator<D>,
    for<'a> &'a OPoint<T, D>: Sub<Output = OVector<T, D>>,
{
    /// Returns edge vectors, coming from self[0]
    pub fn edges(&self) -> [OVector<T, D>; 2] {
        [&self.0[1] - &self.0[0], &self.0[2] - &self.0[0]]
    }
}

impl<T: Scalar, D: DimName> Triangle<OPoint<T, D>>
where
    DefaultAllocator: Allocator<D>,
    for<'a> &'a OPoint<T, D>: Sub<Output = OVector<T, D>>,
    T: ClosedAddAssign + ClosedSubAssign + ClosedMulAssign,
{
    /// Returns a normal vector of the triangle, not normalized.
    pub fn normal(&self) -> OVector<T, D> {
        let [e1, e2] = self.edges();
        e1.cross(&e2)
    }
}

impl Triangle<WorldPoint> {
    pub fn area(&self) -> FloatType {
        self.normal().norm() / 2.0
    }

    /// Normal of the supporting plane, None for a degenerate triangle.
    pub fn unit_normal(&self) -> Option<Unit<WorldVector>> {
        Unit::try_new(self.normal(), EPSILON)
    }

    /// True if the triangle has non-finite coordinates or (almost) zero area.
    pub fn is_degenerate(&self) -> bool {
        self.iter().any(|p| p.iter().any(|x| !x.is_finite())) || self.area() <= EPSILON
    }

    /// Mirror image of a point across the supporting plane of the triangle.
    pub fn mirror_point(&self, p: &WorldPoint) -> WorldPoint {
        let normal = self.normal();
        let t = normal.dot(&(self[1] - p)) / normal.norm_squared();
        p + normal * (2.0 * t)
    }

    /// Signed distance of the point from the supporting plane, positive on the side the normal
    /// points to.
    pub fn signed_distance(&self, p: &WorldPoint) -> FloatType {
        match self.unit_normal() {
            Some(normal) => normal.dot(&(p - self[0])),
            None => 0.0,
        }
    }
}
