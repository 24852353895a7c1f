use std::ops::Sub;

use nalgebra::{Point, Point2};

use super::{FloatType, WorldPoint};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct AABB<Point> {
    pub min: Point,
    pub max: Point,
}

impl<Point> AABB<Point> {
    pub fn new(min: Point, max: Point) -> AABB<Point> {
        AABB { min, max }
    }
}

impl<Point: Sub + Copy> AABB<Point> {
    pub fn size(&self) -> Point::Output {
        self.max - self.min
    }
}

impl AABB<Point2<FloatType>> {
    /// Closed containment test, with `margin` added on every side.
    pub fn contains(&self, p: &Point2<FloatType>, margin: FloatType) -> bool {
        p.x >= self.min.x - margin
            && p.x <= self.max.x + margin
            && p.y >= self.min.y - margin
            && p.y <= self.max.y + margin
    }
}

impl<const D: usize> AABB<Point<FloatType, D>> {
    /// Smallest box containing all the points, None if the iterator is empty.
    pub fn from_points<'a>(
        points: impl IntoIterator<Item = &'a Point<FloatType, D>>,
    ) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(AABB::new(*first, *first), |acc, p| AABB {
            min: acc.min.inf(p),
            max: acc.max.sup(p),
        }))
    }

    pub fn center(&self) -> Point<FloatType, D> {
        nalgebra::center(&self.min, &self.max)
    }
}

/// Drops the `axis` coordinate of a point, keeping the other two in order.
pub fn project_point(p: &WorldPoint, axis: usize) -> Point2<FloatType> {
    match axis {
        0 => Point2::new(p.y, p.z),
        1 => Point2::new(p.x, p.z),
        _ => Point2::new(p.x, p.y),
    }
}
