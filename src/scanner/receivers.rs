use bon::bon;
use nalgebra::Unit;
use rand::Rng;

use crate::geometry::{FloatType, WorldBox, WorldPoint, WorldVector};

/// Regular grid of receiver candidates at a fixed height over a scene footprint.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReceiverGrid {
    /// Distance between neighboring receivers
    pub spacing: FloatType,
    /// Height above the lowest point of the scene
    pub height: FloatType,
    /// Shrinks the footprint on every side
    pub margin: FloatType,
}

#[bon]
impl ReceiverGrid {
    #[builder]
    pub fn new(
        #[builder(default = 5.0)] spacing: FloatType,
        #[builder(default = 1.5)] height: FloatType,
        #[builder(default = 0.0)] margin: FloatType,
    ) -> Self {
        assert!(spacing > 0.0);
        ReceiverGrid {
            spacing,
            height,
            margin,
        }
    }
}

impl ReceiverGrid {
    /// Grid points covering the box as seen from above.
    pub fn points(&self, bounds: &WorldBox, up: &Unit<WorldVector>) -> Vec<WorldPoint> {
        let frame = Frame::new(bounds, up, self.height);

        let steps = |axis: usize| {
            let min = bounds.min[axis] + self.margin;
            let max = bounds.max[axis] - self.margin;
            let count = if max >= min {
                ((max - min) / self.spacing).floor() as usize + 1
            } else {
                0
            };
            (0..count).map(move |i| min + i as FloatType * self.spacing)
        };

        let [a, b] = frame.horizontal_axes;
        let mut points = Vec::new();
        for u in steps(a) {
            for v in steps(b) {
                points.push(frame.point(u, v));
            }
        }
        points
    }
}

/// Uniformly random receiver candidates at `height` over the footprint of the box.
pub fn random_receivers(
    bounds: &WorldBox,
    up: &Unit<WorldVector>,
    height: FloatType,
    count: usize,
    rng: &mut impl Rng,
) -> Vec<WorldPoint> {
    let frame = Frame::new(bounds, up, height);
    let [a, b] = frame.horizontal_axes;

    (0..count)
        .map(|_| {
            let u = rng.random_range(bounds.min[a]..=bounds.max[a]);
            let v = rng.random_range(bounds.min[b]..=bounds.max[b]);
            frame.point(u, v)
        })
        .collect()
}

/// Splits world coordinates into the vertical axis and the two horizontal ones.
struct Frame {
    vertical_axis: usize,
    horizontal_axes: [usize; 2],
    level: FloatType,
}

impl Frame {
    fn new(bounds: &WorldBox, up: &Unit<WorldVector>, height: FloatType) -> Frame {
        let vertical_axis = up.iamax();
        let level = if up[vertical_axis] >= 0.0 {
            bounds.min[vertical_axis] + height
        } else {
            bounds.max[vertical_axis] - height
        };
        let horizontal_axes = match vertical_axis {
            0 => [1, 2],
            1 => [0, 2],
            _ => [0, 1],
        };

        Frame {
            vertical_axis,
            horizontal_axes,
            level,
        }
    }

    fn point(&self, u: FloatType, v: FloatType) -> WorldPoint {
        let mut p = WorldPoint::origin();
        p[self.vertical_axis] = self.level;
        p[self.horizontal_axes[0]] = u;
        p[self.horizontal_axes[1]] = v;
        p
    }
}
