use std::fmt::Display;

use crate::geometry::FloatType;

/// Running count, extremes and mean of a sample set.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub min: FloatType,
    pub max: FloatType,
    pub mean: FloatType,
}

impl Summary {
    pub fn single(value: FloatType) -> Self {
        Summary {
            count: 1,
            min: value,
            max: value,
            mean: value,
        }
    }

    pub fn add(&mut self, value: FloatType) {
        *self = self.merge(&Summary::single(value));
    }

    pub fn merge(&self, other: &Self) -> Self {
        let count = self.count + other.count;
        if count == 0 {
            return Summary::default();
        }
        Summary {
            count,
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            mean: (self.mean * self.count as FloatType + other.mean * other.count as FloatType)
                / count as FloatType,
        }
    }

    /// Every sample moved by `offset`.
    pub fn shifted(&self, offset: FloatType) -> Self {
        if self.count == 0 {
            return *self;
        }
        Summary {
            min: self.min + offset,
            max: self.max + offset,
            mean: self.mean + offset,
            ..*self
        }
    }
}

impl Default for Summary {
    fn default() -> Self {
        Summary {
            count: 0,
            min: FloatType::INFINITY,
            max: FloatType::NEG_INFINITY,
            mean: 0.0,
        }
    }
}

impl FromIterator<FloatType> for Summary {
    fn from_iter<I: IntoIterator<Item = FloatType>>(iter: I) -> Self {
        let mut summary = Summary::default();
        for value in iter {
            summary.add(value);
        }
        summary
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            return write!(f, "no samples");
        }
        write!(
            f,
            "{:.1} - {:.1}; mean {:.1}; {} samples",
            self.min, self.max, self.mean, self.count
        )
    }
}
