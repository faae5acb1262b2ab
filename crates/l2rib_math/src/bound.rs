use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::{Interval, Mat4, Vec3};

/// Axis-aligned bounding box accumulated from geometry.
///
/// A bound starts out `EMPTY` (uninitialized). The first point assigns all
/// six extents; later points only widen them, so the result is always the
/// tightest box around everything that was expanded into it.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Bound {
    pub x: Interval,
    pub y: Interval,
    pub z: Interval,
}

/// Error returned when a persisted bound declaration cannot be read back.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("expected six numeric extents, found `{0}`")]
pub struct ParseBoundError(pub String);

impl Bound {
    /// An uninitialized bound (contains nothing).
    pub const EMPTY: Bound = Bound {
        x: Interval::EMPTY,
        y: Interval::EMPTY,
        z: Interval::EMPTY,
    };

    /// Create a bound from three intervals.
    pub fn new(x: Interval, y: Interval, z: Interval) -> Self {
        Self { x, y, z }
    }

    /// Create the tightest bound around a set of points.
    pub fn from_points<I: IntoIterator<Item = Vec3>>(points: I) -> Self {
        let mut bound = Bound::EMPTY;
        for p in points {
            bound.expand(p);
        }
        bound
    }

    /// True until the bound has absorbed at least one point.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty() || self.z.is_empty()
    }

    /// Minimum corner.
    pub fn min(&self) -> Vec3 {
        Vec3::new(self.x.min, self.y.min, self.z.min)
    }

    /// Maximum corner.
    pub fn max(&self) -> Vec3 {
        Vec3::new(self.x.max, self.y.max, self.z.max)
    }

    /// Expand the bound to contain a point.
    pub fn expand(&mut self, p: Vec3) {
        self.x.include(p.x);
        self.y.include(p.y);
        self.z.include(p.z);
    }

    /// Expand by another bound expressed in a child coordinate system.
    ///
    /// All 8 corners of `child` go through `matrix` and each one is folded
    /// into this bound. An empty child contributes nothing.
    pub fn expand_transformed(&mut self, child: &Bound, matrix: &Mat4) {
        if child.is_empty() {
            return;
        }
        for corner in child.corners() {
            self.expand(matrix.transform_point3(corner));
        }
    }

    /// The 8 corner points of the box.
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.min(), self.max());
        [
            Vec3::new(lo.x, lo.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(lo.x, hi.y, hi.z),
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, hi.z),
        ]
    }

    /// Returns true if the point lies inside or on the box.
    pub fn contains(&self, p: Vec3) -> bool {
        self.x.contains(p.x) && self.y.contains(p.y) && self.z.contains(p.z)
    }

    /// Translate (move) the bound by an offset vector.
    pub fn translate(&self, offset: Vec3) -> Bound {
        if self.is_empty() {
            return *self;
        }
        Bound::new(
            self.x.add_scalar(offset.x),
            self.y.add_scalar(offset.y),
            self.z.add_scalar(offset.z),
        )
    }

    /// Returns the center point of the bound.
    pub fn centroid(&self) -> Vec3 {
        (self.min() + self.max()) * 0.5
    }

    /// Length of the min-to-max diagonal, zero for an empty bound.
    pub fn diagonal(&self) -> f32 {
        if self.is_empty() {
            return 0.0;
        }
        (self.max() - self.min()).length()
    }
}

impl Default for Bound {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Formats as `minx maxx miny maxy minz maxz`, the order used by bound
/// declarations and deferred-archive statements.
impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} {} {}",
            self.x.min, self.x.max, self.y.min, self.y.max, self.z.min, self.z.max
        )
    }
}

impl FromStr for Bound {
    type Err = ParseBoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values: Vec<f32> = s
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| ParseBoundError(s.to_string()))?;
        match values[..] {
            [minx, maxx, miny, maxy, minz, maxz] => Ok(Bound::new(
                Interval::new(minx, maxx),
                Interval::new(miny, maxy),
                Interval::new(minz, maxz),
            )),
            _ => Err(ParseBoundError(s.to_string())),
        }
    }
}
