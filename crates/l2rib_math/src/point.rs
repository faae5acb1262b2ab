use std::cmp::Ordering;

use crate::Vec3;

/// A point with a total order: lexicographic by x, then y, then z.
///
/// `glam::Vec3` is only `PartialEq`; wrapping it lets points go into
/// ordered sets when duplicate vertices need to be detected.
#[derive(Debug, Clone, Copy)]
pub struct OrdPoint(pub Vec3);

impl PartialEq for OrdPoint {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrdPoint {}

impl PartialOrd for OrdPoint {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrdPoint {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .x
            .total_cmp(&other.0.x)
            .then_with(|| self.0.y.total_cmp(&other.0.y))
            .then_with(|| self.0.z.total_cmp(&other.0.z))
    }
}

impl From<Vec3> for OrdPoint {
    fn from(v: Vec3) -> Self {
        OrdPoint(v)
    }
}
