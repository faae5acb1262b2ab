// Re-export glam for convenience
pub use glam::*;

// l2rib math types
mod bound;
mod interval;
mod point;
mod transform;

pub use bound::{Bound, ParseBoundError};
pub use interval::Interval;
pub use point::OrdPoint;
pub use transform::{Mat4Ext, ZERO_SCALE_CLAMP};
