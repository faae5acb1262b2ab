/// A closed range `[min, max]` along one axis.
///
/// `Interval::EMPTY` has `min > max`; including a value into it assigns
/// both ends, so an empty interval behaves as an uninitialized extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub min: f32,
    pub max: f32,
}

impl Interval {
    /// Create a new interval given min and max values.
    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Returns the size of the interval (max - min).
    pub fn size(&self) -> f32 {
        self.max - self.min
    }

    /// Returns true if the interval has not absorbed any value yet.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Returns true if x is within the interval [min, max] (inclusive).
    pub fn contains(&self, x: f32) -> bool {
        self.min <= x && x <= self.max
    }

    /// Grow the interval so that it contains x.
    pub fn include(&mut self, x: f32) {
        if self.is_empty() {
            self.min = x;
            self.max = x;
            return;
        }
        if x < self.min {
            self.min = x;
        }
        if x > self.max {
            self.max = x;
        }
    }

    /// Adds a scalar displacement to both min and max.
    pub fn add_scalar(&self, displacement: f32) -> Interval {
        Interval::new(self.min + displacement, self.max + displacement)
    }

    /// An empty interval (min > max, contains nothing).
    pub const EMPTY: Interval = Interval {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };
}

impl Default for Interval {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_size() {
        let interval = Interval::new(2.0, 7.0);
        assert_eq!(interval.size(), 5.0);

        let negative = Interval::new(-5.0, 5.0);
        assert_eq!(negative.size(), 10.0);
    }

    #[test]
    fn test_interval_contains() {
        let interval = Interval::new(0.0, 10.0);

        // Inclusive bounds
        assert!(interval.contains(0.0));
        assert!(interval.contains(10.0));
        assert!(interval.contains(5.0));

        assert!(!interval.contains(-0.1));
        assert!(!interval.contains(10.1));
    }

    #[test]
    fn test_interval_include_assigns_when_empty() {
        let mut interval = Interval::EMPTY;
        interval.include(3.5);

        assert_eq!(interval.min, 3.5);
        assert_eq!(interval.max, 3.5);
        assert!(!interval.is_empty());
    }

    #[test]
    fn test_interval_include_grows() {
        let mut interval = Interval::new(0.0, 1.0);
        interval.include(-2.0);
        interval.include(0.5);
        interval.include(4.0);

        assert_eq!(interval.min, -2.0);
        assert_eq!(interval.max, 4.0);
    }

    #[test]
    fn test_interval_empty() {
        let empty = Interval::EMPTY;

        assert!(empty.is_empty());
        assert!(!empty.contains(0.0));
        assert!(!empty.contains(f32::INFINITY));
    }

    #[test]
    fn test_interval_add_scalar() {
        let moved = Interval::new(1.0, 2.0).add_scalar(10.0);
        assert_eq!(moved, Interval::new(11.0, 12.0));
    }
}
