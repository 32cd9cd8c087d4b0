//! Min-max scaling into a target range

use serde::{Deserialize, Serialize};

/// Target interval for scaled values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleRange {
    pub lo: f64,
    pub hi: f64,
}

impl Default for ScaleRange {
    fn default() -> Self {
        Self { lo: 0.0, hi: 1.0 }
    }
}

impl ScaleRange {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    pub fn is_valid(&self) -> bool {
        self.lo.is_finite() && self.hi.is_finite() && self.lo < self.hi
    }

    pub fn as_array(&self) -> [f64; 2] {
        [self.lo, self.hi]
    }
}

/// Scale `value` from `[min, max]` into `range`.
///
/// A degenerate column (`min == max`) maps every value to `range.lo`.
pub fn scale(value: f64, min: f64, max: f64, range: ScaleRange) -> f64 {
    let span = max - min;
    if span == 0.0 {
        return range.lo;
    }
    range.lo + (value - min) / span * (range.hi - range.lo)
}

/// Undo [`scale`]. A degenerate column maps every value back to `min`.
pub fn unscale(value: f64, min: f64, max: f64, range: ScaleRange) -> f64 {
    let span = max - min;
    if span == 0.0 {
        return min;
    }
    min + (value - range.lo) / (range.hi - range.lo) * span
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bounds_map_to_range() {
        let range = ScaleRange::new(-1.0, 1.0);
        assert_relative_eq!(scale(2.0, 2.0, 6.0, range), -1.0);
        assert_relative_eq!(scale(6.0, 2.0, 6.0, range), 1.0);
        assert_relative_eq!(scale(4.0, 2.0, 6.0, range), 0.0);
    }

    #[test]
    fn test_round_trip() {
        let range = ScaleRange::default();
        for &(min, max) in &[(0.0, 1.0), (-3.0, 7.5), (1e-9, 3e-3), (-0.6, -0.1)] {
            for i in 0..=10 {
                let v = min + (max - min) * i as f64 / 10.0;
                let back = unscale(scale(v, min, max, range), min, max, range);
                assert_relative_eq!(back, v, epsilon = 1e-15, max_relative = 1e-12);
            }
        }
    }

    #[test]
    fn test_extrapolates_outside_range() {
        let range = ScaleRange::default();
        assert_relative_eq!(scale(3.0, 0.0, 2.0, range), 1.5);
        assert_relative_eq!(unscale(-0.5, 0.0, 2.0, range), -1.0);
    }

    #[test]
    fn test_degenerate_column() {
        let range = ScaleRange::new(0.0, 1.0);
        assert_eq!(scale(5.0, 5.0, 5.0, range), 0.0);
        assert_eq!(scale(9.0, 5.0, 5.0, range), 0.0);
        assert_eq!(unscale(0.7, 5.0, 5.0, range), 5.0);
    }

    #[test]
    fn test_range_validity() {
        assert!(ScaleRange::default().is_valid());
        assert!(!ScaleRange::new(1.0, 1.0).is_valid());
        assert!(!ScaleRange::new(0.0, f64::NAN).is_valid());
    }
}
