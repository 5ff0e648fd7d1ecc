//! Confidence level arithmetic

use std::fmt;

use crate::{Error, Result};

/// A validated confidence level in (0, 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceLevel(f64);

impl ConfidenceLevel {
    /// Create a new confidence level; rejects values outside (0, 1)
    pub fn new(level: f64) -> Result<Self> {
        if level > 0.0 && level < 1.0 {
            Ok(Self(level))
        } else {
            Err(Error::InvalidArgument(format!(
                "Confidence level {level} must be in (0, 1)"
            )))
        }
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// The alpha level (1 - confidence level)
    pub fn alpha(&self) -> f64 {
        1.0 - self.0
    }

    /// Alpha rounded to 7 decimal digits
    ///
    /// Converting a level like 0.95 to its tail probability in binary floating
    /// point leaves residue (0.050000000000000044); quantile estimators key on
    /// the exact tail value, so the residue is rounded away.
    pub fn rounded_alpha(&self) -> f64 {
        (self.alpha() * 1e7).round() / 1e7
    }

    /// Tail probability (alpha/2 for two-tailed intervals)
    pub fn tail_probability(&self) -> f64 {
        self.alpha() / 2.0
    }

    pub const NINETY: Self = Self(0.90);
    pub const NINETY_FIVE: Self = Self(0.95);
    pub const NINETY_NINE: Self = Self(0.99);
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0 * 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_bounds() {
        assert!(ConfidenceLevel::new(0.95).is_ok());
        assert!(ConfidenceLevel::new(0.0).is_err());
        assert!(ConfidenceLevel::new(1.0).is_err());
        assert!(ConfidenceLevel::new(1.5).is_err());
    }

    #[test]
    fn test_alpha_rounding_lands_exactly() {
        let level = ConfidenceLevel::new(0.95).unwrap();
        assert_eq!(level.rounded_alpha(), 0.05);

        let level = ConfidenceLevel::new(0.975).unwrap();
        assert_eq!(level.rounded_alpha(), 0.025);
    }

    #[test]
    fn test_tail_probability() {
        let level = ConfidenceLevel::new(0.95).unwrap();
        assert!((level.tail_probability() - 0.025).abs() < 1e-10);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", ConfidenceLevel::NINETY_FIVE), "95.0%");
    }
}
