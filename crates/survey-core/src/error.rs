//! Error types for survey-weighted estimation
//!
//! Provides a single error type shared by all survey-stats crates.

use thiserror::Error;

/// Error type for survey estimation and summarization
#[derive(Error, Debug)]
pub enum Error {
    /// Polars error surfaced while reading or building tables
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// Structurally invalid request (bad option combination, bad vartype tag)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A named column does not exist in the design's variables table
    #[error("Invalid column: {0}")]
    InvalidColumn(String),

    /// A column has the wrong data type for the requested operation
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    /// Failure inside the estimation primitives (zero weight sum, empty group)
    #[error("Estimation failed: {0}")]
    Estimation(String),

    /// Not enough observations for the requested operation
    #[error("Insufficient data: expected at least {expected} samples, got {actual}")]
    InsufficientData { expected: usize, actual: usize },
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an error for an unknown variance-type tag
    pub fn unknown_vartype(tag: &str) -> Self {
        Self::InvalidArgument(format!(
            "Unknown variance type {tag:?}; expected one of \"se\", \"ci\", \"var\", \"cv\", \"deff\", \"none\""
        ))
    }

    /// Create an error for a non-numeric measured variable
    pub fn categorical_measure(column: &str) -> Self {
        Self::InvalidArgument(format!(
            "Column {column:?} is categorical; use it as a grouping variable instead of a measured variable"
        ))
    }

    /// Create an error for a zero weighted sum
    pub fn zero_weight_sum(context: &str) -> Self {
        Self::Estimation(format!("Sum of weights is zero in {context}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidArgument("proportion mode needs a measured variable".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid argument: proportion mode needs a measured variable"
        );

        let err = Error::InvalidColumn("stype".to_string());
        assert_eq!(err.to_string(), "Invalid column: stype");

        let err = Error::TypeMismatch {
            expected: "numeric".to_string(),
            got: "str".to_string(),
        };
        assert_eq!(err.to_string(), "Type mismatch: expected numeric, got str");

        let err = Error::InsufficientData {
            expected: 2,
            actual: 0,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient data: expected at least 2 samples, got 0"
        );
    }

    #[test]
    fn test_helper_constructors() {
        let err = Error::unknown_vartype("sd");
        assert!(err.to_string().contains("\"sd\""));

        let err = Error::categorical_measure("stype");
        assert!(err.to_string().contains("grouping variable"));

        let err = Error::zero_weight_sum("domain");
        assert_eq!(err.to_string(), "Estimation failed: Sum of weights is zero in domain");
    }

    #[test]
    fn test_from_polars() {
        let polars_err = polars::error::PolarsError::ComputeError("boom".into());
        let err: Error = polars_err.into();
        match err {
            Error::Polars(_) => assert!(err.to_string().contains("boom")),
            _ => panic!("Wrong error type"),
        }
    }
}
