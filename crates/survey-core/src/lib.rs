//! Core types shared across the survey-stats workspace
//!
//! This crate holds the vocabulary the estimation and summarization crates
//! agree on: the [`SurveyDesign`] data model, the shared [`Error`] type, and
//! confidence-level arithmetic. It contains no statistics.

mod design;
mod error;
mod level;

pub use design::{RepMethod, ReplicateWeights, SurveyDesign, TwoPhase, VarianceCenter};
pub use error::{Error, Result};
pub use level::ConfidenceLevel;
