//! Survey-weighted summary statistics over Polars DataFrames
//!
//! This crate is the dispatch and assembly layer: it selects the right
//! computation path for each statistic request (ungrouped, grouped, factor
//! expansion, proportion mode, quantiles, over simple, two-phase or
//! replicate-weight designs), runs the `survey-estimate` primitives, and
//! assembles whatever they return into one rectangular table per call.
//!
//! # Example
//!
//! ```rust,ignore
//! use polars::prelude::*;
//! use survey_core::SurveyDesign;
//! use survey_summary::{MeanOptions, SurveySummaryExt};
//!
//! let design = SurveyDesign::new(df, "pw")?.with_strata("stype")?;
//! let out = design.survey_mean(
//!     &["stype"],
//!     Some("api00".into()),
//!     "api_mean",
//!     &MeanOptions::default().with_vartypes(&["se", "ci"])?,
//! )?;
//! // columns: stype, api_mean, api_mean_se, api_mean_low, api_mean_upp
//! ```

mod adapter;
mod assemble;
mod config;
mod dispatch;
mod reshape;
mod traits;

pub use adapter::MEASURE_NAME;
pub use config::{
    MeanOptions, Measure, QuantileOptions, RatioOptions, TotalOptions, VarianceType,
};
pub use traits::SurveySummaryExt;

// Re-export the option vocabulary callers need to fill the request records.
pub use survey_estimate::{Interpolation, PropMethod, QuantileInterval};
