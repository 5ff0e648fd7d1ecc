//! Survey-weighted statistics toolkit
//!
//! Design-based point estimates and variance measures (mean, total, ratio,
//! quantile, proportion) over weighted, stratified, clustered, two-phase or
//! replicate-weight samples, assembled into uniform Polars DataFrames.
//!
//! The workspace crates are re-exported here:
//! - `survey-core`: the design data model, errors and confidence levels
//! - `survey-estimate`: the weighted-estimation primitives
//! - `survey-summary`: statistic dispatch and result assembly
//!
//! # Example
//!
//! ```rust,ignore
//! use polars::prelude::*;
//! use survey_stats::{MeanOptions, SurveyDesign, SurveySummaryExt};
//!
//! let design = SurveyDesign::new(frame, "pw")?.with_strata("stype")?;
//! let out = design.survey_mean(
//!     &["stype"],
//!     Some("api00".into()),
//!     "api_mean",
//!     &MeanOptions::default(),
//! )?;
//! ```

pub use survey_core::{
    ConfidenceLevel, Error, RepMethod, ReplicateWeights, Result, SurveyDesign, TwoPhase,
    VarianceCenter,
};
pub use survey_estimate::{
    weighted_quantile, CiBounds, EstimateAccessors, Estimand, FittedGrouped, FittedProportion,
    FittedQuantile, FittedStatistic, Interpolation, PropMethod, QuantileInterval,
    SingletonMethod,
};
pub use survey_summary::{
    MeanOptions, Measure, QuantileOptions, RatioOptions, SurveySummaryExt, TotalOptions,
    VarianceType,
};
