//! Design-weighted estimation primitives
//!
//! This crate supplies the estimators the summarization layer dispatches to:
//! Taylor-linearization point estimates and variances for means, totals and
//! ratios; weighted quantiles with Woodruff intervals; proportion intervals
//! that behave near 0 and 1; replicate-weight variance; and the by-group
//! driver. Every estimator returns a fitted-result value implementing
//! [`EstimateAccessors`], the uniform accessor surface the result assembler
//! works against.
//!
//! # Example
//!
//! ```rust,ignore
//! use survey_core::SurveyDesign;
//! use survey_estimate::{
//!     fit_statistic, DesignStructure, Estimand, SingletonMethod, VarianceEngine,
//! };
//!
//! let structure = DesignStructure::prepare(&design)?;
//! let engine = VarianceEngine::Taylor {
//!     structure: &structure,
//!     singleton: SingletonMethod::Zero,
//! };
//! let fit = fit_statistic(&[("api00".into(), Estimand::Mean(&values))], &engine, None, false)?;
//! ```

mod engine;
mod fitted;
mod grouped;
mod proportion;
mod quantile;
mod replication;
mod structure;
mod taylor;

pub use engine::{fit_grouped_statistic, fit_statistic, VarianceEngine};
pub use fitted::{
    critical_value, CiBounds, EstimateAccessors, FittedGrouped, FittedProportion,
    FittedQuantile, FittedStatistic,
};
pub use grouped::{group_keys, GroupKeys};
pub use proportion::{fit_grouped_proportion, fit_proportion, PropMethod};
pub use quantile::{
    fit_grouped_quantiles, fit_quantiles, weighted_quantile, Interpolation, QuantileInterval,
    QuantileSettings,
};
pub use replication::{
    replicate_coefficients, replicate_estimate, variance_from_replicates, RepWeightsMatrix,
};
pub use structure::{numeric_values, string_codes, DesignStructure, MISSING_CODE};
pub use taylor::{
    design_effect, point_estimate, scores, srs_variance, taylor_variance, Estimand,
    SingletonMethod,
};
