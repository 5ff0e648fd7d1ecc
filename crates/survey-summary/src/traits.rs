//! The summarization surface over a survey design

use polars::prelude::DataFrame;
use survey_core::{Result, SurveyDesign};

use crate::config::{MeanOptions, Measure, QuantileOptions, RatioOptions, TotalOptions};
use crate::dispatch;

/// Extension trait computing summary statistics from a [`SurveyDesign`]
///
/// Every method returns one rectangular [`DataFrame`]: grouping columns (when
/// grouped), the point estimate under `name`, and one suffixed column block
/// per requested variance type, in request order.
pub trait SurveySummaryExt {
    /// Design-weighted mean (or proportion, see [`MeanOptions::proportion`])
    ///
    /// With no measure the trailing grouping variable is factor-expanded: the
    /// result carries one row per category level.
    fn survey_mean(
        &self,
        groups: &[&str],
        measure: Option<Measure>,
        name: &str,
        options: &MeanOptions,
    ) -> Result<DataFrame>;

    /// Design-weighted population total
    fn survey_total(
        &self,
        groups: &[&str],
        measure: Option<Measure>,
        name: &str,
        options: &TotalOptions,
    ) -> Result<DataFrame>;

    /// Ratio of two design-weighted totals
    fn survey_ratio(
        &self,
        groups: &[&str],
        numerator: Measure,
        denominator: Measure,
        name: &str,
        options: &RatioOptions,
    ) -> Result<DataFrame>;

    /// Design-weighted quantiles
    ///
    /// One coefficient column per probability, named `{name}_q{100p}`.
    fn survey_quantile(
        &self,
        groups: &[&str],
        measure: Measure,
        probs: &[f64],
        name: &str,
        options: &QuantileOptions,
    ) -> Result<DataFrame>;
}

impl SurveySummaryExt for SurveyDesign {
    fn survey_mean(
        &self,
        groups: &[&str],
        measure: Option<Measure>,
        name: &str,
        options: &MeanOptions,
    ) -> Result<DataFrame> {
        dispatch::summarize_mean(self, groups, measure.as_ref(), name, options)
    }

    fn survey_total(
        &self,
        groups: &[&str],
        measure: Option<Measure>,
        name: &str,
        options: &TotalOptions,
    ) -> Result<DataFrame> {
        dispatch::summarize_total(self, groups, measure.as_ref(), name, options)
    }

    fn survey_ratio(
        &self,
        groups: &[&str],
        numerator: Measure,
        denominator: Measure,
        name: &str,
        options: &RatioOptions,
    ) -> Result<DataFrame> {
        dispatch::summarize_ratio(self, groups, &numerator, &denominator, name, options)
    }

    fn survey_quantile(
        &self,
        groups: &[&str],
        measure: Measure,
        probs: &[f64],
        name: &str,
        options: &QuantileOptions,
    ) -> Result<DataFrame> {
        dispatch::summarize_quantile(self, groups, &measure, probs, name, options)
    }
}
