//! Fitted statistic results and the capability interface over them
//!
//! Each estimator family returns its own result variant; all of them expose
//! the same accessor surface through [`EstimateAccessors`], so result
//! assembly never needs to know which estimator ran. Variants that carry
//! their own interval bounds (proportions, quantiles) answer the generic
//! interval accessor from those stored bounds.

use polars::prelude::DataFrame;
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};
use survey_core::{Error, Result};

/// Lower/upper interval bounds, one pair per result cell
#[derive(Debug, Clone)]
pub struct CiBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Two-sided critical value at the given confidence level
///
/// Student's t when the degrees of freedom are finite and positive, standard
/// normal otherwise.
pub fn critical_value(level: f64, df: f64) -> Result<f64> {
    let p = 1.0 - (1.0 - level) / 2.0;
    if df.is_finite() && df > 0.0 {
        let dist = StudentsT::new(0.0, 1.0, df)
            .map_err(|e| Error::Estimation(format!("t-distribution: {e}")))?;
        Ok(dist.inverse_cdf(p))
    } else {
        let dist = Normal::new(0.0, 1.0)
            .map_err(|e| Error::Estimation(format!("normal distribution: {e}")))?;
        Ok(dist.inverse_cdf(p))
    }
}

fn symmetric_interval(coef: &[f64], var: &[f64], level: f64, df: f64) -> Result<CiBounds> {
    let t = critical_value(level, df)?;
    let mut lower = Vec::with_capacity(coef.len());
    let mut upper = Vec::with_capacity(coef.len());
    for (&c, &v) in coef.iter().zip(var.iter()) {
        let margin = t * v.max(0.0).sqrt();
        lower.push(c - margin);
        upper.push(c + margin);
    }
    Ok(CiBounds { lower, upper })
}

/// Uniform accessor surface over every fitted result variant
pub trait EstimateAccessors {
    /// Per-coefficient labels (variable names, level names or quantile tags)
    fn labels(&self) -> &[String];

    /// Number of result rows (groups, or 1 when ungrouped)
    fn rows(&self) -> usize;

    /// Point estimates, row-major over `rows() x labels()`
    fn coefficients(&self) -> &[f64];

    /// Sampling variances, aligned with `coefficients()`
    fn variances(&self) -> &[f64];

    fn standard_errors(&self) -> Vec<f64> {
        self.variances().iter().map(|v| v.max(0.0).sqrt()).collect()
    }

    /// Symmetric interval at the given level and degrees of freedom; variants
    /// with their own stored bounds return those instead
    fn confidence_interval(&self, level: f64, df: f64) -> Result<CiBounds>;

    /// Direct interval bounds, for variants whose estimator reports them
    fn prop_interval(&self) -> Result<CiBounds> {
        Err(Error::Estimation(
            "This estimator does not report direct interval bounds".to_string(),
        ))
    }

    fn cv(&self) -> Vec<f64> {
        self.coefficients()
            .iter()
            .zip(self.variances().iter())
            .map(|(&c, &v)| {
                if c != 0.0 {
                    v.max(0.0).sqrt() / c.abs()
                } else {
                    f64::NAN
                }
            })
            .collect()
    }

    fn design_effects(&self) -> Result<&[f64]> {
        Err(Error::Estimation(
            "Design effect was not computed for this estimate".to_string(),
        ))
    }

    /// Group-value columns, for grouped fits
    fn group_values(&self) -> Option<&DataFrame> {
        None
    }
}

/// Mean/total/ratio fit over the whole design (one result row)
#[derive(Debug, Clone)]
pub struct FittedStatistic {
    labels: Vec<String>,
    coef: Vec<f64>,
    var: Vec<f64>,
    deff: Option<Vec<f64>>,
}

impl FittedStatistic {
    pub fn new(labels: Vec<String>, coef: Vec<f64>, var: Vec<f64>, deff: Option<Vec<f64>>) -> Self {
        debug_assert_eq!(labels.len(), coef.len());
        debug_assert_eq!(coef.len(), var.len());
        Self { labels, coef, var, deff }
    }
}

impl EstimateAccessors for FittedStatistic {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn rows(&self) -> usize {
        1
    }

    fn coefficients(&self) -> &[f64] {
        &self.coef
    }

    fn variances(&self) -> &[f64] {
        &self.var
    }

    fn confidence_interval(&self, level: f64, df: f64) -> Result<CiBounds> {
        symmetric_interval(&self.coef, &self.var, level, df)
    }

    fn design_effects(&self) -> Result<&[f64]> {
        self.deff.as_deref().ok_or_else(|| {
            Error::Estimation("Design effect was not computed for this estimate".to_string())
        })
    }
}

/// Dedicated proportion fit with estimator-reported interval bounds
#[derive(Debug, Clone)]
pub struct FittedProportion {
    labels: Vec<String>,
    coef: Vec<f64>,
    var: Vec<f64>,
    ci_l: Vec<f64>,
    ci_u: Vec<f64>,
}

impl FittedProportion {
    pub fn new(label: String, coef: f64, var: f64, ci_l: f64, ci_u: f64) -> Self {
        Self {
            labels: vec![label],
            coef: vec![coef],
            var: vec![var],
            ci_l: vec![ci_l],
            ci_u: vec![ci_u],
        }
    }
}

impl EstimateAccessors for FittedProportion {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn rows(&self) -> usize {
        1
    }

    fn coefficients(&self) -> &[f64] {
        &self.coef
    }

    fn variances(&self) -> &[f64] {
        &self.var
    }

    fn confidence_interval(&self, _level: f64, _df: f64) -> Result<CiBounds> {
        // The interval was shaped by the proportion method at fit time.
        self.prop_interval()
    }

    fn prop_interval(&self) -> Result<CiBounds> {
        Ok(CiBounds {
            lower: self.ci_l.clone(),
            upper: self.ci_u.clone(),
        })
    }
}

/// Quantile fit: one coefficient per requested probability
#[derive(Debug, Clone)]
pub struct FittedQuantile {
    labels: Vec<String>,
    coef: Vec<f64>,
    var: Vec<f64>,
    ci_l: Vec<f64>,
    ci_u: Vec<f64>,
}

impl FittedQuantile {
    pub fn new(
        labels: Vec<String>,
        coef: Vec<f64>,
        var: Vec<f64>,
        ci_l: Vec<f64>,
        ci_u: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(labels.len(), coef.len());
        Self { labels, coef, var, ci_l, ci_u }
    }
}

impl EstimateAccessors for FittedQuantile {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn rows(&self) -> usize {
        1
    }

    fn coefficients(&self) -> &[f64] {
        &self.coef
    }

    fn variances(&self) -> &[f64] {
        &self.var
    }

    fn confidence_interval(&self, _level: f64, _df: f64) -> Result<CiBounds> {
        self.prop_interval()
    }

    fn prop_interval(&self) -> Result<CiBounds> {
        Ok(CiBounds {
            lower: self.ci_l.clone(),
            upper: self.ci_u.clone(),
        })
    }
}

/// By-group fit: one result row per group, group values preserved
#[derive(Debug, Clone)]
pub struct FittedGrouped {
    labels: Vec<String>,
    groups: DataFrame,
    coef: Vec<f64>,
    var: Vec<f64>,
    deff: Option<Vec<f64>>,
    bounds: Option<CiBounds>,
}

impl FittedGrouped {
    pub fn new(
        labels: Vec<String>,
        groups: DataFrame,
        coef: Vec<f64>,
        var: Vec<f64>,
        deff: Option<Vec<f64>>,
        bounds: Option<CiBounds>,
    ) -> Self {
        debug_assert_eq!(coef.len(), groups.height() * labels.len());
        debug_assert_eq!(coef.len(), var.len());
        Self { labels, groups, coef, var, deff, bounds }
    }
}

impl EstimateAccessors for FittedGrouped {
    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn rows(&self) -> usize {
        self.groups.height()
    }

    fn coefficients(&self) -> &[f64] {
        &self.coef
    }

    fn variances(&self) -> &[f64] {
        &self.var
    }

    fn confidence_interval(&self, level: f64, df: f64) -> Result<CiBounds> {
        match &self.bounds {
            Some(bounds) => Ok(bounds.clone()),
            None => symmetric_interval(&self.coef, &self.var, level, df),
        }
    }

    fn prop_interval(&self) -> Result<CiBounds> {
        self.bounds.clone().ok_or_else(|| {
            Error::Estimation(
                "This grouped estimator does not report direct interval bounds".to_string(),
            )
        })
    }

    fn design_effects(&self) -> Result<&[f64]> {
        self.deff.as_deref().ok_or_else(|| {
            Error::Estimation("Design effect was not computed for this estimate".to_string())
        })
    }

    fn group_values(&self) -> Option<&DataFrame> {
        Some(&self.groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_critical_value_normal_vs_t() {
        let z = critical_value(0.95, f64::INFINITY).unwrap();
        assert_relative_eq!(z, 1.959964, epsilon = 1e-4);
        let t = critical_value(0.95, 5.0).unwrap();
        assert!(t > z);
    }

    #[test]
    fn test_symmetric_interval_widens_with_level() {
        let fit = FittedStatistic::new(
            vec!["y".to_string()],
            vec![10.0],
            vec![4.0],
            None,
        );
        let wide = fit.confidence_interval(0.95, f64::INFINITY).unwrap();
        let narrow = fit.confidence_interval(0.65, f64::INFINITY).unwrap();
        let wide_width = wide.upper[0] - wide.lower[0];
        let narrow_width = narrow.upper[0] - narrow.lower[0];
        assert!(wide_width > narrow_width);
        assert!(narrow_width > 0.0);
    }

    #[test]
    fn test_cv_and_se() {
        let fit = FittedStatistic::new(
            vec!["y".to_string()],
            vec![20.0],
            vec![25.0],
            None,
        );
        assert_relative_eq!(fit.standard_errors()[0], 5.0);
        assert_relative_eq!(fit.cv()[0], 0.25);
    }

    #[test]
    fn test_proportion_interval_is_stored() {
        let fit = FittedProportion::new("p".to_string(), 0.3, 0.01, 0.2, 0.4);
        let bounds = fit.confidence_interval(0.95, 10.0).unwrap();
        assert_relative_eq!(bounds.lower[0], 0.2);
        assert_relative_eq!(bounds.upper[0], 0.4);
        assert!(fit.design_effects().is_err());
    }
}
