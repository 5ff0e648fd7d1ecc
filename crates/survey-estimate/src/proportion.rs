//! Dedicated proportion-interval estimation
//!
//! The design-weighted mean of a 0/1 indicator, with interval methods that
//! behave near the boundaries (logit and arcsine transforms, Beta with the
//! effective sample size) where the plain symmetric interval does not. This
//! is the estimator the summarization layer routes proportion requests to.

use statrs::distribution::{Beta, ContinuousCDF};
use survey_core::Result;

use crate::engine::VarianceEngine;
use crate::fitted::{critical_value, CiBounds, FittedGrouped, FittedProportion};
use crate::grouped::GroupKeys;
use crate::taylor::Estimand;

/// Interval construction method for a proportion
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PropMethod {
    /// Interval on the log-odds scale, transformed back
    #[default]
    Logit,
    /// Interval on the arcsine-square-root scale, transformed back
    Asin,
    /// Beta interval with the effective sample size
    Beta,
    /// Plain symmetric interval on the proportion itself
    Mean,
}

impl PropMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Logit => "logit",
            Self::Asin => "asin",
            Self::Beta => "beta",
            Self::Mean => "mean",
        }
    }
}

/// Interval bounds for an estimated proportion
fn proportion_bounds(p: f64, var: f64, level: f64, df: f64, method: PropMethod) -> Result<(f64, f64)> {
    let se = var.max(0.0).sqrt();
    let t = critical_value(level, df)?;

    if p.is_nan() {
        return Ok((f64::NAN, f64::NAN));
    }
    if !(0.0..=1.0).contains(&p) || se == 0.0 {
        return Ok((p, p));
    }

    let bounds = match method {
        PropMethod::Mean => (p - t * se, p + t * se),
        PropMethod::Logit => {
            if p <= 0.0 || p >= 1.0 {
                (p, p)
            } else {
                let l = (p / (1.0 - p)).ln();
                let se_l = se / (p * (1.0 - p));
                let expit = |x: f64| 1.0 / (1.0 + (-x).exp());
                (expit(l - t * se_l), expit(l + t * se_l))
            }
        }
        PropMethod::Asin => {
            if p <= 0.0 || p >= 1.0 {
                (p, p)
            } else {
                let phi = p.sqrt().asin();
                let se_phi = se / (2.0 * (p * (1.0 - p)).sqrt());
                let half_pi = std::f64::consts::FRAC_PI_2;
                let low = (phi - t * se_phi).clamp(0.0, half_pi);
                let upp = (phi + t * se_phi).clamp(0.0, half_pi);
                (low.sin().powi(2), upp.sin().powi(2))
            }
        }
        PropMethod::Beta => {
            let n_eff = p * (1.0 - p) / var;
            if !n_eff.is_finite() || n_eff <= 0.0 {
                (p - t * se, p + t * se)
            } else {
                let alpha = 1.0 - level;
                let x = n_eff * p;
                let lower = if x > 0.0 {
                    Beta::new(x, n_eff - x + 1.0)
                        .map(|d| d.inverse_cdf(alpha / 2.0))
                        .unwrap_or(0.0)
                } else {
                    0.0
                };
                let upper = if x < n_eff {
                    Beta::new(x + 1.0, n_eff - x)
                        .map(|d| d.inverse_cdf(1.0 - alpha / 2.0))
                        .unwrap_or(1.0)
                } else {
                    1.0
                };
                (lower, upper)
            }
        }
    };
    Ok(bounds)
}

/// Fit a proportion over the whole design (or one domain)
pub fn fit_proportion(
    label: String,
    indicator: &[f64],
    engine: &VarianceEngine,
    domain: Option<&[bool]>,
    level: f64,
    df: f64,
    method: PropMethod,
) -> Result<FittedProportion> {
    let (p, var) = engine.estimate(&Estimand::Mean(indicator), domain)?;
    let (ci_l, ci_u) = proportion_bounds(p, var, level, df, method)?;
    Ok(FittedProportion::new(label, p, var, ci_l, ci_u))
}

/// Fit a proportion within every group
///
/// The design effect is never computed here; it is not defined for this
/// estimator.
pub fn fit_grouped_proportion(
    label: String,
    indicator: &[f64],
    engine: &VarianceEngine,
    keys: &GroupKeys,
    masks: &[Vec<bool>],
    level: f64,
    df: f64,
    method: PropMethod,
) -> Result<FittedGrouped> {
    let mut coef = Vec::with_capacity(masks.len());
    let mut var = Vec::with_capacity(masks.len());
    let mut lower = Vec::with_capacity(masks.len());
    let mut upper = Vec::with_capacity(masks.len());
    for mask in masks {
        let (p, v) = engine.estimate(&Estimand::Mean(indicator), Some(mask))?;
        let (ci_l, ci_u) = proportion_bounds(p, v, level, df, method)?;
        coef.push(p);
        var.push(v);
        lower.push(ci_l);
        upper.push(ci_u);
    }
    Ok(FittedGrouped::new(
        vec![label],
        keys.table.clone(),
        coef,
        var,
        None,
        Some(CiBounds { lower, upper }),
    ))
}
