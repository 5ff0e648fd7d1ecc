//! Weighted quantile estimation
//!
//! Quantiles are read off the design-weighted CDF under a selectable
//! interpolation rule. Intervals follow Woodruff's approach: an interval for
//! the proportion P(Y <= q) is built on the probability scale (Wald or Beta
//! form) and inverted through the weighted CDF back to the quantile scale;
//! the standard error is recovered from the interval width.

use statrs::distribution::{Beta, ContinuousCDF};
use survey_core::{Error, Result};

use crate::engine::VarianceEngine;
use crate::fitted::{critical_value, CiBounds, FittedGrouped, FittedQuantile};
use crate::grouped::GroupKeys;
use crate::replication::{replicate_coefficients, variance_from_replicates};
use crate::taylor::taylor_variance;

/// Interpolation rule at discontinuities of the weighted CDF
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Interpolation {
    /// Lower value at a discontinuity
    Lower,
    /// Higher value at a discontinuity
    #[default]
    Higher,
    /// Midpoint of the bracketing values
    Middle,
    /// Value whose CDF position is nearest
    Nearest,
    /// Linear interpolation between bracketing values
    Linear,
}

/// Shape of the probability-scale interval
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum QuantileInterval {
    /// Symmetric (Wald) interval on the proportion scale
    #[default]
    Wald,
    /// Beta interval with the effective sample size
    Beta,
}

/// Fit-time settings for a quantile request
#[derive(Debug, Clone)]
pub struct QuantileSettings {
    /// Requested probabilities, each in [0, 1]
    pub probs: Vec<f64>,
    /// Tail mass of the interval (already rounded by the caller)
    pub alpha: f64,
    pub interval: QuantileInterval,
    pub interpolation: Interpolation,
    /// Degrees of freedom for the critical value; infinite means normal
    pub df: f64,
}

/// Design-weighted quantile of `y` at probability `p`
pub fn weighted_quantile(
    y: &[f64],
    weights: &[f64],
    domain: Option<&[bool]>,
    p: f64,
    interpolation: Interpolation,
) -> f64 {
    if !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    let mut pairs: Vec<(f64, f64)> = Vec::new();
    for i in 0..y.len() {
        if domain.map_or(true, |d| d[i]) {
            if y[i].is_nan() {
                return f64::NAN;
            }
            if weights[i] > 0.0 {
                pairs.push((y[i], weights[i]));
            }
        }
    }
    if pairs.is_empty() {
        return f64::NAN;
    }
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let total: f64 = pairs.iter().map(|(_, w)| w).sum();
    if total <= 0.0 {
        return f64::NAN;
    }
    let mut cdf = Vec::with_capacity(pairs.len());
    let mut cumulative = 0.0;
    for (_, w) in &pairs {
        cumulative += w;
        cdf.push(cumulative / total);
    }
    let values: Vec<f64> = pairs.iter().map(|(v, _)| *v).collect();
    quantile_at(&values, &cdf, p, interpolation)
}

/// Quantile of a sorted sample given its weighted CDF
fn quantile_at(sorted: &[f64], cdf: &[f64], p: f64, interpolation: Interpolation) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted[0];
    }

    let (left, right) = if p <= cdf[0] {
        (0, 1.min(n - 1))
    } else if p >= cdf[n - 1] {
        (n - 2, n - 1)
    } else {
        let idx = cdf.partition_point(|&x| x < p);
        (idx.saturating_sub(1), idx.min(n - 1))
    };

    match interpolation {
        Interpolation::Lower => sorted[left],
        Interpolation::Higher => sorted[right],
        Interpolation::Middle => (sorted[left] + sorted[right]) / 2.0,
        Interpolation::Nearest => {
            if (p - cdf[left]).abs() <= (cdf[right] - p).abs() {
                sorted[left]
            } else {
                sorted[right]
            }
        }
        Interpolation::Linear => {
            let span = cdf[right] - cdf[left];
            if span <= 0.0 {
                return sorted[left];
            }
            if (p - cdf[left]).abs() < 1e-12 && right != left {
                return (sorted[left] + sorted[right]) / 2.0;
            }
            let w = (p - cdf[left]) / span;
            (1.0 - w) * sorted[left] + w * sorted[right]
        }
    }
}

/// Interval for the proportion P(Y <= q) on the probability scale
fn probability_interval(
    p: f64,
    var_p: f64,
    z: f64,
    alpha: f64,
    interval: QuantileInterval,
) -> (f64, f64) {
    let se_p = var_p.max(0.0).sqrt();
    match interval {
        QuantileInterval::Wald => ((p - z * se_p).max(0.0), (p + z * se_p).min(1.0)),
        QuantileInterval::Beta => {
            if !(var_p > 0.0) {
                return (p, p);
            }
            let n_eff = p * (1.0 - p) / var_p;
            if !n_eff.is_finite() || n_eff <= 0.0 {
                return ((p - z * se_p).max(0.0), (p + z * se_p).min(1.0));
            }
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
            (lower.max(0.0), upper.min(1.0))
        }
    }
}

fn quantile_cell(
    y: &[f64],
    engine: &VarianceEngine,
    domain: Option<&[bool]>,
    p: f64,
    settings: &QuantileSettings,
) -> Result<(f64, f64, f64, f64)> {
    let weights = engine.weights();
    let q = weighted_quantile(y, weights, domain, p, settings.interpolation);
    if q.is_nan() {
        return Ok((f64::NAN, f64::NAN, f64::NAN, f64::NAN));
    }

    let level = 1.0 - settings.alpha;
    let z = critical_value(level, settings.df)?;

    match engine {
        VarianceEngine::Taylor { structure, singleton } => {
            // Influence scores of the proportion P(Y <= q).
            let mut sum_w = 0.0;
            for i in 0..y.len() {
                if domain.map_or(true, |d| d[i]) {
                    sum_w += weights[i];
                }
            }
            if sum_w <= 0.0 {
                return Err(Error::zero_weight_sum("quantile"));
            }
            let scores: Vec<f64> = (0..y.len())
                .map(|i| {
                    if domain.map_or(true, |d| d[i]) {
                        let indicator = if y[i] <= q { 1.0 } else { 0.0 };
                        (weights[i] / sum_w) * (indicator - p)
                    } else {
                        0.0
                    }
                })
                .collect();
            let var_p = taylor_variance(&scores, structure, *singleton);
            let (p_low, p_upp) =
                probability_interval(p, var_p, z, settings.alpha, settings.interval);
            let low = weighted_quantile(y, weights, domain, p_low, settings.interpolation);
            let upp = weighted_quantile(y, weights, domain, p_upp, settings.interpolation);
            let se = (upp - low) / (2.0 * z);
            Ok((q, se * se, low, upp))
        }
        VarianceEngine::Replicate { matrix, method, center, .. } => {
            let mut theta_reps = Vec::with_capacity(matrix.n_reps());
            for r in 0..matrix.n_reps() {
                let rep_weights = matrix.replicate(r);
                let theta =
                    weighted_quantile(y, &rep_weights, domain, p, settings.interpolation);
                theta_reps.push(if theta.is_nan() { q } else { theta });
            }
            let coefficients = replicate_coefficients(*method, matrix.n_reps());
            let var = variance_from_replicates(*method, q, &theta_reps, &coefficients, *center);
            let margin = z * var.max(0.0).sqrt();
            Ok((q, var, q - margin, q + margin))
        }
    }
}

/// Fit quantiles over the whole design (or one domain)
pub fn fit_quantiles(
    labels: Vec<String>,
    y: &[f64],
    engine: &VarianceEngine,
    domain: Option<&[bool]>,
    settings: &QuantileSettings,
) -> Result<FittedQuantile> {
    debug_assert_eq!(labels.len(), settings.probs.len());
    let mut coef = Vec::with_capacity(settings.probs.len());
    let mut var = Vec::with_capacity(settings.probs.len());
    let mut ci_l = Vec::with_capacity(settings.probs.len());
    let mut ci_u = Vec::with_capacity(settings.probs.len());
    for &p in &settings.probs {
        let (q, v, low, upp) = quantile_cell(y, engine, domain, p, settings)?;
        coef.push(q);
        var.push(v);
        ci_l.push(low);
        ci_u.push(upp);
    }
    Ok(FittedQuantile::new(labels, coef, var, ci_l, ci_u))
}

/// Fit quantiles within every group
pub fn fit_grouped_quantiles(
    labels: Vec<String>,
    y: &[f64],
    engine: &VarianceEngine,
    keys: &GroupKeys,
    masks: &[Vec<bool>],
    settings: &QuantileSettings,
) -> Result<FittedGrouped> {
    let n_cells = masks.len() * settings.probs.len();
    let mut coef = Vec::with_capacity(n_cells);
    let mut var = Vec::with_capacity(n_cells);
    let mut lower = Vec::with_capacity(n_cells);
    let mut upper = Vec::with_capacity(n_cells);
    for mask in masks {
        for &p in &settings.probs {
            let (q, v, low, upp) = quantile_cell(y, engine, Some(mask), p, settings)?;
            coef.push(q);
            var.push(v);
            lower.push(low);
            upper.push(upp);
        }
    }
    Ok(FittedGrouped::new(
        labels,
        keys.table.clone(),
        coef,
        var,
        None,
        Some(CiBounds { lower, upper }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::DesignStructure;
    use crate::taylor::SingletonMethod;
    use approx::assert_relative_eq;
    use polars::prelude::*;
    use survey_core::SurveyDesign;

    #[test]
    fn test_weighted_median_uniform_weights() {
        let y = [1.0, 2.0, 3.0, 4.0, 5.0];
        let w = [1.0; 5];
        let lower = weighted_quantile(&y, &w, None, 0.5, Interpolation::Lower);
        let higher = weighted_quantile(&y, &w, None, 0.5, Interpolation::Higher);
        let linear = weighted_quantile(&y, &w, None, 0.5, Interpolation::Linear);
        assert!(lower <= 3.0);
        assert!(higher >= 3.0);
        assert!(linear >= 2.0 && linear <= 3.0);
    }

    #[test]
    fn test_weight_shifts_quantile() {
        let y = [1.0, 2.0, 3.0];
        let w = [1.0, 4.0, 1.0];
        let q = weighted_quantile(&y, &w, None, 0.5, Interpolation::Higher);
        assert_relative_eq!(q, 2.0);
    }

    #[test]
    fn test_extreme_probabilities() {
        let y = [1.0, 2.0, 3.0];
        let w = [1.0; 3];
        assert_relative_eq!(
            weighted_quantile(&y, &w, None, 0.0, Interpolation::Lower),
            1.0
        );
        assert_relative_eq!(
            weighted_quantile(&y, &w, None, 1.0, Interpolation::Higher),
            3.0
        );
        assert!(weighted_quantile(&y, &w, None, 1.5, Interpolation::Higher).is_nan());
    }

    #[test]
    fn test_fit_quantiles_bounds_bracket_estimate() {
        let frame = df!["w" => vec![1.0; 9]].unwrap();
        let structure =
            DesignStructure::prepare(&SurveyDesign::new(frame, "w").unwrap()).unwrap();
        let engine = VarianceEngine::Taylor {
            structure: &structure,
            singleton: SingletonMethod::Zero,
        };
        let y = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let settings = QuantileSettings {
            probs: vec![0.5],
            alpha: 0.05,
            interval: QuantileInterval::Wald,
            interpolation: Interpolation::Linear,
            df: f64::INFINITY,
        };
        let fit = fit_quantiles(vec!["q50".to_string()], &y, &engine, None, &settings).unwrap();
        use crate::fitted::EstimateAccessors;
        let q = fit.coefficients()[0];
        let bounds = fit.prop_interval().unwrap();
        assert!(bounds.lower[0] <= q);
        assert!(bounds.upper[0] >= q);
        assert!(fit.variances()[0] >= 0.0);
    }
}
