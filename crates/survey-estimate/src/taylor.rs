//! Taylor-linearization estimation
//!
//! Point estimates, linearization scores and the stratified/clustered
//! two-stage variance over them. Missing observations are carried as NaN and
//! propagate through to the estimate; callers that want them dropped mask
//! them out of the domain before calling in.

use survey_core::{Error, Result};

use crate::structure::{psus_per_stratum, DesignStructure, MISSING_CODE};

/// What is being estimated from the weighted sample
#[derive(Debug, Clone, Copy)]
pub enum Estimand<'a> {
    /// Design-weighted mean of one variable
    Mean(&'a [f64]),
    /// Design-weighted population total of one variable
    Total(&'a [f64]),
    /// Ratio of two design-weighted totals
    Ratio { num: &'a [f64], den: &'a [f64] },
}

/// Handling of strata that contain a single sampling unit
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SingletonMethod {
    /// Singleton strata contribute zero variance
    #[default]
    Zero,
    /// Center singleton strata on the grand mean
    Center,
}

#[inline]
fn keep(domain: Option<&[bool]>, i: usize) -> bool {
    domain.map_or(true, |d| d[i])
}

/// Design-weighted point estimate, optionally restricted to a domain
pub fn point_estimate(
    estimand: &Estimand,
    weights: &[f64],
    domain: Option<&[bool]>,
) -> Result<f64> {
    match estimand {
        Estimand::Mean(y) => {
            let mut sum_wy = 0.0;
            let mut sum_w = 0.0;
            for i in 0..y.len() {
                if keep(domain, i) {
                    sum_wy += weights[i] * y[i];
                    sum_w += weights[i];
                }
            }
            if sum_w == 0.0 {
                return Err(Error::zero_weight_sum("mean"));
            }
            Ok(sum_wy / sum_w)
        }
        Estimand::Total(y) => {
            let mut sum_wy = 0.0;
            for i in 0..y.len() {
                if keep(domain, i) {
                    sum_wy += weights[i] * y[i];
                }
            }
            Ok(sum_wy)
        }
        Estimand::Ratio { num, den } => {
            let mut sum_wy = 0.0;
            let mut sum_wx = 0.0;
            for i in 0..num.len() {
                if keep(domain, i) {
                    sum_wy += weights[i] * num[i];
                    sum_wx += weights[i] * den[i];
                }
            }
            if sum_wx == 0.0 {
                return Err(Error::Estimation(
                    "Weighted sum of the ratio denominator is zero".to_string(),
                ));
            }
            Ok(sum_wy / sum_wx)
        }
    }
}

/// Linearization scores for an estimand; zero outside the domain
pub fn scores(
    estimand: &Estimand,
    weights: &[f64],
    domain: Option<&[bool]>,
) -> Result<Vec<f64>> {
    match estimand {
        Estimand::Mean(y) => {
            let mut sum_w = 0.0;
            for i in 0..y.len() {
                if keep(domain, i) {
                    sum_w += weights[i];
                }
            }
            if sum_w == 0.0 {
                return Err(Error::zero_weight_sum("mean scores"));
            }
            let est = point_estimate(estimand, weights, domain)?;
            Ok((0..y.len())
                .map(|i| {
                    if keep(domain, i) {
                        (weights[i] / sum_w) * (y[i] - est)
                    } else {
                        0.0
                    }
                })
                .collect())
        }
        Estimand::Total(y) => Ok((0..y.len())
            .map(|i| if keep(domain, i) { weights[i] * y[i] } else { 0.0 })
            .collect()),
        Estimand::Ratio { num, den } => {
            let mut sum_wx = 0.0;
            for i in 0..num.len() {
                if keep(domain, i) {
                    sum_wx += weights[i] * den[i];
                }
            }
            if sum_wx == 0.0 {
                return Err(Error::Estimation(
                    "Weighted sum of the ratio denominator is zero".to_string(),
                ));
            }
            let r_hat = point_estimate(estimand, weights, domain)?;
            Ok((0..num.len())
                .map(|i| {
                    if keep(domain, i) {
                        (weights[i] / sum_wx) * (num[i] - r_hat * den[i])
                    } else {
                        0.0
                    }
                })
                .collect())
        }
    }
}

/// Two-stage Taylor variance of a score vector under the design structure
pub fn taylor_variance(
    scores: &[f64],
    structure: &DesignStructure,
    singleton: SingletonMethod,
) -> f64 {
    let n = scores.len();
    if n == 0 {
        return 0.0;
    }

    let stage1 = match &structure.strata {
        None => variance_unstratified(scores, structure.psu.as_deref(), structure.n_psus),
        Some(strata) => variance_stratified(
            scores,
            strata,
            structure.n_strata,
            structure.psu.as_deref(),
            singleton,
        ),
    } * structure.fpc;

    let stage2 = match (&structure.psu, &structure.ssu) {
        (Some(psu), Some(ssu)) => {
            stage2_variance(scores, psu, ssu, structure.fpc, structure.fpc_stage2)
        }
        _ => 0.0,
    };

    stage1 + stage2
}

fn variance_unstratified(scores: &[f64], psu: Option<&[u32]>, n_psus: u32) -> f64 {
    let n = scores.len();
    match psu {
        Some(psu) => {
            if n_psus <= 1 {
                return 0.0;
            }
            let mut totals = vec![0.0; n_psus as usize];
            for (&s, &p) in scores.iter().zip(psu.iter()) {
                if p != MISSING_CODE {
                    totals[p as usize] += s;
                }
            }
            let mean = totals.iter().sum::<f64>() / n_psus as f64;
            let ss: f64 = totals.iter().map(|&t| (t - mean).powi(2)).sum();
            (n_psus as f64 / (n_psus as f64 - 1.0)) * ss
        }
        None => {
            if n <= 1 {
                return 0.0;
            }
            let mean = scores.iter().sum::<f64>() / n as f64;
            let ss: f64 = scores.iter().map(|&s| (s - mean).powi(2)).sum();
            (n as f64 / (n as f64 - 1.0)) * ss
        }
    }
}

fn variance_stratified(
    scores: &[f64],
    strata: &[u32],
    n_strata: u32,
    psu: Option<&[u32]>,
    singleton: SingletonMethod,
) -> f64 {
    if scores.is_empty() || n_strata == 0 {
        return 0.0;
    }

    match psu {
        Some(psu) => {
            // Aggregate scores to PSU totals, then treat PSUs as the units
            // within each stratum.
            let max_psu = psu
                .iter()
                .filter(|&&p| p != MISSING_CODE)
                .max()
                .copied()
                .unwrap_or(0);
            let mut totals = vec![0.0; max_psu as usize + 1];
            for (&s, &p) in scores.iter().zip(psu.iter()) {
                if p != MISSING_CODE {
                    totals[p as usize] += s;
                }
            }

            let mut psus_in: Vec<Vec<u32>> = vec![Vec::new(); n_strata as usize];
            for (&h, &p) in strata.iter().zip(psu.iter()) {
                if h != MISSING_CODE && p != MISSING_CODE && !psus_in[h as usize].contains(&p) {
                    psus_in[h as usize].push(p);
                }
            }

            let grand_mean = if singleton == SingletonMethod::Center {
                let used: Vec<f64> = psus_in
                    .iter()
                    .flatten()
                    .map(|&p| totals[p as usize])
                    .collect();
                if used.is_empty() {
                    0.0
                } else {
                    used.iter().sum::<f64>() / used.len() as f64
                }
            } else {
                0.0
            };

            let mut var = 0.0;
            for ids in &psus_in {
                let n_h = ids.len();
                if n_h == 0 {
                    continue;
                }
                if n_h == 1 {
                    if singleton == SingletonMethod::Center {
                        var += (totals[ids[0] as usize] - grand_mean).powi(2);
                    }
                    continue;
                }
                let stratum_totals: Vec<f64> = ids.iter().map(|&p| totals[p as usize]).collect();
                let mean = stratum_totals.iter().sum::<f64>() / n_h as f64;
                let ss: f64 = stratum_totals.iter().map(|&t| (t - mean).powi(2)).sum();
                var += (n_h as f64 / (n_h as f64 - 1.0)) * ss;
            }
            var
        }
        None => {
            // Stratified element sampling.
            let mut sums = vec![0.0; n_strata as usize];
            let mut sum_sq = vec![0.0; n_strata as usize];
            let mut counts = vec![0u32; n_strata as usize];
            let mut grand_total = 0.0;
            let mut total_n = 0u32;
            for (&s, &h) in scores.iter().zip(strata.iter()) {
                if h != MISSING_CODE {
                    sums[h as usize] += s;
                    sum_sq[h as usize] += s * s;
                    counts[h as usize] += 1;
                    grand_total += s;
                    total_n += 1;
                }
            }
            let grand_mean = if singleton == SingletonMethod::Center && total_n > 0 {
                grand_total / total_n as f64
            } else {
                0.0
            };

            let mut var = 0.0;
            for h in 0..n_strata as usize {
                let n_h = counts[h];
                if n_h == 0 {
                    continue;
                }
                if n_h == 1 {
                    if singleton == SingletonMethod::Center {
                        var += (sums[h] - grand_mean).powi(2);
                    }
                    continue;
                }
                let n_h = n_h as f64;
                var += (sum_sq[h] - sums[h].powi(2) / n_h) / (n_h - 1.0) * n_h;
            }
            var
        }
    }
}

fn stage2_variance(scores: &[f64], psu: &[u32], ssu: &[u32], fpc: f64, fpc_stage2: f64) -> f64 {
    let stage1_fraction = 1.0 - fpc;
    if stage1_fraction <= 0.0 || scores.is_empty() {
        return 0.0;
    }

    let max_psu = psu
        .iter()
        .filter(|&&p| p != MISSING_CODE)
        .max()
        .copied()
        .unwrap_or(0);
    let mut members: Vec<Vec<usize>> = vec![Vec::new(); max_psu as usize + 1];
    for (i, &p) in psu.iter().enumerate() {
        if p != MISSING_CODE {
            members[p as usize].push(i);
        }
    }

    let mut var = 0.0;
    for rows in &members {
        if rows.is_empty() {
            continue;
        }
        let mut ssu_ids: Vec<u32> = Vec::new();
        let mut totals: Vec<f64> = Vec::new();
        for &i in rows {
            let s = ssu[i];
            if s == MISSING_CODE {
                continue;
            }
            match ssu_ids.iter().position(|&id| id == s) {
                Some(k) => totals[k] += scores[i],
                None => {
                    ssu_ids.push(s);
                    totals.push(scores[i]);
                }
            }
        }
        let n_ssus = totals.len();
        if n_ssus <= 1 {
            continue;
        }
        let mean = totals.iter().sum::<f64>() / n_ssus as f64;
        let ss: f64 = totals.iter().map(|&t| (t - mean).powi(2)).sum();
        let within = (n_ssus as f64 / (n_ssus as f64 - 1.0)) * ss;
        var += stage1_fraction * fpc_stage2 * within;
    }
    var
}

/// Variance the same estimate would have under simple random sampling
///
/// Used as the denominator of the design effect.
pub fn srs_variance(
    estimand: &Estimand,
    weights: &[f64],
    domain: Option<&[bool]>,
) -> Result<f64> {
    let mut w = Vec::new();
    let mut y = Vec::new();
    let mut x = Vec::new();
    match estimand {
        Estimand::Mean(values) | Estimand::Total(values) => {
            for i in 0..values.len() {
                if keep(domain, i) {
                    y.push(values[i]);
                    w.push(weights[i]);
                }
            }
        }
        Estimand::Ratio { num, den } => {
            for i in 0..num.len() {
                if keep(domain, i) {
                    y.push(num[i]);
                    x.push(den[i]);
                    w.push(weights[i]);
                }
            }
        }
    }

    let n = y.len() as f64;
    if n < 2.0 {
        return Ok(f64::NAN);
    }
    let sum_w: f64 = w.iter().sum();
    if sum_w <= 0.0 {
        return Ok(f64::NAN);
    }
    let wn: Vec<f64> = w.iter().map(|wi| wi / sum_w).collect();
    let fpc = 1.0 - n / sum_w;

    match estimand {
        Estimand::Mean(_) => Ok((weighted_s2(&y, &wn) / n) * fpc),
        Estimand::Total(_) => Ok((sum_w.powi(2) / n) * weighted_s2(&y, &wn) * fpc),
        Estimand::Ratio { .. } => {
            let ybar: f64 = y.iter().zip(wn.iter()).map(|(yi, wi)| wi * yi).sum();
            let xbar: f64 = x.iter().zip(wn.iter()).map(|(xi, wi)| wi * xi).sum();
            if xbar == 0.0 {
                return Ok(f64::NAN);
            }
            let r_hat = ybar / xbar;
            let resid: Vec<f64> = y
                .iter()
                .zip(x.iter())
                .map(|(yi, xi)| yi - r_hat * xi)
                .collect();
            Ok((weighted_s2(&resid, &wn) / (n * xbar.powi(2))) * fpc)
        }
    }
}

fn weighted_s2(y: &[f64], wn: &[f64]) -> f64 {
    let n = y.len() as f64;
    if n <= 1.0 {
        return f64::NAN;
    }
    let mu: f64 = y.iter().zip(wn.iter()).map(|(yi, wi)| wi * yi).sum();
    let ss: f64 = y
        .iter()
        .zip(wn.iter())
        .map(|(yi, wi)| wi * (yi - mu).powi(2))
        .sum();
    (n / (n - 1.0)) * ss
}

/// Ratio of the design variance to the simple-random-sampling variance
pub fn design_effect(variance: f64, srs_variance: f64) -> f64 {
    if srs_variance > 0.0 {
        variance / srs_variance
    } else {
        f64::NAN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use survey_core::SurveyDesign;

    fn unstructured(n: usize) -> DesignStructure {
        let frame = polars::df![
            "w" => vec![1.0; n],
        ]
        .unwrap();
        DesignStructure::prepare(&SurveyDesign::new(frame, "w").unwrap()).unwrap()
    }

    #[test]
    fn test_mean_point_estimate() {
        let y = [10.0, 20.0, 30.0];
        let w = [1.0, 1.0, 1.0];
        let est = point_estimate(&Estimand::Mean(&y), &w, None).unwrap();
        assert_relative_eq!(est, 20.0);
    }

    #[test]
    fn test_mean_variance_matches_srs_formula() {
        // Equal weights, no structure: Taylor variance of the mean must equal
        // s^2 / n.
        let y = [1.0, 2.0, 3.0, 4.0, 5.0];
        let w = [1.0; 5];
        let structure = unstructured(5);
        let s = scores(&Estimand::Mean(&y), &w, None).unwrap();
        let var = taylor_variance(&s, &structure, SingletonMethod::Zero);
        assert_relative_eq!(var, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_domain_mean() {
        let y = [10.0, 20.0, 30.0, 40.0];
        let w = [1.0; 4];
        let domain = [true, true, false, false];
        let est = point_estimate(&Estimand::Mean(&y), &w, Some(&domain)).unwrap();
        assert_relative_eq!(est, 15.0);
    }

    #[test]
    fn test_constant_ratio_has_zero_scores() {
        let num = [10.0, 20.0];
        let den = [5.0, 10.0];
        let w = [1.0, 1.0];
        let est = point_estimate(&Estimand::Ratio { num: &num, den: &den }, &w, None).unwrap();
        assert_relative_eq!(est, 2.0);
        let s = scores(&Estimand::Ratio { num: &num, den: &den }, &w, None).unwrap();
        for v in s {
            assert_relative_eq!(v, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_weight_sum_is_error() {
        let y = [1.0, 2.0];
        let w = [0.0, 0.0];
        assert!(point_estimate(&Estimand::Mean(&y), &w, None).is_err());
    }

    #[test]
    fn test_nan_propagates() {
        let y = [1.0, f64::NAN, 3.0];
        let w = [1.0; 3];
        let est = point_estimate(&Estimand::Mean(&y), &w, None).unwrap();
        assert!(est.is_nan());
    }

    #[test]
    fn test_stratification_reduces_variance_for_separated_strata() {
        let frame = polars::df![
            "w" => vec![1.0; 6],
            "stratum" => ["a", "a", "a", "b", "b", "b"],
        ]
        .unwrap();
        let stratified = DesignStructure::prepare(
            &SurveyDesign::new(frame, "w")
                .unwrap()
                .with_strata("stratum")
                .unwrap(),
        )
        .unwrap();
        let plain = unstructured(6);

        let y = [1.0, 2.0, 3.0, 101.0, 102.0, 103.0];
        let w = [1.0; 6];
        let s = scores(&Estimand::Mean(&y), &w, None).unwrap();
        let var_strat = taylor_variance(&s, &stratified, SingletonMethod::Zero);
        let var_plain = taylor_variance(&s, &plain, SingletonMethod::Zero);
        assert!(var_strat < var_plain);
    }

    #[test]
    fn test_design_effect_ratio() {
        assert_relative_eq!(design_effect(2.0, 1.0), 2.0);
        assert!(design_effect(2.0, 0.0).is_nan());
    }
}
