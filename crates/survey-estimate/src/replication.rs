//! Replicate-weight variance estimation
//!
//! BRR (with Fay's adjustment), jackknife, bootstrap and SDR replicate sets,
//! with either replicate-mean or full-sample centering. The replicate weights
//! themselves are supplied by the design; nothing is resampled here.

use polars::prelude::*;
use survey_core::{RepMethod, Result, VarianceCenter};

use crate::structure::numeric_values;
use crate::taylor::{point_estimate, Estimand};

/// Replicate weights extracted into a dense row-major matrix (n x R)
#[derive(Debug, Clone)]
pub struct RepWeightsMatrix {
    data: Vec<f64>,
    n: usize,
    n_reps: usize,
}

impl RepWeightsMatrix {
    /// Pull the named replicate weight columns out of the frame
    pub fn extract(frame: &DataFrame, columns: &[String]) -> Result<Self> {
        let n = frame.height();
        let n_reps = columns.len();
        let mut data = vec![0.0; n * n_reps];
        for (r, name) in columns.iter().enumerate() {
            let values = numeric_values(frame, name)?;
            for (i, v) in values.into_iter().enumerate() {
                data[i * n_reps + r] = if v.is_nan() { 0.0 } else { v };
            }
        }
        Ok(Self { data, n, n_reps })
    }

    pub fn n_reps(&self) -> usize {
        self.n_reps
    }

    /// The r-th replicate weight vector
    pub fn replicate(&self, r: usize) -> Vec<f64> {
        (0..self.n).map(|i| self.data[i * self.n_reps + r]).collect()
    }
}

/// Scaling coefficient applied to each replicate's squared deviation
pub fn replicate_coefficients(method: RepMethod, n_reps: usize) -> Vec<f64> {
    let r = n_reps as f64;
    match method {
        RepMethod::Bootstrap => vec![1.0 / r; n_reps],
        RepMethod::Brr { fay } => vec![1.0 / (r * (1.0 - fay).powi(2)); n_reps],
        RepMethod::Jackknife => vec![(r - 1.0) / r; n_reps],
        RepMethod::Sdr => vec![4.0 / r; n_reps],
    }
}

/// Variance of an estimate from its replicate estimates
pub fn variance_from_replicates(
    method: RepMethod,
    theta_full: f64,
    theta_reps: &[f64],
    coefficients: &[f64],
    center: VarianceCenter,
) -> f64 {
    let n_reps = theta_reps.len();
    if n_reps == 0 {
        return 0.0;
    }

    match method {
        RepMethod::Jackknife => {
            // Pseudo-value form: for coefficient c = (R-1)/R the inflation
            // factor is 1/(1-c) = R.
            let factors: Vec<f64> = coefficients
                .iter()
                .map(|&c| if c < 1.0 { 1.0 / (1.0 - c) } else { f64::INFINITY })
                .collect();
            let pseudo: Vec<f64> = theta_reps
                .iter()
                .zip(factors.iter())
                .map(|(&rep, &f)| f * theta_full - (f - 1.0) * rep)
                .collect();
            let mean = pseudo.iter().sum::<f64>() / n_reps as f64;
            pseudo
                .iter()
                .zip(coefficients.iter())
                .zip(factors.iter())
                .map(|((&p, &c), &f)| {
                    let denom = f - 1.0;
                    if denom > 0.0 {
                        let diff = (p - mean) / denom;
                        c * diff * diff
                    } else {
                        0.0
                    }
                })
                .sum()
        }
        RepMethod::Brr { .. } | RepMethod::Bootstrap | RepMethod::Sdr => {
            let center_value = match center {
                VarianceCenter::ReplicateMean => {
                    theta_reps.iter().sum::<f64>() / n_reps as f64
                }
                VarianceCenter::FullSample => theta_full,
            };
            theta_reps
                .iter()
                .zip(coefficients.iter())
                .map(|(&rep, &c)| {
                    let diff = rep - center_value;
                    c * diff * diff
                })
                .sum()
        }
    }
}

/// Full-sample estimate plus its replicate-weight variance
pub fn replicate_estimate(
    estimand: &Estimand,
    weights: &[f64],
    matrix: &RepWeightsMatrix,
    method: RepMethod,
    center: VarianceCenter,
    domain: Option<&[bool]>,
) -> Result<(f64, f64)> {
    let theta_full = point_estimate(estimand, weights, domain)?;
    let mut theta_reps = Vec::with_capacity(matrix.n_reps());
    for r in 0..matrix.n_reps() {
        let rep_weights = matrix.replicate(r);
        // A replicate can zero out an entire domain; report the replicate at
        // the full-sample value rather than failing the whole fit.
        let theta = point_estimate(estimand, &rep_weights, domain).unwrap_or(theta_full);
        theta_reps.push(theta);
    }
    let coefficients = replicate_coefficients(method, matrix.n_reps());
    let variance = variance_from_replicates(method, theta_full, &theta_reps, &coefficients, center);
    Ok((theta_full, variance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_coefficients() {
        assert_eq!(
            replicate_coefficients(RepMethod::Bootstrap, 4),
            vec![0.25; 4]
        );
        assert_eq!(replicate_coefficients(RepMethod::Sdr, 8), vec![0.5; 8]);
        let brr = replicate_coefficients(RepMethod::Brr { fay: 0.5 }, 4);
        assert_relative_eq!(brr[0], 1.0, epsilon = 1e-12);
        let jk = replicate_coefficients(RepMethod::Jackknife, 4);
        assert_relative_eq!(jk[0], 0.75, epsilon = 1e-12);
    }

    #[test]
    fn test_brr_variance_full_sample_center() {
        let reps = [9.0, 11.0, 10.5, 9.5];
        let coefs = replicate_coefficients(RepMethod::Brr { fay: 0.0 }, 4);
        let var = variance_from_replicates(
            RepMethod::Brr { fay: 0.0 },
            10.0,
            &reps,
            &coefs,
            VarianceCenter::FullSample,
        );
        // mean of squared deviations from 10: (1 + 1 + 0.25 + 0.25) / 4
        assert_relative_eq!(var, 0.625, epsilon = 1e-12);
    }

    #[test]
    fn test_replicate_estimate_mean() {
        let frame = df![
            "rw1" => [2.0, 0.0, 2.0],
            "rw2" => [0.0, 2.0, 2.0],
        ]
        .unwrap();
        let matrix = RepWeightsMatrix::extract(
            &frame,
            &["rw1".to_string(), "rw2".to_string()],
        )
        .unwrap();
        let y = [1.0, 2.0, 3.0];
        let w = [1.0; 3];
        let (est, var) = replicate_estimate(
            &Estimand::Mean(&y),
            &w,
            &matrix,
            RepMethod::Brr { fay: 0.0 },
            VarianceCenter::ReplicateMean,
            None,
        )
        .unwrap();
        assert_relative_eq!(est, 2.0);
        // replicate means: 2.0 and 2.5; centered on 2.25 -> var = (0.0625 + 0.0625) / 2
        assert_relative_eq!(var, 0.0625, epsilon = 1e-12);
    }
}
