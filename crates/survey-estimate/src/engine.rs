//! Variance engine: Taylor linearization or replicate weights
//!
//! One statistic call binds the prepared structure (and, for replicate
//! designs, the extracted weight matrix) into a [`VarianceEngine`]; the fit
//! functions then run the same way against either engine.

use survey_core::{RepMethod, Result, VarianceCenter};

use crate::fitted::{FittedGrouped, FittedStatistic};
use crate::grouped::GroupKeys;
use crate::replication::{replicate_estimate, RepWeightsMatrix};
use crate::structure::DesignStructure;
use crate::taylor::{
    design_effect, point_estimate, scores, srs_variance, taylor_variance, Estimand,
    SingletonMethod,
};

/// How sampling variance is computed for this call
pub enum VarianceEngine<'a> {
    Taylor {
        structure: &'a DesignStructure,
        singleton: SingletonMethod,
    },
    Replicate {
        structure: &'a DesignStructure,
        matrix: &'a RepWeightsMatrix,
        method: RepMethod,
        center: VarianceCenter,
    },
}

impl<'a> VarianceEngine<'a> {
    pub fn structure(&self) -> &'a DesignStructure {
        match self {
            VarianceEngine::Taylor { structure, .. } => structure,
            VarianceEngine::Replicate { structure, .. } => structure,
        }
    }

    /// Analysis weights at structure length
    pub fn weights(&self) -> &'a [f64] {
        &self.structure().weights
    }

    /// Point estimate and sampling variance of one estimand
    pub fn estimate(&self, estimand: &Estimand, domain: Option<&[bool]>) -> Result<(f64, f64)> {
        match self {
            VarianceEngine::Taylor { structure, singleton } => {
                let est = point_estimate(estimand, &structure.weights, domain)?;
                let z = scores(estimand, &structure.weights, domain)?;
                let var = taylor_variance(&z, structure, *singleton);
                Ok((est, var))
            }
            VarianceEngine::Replicate { structure, matrix, method, center } => {
                replicate_estimate(estimand, &structure.weights, matrix, *method, *center, domain)
            }
        }
    }

    /// Degrees of freedom the design leaves for interval construction
    pub fn residual_df(&self) -> f64 {
        match self {
            VarianceEngine::Taylor { structure, .. } => structure.residual_df(),
            VarianceEngine::Replicate { matrix, .. } => {
                matrix.n_reps().saturating_sub(1) as f64
            }
        }
    }
}

/// Fit one or more estimands over the whole design (or one domain)
pub fn fit_statistic(
    items: &[(String, Estimand)],
    engine: &VarianceEngine,
    domain: Option<&[bool]>,
    want_deff: bool,
) -> Result<FittedStatistic> {
    let mut labels = Vec::with_capacity(items.len());
    let mut coef = Vec::with_capacity(items.len());
    let mut var = Vec::with_capacity(items.len());
    let mut deff = if want_deff {
        Some(Vec::with_capacity(items.len()))
    } else {
        None
    };

    for (label, estimand) in items {
        let (est, v) = engine.estimate(estimand, domain)?;
        labels.push(label.clone());
        coef.push(est);
        var.push(v);
        if let Some(deff) = deff.as_mut() {
            let srs = srs_variance(estimand, engine.weights(), domain)?;
            deff.push(design_effect(v, srs));
        }
    }

    Ok(FittedStatistic::new(labels, coef, var, deff))
}

/// Fit one or more estimands within every group
///
/// Each group is estimated as a domain of the full design, so the variance
/// sees the complete sampling structure. Group masks must already be at
/// structure length.
pub fn fit_grouped_statistic(
    items: &[(String, Estimand)],
    engine: &VarianceEngine,
    keys: &GroupKeys,
    masks: &[Vec<bool>],
    want_deff: bool,
) -> Result<FittedGrouped> {
    let n_groups = masks.len();
    let n_items = items.len();
    let mut coef = Vec::with_capacity(n_groups * n_items);
    let mut var = Vec::with_capacity(n_groups * n_items);
    let mut deff = if want_deff {
        Some(Vec::with_capacity(n_groups * n_items))
    } else {
        None
    };

    for mask in masks {
        for (_, estimand) in items {
            let (est, v) = engine.estimate(estimand, Some(mask))?;
            coef.push(est);
            var.push(v);
            if let Some(deff) = deff.as_mut() {
                let srs = srs_variance(estimand, engine.weights(), Some(mask))?;
                deff.push(design_effect(v, srs));
            }
        }
    }

    let labels: Vec<String> = items.iter().map(|(label, _)| label.clone()).collect();
    Ok(FittedGrouped::new(
        labels,
        keys.table.clone(),
        coef,
        var,
        deff,
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitted::EstimateAccessors;
    use crate::grouped::group_keys;
    use approx::assert_relative_eq;
    use polars::prelude::*;
    use survey_core::SurveyDesign;

    fn design() -> SurveyDesign {
        let frame = df![
            "y" => [10.0, 20.0, 30.0, 40.0],
            "w" => [1.0, 1.0, 1.0, 1.0],
            "g" => ["A", "A", "B", "B"],
        ]
        .unwrap();
        SurveyDesign::new(frame, "w").unwrap()
    }

    #[test]
    fn test_fit_statistic_mean() {
        let design = design();
        let structure = DesignStructure::prepare(&design).unwrap();
        let engine = VarianceEngine::Taylor {
            structure: &structure,
            singleton: SingletonMethod::Zero,
        };
        let y = [10.0, 20.0, 30.0, 40.0];
        let fit = fit_statistic(
            &[("y".to_string(), Estimand::Mean(&y))],
            &engine,
            None,
            true,
        )
        .unwrap();
        assert_relative_eq!(fit.coefficients()[0], 25.0);
        assert_eq!(fit.design_effects().unwrap().len(), 1);
    }

    #[test]
    fn test_fit_grouped_means() {
        let design = design();
        let structure = DesignStructure::prepare(&design).unwrap();
        let engine = VarianceEngine::Taylor {
            structure: &structure,
            singleton: SingletonMethod::Zero,
        };
        let keys = group_keys(design.frame(), &["g".to_string()]).unwrap();
        let y = [10.0, 20.0, 30.0, 40.0];
        let fit = fit_grouped_statistic(
            &[("y".to_string(), Estimand::Mean(&y))],
            &engine,
            &keys,
            &keys.masks,
            false,
        )
        .unwrap();
        assert_eq!(fit.rows(), 2);
        assert_relative_eq!(fit.coefficients()[0], 15.0);
        assert_relative_eq!(fit.coefficients()[1], 35.0);
        assert!(fit.group_values().is_some());
    }
}
