//! Estimation adapter
//!
//! Normalizes the argument shape of each statistic kind before anything is
//! estimated: measures are materialized (expressions under a reserved working
//! name, against a clone of the frame, so the caller's design is never
//! mutated), dtypes are validated or coerced, two-phase designs get their
//! working variables relocated into the phase-1 structure, and the variance
//! engine is chosen from the design.

use polars::prelude::*;
use survey_core::{Error, Result, SurveyDesign};
use survey_estimate::{
    group_keys, DesignStructure, GroupKeys, RepWeightsMatrix, SingletonMethod, VarianceEngine,
};
use tracing::warn;

use crate::config::Measure;

/// Reserved name a measured expression is materialized under
pub const MEASURE_NAME: &str = "__survey_measure";

/// Everything one statistic call needs from the design, prepared once
pub(crate) struct Prepared {
    pub structure: DesignStructure,
    replication: Option<ReplicationParts>,
}

struct ReplicationParts {
    matrix: RepWeightsMatrix,
    method: survey_core::RepMethod,
    center: survey_core::VarianceCenter,
}

impl Prepared {
    pub fn new(design: &SurveyDesign) -> Result<Self> {
        if design.replicates().is_some() && design.two_phase().is_some() {
            return Err(Error::InvalidArgument(
                "A replicate-weight design cannot also carry a two-phase block".to_string(),
            ));
        }
        let structure = DesignStructure::prepare(design)?;
        let replication = match design.replicates() {
            Some(rep) => Some(ReplicationParts {
                matrix: RepWeightsMatrix::extract(design.frame(), &rep.columns)?,
                method: rep.method,
                center: rep.center,
            }),
            None => None,
        };
        Ok(Self { structure, replication })
    }

    pub fn engine(&self) -> VarianceEngine<'_> {
        match &self.replication {
            Some(rep) => VarianceEngine::Replicate {
                structure: &self.structure,
                matrix: &rep.matrix,
                method: rep.method,
                center: rep.center,
            },
            None => VarianceEngine::Taylor {
                structure: &self.structure,
                singleton: SingletonMethod::Zero,
            },
        }
    }

    /// Degrees of freedom for interval construction
    ///
    /// Request override first, then the design override, then the design's
    /// residual degrees of freedom (or the fallback, for quantiles).
    pub fn resolve_df(
        &self,
        design: &SurveyDesign,
        request_df: Option<f64>,
        fallback: Option<f64>,
    ) -> f64 {
        request_df
            .or(design.df_override())
            .or(fallback)
            .unwrap_or_else(|| self.engine().residual_df())
    }
}

/// Materialize a measure into analysis-frame values (nulls become NaN)
///
/// Categorical measured variables are rejected; booleans are coerced to 0/1.
pub(crate) fn materialize_measure(design: &SurveyDesign, measure: &Measure) -> Result<Vec<f64>> {
    let (column, display) = match measure {
        Measure::Column(name) => {
            let column = design
                .frame()
                .column(name)
                .map_err(|_| Error::InvalidColumn(name.clone()))?
                .clone();
            (column, name.as_str())
        }
        Measure::Expr(expr) => {
            let materialized = design
                .frame()
                .clone()
                .lazy()
                .select([expr.clone().alias(MEASURE_NAME)])
                .collect()?;
            let column = materialized
                .column(MEASURE_NAME)
                .map_err(|_| Error::InvalidColumn(MEASURE_NAME.to_string()))?
                .clone();
            (column, MEASURE_NAME)
        }
    };

    let dt = column.dtype();
    if !(dt.is_float() || dt.is_integer() || dt == &DataType::Boolean) {
        return Err(Error::categorical_measure(display));
    }

    let casted = column.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Collapse a categorical column into per-level 0/1 indicators
///
/// Levels come back in first-appearance order; rows where the column is null
/// get NaN in every indicator.
pub(crate) fn indicator_columns(
    design: &SurveyDesign,
    column: &str,
) -> Result<(Vec<String>, Vec<Vec<f64>>)> {
    let col = design
        .frame()
        .column(column)
        .map_err(|_| Error::InvalidColumn(column.to_string()))?;
    if col.dtype().is_float() || col.dtype().is_integer() {
        warn!(column, "numeric grouping variable coerced to text categories");
    }
    let casted = col.cast(&DataType::String)?;
    let ca = casted.str()?;

    let mut levels: Vec<String> = Vec::new();
    for value in ca.iter().flatten() {
        if !levels.iter().any(|l| l == value) {
            levels.push(value.to_string());
        }
    }

    let mut indicators: Vec<Vec<f64>> = Vec::with_capacity(levels.len());
    for level in &levels {
        let indicator: Vec<f64> = ca
            .iter()
            .map(|v| match v {
                Some(value) if value == level => 1.0,
                Some(_) => 0.0,
                None => f64::NAN,
            })
            .collect();
        indicators.push(indicator);
    }
    Ok((levels, indicators))
}

/// Discover groups and lift their masks to structure length
///
/// Numeric grouping columns are coerced to text with a warning; the
/// estimators key categories textually.
pub(crate) fn group_masks(
    design: &SurveyDesign,
    prepared: &Prepared,
    groups: &[&str],
) -> Result<(GroupKeys, Vec<Vec<bool>>)> {
    for name in groups {
        let column = design
            .frame()
            .column(name)
            .map_err(|_| Error::InvalidColumn(name.to_string()))?;
        if column.dtype().is_float() || column.dtype().is_integer() {
            warn!(column = *name, "numeric grouping variable coerced to text categories");
        }
    }
    let names: Vec<String> = groups.iter().map(|g| g.to_string()).collect();
    let keys = group_keys(design.frame(), &names)?;
    let masks = keys
        .masks
        .iter()
        .map(|mask| prepared.structure.expand_mask(mask))
        .collect();
    Ok((keys, masks))
}

/// Combine the base domain with a missing-value filter over the given values
///
/// With `na_rm` the NaN positions are masked out; without it they stay in and
/// propagate NaN through the estimate.
pub(crate) fn missing_filtered_domain(
    structure: &DesignStructure,
    values: &[&[f64]],
    na_rm: bool,
) -> Option<Vec<bool>> {
    let base = structure.base_domain().map(|d| d.to_vec());
    if !na_rm {
        return base;
    }
    let n = structure.len();
    let mut mask = base.unwrap_or_else(|| vec![true; n]);
    for column in values {
        for (m, v) in mask.iter_mut().zip(column.iter()) {
            if v.is_nan() {
                *m = false;
            }
        }
    }
    Some(mask)
}

/// Intersect an expanded group mask with an optional missing-value domain
pub(crate) fn intersect_mask(mask: &mut [bool], domain: Option<&[bool]>) {
    if let Some(domain) = domain {
        for (m, &d) in mask.iter_mut().zip(domain.iter()) {
            *m = *m && d;
        }
    }
}
