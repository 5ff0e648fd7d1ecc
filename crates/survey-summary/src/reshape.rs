//! Factor reshaping
//!
//! The grouped factor-expansion path produces a wide table: one row per
//! remaining group combination with a full block of statistic columns per
//! category level of the peeled variable. This module pivots it long: one row
//! per (group combination x level), with the level recovered from the column
//! labels and kept in the original level order. Grouping columns are
//! row-replicated once per level; interval columns collapse to a single
//! low/upp pair however many levels existed.

use polars::prelude::*;
use survey_core::{Error, Result};

use crate::config::VarianceType;

/// Pivot a wide grouped factor result into one row per group and level
#[allow(clippy::too_many_arguments)]
pub(crate) fn reshape_factor(
    wide: &DataFrame,
    name: &str,
    peeled: &str,
    labels: &[String],
    level_values: &[String],
    group_columns: &[String],
    types: &[VarianceType],
) -> Result<DataFrame> {
    let n_groups = wide.height();
    let n_levels = labels.len();
    let mut columns: Vec<Column> = Vec::new();

    // Grouping columns, replicated once per level.
    for group in group_columns {
        let source = wide
            .column(group)
            .map_err(|_| Error::InvalidColumn(group.clone()))?
            .str()?;
        let mut replicated: Vec<String> = Vec::with_capacity(n_groups * n_levels);
        for g in 0..n_groups {
            let value = source.get(g).unwrap_or("").to_string();
            for _ in 0..n_levels {
                replicated.push(value.clone());
            }
        }
        columns.push(Series::new(group.as_str().into(), replicated).into());
    }

    // The peeled variable, cycling through the original level order.
    let mut level_column: Vec<String> = Vec::with_capacity(n_groups * n_levels);
    for _ in 0..n_groups {
        for level in level_values {
            level_column.push(level.clone());
        }
    }
    columns.push(Series::new(peeled.into(), level_column).into());

    for vtype in types {
        match vtype {
            VarianceType::Coefficient => {
                columns.push(stacked(wide, name, labels, "", n_groups)?);
            }
            VarianceType::StandardError => {
                columns.push(stacked(wide, name, labels, "_se", n_groups)?);
            }
            VarianceType::Variance => {
                columns.push(stacked(wide, name, labels, "_var", n_groups)?);
            }
            VarianceType::Cv => {
                columns.push(stacked(wide, name, labels, "_cv", n_groups)?);
            }
            VarianceType::DesignEffect => {
                columns.push(stacked(wide, name, labels, "_deff", n_groups)?);
            }
            VarianceType::ConfidenceInterval | VarianceType::PropInterval => {
                columns.push(stacked(wide, name, labels, "_low", n_groups)?);
                columns.push(stacked(wide, name, labels, "_upp", n_groups)?);
            }
            VarianceType::Groups
            | VarianceType::Levels
            | VarianceType::None => {}
        }
    }

    let long = DataFrame::new(columns)?;
    debug_assert_eq!(long.height(), n_groups * n_levels);
    Ok(long)
}

/// Stack one suffix block: the per-level wide columns become a single long
/// column named after the statistic
fn stacked(
    wide: &DataFrame,
    name: &str,
    labels: &[String],
    suffix: &str,
    n_groups: usize,
) -> Result<Column> {
    let mut sources = Vec::with_capacity(labels.len());
    for label in labels {
        let wide_name = format!("{label}{suffix}");
        let ca = wide
            .column(&wide_name)
            .map_err(|_| Error::InvalidColumn(wide_name.clone()))?
            .f64()?
            .clone();
        sources.push(ca);
    }

    let mut values: Vec<f64> = Vec::with_capacity(n_groups * labels.len());
    for g in 0..n_groups {
        for source in &sources {
            values.push(source.get(g).unwrap_or(f64::NAN));
        }
    }
    let long_name = format!("{name}{suffix}");
    Ok(Series::new(long_name.as_str().into(), values).into())
}
