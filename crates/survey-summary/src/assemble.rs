//! Result assembly
//!
//! Turns a fitted statistic plus an ordered variance-type list into one
//! rectangular table. Every requested type contributes its own block of
//! columns, concatenated in request order; nothing is merged or overwritten.
//! The fitted object is trusted to match the request: the dispatcher built
//! both, and a mismatch is a programming error, not a recoverable condition.
//!
//! Two orientations exist. In the wide orientation each fitted label owns a
//! column per block and rows follow the fit's groups. When the `Levels` type
//! is present (the factor path with no remaining grouping) the label axis
//! becomes the row axis instead: one column per block, one row per category
//! level.

use polars::prelude::*;
use survey_core::{Error, Result};
use survey_estimate::EstimateAccessors;

use crate::config::VarianceType;

/// Factor-path context: the peeled variable whose levels label the rows
pub(crate) struct FactorContext {
    pub variable: String,
}

pub(crate) struct AssembleContext<'a> {
    /// Output name of the statistic; base of every column in the long
    /// orientation
    pub name: &'a str,
    /// Confidence levels to emit, already truncated by the dispatcher
    pub levels: &'a [f64],
    /// Degrees of freedom for symmetric intervals
    pub df: f64,
    pub factor: Option<FactorContext>,
}

/// Assemble the requested variance-type blocks into one table
pub(crate) fn assemble(
    fit: &dyn EstimateAccessors,
    types: &[VarianceType],
    ctx: &AssembleContext,
) -> Result<DataFrame> {
    let long = types.contains(&VarianceType::Levels);
    let mut columns: Vec<Column> = Vec::new();

    for vtype in types {
        match vtype {
            VarianceType::Groups => {
                let groups = fit.group_values().ok_or_else(|| {
                    Error::Estimation("Grouped assembly without group values".to_string())
                })?;
                for column in groups.get_columns() {
                    columns.push(column.clone());
                }
            }
            VarianceType::Levels => {
                let factor = ctx.factor.as_ref().ok_or_else(|| {
                    Error::Estimation("Levels assembly without a factor context".to_string())
                })?;
                let values: Vec<String> = fit
                    .labels()
                    .iter()
                    .map(|label| {
                        label
                            .strip_prefix(factor.variable.as_str())
                            .unwrap_or(label)
                            .to_string()
                    })
                    .collect();
                columns.push(Series::new(factor.variable.as_str().into(), values).into());
            }
            VarianceType::Coefficient => {
                push_block(&mut columns, fit, fit.coefficients().to_vec(), "", ctx, long);
            }
            VarianceType::StandardError => {
                push_block(&mut columns, fit, fit.standard_errors(), "_se", ctx, long);
            }
            VarianceType::Variance => {
                push_block(&mut columns, fit, fit.variances().to_vec(), "_var", ctx, long);
            }
            VarianceType::Cv => {
                push_block(&mut columns, fit, fit.cv(), "_cv", ctx, long);
            }
            VarianceType::DesignEffect => {
                let deff = fit.design_effects()?.to_vec();
                push_block(&mut columns, fit, deff, "_deff", ctx, long);
            }
            VarianceType::ConfidenceInterval => {
                let tagged = ctx.levels.len() > 1;
                for &level in ctx.levels {
                    let bounds = fit.confidence_interval(level, ctx.df)?;
                    let tag = if tagged { format_percent(level * 100.0) } else { String::new() };
                    push_block(
                        &mut columns,
                        fit,
                        bounds.lower,
                        &format!("_low{tag}"),
                        ctx,
                        long,
                    );
                    push_block(
                        &mut columns,
                        fit,
                        bounds.upper,
                        &format!("_upp{tag}"),
                        ctx,
                        long,
                    );
                }
            }
            VarianceType::PropInterval => {
                let bounds = fit.prop_interval()?;
                push_block(&mut columns, fit, bounds.lower, "_low", ctx, long);
                push_block(&mut columns, fit, bounds.upper, "_upp", ctx, long);
            }
            VarianceType::None => {}
        }
    }

    Ok(DataFrame::new(columns)?)
}

/// Emit one statistic block: one column per label (wide) or a single column
/// with the label axis as rows (long)
fn push_block(
    columns: &mut Vec<Column>,
    fit: &dyn EstimateAccessors,
    values: Vec<f64>,
    suffix: &str,
    ctx: &AssembleContext,
    long: bool,
) {
    if long {
        let name = format!("{}{}", ctx.name, suffix);
        columns.push(Series::new(name.as_str().into(), values).into());
    } else {
        let rows = fit.rows();
        let width = fit.labels().len();
        for (k, label) in fit.labels().iter().enumerate() {
            let cells: Vec<f64> = (0..rows).map(|r| values[r * width + k]).collect();
            let name = format!("{label}{suffix}");
            columns.push(Series::new(name.as_str().into(), cells).into());
        }
    }
}

/// Render a percentage without trailing zeros (95, 97.5)
pub(crate) fn format_percent(value: f64) -> String {
    let rounded = (value * 1e6).round() / 1e6;
    format!("{rounded}")
}
