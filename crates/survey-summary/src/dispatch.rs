//! Statistic dispatch
//!
//! One function per statistic kind picks exactly one computation path from
//! the request shape: ungrouped or grouped, explicit measure or factor
//! expansion, proportion mode, quantiles. Validation happens here, before
//! anything is estimated, so a rejected request never touches the estimators;
//! estimator failures propagate unchanged.
//!
//! Only the plain ungrouped path honors more than one confidence level. The
//! grouped, proportion and quantile paths use the first level and warn; this
//! is a deliberate, documented limitation.

use polars::prelude::DataFrame;
use survey_core::{ConfidenceLevel, Error, Result, SurveyDesign};
use survey_estimate::{
    fit_grouped_proportion, fit_grouped_quantiles, fit_grouped_statistic, fit_proportion,
    fit_quantiles, fit_statistic, Estimand, QuantileSettings,
};
use tracing::warn;

use crate::adapter::{
    group_masks, indicator_columns, intersect_mask, materialize_measure,
    missing_filtered_domain, Prepared,
};
use crate::assemble::{assemble, format_percent, AssembleContext, FactorContext};
use crate::config::{
    MeanOptions, Measure, QuantileOptions, RatioOptions, TotalOptions, VarianceType,
};
use crate::reshape::reshape_factor;

/// Mean-like aggregates share one code path
#[derive(Clone, Copy)]
enum AggregateKind {
    Mean,
    Total,
}

impl AggregateKind {
    fn estimand<'a>(&self, values: &'a [f64]) -> Estimand<'a> {
        match self {
            AggregateKind::Mean => Estimand::Mean(values),
            AggregateKind::Total => Estimand::Total(values),
        }
    }
}

/// Compute a design-weighted mean (or proportion) summary
pub(crate) fn summarize_mean(
    design: &SurveyDesign,
    groups: &[&str],
    measure: Option<&Measure>,
    name: &str,
    options: &MeanOptions,
) -> Result<DataFrame> {
    reject_none_vartype(&options.vartypes)?;
    validate_levels(&options.levels)?;

    if options.proportion {
        let measure = measure.ok_or_else(|| {
            Error::InvalidArgument(
                "Proportion mode requires a measured variable; a factor request cannot be \
                 combined with it"
                    .to_string(),
            )
        })?;
        return proportion_path(design, groups, measure, name, options);
    }

    match measure {
        Some(measure) => aggregate_path(
            design,
            groups,
            measure,
            name,
            AggregateKind::Mean,
            &options.vartypes,
            &options.levels,
            options.na_rm,
            options.deff,
            options.df,
        ),
        None => factor_path(
            design,
            groups,
            name,
            AggregateKind::Mean,
            &options.vartypes,
            &options.levels,
            options.na_rm,
            options.deff,
            options.df,
        ),
    }
}

/// Compute a design-weighted total summary
pub(crate) fn summarize_total(
    design: &SurveyDesign,
    groups: &[&str],
    measure: Option<&Measure>,
    name: &str,
    options: &TotalOptions,
) -> Result<DataFrame> {
    reject_none_vartype(&options.vartypes)?;
    validate_levels(&options.levels)?;

    match measure {
        Some(measure) => aggregate_path(
            design,
            groups,
            measure,
            name,
            AggregateKind::Total,
            &options.vartypes,
            &options.levels,
            options.na_rm,
            options.deff,
            options.df,
        ),
        None => factor_path(
            design,
            groups,
            name,
            AggregateKind::Total,
            &options.vartypes,
            &options.levels,
            options.na_rm,
            options.deff,
            options.df,
        ),
    }
}

/// Compute a ratio-of-totals summary
pub(crate) fn summarize_ratio(
    design: &SurveyDesign,
    groups: &[&str],
    numerator: &Measure,
    denominator: &Measure,
    name: &str,
    options: &RatioOptions,
) -> Result<DataFrame> {
    reject_none_vartype(&options.vartypes)?;
    validate_levels(&options.levels)?;

    let prepared = Prepared::new(design)?;
    let num = prepared
        .structure
        .expand_values(&materialize_measure(design, numerator)?, 0.0);
    let den = prepared
        .structure
        .expand_values(&materialize_measure(design, denominator)?, 0.0);
    let domain = missing_filtered_domain(&prepared.structure, &[&num, &den], options.na_rm);
    let df = prepared.resolve_df(design, options.df, None);
    let want_deff = options.deff || options.vartypes.contains(&VarianceType::DesignEffect);
    let items = [(
        name.to_string(),
        Estimand::Ratio { num: &num, den: &den },
    )];

    if groups.is_empty() {
        let fit = fit_statistic(&items, &prepared.engine(), domain.as_deref(), want_deff)?;
        let types = layout(false, &options.vartypes, options.deff);
        let ctx = AssembleContext {
            name,
            levels: &options.levels,
            df,
            factor: None,
        };
        assemble(&fit, &types, &ctx)
    } else {
        let levels = truncated(&options.levels, "grouped ratio");
        let (keys, mut masks) = group_masks(design, &prepared, groups)?;
        for mask in &mut masks {
            intersect_mask(mask, domain.as_deref());
        }
        let fit =
            fit_grouped_statistic(&items, &prepared.engine(), &keys, &masks, want_deff)?;
        let types = layout(true, &options.vartypes, options.deff);
        let ctx = AssembleContext {
            name,
            levels: &levels,
            df,
            factor: None,
        };
        assemble(&fit, &types, &ctx)
    }
}

/// Compute a weighted-quantile summary
pub(crate) fn summarize_quantile(
    design: &SurveyDesign,
    groups: &[&str],
    measure: &Measure,
    probs: &[f64],
    name: &str,
    options: &QuantileOptions,
) -> Result<DataFrame> {
    validate_levels(&options.levels)?;
    if probs.is_empty() {
        return Err(Error::InvalidArgument(
            "Quantile request needs at least one probability".to_string(),
        ));
    }
    for &p in probs {
        if !(0.0..=1.0).contains(&p) {
            return Err(Error::InvalidArgument(format!(
                "Quantile probability {p} must be in [0, 1]"
            )));
        }
    }

    let prepared = Prepared::new(design)?;
    let values = prepared
        .structure
        .expand_values(&materialize_measure(design, measure)?, 0.0);
    let domain = missing_filtered_domain(&prepared.structure, &[&values], options.na_rm);

    // Quantiles default to the normal approximation unless a df override is
    // given.
    let df = prepared.resolve_df(design, options.df, Some(f64::INFINITY));
    let levels = truncated(&options.levels, "quantile");
    let level = ConfidenceLevel::new(levels[0])?;
    let settings = QuantileSettings {
        probs: probs.to_vec(),
        alpha: level.rounded_alpha(),
        interval: options.interval,
        interpolation: options.interpolation,
        df,
    };
    let labels: Vec<String> = probs
        .iter()
        .map(|&p| format!("{name}_q{}", format_percent(p * 100.0)))
        .collect();

    if groups.is_empty() {
        let fit = fit_quantiles(labels, &values, &prepared.engine(), domain.as_deref(), &settings)?;
        let types = layout(false, &options.vartypes, false);
        let ctx = AssembleContext {
            name,
            levels: &levels,
            df,
            factor: None,
        };
        assemble(&fit, &types, &ctx)
    } else {
        let (keys, mut masks) = group_masks(design, &prepared, groups)?;
        for mask in &mut masks {
            intersect_mask(mask, domain.as_deref());
        }
        let fit = fit_grouped_quantiles(
            labels,
            &values,
            &prepared.engine(),
            &keys,
            &masks,
            &settings,
        )?;
        // The grouped quantile estimator reports its bounds directly.
        let types = remap_interval(layout(true, &options.vartypes, false));
        let ctx = AssembleContext {
            name,
            levels: &levels,
            df,
            factor: None,
        };
        assemble(&fit, &types, &ctx)
    }
}

#[allow(clippy::too_many_arguments)]
fn aggregate_path(
    design: &SurveyDesign,
    groups: &[&str],
    measure: &Measure,
    name: &str,
    kind: AggregateKind,
    vartypes: &[VarianceType],
    levels: &[f64],
    na_rm: bool,
    deff: bool,
    df_override: Option<f64>,
) -> Result<DataFrame> {
    let prepared = Prepared::new(design)?;
    let values = prepared
        .structure
        .expand_values(&materialize_measure(design, measure)?, 0.0);
    let domain = missing_filtered_domain(&prepared.structure, &[&values], na_rm);
    let df = prepared.resolve_df(design, df_override, None);
    let want_deff = deff || vartypes.contains(&VarianceType::DesignEffect);
    let items = [(name.to_string(), kind.estimand(&values))];

    if groups.is_empty() {
        let fit = fit_statistic(&items, &prepared.engine(), domain.as_deref(), want_deff)?;
        let types = layout(false, vartypes, deff);
        let ctx = AssembleContext {
            name,
            levels,
            df,
            factor: None,
        };
        assemble(&fit, &types, &ctx)
    } else {
        let levels = truncated(levels, "grouped estimate");
        let (keys, mut masks) = group_masks(design, &prepared, groups)?;
        for mask in &mut masks {
            intersect_mask(mask, domain.as_deref());
        }
        let fit =
            fit_grouped_statistic(&items, &prepared.engine(), &keys, &masks, want_deff)?;
        let types = layout(true, vartypes, deff);
        let ctx = AssembleContext {
            name,
            levels: &levels,
            df,
            factor: None,
        };
        assemble(&fit, &types, &ctx)
    }
}

fn proportion_path(
    design: &SurveyDesign,
    groups: &[&str],
    measure: &Measure,
    name: &str,
    options: &MeanOptions,
) -> Result<DataFrame> {
    let prepared = Prepared::new(design)?;
    let values = prepared
        .structure
        .expand_values(&materialize_measure(design, measure)?, 0.0);
    let domain = missing_filtered_domain(&prepared.structure, &[&values], options.na_rm);
    let df = prepared.resolve_df(design, options.df, None);

    // The proportion estimator defines no design effect.
    let mut vartypes: Vec<VarianceType> = options.vartypes.to_vec();
    if options.deff || vartypes.contains(&VarianceType::DesignEffect) {
        warn!("design effect is not defined for the proportion estimator; dropping it");
        vartypes.retain(|t| *t != VarianceType::DesignEffect);
    }
    let levels = truncated(&options.levels, "proportion");
    let level = levels[0];

    if groups.is_empty() {
        let fit = fit_proportion(
            name.to_string(),
            &values,
            &prepared.engine(),
            domain.as_deref(),
            level,
            df,
            options.prop_method,
        )?;
        let types = layout(false, &vartypes, false);
        let ctx = AssembleContext {
            name,
            levels: &levels,
            df,
            factor: None,
        };
        assemble(&fit, &types, &ctx)
    } else {
        let (keys, mut masks) = group_masks(design, &prepared, groups)?;
        for mask in &mut masks {
            intersect_mask(mask, domain.as_deref());
        }
        let fit = fit_grouped_proportion(
            name.to_string(),
            &values,
            &prepared.engine(),
            &keys,
            &masks,
            level,
            df,
            options.prop_method,
        )?;
        // Bounds come straight off the per-group proportion fits.
        let types = remap_interval(layout(true, &vartypes, false));
        let ctx = AssembleContext {
            name,
            levels: &levels,
            df,
            factor: None,
        };
        assemble(&fit, &types, &ctx)
    }
}

#[allow(clippy::too_many_arguments)]
fn factor_path(
    design: &SurveyDesign,
    groups: &[&str],
    name: &str,
    kind: AggregateKind,
    vartypes: &[VarianceType],
    levels: &[f64],
    na_rm: bool,
    deff: bool,
    df_override: Option<f64>,
) -> Result<DataFrame> {
    let Some((&peeled, remaining)) = groups.split_last() else {
        return Err(Error::InvalidArgument(
            "A request without a measured variable needs at least one grouping variable \
             whose categories can be summarized"
                .to_string(),
        ));
    };

    let prepared = Prepared::new(design)?;
    let (level_values, indicators) = indicator_columns(design, peeled)?;
    if level_values.is_empty() {
        return Err(Error::InsufficientData {
            expected: 1,
            actual: 0,
        });
    }
    let expanded: Vec<Vec<f64>> = indicators
        .iter()
        .map(|ind| prepared.structure.expand_values(ind, 0.0))
        .collect();
    let value_refs: Vec<&[f64]> = expanded.iter().map(|v| v.as_slice()).collect();
    let domain = missing_filtered_domain(&prepared.structure, &value_refs, na_rm);
    let df = prepared.resolve_df(design, df_override, None);
    let want_deff = deff || vartypes.contains(&VarianceType::DesignEffect);
    let levels = truncated(levels, "factor expansion");

    let labels: Vec<String> = level_values
        .iter()
        .map(|level| format!("{peeled}{level}"))
        .collect();
    let items: Vec<(String, Estimand)> = labels
        .iter()
        .zip(expanded.iter())
        .map(|(label, values)| (label.clone(), kind.estimand(values)))
        .collect();

    if remaining.is_empty() {
        // Single call over the whole design; the level axis becomes the rows
        // and a levels column stands in for the grouping columns.
        let fit = fit_statistic(&items, &prepared.engine(), domain.as_deref(), want_deff)?;
        let mut types = vec![VarianceType::Levels];
        types.extend(layout(false, vartypes, deff));
        let ctx = AssembleContext {
            name,
            levels: &levels,
            df,
            factor: Some(FactorContext {
                variable: peeled.to_string(),
            }),
        };
        assemble(&fit, &types, &ctx)
    } else {
        let (keys, mut masks) = group_masks(design, &prepared, remaining)?;
        for mask in &mut masks {
            intersect_mask(mask, domain.as_deref());
        }
        let fit =
            fit_grouped_statistic(&items, &prepared.engine(), &keys, &masks, want_deff)?;
        let types = layout(true, vartypes, deff);
        let ctx = AssembleContext {
            name,
            levels: &levels,
            df,
            factor: None,
        };
        let wide = assemble(&fit, &types, &ctx)?;
        let group_names: Vec<String> = remaining.iter().map(|g| g.to_string()).collect();
        reshape_factor(
            &wide,
            name,
            peeled,
            &labels,
            &level_values,
            &group_names,
            &types,
        )
    }
}

/// Lay out the assembly order: grouping columns, then the implicit
/// coefficient, then the requested types, then a trailing design effect when
/// only the flag asked for it
fn layout(with_groups: bool, user: &[VarianceType], deff_flag: bool) -> Vec<VarianceType> {
    let mut out = Vec::with_capacity(user.len() + 3);
    if with_groups {
        out.push(VarianceType::Groups);
    }
    out.push(VarianceType::Coefficient);
    for vtype in user {
        match vtype {
            VarianceType::Coefficient
            | VarianceType::Groups
            | VarianceType::Levels
            | VarianceType::None => {}
            other => out.push(*other),
        }
    }
    if deff_flag && !out.contains(&VarianceType::DesignEffect) {
        out.push(VarianceType::DesignEffect);
    }
    out
}

/// Swap the generic interval tag for the direct-bounds tag
///
/// The grouped proportion and quantile estimators report bounds under their
/// own fields rather than through a level-parameterized interval.
fn remap_interval(types: Vec<VarianceType>) -> Vec<VarianceType> {
    types
        .into_iter()
        .map(|t| {
            if t == VarianceType::ConfidenceInterval {
                VarianceType::PropInterval
            } else {
                t
            }
        })
        .collect()
}

fn reject_none_vartype(types: &[VarianceType]) -> Result<()> {
    if types.contains(&VarianceType::None) {
        return Err(Error::InvalidArgument(
            "Variance type \"none\" is only meaningful for quantile requests".to_string(),
        ));
    }
    Ok(())
}

fn validate_levels(levels: &[f64]) -> Result<()> {
    if levels.is_empty() {
        return Err(Error::InvalidArgument(
            "At least one confidence level is required".to_string(),
        ));
    }
    for &level in levels {
        ConfidenceLevel::new(level)?;
    }
    Ok(())
}

/// Keep only the first confidence level outside the plain ungrouped path
fn truncated(levels: &[f64], context: &str) -> Vec<f64> {
    if levels.len() > 1 {
        warn!(
            context,
            "only the first confidence level is used on this path; the rest are ignored"
        );
        vec![levels[0]]
    } else {
        levels.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_prepends_coefficient() {
        let types = layout(false, &[VarianceType::StandardError], false);
        assert_eq!(
            types,
            vec![VarianceType::Coefficient, VarianceType::StandardError]
        );
    }

    #[test]
    fn test_layout_groups_first_and_deff_flag() {
        let types = layout(
            true,
            &[VarianceType::ConfidenceInterval, VarianceType::Cv],
            true,
        );
        assert_eq!(
            types,
            vec![
                VarianceType::Groups,
                VarianceType::Coefficient,
                VarianceType::ConfidenceInterval,
                VarianceType::Cv,
                VarianceType::DesignEffect,
            ]
        );
    }

    #[test]
    fn test_layout_deduplicates_deff() {
        let types = layout(false, &[VarianceType::DesignEffect], true);
        assert_eq!(
            types,
            vec![VarianceType::Coefficient, VarianceType::DesignEffect]
        );
    }

    #[test]
    fn test_remap_interval() {
        let types = remap_interval(vec![
            VarianceType::Coefficient,
            VarianceType::ConfidenceInterval,
        ]);
        assert_eq!(
            types,
            vec![VarianceType::Coefficient, VarianceType::PropInterval]
        );
    }

    #[test]
    fn test_truncated_keeps_single() {
        assert_eq!(truncated(&[0.95], "x"), vec![0.95]);
        assert_eq!(truncated(&[0.95, 0.9], "x"), vec![0.95]);
    }
}
