//! Factor expansion, reshaping and proportion mode

mod common;

use approx::assert_relative_eq;
use common::{cell, school_design, text_cell};
use polars::prelude::*;
use survey_core::Error;
use survey_summary::{MeanOptions, Measure, PropMethod, SurveySummaryExt};

#[test]
fn test_factor_expansion_without_remaining_groups() {
    // Levels deliberately not in alphabetical order of first appearance.
    let frame = df![
        "stype" => ["M", "E", "M", "H"],
        "w" => [1.0, 1.0, 1.0, 1.0],
    ]
    .unwrap();
    let design = survey_core::SurveyDesign::new(frame, "w").unwrap();
    let out = design
        .survey_mean(&["stype"], None, "prop", &MeanOptions::default())
        .unwrap();

    // One row per level: lvls column, coefficient, se.
    assert_eq!(out.shape(), (3, 3));
    assert_eq!(text_cell(&out, "stype", 0), "M");
    assert_eq!(text_cell(&out, "stype", 1), "E");
    assert_eq!(text_cell(&out, "stype", 2), "H");
    assert_relative_eq!(cell(&out, "prop", 0), 0.5);
    assert_relative_eq!(cell(&out, "prop", 1), 0.25);
    assert_relative_eq!(cell(&out, "prop", 2), 0.25);
}

#[test]
fn test_factor_expansion_with_remaining_groups_reshapes_long() {
    let design = school_design();
    let options = MeanOptions::default().with_vartypes(&["se", "ci"]).unwrap();
    let out = design
        .survey_mean(&["region", "stype"], None, "share", &options)
        .unwrap();

    // 2 regions x 3 levels = 6 rows; region, stype, coefficient, se, low, upp.
    assert_eq!(out.shape(), (6, 6));
    assert_eq!(text_cell(&out, "region", 0), "north");
    assert_eq!(text_cell(&out, "region", 3), "south");
    // Levels cycle within each group in original order.
    assert_eq!(text_cell(&out, "stype", 0), "E");
    assert_eq!(text_cell(&out, "stype", 1), "H");
    assert_eq!(text_cell(&out, "stype", 2), "M");
    assert_eq!(text_cell(&out, "stype", 3), "E");

    // Shares within a region sum to one.
    let north: f64 = (0..3).map(|row| cell(&out, "share", row)).sum();
    assert_relative_eq!(north, 1.0, epsilon = 1e-10);

    for row in 0..6 {
        assert!(cell(&out, "share_low", row) <= cell(&out, "share", row));
        assert!(cell(&out, "share_upp", row) >= cell(&out, "share", row));
    }
}

#[test]
fn test_factor_requires_grouping() {
    let design = school_design();
    let err = design
        .survey_mean(&[], None, "p", &MeanOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn test_proportion_mode_rejects_factor_request() {
    let design = school_design();
    let mut options = MeanOptions::default();
    options.proportion = true;
    let err = design
        .survey_mean(&["stype"], None, "p", &options)
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn test_ungrouped_proportion_interval_inside_unit_range() {
    let frame = df![
        "won" => [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0],
        "w" => vec![1.0; 10],
    ]
    .unwrap();
    let design = survey_core::SurveyDesign::new(frame, "w").unwrap();
    let mut options = MeanOptions::default().with_vartypes(&["ci"]).unwrap();
    options.proportion = true;
    options.prop_method = PropMethod::Logit;
    let out = design
        .survey_mean(&[], Some("won".into()), "p", &options)
        .unwrap();

    assert_relative_eq!(cell(&out, "p", 0), 0.2);
    let low = cell(&out, "p_low", 0);
    let upp = cell(&out, "p_upp", 0);
    assert!(low > 0.0 && low < 0.2);
    assert!(upp > 0.2 && upp < 1.0);
}

#[test]
fn test_grouped_proportion_drops_deff_and_reports_bounds() {
    let design = school_design();
    let mut options = MeanOptions::default().with_vartypes(&["ci", "deff"]).unwrap();
    options.proportion = true;

    // Proportion of elementary schools per region.
    let out = design
        .survey_mean(
            &["region"],
            Some(Measure::from(col("stype").eq(lit("E")))),
            "p_elem",
            &options,
        )
        .unwrap();

    // region + coefficient + low/upp; the deff request is dropped.
    assert_eq!(out.shape(), (2, 4));
    assert!(out.column("p_elem_deff").is_err());
    for row in 0..2 {
        let p = cell(&out, "p_elem", row);
        assert_relative_eq!(p, 0.5);
        assert!(cell(&out, "p_elem_low", row) <= p);
        assert!(cell(&out, "p_elem_upp", row) >= p);
    }
}

#[test]
fn test_numeric_group_is_coerced_to_text() {
    let frame = df![
        "y" => [1.0, 2.0, 3.0, 4.0],
        "g" => [2i64, 2, 7, 7],
        "w" => [1.0, 1.0, 1.0, 1.0],
    ]
    .unwrap();
    let design = survey_core::SurveyDesign::new(frame, "w").unwrap();
    let out = design
        .survey_mean(&["g"], Some("y".into()), "y", &MeanOptions::default())
        .unwrap();
    assert_eq!(out.shape(), (2, 3));
    assert_eq!(text_cell(&out, "g", 0), "2");
    assert_eq!(text_cell(&out, "g", 1), "7");
}
