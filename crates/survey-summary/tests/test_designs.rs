//! Stratified, two-phase and replicate-weight designs through the summary layer

mod common;

use approx::assert_relative_eq;
use common::cell;
use polars::prelude::*;
use survey_core::{RepMethod, ReplicateWeights, SurveyDesign};
use survey_summary::{MeanOptions, SurveySummaryExt};

#[test]
fn test_stratified_design_mean() {
    let frame = df![
        "y" => [1.0, 2.0, 3.0, 101.0, 102.0, 103.0],
        "stratum" => ["a", "a", "a", "b", "b", "b"],
        "w" => [1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
    ]
    .unwrap();
    let stratified = SurveyDesign::new(frame.clone(), "w")
        .unwrap()
        .with_strata("stratum")
        .unwrap();
    let plain = SurveyDesign::new(frame, "w").unwrap();

    let stratified_out = stratified
        .survey_mean(&[], Some("y".into()), "y", &MeanOptions::default())
        .unwrap();
    let plain_out = plain
        .survey_mean(&[], Some("y".into()), "y", &MeanOptions::default())
        .unwrap();

    assert_relative_eq!(cell(&stratified_out, "y", 0), 52.0);
    assert_relative_eq!(cell(&plain_out, "y", 0), 52.0);
    // The strata separate the two value clusters, so stratification must
    // shrink the standard error.
    assert!(cell(&stratified_out, "y_se", 0) < cell(&plain_out, "y_se", 0));
}

#[test]
fn test_two_phase_design_mean() {
    let phase1 = df![
        "stratum" => ["a", "a", "b", "b"],
        "keep" => [true, false, true, true],
    ]
    .unwrap();
    let frame = df![
        "y" => [10.0, 30.0, 50.0],
        "w" => [2.0, 1.0, 1.0],
    ]
    .unwrap();
    let design = SurveyDesign::new(frame, "w")
        .unwrap()
        .with_two_phase(phase1, "keep")
        .unwrap()
        .with_strata("stratum")
        .unwrap();

    let out = design
        .survey_mean(&[], Some("y".into()), "y", &MeanOptions::default())
        .unwrap();
    // Weighted mean over the phase-2 rows: (2*10 + 30 + 50) / 4.
    assert_relative_eq!(cell(&out, "y", 0), 25.0);
    assert!(cell(&out, "y_se", 0).is_finite());
}

#[test]
fn test_two_phase_grouped_mean() {
    let phase1 = df![
        "cluster" => ["c1", "c1", "c2", "c2", "c3", "c3"],
        "keep" => [true, true, true, true, false, false],
    ]
    .unwrap();
    let frame = df![
        "y" => [10.0, 20.0, 30.0, 40.0],
        "g" => ["A", "A", "B", "B"],
        "w" => [1.0, 1.0, 1.0, 1.0],
    ]
    .unwrap();
    let design = SurveyDesign::new(frame, "w")
        .unwrap()
        .with_two_phase(phase1, "keep")
        .unwrap()
        .with_psu("cluster")
        .unwrap();

    let out = design
        .survey_mean(&["g"], Some("y".into()), "y", &MeanOptions::default())
        .unwrap();
    assert_eq!(out.shape(), (2, 3));
    assert_relative_eq!(cell(&out, "y", 0), 15.0);
    assert_relative_eq!(cell(&out, "y", 1), 35.0);
}

#[test]
fn test_replicate_design_mean() {
    let frame = df![
        "y" => [1.0, 2.0, 3.0, 4.0],
        "w" => [1.0, 1.0, 1.0, 1.0],
        "rw1" => [2.0, 0.0, 2.0, 0.0],
        "rw2" => [0.0, 2.0, 0.0, 2.0],
        "rw3" => [2.0, 2.0, 0.0, 0.0],
        "rw4" => [0.0, 0.0, 2.0, 2.0],
    ]
    .unwrap();
    let replicates = ReplicateWeights::new(
        vec![
            "rw1".to_string(),
            "rw2".to_string(),
            "rw3".to_string(),
            "rw4".to_string(),
        ],
        RepMethod::Brr { fay: 0.0 },
    );
    let design = SurveyDesign::new(frame, "w")
        .unwrap()
        .with_replicates(replicates)
        .unwrap();

    let out = design
        .survey_mean(&[], Some("y".into()), "y", &MeanOptions::default())
        .unwrap();
    assert_relative_eq!(cell(&out, "y", 0), 2.5);
    assert!(cell(&out, "y_se", 0) > 0.0);
}

#[test]
fn test_replicate_design_grouped() {
    let frame = df![
        "y" => [1.0, 2.0, 3.0, 4.0],
        "g" => ["A", "B", "A", "B"],
        "w" => [1.0, 1.0, 1.0, 1.0],
        "rw1" => [2.0, 0.0, 2.0, 0.0],
        "rw2" => [0.0, 2.0, 0.0, 2.0],
    ]
    .unwrap();
    let replicates = ReplicateWeights::new(
        vec!["rw1".to_string(), "rw2".to_string()],
        RepMethod::Jackknife,
    );
    let design = SurveyDesign::new(frame, "w")
        .unwrap()
        .with_replicates(replicates)
        .unwrap();

    let out = design
        .survey_mean(&["g"], Some("y".into()), "y", &MeanOptions::default())
        .unwrap();
    assert_eq!(out.shape(), (2, 3));
    assert_relative_eq!(cell(&out, "y", 0), 2.0);
    assert_relative_eq!(cell(&out, "y", 1), 3.0);
}
