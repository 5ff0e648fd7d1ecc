//! Shared fixtures for the summary integration tests
#![allow(dead_code)]

use polars::prelude::*;
use survey_core::SurveyDesign;

/// Equal-weight design over a single measured column named `y`
pub fn simple_design(values: &[f64]) -> SurveyDesign {
    let frame = df![
        "y" => values.to_vec(),
        "w" => vec![1.0; values.len()],
    ]
    .unwrap();
    SurveyDesign::new(frame, "w").unwrap()
}

/// Two groups of two: y = {10, 20} in A and {30, 40} in B
pub fn grouped_design() -> SurveyDesign {
    let frame = df![
        "y" => [10.0, 20.0, 30.0, 40.0],
        "g" => ["A", "A", "B", "B"],
        "w" => [1.0, 1.0, 1.0, 1.0],
    ]
    .unwrap();
    SurveyDesign::new(frame, "w").unwrap()
}

/// School-like fixture with a region and a school-type category
pub fn school_design() -> SurveyDesign {
    let frame = df![
        "api00" => [693.0, 570.0, 546.0, 571.0, 478.0, 858.0, 918.0, 831.0],
        "enroll" => [247.0, 463.0, 395.0, 190.0, 521.0, 208.0, 160.0, 370.0],
        "region" => ["north", "north", "north", "north", "south", "south", "south", "south"],
        "stype" => ["E", "E", "H", "M", "E", "E", "H", "M"],
        "pw" => [30.97, 30.97, 30.97, 30.97, 44.18, 44.18, 44.18, 44.18],
    ]
    .unwrap();
    SurveyDesign::new(frame, "pw").unwrap()
}

/// Pull a single f64 cell out of a result frame
pub fn cell(frame: &DataFrame, column: &str, row: usize) -> f64 {
    frame
        .column(column)
        .unwrap_or_else(|_| panic!("missing column {column}"))
        .f64()
        .unwrap()
        .get(row)
        .unwrap()
}

/// Pull a single string cell out of a result frame
pub fn text_cell(frame: &DataFrame, column: &str, row: usize) -> String {
    frame
        .column(column)
        .unwrap_or_else(|_| panic!("missing column {column}"))
        .str()
        .unwrap()
        .get(row)
        .unwrap()
        .to_string()
}
