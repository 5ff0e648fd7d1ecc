//! By-group driver
//!
//! Discovers the groups of one or more (textually keyed) grouping columns in
//! first-appearance order and materializes one domain mask per group. Rows
//! with a missing value in any grouping column belong to no group.

use std::collections::HashMap;

use polars::prelude::*;
use survey_core::{Error, Result};

/// Discovered groups: one table row and one domain mask per group
#[derive(Debug, Clone)]
pub struct GroupKeys {
    /// One row per group, one textual column per grouping variable, in
    /// first-appearance order
    pub table: DataFrame,
    /// Domain masks at analysis-frame length, aligned with `table` rows
    pub masks: Vec<Vec<bool>>,
}

impl GroupKeys {
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }
}

/// Discover the groups of `columns` within `frame`
pub fn group_keys(frame: &DataFrame, columns: &[String]) -> Result<GroupKeys> {
    if columns.is_empty() {
        return Err(Error::InvalidArgument(
            "Group discovery needs at least one grouping column".to_string(),
        ));
    }

    let n = frame.height();
    let mut text_columns: Vec<Vec<Option<String>>> = Vec::with_capacity(columns.len());
    for name in columns {
        let column = frame
            .column(name)
            .map_err(|_| Error::InvalidColumn(name.to_string()))?;
        let casted = column.cast(&DataType::String)?;
        let ca = casted.str()?;
        text_columns.push(ca.iter().map(|v| v.map(|s| s.to_string())).collect());
    }

    let mut lookup: HashMap<Vec<String>, usize> = HashMap::new();
    let mut keys: Vec<Vec<String>> = Vec::new();
    let mut masks: Vec<Vec<bool>> = Vec::new();

    for i in 0..n {
        let mut key = Vec::with_capacity(columns.len());
        let mut complete = true;
        for col in &text_columns {
            match &col[i] {
                Some(v) => key.push(v.clone()),
                None => {
                    complete = false;
                    break;
                }
            }
        }
        if !complete {
            continue;
        }
        let g = match lookup.get(&key) {
            Some(&g) => g,
            None => {
                let g = keys.len();
                lookup.insert(key.clone(), g);
                keys.push(key);
                masks.push(vec![false; n]);
                g
            }
        };
        masks[g][i] = true;
    }

    let mut table_columns: Vec<Column> = Vec::with_capacity(columns.len());
    for (c, name) in columns.iter().enumerate() {
        let values: Vec<String> = keys.iter().map(|key| key[c].clone()).collect();
        let series = Series::new(name.as_str().into(), values);
        table_columns.push(series.into());
    }
    let table = DataFrame::new(table_columns)?;

    Ok(GroupKeys { table, masks })
}
