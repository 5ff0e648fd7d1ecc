//! Prepared design structure
//!
//! One statistic call prepares a [`DesignStructure`] from the caller's
//! [`SurveyDesign`] and works on that value alone; the design's frame is never
//! touched again. Stratum, cluster and secondary-unit columns are indexed into
//! dense integer codes here, once, so the variance kernels can stay on plain
//! slices. For a two-phase design the structure lives at phase-1 length and
//! the phase-2 subset becomes the baseline domain mask.

use std::collections::HashMap;

use polars::prelude::*;
use survey_core::{Error, Result, SurveyDesign};

/// Sentinel code for a missing category value
pub const MISSING_CODE: u32 = u32::MAX;

/// Integer-coded sampling structure for one statistic computation
#[derive(Debug, Clone)]
pub struct DesignStructure {
    /// Analysis weights, at structure length (zero outside the phase-2 subset)
    pub weights: Vec<f64>,
    /// Stratum codes, dense from zero
    pub strata: Option<Vec<u32>>,
    pub n_strata: u32,
    /// Primary sampling unit codes, dense from zero
    pub psu: Option<Vec<u32>>,
    pub n_psus: u32,
    /// Secondary sampling unit codes, dense from zero
    pub ssu: Option<Vec<u32>>,
    /// Stage-1 finite population correction multiplier
    pub fpc: f64,
    /// Stage-2 finite population correction multiplier
    pub fpc_stage2: f64,
    /// Phase-2 membership mask, present only for two-phase designs
    subset: Option<Vec<bool>>,
    n: usize,
}

impl DesignStructure {
    /// Prepare the structure for one statistic call
    pub fn prepare(design: &SurveyDesign) -> Result<Self> {
        let frame = design.structure_frame();
        let n = frame.height();

        let subset = match design.two_phase() {
            Some(tp) => {
                let mask = frame
                    .column(&tp.subset)
                    .map_err(|_| Error::InvalidColumn(tp.subset.clone()))?
                    .bool()?;
                Some(mask.into_iter().map(|v| v.unwrap_or(false)).collect::<Vec<bool>>())
            }
            None => None,
        };

        let raw_weights: Vec<f64> = numeric_values(design.frame(), design.weight())?
            .into_iter()
            .map(|w| if w.is_nan() { 0.0 } else { w })
            .collect();
        let weights = match &subset {
            Some(mask) => scatter(&raw_weights, mask, 0.0),
            None => raw_weights,
        };

        let (strata, n_strata) = optional_codes(frame, design.strata())?;
        let (psu, n_psus) = optional_codes(frame, design.psu())?;
        let (ssu, _) = optional_codes(frame, design.ssu())?;

        let fpc = scalar_or(frame, design.fpc(), 1.0)?;
        let fpc_stage2 = scalar_or(frame, design.fpc_stage2(), 1.0)?;

        Ok(Self {
            weights,
            strata,
            n_strata,
            psu,
            n_psus,
            ssu,
            fpc,
            fpc_stage2,
            subset,
            n,
        })
    }

    /// Structure length (phase-1 length for two-phase designs)
    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// The phase-2 subset as a baseline domain, when one exists
    pub fn base_domain(&self) -> Option<&[bool]> {
        self.subset.as_deref()
    }

    /// Lift analysis-frame values to structure length
    ///
    /// For a two-phase design the values are scattered into the phase-1 row
    /// order with `fill` outside the subset; otherwise they pass through.
    pub fn expand_values(&self, values: &[f64], fill: f64) -> Vec<f64> {
        match &self.subset {
            Some(mask) => scatter(values, mask, fill),
            None => values.to_vec(),
        }
    }

    /// Lift an analysis-frame mask to structure length (false outside subset)
    pub fn expand_mask(&self, mask: &[bool]) -> Vec<bool> {
        match &self.subset {
            Some(subset) => {
                let mut out = vec![false; subset.len()];
                let mut j = 0;
                for (i, &keep) in subset.iter().enumerate() {
                    if keep {
                        out[i] = mask[j];
                        j += 1;
                    }
                }
                out
            }
            None => mask.to_vec(),
        }
    }

    /// Residual degrees of freedom of the design: clusters minus strata
    pub fn residual_df(&self) -> f64 {
        match (&self.strata, &self.psu) {
            (None, None) => self.n.saturating_sub(1) as f64,
            (None, Some(_)) => self.n_psus.saturating_sub(1) as f64,
            (Some(strata), psu) => {
                let mut df = 0u32;
                match psu {
                    Some(psu) => {
                        let per_stratum = psus_per_stratum(strata, self.n_strata, psu);
                        for count in per_stratum {
                            df += count.saturating_sub(1);
                        }
                    }
                    None => {
                        let mut counts = vec![0u32; self.n_strata as usize];
                        for &h in strata {
                            if h != MISSING_CODE {
                                counts[h as usize] += 1;
                            }
                        }
                        for count in counts {
                            df += count.saturating_sub(1);
                        }
                    }
                }
                df as f64
            }
        }
    }
}

/// Number of distinct PSUs observed in each stratum
pub(crate) fn psus_per_stratum(strata: &[u32], n_strata: u32, psu: &[u32]) -> Vec<u32> {
    let mut seen: Vec<HashMap<u32, ()>> = vec![HashMap::new(); n_strata as usize];
    for (&h, &p) in strata.iter().zip(psu.iter()) {
        if h != MISSING_CODE && p != MISSING_CODE {
            seen[h as usize].insert(p, ());
        }
    }
    seen.iter().map(|m| m.len() as u32).collect()
}

/// Index a textual column into dense codes, keyed in first-appearance order
pub fn string_codes(column: &Column) -> Result<(Vec<u32>, Vec<String>)> {
    let casted = column.cast(&DataType::String)?;
    let ca = casted.str()?;
    let mut lookup: HashMap<String, u32> = HashMap::new();
    let mut levels: Vec<String> = Vec::new();
    let codes = ca
        .iter()
        .map(|opt| match opt {
            Some(s) => match lookup.get(s) {
                Some(&code) => code,
                None => {
                    let code = levels.len() as u32;
                    lookup.insert(s.to_string(), code);
                    levels.push(s.to_string());
                    code
                }
            },
            None => MISSING_CODE,
        })
        .collect();
    Ok((codes, levels))
}

/// Read a numeric column as `f64` values (nulls become NaN)
pub fn numeric_values(frame: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = frame
        .column(name)
        .map_err(|_| Error::InvalidColumn(name.to_string()))?;
    let casted = column.cast(&DataType::Float64)?;
    let ca = casted.f64()?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn optional_codes(frame: &DataFrame, name: Option<&str>) -> Result<(Option<Vec<u32>>, u32)> {
    match name {
        Some(name) => {
            let column = frame
                .column(name)
                .map_err(|_| Error::InvalidColumn(name.to_string()))?;
            let (codes, levels) = string_codes(column)?;
            Ok((Some(codes), levels.len() as u32))
        }
        None => Ok((None, 0)),
    }
}

fn scalar_or(frame: &DataFrame, name: Option<&str>, default: f64) -> Result<f64> {
    match name {
        Some(name) => {
            let column = frame
                .column(name)
                .map_err(|_| Error::InvalidColumn(name.to_string()))?;
            let casted = column.cast(&DataType::Float64)?;
            Ok(casted.f64()?.get(0).unwrap_or(default))
        }
        None => Ok(default),
    }
}

fn scatter(values: &[f64], mask: &[bool], fill: f64) -> Vec<f64> {
    let mut out = vec![fill; mask.len()];
    let mut j = 0;
    for (i, &keep) in mask.iter().enumerate() {
        if keep {
            out[i] = values[j];
            j += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stratified_design() -> SurveyDesign {
        let frame = df![
            "y" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            "w" => [1.0, 1.0, 1.0, 1.0, 1.0, 1.0],
            "stratum" => ["a", "a", "a", "b", "b", "b"],
            "cluster" => ["c1", "c1", "c2", "c3", "c4", "c4"],
        ]
        .unwrap();
        SurveyDesign::new(frame, "w")
            .unwrap()
            .with_strata("stratum")
            .unwrap()
            .with_psu("cluster")
            .unwrap()
    }

    #[test]
    fn test_codes_first_appearance_order() {
        let frame = df!["g" => ["z", "m", "z", "a"]].unwrap();
        let (codes, levels) = string_codes(frame.column("g").unwrap()).unwrap();
        assert_eq!(codes, vec![0, 1, 0, 2]);
        assert_eq!(levels, vec!["z", "m", "a"]);
    }

    #[test]
    fn test_residual_df_clusters_minus_strata() {
        let structure = DesignStructure::prepare(&stratified_design()).unwrap();
        // two strata with two PSUs each: (2-1) + (2-1) = 2
        assert_eq!(structure.residual_df(), 2.0);
    }

    #[test]
    fn test_two_phase_expansion() {
        let phase1 = df![
            "stratum" => ["a", "a", "b", "b"],
            "keep" => [true, false, true, true],
        ]
        .unwrap();
        let frame = df![
            "y" => [10.0, 30.0, 40.0],
            "w" => [2.0, 2.0, 2.0],
        ]
        .unwrap();
        let design = SurveyDesign::new(frame, "w")
            .unwrap()
            .with_two_phase(phase1, "keep")
            .unwrap()
            .with_strata("stratum")
            .unwrap();
        let structure = DesignStructure::prepare(&design).unwrap();

        assert_eq!(structure.len(), 4);
        assert_eq!(structure.weights, vec![2.0, 0.0, 2.0, 2.0]);
        assert_eq!(
            structure.expand_values(&[10.0, 30.0, 40.0], 0.0),
            vec![10.0, 0.0, 30.0, 40.0]
        );
        assert_eq!(
            structure.expand_mask(&[true, false, true]),
            vec![true, false, false, true]
        );
        assert_eq!(structure.base_domain().unwrap(), &[true, false, true, true]);
    }
}
