//! The survey design data model
//!
//! A [`SurveyDesign`] describes how the sample was drawn: the variables table,
//! the analysis weight, and either stratum/cluster metadata (for Taylor
//! linearization) or a set of replicate weights. The design is read-only to
//! every statistic computation; callers build it once and pass it by
//! reference.

use polars::prelude::*;

use crate::{Error, Result};

/// Replication method for replicate-weight variance estimation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RepMethod {
    /// Balanced repeated replication, with Fay's coefficient (0.0 for plain BRR)
    Brr { fay: f64 },
    /// Delete-one jackknife (JK1)
    Jackknife,
    /// Rescaled bootstrap
    Bootstrap,
    /// Successive difference replication (e.g. ACS)
    Sdr,
}

/// Centering point for replicate-based variance
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum VarianceCenter {
    /// Center on the mean of the replicate estimates (Stata / R survey default)
    #[default]
    ReplicateMean,
    /// Center on the full-sample estimate (R survey `mse = TRUE`)
    FullSample,
}

/// Replicate-weight block of a design
#[derive(Debug, Clone)]
pub struct ReplicateWeights {
    /// Replicate weight column names, one per replicate
    pub columns: Vec<String>,
    /// Replication method that produced the weights
    pub method: RepMethod,
    /// Variance centering point
    pub center: VarianceCenter,
}

impl ReplicateWeights {
    pub fn new(columns: Vec<String>, method: RepMethod) -> Self {
        Self {
            columns,
            method,
            center: VarianceCenter::default(),
        }
    }

    pub fn with_center(mut self, center: VarianceCenter) -> Self {
        self.center = center;
        self
    }

    /// Number of replicates
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Two-phase block: the phase-1 sample the analysis rows were subsampled from
///
/// `subset` names a boolean column of `phase1` marking which phase-1 rows were
/// retained in phase 2. The design's stratum/cluster columns refer to `phase1`
/// when this block is present; measured and grouping variables are read from
/// the analysis frame (the phase-2 rows, in phase-1 order).
#[derive(Debug, Clone)]
pub struct TwoPhase {
    pub phase1: DataFrame,
    pub subset: String,
}

/// A weighted-sample description
///
/// Owns the variables table plus the column names describing the sampling
/// structure. Statistic computations never mutate the frame; per-call working
/// variables live in prepared values outside the design.
#[derive(Debug, Clone)]
pub struct SurveyDesign {
    frame: DataFrame,
    weight: String,
    strata: Option<String>,
    psu: Option<String>,
    ssu: Option<String>,
    fpc: Option<String>,
    fpc_stage2: Option<String>,
    replicates: Option<ReplicateWeights>,
    two_phase: Option<TwoPhase>,
    df_override: Option<f64>,
}

impl SurveyDesign {
    /// Create a design from a variables table and a weight column
    pub fn new(frame: DataFrame, weight: &str) -> Result<Self> {
        require_numeric(&frame, weight)?;
        Ok(Self {
            frame,
            weight: weight.to_string(),
            strata: None,
            psu: None,
            ssu: None,
            fpc: None,
            fpc_stage2: None,
            replicates: None,
            two_phase: None,
            df_override: None,
        })
    }

    pub fn with_strata(mut self, column: &str) -> Result<Self> {
        require_column(self.structure_frame(), column)?;
        self.strata = Some(column.to_string());
        Ok(self)
    }

    pub fn with_psu(mut self, column: &str) -> Result<Self> {
        require_column(self.structure_frame(), column)?;
        self.psu = Some(column.to_string());
        Ok(self)
    }

    pub fn with_ssu(mut self, column: &str) -> Result<Self> {
        require_column(self.structure_frame(), column)?;
        self.ssu = Some(column.to_string());
        Ok(self)
    }

    pub fn with_fpc(mut self, column: &str) -> Result<Self> {
        require_column(self.structure_frame(), column)?;
        self.fpc = Some(column.to_string());
        Ok(self)
    }

    pub fn with_fpc_stage2(mut self, column: &str) -> Result<Self> {
        require_column(self.structure_frame(), column)?;
        self.fpc_stage2 = Some(column.to_string());
        Ok(self)
    }

    pub fn with_replicates(mut self, replicates: ReplicateWeights) -> Result<Self> {
        if replicates.is_empty() {
            return Err(Error::InvalidArgument(
                "Replicate weight set must name at least one column".to_string(),
            ));
        }
        for column in &replicates.columns {
            require_numeric(&self.frame, column)?;
        }
        self.replicates = Some(replicates);
        Ok(self)
    }

    /// Attach the phase-1 sample the analysis frame was drawn from
    ///
    /// After this call the stratum/cluster column names are resolved against
    /// the phase-1 frame. The subset column must be boolean and its number of
    /// `true` entries must match the analysis frame height.
    pub fn with_two_phase(mut self, phase1: DataFrame, subset: &str) -> Result<Self> {
        let mask = phase1
            .column(subset)
            .map_err(|_| Error::InvalidColumn(subset.to_string()))?;
        let mask = mask.bool().map_err(|_| Error::TypeMismatch {
            expected: "boolean".to_string(),
            got: format!("{:?}", mask.dtype()),
        })?;
        let retained = mask.sum().unwrap_or(0) as usize;
        if retained != self.frame.height() {
            return Err(Error::InvalidArgument(format!(
                "Phase-2 subset marks {retained} rows but the analysis frame has {} rows",
                self.frame.height()
            )));
        }
        self.two_phase = Some(TwoPhase {
            phase1,
            subset: subset.to_string(),
        });
        Ok(self)
    }

    /// Override the design degrees of freedom used for interval construction
    pub fn with_degrees_of_freedom(mut self, df: f64) -> Self {
        self.df_override = Some(df);
        self
    }

    /// The analysis frame (phase-2 rows for a two-phase design)
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// The frame stratum/cluster/FPC columns are resolved against
    ///
    /// The phase-1 frame when a two-phase block is present, the analysis frame
    /// otherwise.
    pub fn structure_frame(&self) -> &DataFrame {
        match &self.two_phase {
            Some(tp) => &tp.phase1,
            None => &self.frame,
        }
    }

    pub fn weight(&self) -> &str {
        &self.weight
    }

    pub fn strata(&self) -> Option<&str> {
        self.strata.as_deref()
    }

    pub fn psu(&self) -> Option<&str> {
        self.psu.as_deref()
    }

    pub fn ssu(&self) -> Option<&str> {
        self.ssu.as_deref()
    }

    pub fn fpc(&self) -> Option<&str> {
        self.fpc.as_deref()
    }

    pub fn fpc_stage2(&self) -> Option<&str> {
        self.fpc_stage2.as_deref()
    }

    pub fn replicates(&self) -> Option<&ReplicateWeights> {
        self.replicates.as_ref()
    }

    pub fn two_phase(&self) -> Option<&TwoPhase> {
        self.two_phase.as_ref()
    }

    pub fn df_override(&self) -> Option<f64> {
        self.df_override
    }
}

fn require_column(frame: &DataFrame, name: &str) -> Result<()> {
    frame
        .column(name)
        .map_err(|_| Error::InvalidColumn(name.to_string()))?;
    Ok(())
}

fn require_numeric(frame: &DataFrame, name: &str) -> Result<()> {
    let column = frame
        .column(name)
        .map_err(|_| Error::InvalidColumn(name.to_string()))?;
    let dt = column.dtype();
    if dt.is_float() || dt.is_integer() {
        Ok(())
    } else {
        Err(Error::TypeMismatch {
            expected: "numeric".to_string(),
            got: format!("{dt:?}"),
        })
    }
}
