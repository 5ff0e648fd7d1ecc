//! Request vocabulary: variance types, measures and per-statistic options

use polars::prelude::Expr;
use survey_core::{Error, Result};
use survey_estimate::{Interpolation, PropMethod, QuantileInterval};

/// One kind of output block a statistic request can ask for
///
/// Callers name the reportable kinds (`"se"`, `"ci"`, `"var"`, `"cv"`,
/// `"deff"`, `"none"`); the remaining variants are placed by the dispatcher
/// itself while it lays out the assembly order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarianceType {
    /// Point estimate column(s); always present, placed implicitly
    Coefficient,
    /// Standard error, suffix `_se`
    StandardError,
    /// Symmetric interval at the requested level(s), suffixes `_low`/`_upp`
    ConfidenceInterval,
    /// Estimator-reported interval bounds, suffixes `_low`/`_upp`
    PropInterval,
    /// Sampling variance, suffix `_var`
    Variance,
    /// Coefficient of variation, suffix `_cv`
    Cv,
    /// Design effect, suffix `_deff`
    DesignEffect,
    /// Grouping-column passthrough
    Groups,
    /// Factor levels column for the no-remaining-groups factor path
    Levels,
    /// No variance output; only meaningful for quantiles
    None,
}

impl VarianceType {
    /// Parse a caller-supplied tag
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "se" => Ok(Self::StandardError),
            "ci" => Ok(Self::ConfidenceInterval),
            "var" => Ok(Self::Variance),
            "cv" => Ok(Self::Cv),
            "deff" => Ok(Self::DesignEffect),
            "none" => Ok(Self::None),
            _ => Err(Error::unknown_vartype(tag)),
        }
    }

    pub fn parse_all(tags: &[&str]) -> Result<Vec<Self>> {
        tags.iter().map(|tag| Self::parse(tag)).collect()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Coefficient => "coef",
            Self::StandardError => "se",
            Self::ConfidenceInterval => "ci",
            Self::PropInterval => "ci-prop",
            Self::Variance => "var",
            Self::Cv => "cv",
            Self::DesignEffect => "deff",
            Self::Groups => "grps",
            Self::Levels => "lvls",
            Self::None => "none",
        }
    }
}

/// What to measure: an existing column or a computed expression
///
/// An expression is materialized under a reserved working name against a
/// clone of the design's frame; the caller's frame is never touched.
#[derive(Clone)]
pub enum Measure {
    Column(String),
    Expr(Expr),
}

impl From<&str> for Measure {
    fn from(name: &str) -> Self {
        Self::Column(name.to_string())
    }
}

impl From<String> for Measure {
    fn from(name: String) -> Self {
        Self::Column(name)
    }
}

impl From<Expr> for Measure {
    fn from(expr: Expr) -> Self {
        Self::Expr(expr)
    }
}

/// Options for a mean (or proportion) request
#[derive(Clone)]
pub struct MeanOptions {
    pub vartypes: Vec<VarianceType>,
    /// Confidence levels; more than one is honored only on the plain
    /// ungrouped path
    pub levels: Vec<f64>,
    /// Drop missing observations before estimation
    pub na_rm: bool,
    /// Route to the dedicated proportion-interval estimator
    pub proportion: bool,
    pub prop_method: PropMethod,
    /// Also report the design effect
    pub deff: bool,
    /// Override the design degrees of freedom
    pub df: Option<f64>,
}

impl Default for MeanOptions {
    fn default() -> Self {
        Self {
            vartypes: vec![VarianceType::StandardError],
            levels: vec![0.95],
            na_rm: false,
            proportion: false,
            prop_method: PropMethod::default(),
            deff: false,
            df: None,
        }
    }
}

impl MeanOptions {
    pub fn with_vartypes(mut self, tags: &[&str]) -> Result<Self> {
        self.vartypes = VarianceType::parse_all(tags)?;
        Ok(self)
    }
}

/// Options for a total request
#[derive(Clone)]
pub struct TotalOptions {
    pub vartypes: Vec<VarianceType>,
    pub levels: Vec<f64>,
    pub na_rm: bool,
    pub deff: bool,
    pub df: Option<f64>,
}

impl Default for TotalOptions {
    fn default() -> Self {
        Self {
            vartypes: vec![VarianceType::StandardError],
            levels: vec![0.95],
            na_rm: false,
            deff: false,
            df: None,
        }
    }
}

impl TotalOptions {
    pub fn with_vartypes(mut self, tags: &[&str]) -> Result<Self> {
        self.vartypes = VarianceType::parse_all(tags)?;
        Ok(self)
    }
}

/// Options for a ratio request
#[derive(Clone)]
pub struct RatioOptions {
    pub vartypes: Vec<VarianceType>,
    pub levels: Vec<f64>,
    pub na_rm: bool,
    pub deff: bool,
    pub df: Option<f64>,
}

impl Default for RatioOptions {
    fn default() -> Self {
        Self {
            vartypes: vec![VarianceType::StandardError],
            levels: vec![0.95],
            na_rm: false,
            deff: false,
            df: None,
        }
    }
}

impl RatioOptions {
    pub fn with_vartypes(mut self, tags: &[&str]) -> Result<Self> {
        self.vartypes = VarianceType::parse_all(tags)?;
        Ok(self)
    }
}

/// Options for a quantile request
#[derive(Clone)]
pub struct QuantileOptions {
    /// May include `"none"`; the coefficient is always reported regardless
    pub vartypes: Vec<VarianceType>,
    pub levels: Vec<f64>,
    pub na_rm: bool,
    pub interval: QuantileInterval,
    pub interpolation: Interpolation,
    /// Degrees of freedom; quantiles default to the normal approximation
    pub df: Option<f64>,
}

impl Default for QuantileOptions {
    fn default() -> Self {
        Self {
            vartypes: vec![VarianceType::StandardError],
            levels: vec![0.95],
            na_rm: false,
            interval: QuantileInterval::default(),
            interpolation: Interpolation::default(),
            df: None,
        }
    }
}

impl QuantileOptions {
    pub fn with_vartypes(mut self, tags: &[&str]) -> Result<Self> {
        self.vartypes = VarianceType::parse_all(tags)?;
        Ok(self)
    }
}
