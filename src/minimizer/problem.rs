//! Minimizer input and output types.

use ndarray::{Array1, Array2};
use std::fmt;

use crate::error::{Result, SpectrumFitError};
use crate::formula::Formula;
use crate::histogram::Histogram;

/// How a parameter may move during minimization.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constraint {
    Free,
    Fixed,
    /// Limited to `[lower, upper]`. A pair with `lower >= upper` fixes the
    /// parameter instead.
    Bounded { lower: f64, upper: f64 },
}

/// Per-parameter minimizer input.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSetting {
    pub name: String,
    pub initial: f64,
    pub constraint: Constraint,
}

impl ParameterSetting {
    pub fn free(name: impl Into<String>, initial: f64) -> Self {
        Self {
            name: name.into(),
            initial,
            constraint: Constraint::Free,
        }
    }

    pub fn fixed(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            initial: value,
            constraint: Constraint::Fixed,
        }
    }

    pub fn bounded(name: impl Into<String>, initial: f64, lower: f64, upper: f64) -> Self {
        Self {
            name: name.into(),
            initial,
            constraint: Constraint::Bounded { lower, upper },
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self.constraint, Constraint::Fixed)
    }
}

/// Objective the minimizer is asked to reduce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    /// Poisson likelihood ratio, suited to sparse low-count bins.
    #[default]
    Likelihood,
    /// Neyman chi-square with `max(y, 1)` variances.
    ChiSquare,
}

/// Histogram bins selected for a fit.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedData {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
}

impl BinnedData {
    pub fn new(x: Array1<f64>, y: Array1<f64>) -> Result<Self> {
        if x.len() != y.len() {
            return Err(SpectrumFitError::DimensionMismatch(format!(
                "{} bin centres but {} contents",
                x.len(),
                y.len()
            )));
        }
        Ok(Self { x, y })
    }

    /// Bins whose centre lies in `[lb, ub]`.
    pub fn from_histogram(histogram: &dyn Histogram, lb: f64, ub: f64) -> Self {
        let (x, y): (Vec<f64>, Vec<f64>) = (0..histogram.bin_count())
            .map(|bin| (histogram.bin_center(bin), histogram.bin_content(bin)))
            .filter(|(centre, _)| *centre >= lb && *centre <= ub)
            .unzip();
        Self {
            x: Array1::from(x),
            y: Array1::from(y),
        }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Everything a [`Minimizer`](super::Minimizer) needs for one fit.
#[derive(Debug, Clone, Copy)]
pub struct FitProblem<'a> {
    pub formula: &'a Formula,
    pub parameters: &'a [ParameterSetting],
    pub data: &'a BinnedData,
    pub mode: FitMode,
}

impl<'a> FitProblem<'a> {
    pub fn new(
        formula: &'a Formula,
        parameters: &'a [ParameterSetting],
        data: &'a BinnedData,
        mode: FitMode,
    ) -> Self {
        Self {
            formula,
            parameters,
            data,
            mode,
        }
    }

    /// Checks that every formula parameter has a setting and there is data.
    pub fn validate(&self) -> Result<()> {
        if self.parameters.len() < self.formula.parameter_count() {
            return Err(SpectrumFitError::DimensionMismatch(format!(
                "formula uses {} parameters but {} were supplied",
                self.formula.parameter_count(),
                self.parameters.len()
            )));
        }
        if self.data.is_empty() {
            return Err(SpectrumFitError::InvalidInput(
                "no histogram bins inside the fit range".to_string(),
            ));
        }
        Ok(())
    }
}

/// Minimizer output.
#[derive(Debug, Clone)]
pub struct FitResult {
    pub parameters: Vec<f64>,
    pub errors: Vec<f64>,
    /// Full symmetric covariance; rows of fixed parameters are zero.
    pub covariance: Array2<f64>,
    /// Bounds actually applied, `None` for free and fixed parameters.
    pub bounds: Vec<Option<(f64, f64)>>,
    pub chi_square: f64,
    pub ndf: usize,
    pub valid: bool,
    pub message: String,
    pub iterations: usize,
}

impl FitResult {
    pub fn parameter(&self, index: usize) -> Option<f64> {
        self.parameters.get(index).copied()
    }

    pub fn error(&self, index: usize) -> Option<f64> {
        self.errors.get(index).copied()
    }

    /// Covariance of parameters `i` and `j`, zero outside the matrix.
    pub fn covariance(&self, i: usize, j: usize) -> f64 {
        self.covariance.get((i, j)).copied().unwrap_or(0.0)
    }

    pub fn bounds(&self, index: usize) -> Option<(f64, f64)> {
        self.bounds.get(index).copied().flatten()
    }

    /// `chi_square / ndf`, zero without degrees of freedom.
    pub fn reduced_chi_square(&self) -> f64 {
        if self.ndf == 0 {
            0.0
        } else {
            self.chi_square / self.ndf as f64
        }
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Fit Result:")?;
        writeln!(f, "  Valid: {}", self.valid)?;
        writeln!(f, "  Message: {}", self.message)?;
        writeln!(f, "  Chi-square / ndf: {:.4} / {}", self.chi_square, self.ndf)?;
        writeln!(f, "  Iterations: {}", self.iterations)?;
        for (i, (value, error)) in self.parameters.iter().zip(&self.errors).enumerate() {
            writeln!(f, "  [{}] {:.6e} +/- {:.3e}", i, value, error)?;
        }
        Ok(())
    }
}
