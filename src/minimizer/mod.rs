//! Nonlinear minimization of fit formulas against binned data.
//!
//! The fitter talks to minimizers only through the [`Minimizer`] trait. With
//! the `lm` feature (on by default) the crate ships [`LevenbergMarquardt`], a
//! damped Gauss-Newton minimizer with Minuit-style parameter bounds.

pub mod problem;

#[cfg(feature = "lm")]
pub mod algorithm;
#[cfg(feature = "lm")]
pub mod config;
#[cfg(feature = "lm")]
pub mod convergence;
#[cfg(feature = "lm")]
pub mod covariance;
#[cfg(feature = "lm")]
pub mod finite_difference;
#[cfg(feature = "lm")]
pub mod step;
#[cfg(feature = "lm")]
pub mod trust_region;

pub use problem::{BinnedData, Constraint, FitMode, FitProblem, FitResult, ParameterSetting};

#[cfg(feature = "lm")]
pub use algorithm::LevenbergMarquardt;
#[cfg(feature = "lm")]
pub use config::LmConfig;

use crate::error::Result;

/// A minimizer for [`FitProblem`]s.
///
/// Implementations return `Err` only when no result can be produced at all; a
/// fit that ran but did not converge is reported through [`FitResult::valid`].
pub trait Minimizer {
    fn minimize(&self, problem: &FitProblem<'_>) -> Result<FitResult>;
}

impl<M: Minimizer + ?Sized> Minimizer for &M {
    fn minimize(&self, problem: &FitProblem<'_>) -> Result<FitResult> {
        (**self).minimize(problem)
    }
}

impl<M: Minimizer + ?Sized> Minimizer for Box<M> {
    fn minimize(&self, problem: &FitProblem<'_>) -> Result<FitResult> {
        (**self).minimize(problem)
    }
}
