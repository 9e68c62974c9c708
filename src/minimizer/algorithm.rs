//! Implementation of the Levenberg-Marquardt minimizer.
//!
//! Bounded parameters are optimised in Minuit-style internal coordinates so
//! the formula never sees a value outside its limits. Errors and covariance
//! are evaluated in external coordinates at the minimum.

use ndarray::{Array1, Array2};

use crate::error::{Result, SpectrumFitError};
use crate::parameters::{Bounds, BoundsTransform};

use super::config::LmConfig;
use super::convergence::{ConvergenceCriteria, ConvergenceStatus};
use super::covariance::{calculate_covariance, embed_covariance, standard_errors_from_covariance};
use super::finite_difference;
use super::problem::{Constraint, FitMode, FitProblem, FitResult};
use super::step::LmStep;
use super::trust_region::TrustRegion;
use super::Minimizer;

/// Smallest model value used in likelihood residuals.
const MIN_MODEL_VALUE: f64 = 1e-10;

/// Signed residual for one bin.
///
/// `Likelihood` gives the Baker-Cousins deviance contribution
/// `2 (f - y + y ln(y/f))` as a signed square root, so that `Σ r²` is the
/// Poisson likelihood-ratio chi-square. `ChiSquare` weights by `max(y, 1)`.
pub fn residual(mode: FitMode, model: f64, observed: f64) -> f64 {
    match mode {
        FitMode::Likelihood => {
            let f = model.max(MIN_MODEL_VALUE);
            let deviance = if observed > 0.0 {
                2.0 * (f - observed + observed * (observed / f).ln())
            } else {
                2.0 * f
            };
            deviance.max(0.0).sqrt().copysign(f - observed)
        }
        FitMode::ChiSquare => (model - observed) / observed.max(1.0).sqrt(),
    }
}

/// A parameter the minimizer is allowed to move.
#[derive(Debug, Clone, Copy)]
struct FreeParameter {
    index: usize,
    transform: Option<BoundsTransform>,
}

impl FreeParameter {
    fn to_external(&self, internal: f64) -> f64 {
        match &self.transform {
            Some(t) => t.to_external(internal),
            None => internal,
        }
    }
}

/// The residual function of a [`FitProblem`] over its free parameters.
struct Objective<'p, 'a> {
    problem: &'p FitProblem<'a>,
    base: Vec<f64>,
    free: Vec<FreeParameter>,
}

impl<'p, 'a> Objective<'p, 'a> {
    fn external(&self, internal: &Array1<f64>) -> Vec<f64> {
        let mut params = self.base.clone();
        for (p, &value) in self.free.iter().zip(internal.iter()) {
            params[p.index] = p.to_external(value);
        }
        params
    }

    fn residuals_external(&self, params: &[f64]) -> Result<Array1<f64>> {
        let data = self.problem.data;
        let mut residuals = Array1::zeros(data.len());
        for (i, (&x, &y)) in data.x.iter().zip(data.y.iter()).enumerate() {
            let model = self.problem.formula.evaluate(x, params)?;
            if !model.is_finite() {
                return Err(SpectrumFitError::Minimizer(format!(
                    "model is not finite at x = {}",
                    x
                )));
            }
            residuals[i] = residual(self.problem.mode, model, y);
        }
        Ok(residuals)
    }

    fn residuals(&self, internal: &Array1<f64>) -> Result<Array1<f64>> {
        self.residuals_external(&self.external(internal))
    }

    /// Jacobian with respect to the external values of the free parameters.
    fn external_jacobian(&self, params: &[f64], epsilon: f64) -> Result<Array2<f64>> {
        let free_values = Array1::from_iter(self.free.iter().map(|p| params[p.index]));
        let with_free = |values: &Array1<f64>| {
            let mut full = params.to_vec();
            for (p, &v) in self.free.iter().zip(values.iter()) {
                full[p.index] = v;
            }
            self.residuals_external(&full)
        };
        let base = with_free(&free_values)?;
        finite_difference::jacobian(with_free, &free_values, &base, Some(epsilon))
    }
}

/// `initial` clamped into `bounds` and moved off the edges, where the
/// transforms have zero slope.
fn interior_start(initial: f64, bounds: &Bounds) -> f64 {
    let value = bounds.clamp(initial);
    if bounds.is_finite() {
        let margin = 1e-6 * (bounds.max - bounds.min);
        value.max(bounds.min + margin).min(bounds.max - margin)
    } else if bounds.has_lower_bound() && value == bounds.min {
        value + 1e-6 * value.abs().max(1.0)
    } else if bounds.has_upper_bound() && value == bounds.max {
        value - 1e-6 * value.abs().max(1.0)
    } else {
        value
    }
}

fn cost(residuals: &Array1<f64>) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}

/// The Levenberg-Marquardt minimizer.
#[derive(Debug, Clone, Default)]
pub struct LevenbergMarquardt {
    config: LmConfig,
}

impl LevenbergMarquardt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: LmConfig) -> Self {
        Self { config }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    pub fn with_ftol(mut self, ftol: f64) -> Self {
        self.config.ftol = ftol;
        self
    }

    pub fn with_xtol(mut self, xtol: f64) -> Self {
        self.config.xtol = xtol;
        self
    }

    pub fn config(&self) -> &LmConfig {
        &self.config
    }

    /// Split the settings into fixed values, free parameters and applied bounds.
    fn prepare<'p, 'a>(
        &self,
        problem: &'p FitProblem<'a>,
    ) -> Result<(Objective<'p, 'a>, Array1<f64>, Vec<Option<(f64, f64)>>)> {
        let mut base = Vec::with_capacity(problem.parameters.len());
        let mut free = Vec::new();
        let mut internal = Vec::new();
        let mut applied = Vec::with_capacity(problem.parameters.len());

        for (index, setting) in problem.parameters.iter().enumerate() {
            match setting.constraint {
                Constraint::Fixed => {
                    base.push(setting.initial);
                    applied.push(None);
                }
                Constraint::Bounded { lower, upper } if lower >= upper => {
                    log::warn!(
                        "Parameter {} has bounds [{}, {}] with lower >= upper; fixing it at {}",
                        setting.name,
                        lower,
                        upper,
                        setting.initial
                    );
                    base.push(setting.initial);
                    applied.push(None);
                }
                Constraint::Bounded { lower, upper } => {
                    let bounds = Bounds::new(lower, upper)?;
                    let start = interior_start(setting.initial, &bounds);
                    let transform = BoundsTransform::new(bounds);
                    base.push(start);
                    internal.push(transform.to_internal(start)?);
                    free.push(FreeParameter {
                        index,
                        transform: Some(transform),
                    });
                    applied.push(Some((lower, upper)));
                }
                Constraint::Free => {
                    base.push(setting.initial);
                    internal.push(setting.initial);
                    free.push(FreeParameter {
                        index,
                        transform: None,
                    });
                    applied.push(None);
                }
            }
        }

        Ok((
            Objective {
                problem,
                base,
                free,
            },
            Array1::from(internal),
            applied,
        ))
    }

    /// Run the damped iteration from `params` (internal coordinates).
    fn iterate(
        &self,
        objective: &Objective<'_, '_>,
        mut params: Array1<f64>,
    ) -> Result<(Array1<f64>, f64, usize, ConvergenceStatus)> {
        let criteria = ConvergenceCriteria::from_config(&self.config);
        let mut region = TrustRegion::from_config(&self.config);

        let mut residuals = objective.residuals(&params)?;
        let mut current_cost = cost(&residuals);
        let mut iterations = 0;

        if params.is_empty() {
            return Ok((params, current_cost, 0, ConvergenceStatus::ParameterConvergence));
        }

        loop {
            let jacobian = finite_difference::jacobian(
                |p| objective.residuals(p),
                &params,
                &residuals,
                Some(self.config.epsilon),
            )?;

            let gradient = jacobian.t().dot(&residuals);
            let gradient_norm = gradient.dot(&gradient).sqrt();
            if gradient_norm < self.config.gtol {
                return Ok((params, current_cost, iterations, ConvergenceStatus::GradientConvergence));
            }

            // Retry with more damping until a step is accepted
            loop {
                let step = LmStep::calculate_step(&jacobian, &residuals, &region);
                let trial = &params + &step.step;

                let evaluated = objective.residuals(&trial);
                let (trial_residuals, trial_cost) = match evaluated {
                    Ok(r) => {
                        let c = cost(&r);
                        (r, c)
                    }
                    Err(e) => {
                        log::debug!("Rejected step at lambda {:.1e}: {}", region.lambda, e);
                        (Array1::zeros(0), f64::INFINITY)
                    }
                };

                let gain = TrustRegion::gain_ratio(current_cost, trial_cost, step.predicted_reduction);
                if region.update_lambda(gain) {
                    iterations += 1;
                    let status = criteria.check(
                        &params,
                        &trial,
                        current_cost,
                        trial_cost,
                        gradient_norm,
                        iterations,
                    );
                    params = trial;
                    residuals = trial_residuals;
                    current_cost = trial_cost;
                    if status.is_terminated() {
                        return Ok((params, current_cost, iterations, status));
                    }
                    break;
                }

                if region.at_max_damping() {
                    return Ok((params, current_cost, iterations, ConvergenceStatus::DampingSaturated));
                }
            }
        }
    }
}

impl Minimizer for LevenbergMarquardt {
    fn minimize(&self, problem: &FitProblem<'_>) -> Result<FitResult> {
        problem.validate()?;

        let (objective, start, applied) = self.prepare(problem)?;
        let (internal, chi_square, iterations, status) = self.iterate(&objective, start)?;

        let parameters = objective.external(&internal);
        let n = parameters.len();
        let free_indices: Vec<usize> = objective.free.iter().map(|p| p.index).collect();
        let ndf = problem.data.len().saturating_sub(free_indices.len());

        let mut valid = status.is_converged();
        let mut message = status.description().to_string();

        let covariance = match objective
            .external_jacobian(&parameters, self.config.epsilon)
            .and_then(|j| calculate_covariance(&j))
        {
            Ok(free_covar) => embed_covariance(&free_covar, &free_indices, n),
            Err(e) => {
                valid = false;
                message = format!("{}; {}", message, e);
                Array2::zeros((n, n))
            }
        };
        let errors = standard_errors_from_covariance(&covariance).to_vec();

        log::debug!(
            "Minimization finished after {} iterations: {} (chi2 = {:.4}, ndf = {})",
            iterations,
            message,
            chi_square,
            ndf
        );

        Ok(FitResult {
            parameters,
            errors,
            covariance,
            bounds: applied,
            chi_square,
            ndf,
            valid,
            message,
            iterations,
        })
    }
}
