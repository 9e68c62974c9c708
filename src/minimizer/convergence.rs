//! Convergence criteria for the Levenberg-Marquardt minimizer.

use ndarray::Array1;

use super::config::LmConfig;

/// Possible convergence states of a minimization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceStatus {
    Running,
    ParameterConvergence,
    FunctionValueConvergence,
    GradientConvergence,
    /// No step reduces the cost even at maximum damping.
    DampingSaturated,
    MaxIterationsReached,
}

impl ConvergenceStatus {
    pub fn is_terminated(&self) -> bool {
        !matches!(self, ConvergenceStatus::Running)
    }

    pub fn is_converged(&self) -> bool {
        matches!(
            self,
            ConvergenceStatus::ParameterConvergence
                | ConvergenceStatus::FunctionValueConvergence
                | ConvergenceStatus::GradientConvergence
                | ConvergenceStatus::DampingSaturated
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConvergenceStatus::Running => "Minimization is still running",
            ConvergenceStatus::ParameterConvergence => "Converged: small parameter change",
            ConvergenceStatus::FunctionValueConvergence => "Converged: small cost change",
            ConvergenceStatus::GradientConvergence => "Converged: small gradient",
            ConvergenceStatus::DampingSaturated => "Step rejected at maximum damping",
            ConvergenceStatus::MaxIterationsReached => "Terminated: maximum iterations reached",
        }
    }
}

/// Criteria for determining when the minimization has converged.
#[derive(Debug, Clone)]
pub struct ConvergenceCriteria {
    pub xtol: f64,
    pub ftol: f64,
    pub gtol: f64,
    pub max_iterations: usize,
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self::from_config(&LmConfig::default())
    }
}

impl ConvergenceCriteria {
    pub fn from_config(config: &LmConfig) -> Self {
        Self {
            xtol: config.xtol,
            ftol: config.ftol,
            gtol: config.gtol,
            max_iterations: config.max_iterations,
        }
    }

    /// Status after an accepted step from `params` to `new_params`.
    pub fn check(
        &self,
        params: &Array1<f64>,
        new_params: &Array1<f64>,
        cost: f64,
        new_cost: f64,
        gradient_norm: f64,
        iterations: usize,
    ) -> ConvergenceStatus {
        if gradient_norm < self.gtol {
            return ConvergenceStatus::GradientConvergence;
        }

        let param_change = new_params
            .iter()
            .zip(params.iter())
            .map(|(a, b)| (a - b).abs() / b.abs().max(1.0))
            .fold(0.0, f64::max);
        if param_change < self.xtol {
            return ConvergenceStatus::ParameterConvergence;
        }

        let cost_change = (cost - new_cost).abs() / cost.abs().max(1e-10);
        if cost_change < self.ftol {
            return ConvergenceStatus::FunctionValueConvergence;
        }

        if iterations >= self.max_iterations {
            return ConvergenceStatus::MaxIterationsReached;
        }

        ConvergenceStatus::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn criteria() -> ConvergenceCriteria {
        ConvergenceCriteria {
            xtol: 1e-8,
            ftol: 1e-8,
            gtol: 1e-8,
            max_iterations: 100,
        }
    }

    #[test]
    fn test_convergence_criteria() {
        let criteria = criteria();
        let params = array![1.0, 2.0, 3.0];

        let status = criteria.check(&params, &array![1.0, 2.0, 3.0 + 1e-9], 10.0, 9.9, 0.1, 50);
        assert_eq!(status, ConvergenceStatus::ParameterConvergence);

        let moved = array![1.1, 2.1, 3.1];
        let status = criteria.check(&params, &moved, 10.0, 9.9999999999, 0.1, 50);
        assert_eq!(status, ConvergenceStatus::FunctionValueConvergence);

        let status = criteria.check(&params, &moved, 10.0, 9.0, 1e-9, 50);
        assert_eq!(status, ConvergenceStatus::GradientConvergence);

        let status = criteria.check(&params, &moved, 10.0, 9.0, 0.1, 100);
        assert_eq!(status, ConvergenceStatus::MaxIterationsReached);

        let status = criteria.check(&params, &moved, 10.0, 9.0, 0.1, 50);
        assert_eq!(status, ConvergenceStatus::Running);
    }

    #[test]
    fn test_convergence_status_methods() {
        assert!(!ConvergenceStatus::Running.is_terminated());
        assert!(ConvergenceStatus::MaxIterationsReached.is_terminated());
        assert!(!ConvergenceStatus::MaxIterationsReached.is_converged());
        assert!(ConvergenceStatus::DampingSaturated.is_converged());
        assert!(ConvergenceStatus::ParameterConvergence.is_converged());
    }
}
