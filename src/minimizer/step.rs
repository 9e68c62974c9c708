//! Step calculation for the Levenberg-Marquardt minimizer.
//!
//! The step solves `(JᵀJ + λ·diag(JᵀJ)) δ = -Jᵀr`, blending Gauss-Newton and
//! gradient descent through the damping parameter λ.

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

use super::trust_region::TrustRegion;

/// Result of a Levenberg-Marquardt step calculation.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub step: Array1<f64>,

    /// Reduction in `Σ r²` predicted by the linearised model
    pub predicted_reduction: f64,

    pub lambda: f64,
}

/// Handles step calculation for the Levenberg-Marquardt algorithm.
pub struct LmStep;

impl LmStep {
    pub fn calculate_step(
        jacobian: &Array2<f64>,
        residuals: &Array1<f64>,
        trust_region: &TrustRegion,
    ) -> StepResult {
        let j_t_j = jacobian.t().dot(jacobian);
        let j_t_r = jacobian.t().dot(residuals);
        let lambda = trust_region.lambda;

        let mut augmented = j_t_j.clone();
        for i in 0..augmented.nrows() {
            augmented[[i, i]] += lambda * augmented[[i, i]].max(1e-10);
        }

        let step = match Self::solve_cholesky(&augmented, &j_t_r.mapv(|g| -g)) {
            Some(step) => step,
            // Gradient descent when the damped system is not positive definite
            None => j_t_r.mapv(|g| -g / (lambda + 1.0)),
        };

        let predicted_reduction = Self::predicted_reduction(&j_t_j, &j_t_r, &step);

        StepResult {
            step,
            predicted_reduction,
            lambda,
        }
    }

    fn solve_cholesky(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
        let n = a.nrows();
        let a = DMatrix::from_fn(n, n, |i, j| a[[i, j]]);
        let b = DVector::from_iterator(n, b.iter().copied());
        let x = a.cholesky()?.solve(&b);
        if x.iter().all(|v| v.is_finite()) {
            Some(Array1::from_iter(x.iter().copied()))
        } else {
            None
        }
    }

    /// `|r|² - |r + Jδ|² = -(2 δ·Jᵀr + δᵀJᵀJδ)`
    fn predicted_reduction(j_t_j: &Array2<f64>, j_t_r: &Array1<f64>, step: &Array1<f64>) -> f64 {
        -(2.0 * step.dot(j_t_r) + step.dot(&j_t_j.dot(step)))
    }
}
