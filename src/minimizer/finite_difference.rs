//! Forward finite-difference Jacobians.

use ndarray::{Array1, Array2};

use crate::error::{Result, SpectrumFitError};

/// Default relative step size for finite differences.
pub const DEFAULT_EPSILON: f64 = 1e-8;

/// Jacobian `J[i, j] = d residual[i] / d param[j]` by forward differences.
///
/// `residuals` must be `f(params)`; it is passed in so callers that already
/// hold it avoid one evaluation. The step is scaled to the parameter magnitude.
pub fn jacobian<F>(
    f: F,
    params: &Array1<f64>,
    residuals: &Array1<f64>,
    epsilon: Option<f64>,
) -> Result<Array2<f64>>
where
    F: Fn(&Array1<f64>) -> Result<Array1<f64>>,
{
    let eps = epsilon.unwrap_or(DEFAULT_EPSILON);
    let n_params = params.len();
    let n_residuals = residuals.len();

    let mut jac = Array2::zeros((n_residuals, n_params));

    for j in 0..n_params {
        let mut perturbed = params.clone();

        let param_j = params[j];
        let eps_j = if param_j.abs() > 1.0 {
            param_j.abs() * eps
        } else {
            eps
        };
        perturbed[j] += eps_j;

        let residuals_perturbed = f(&perturbed)?;
        if residuals_perturbed.len() != n_residuals {
            return Err(SpectrumFitError::DimensionMismatch(format!(
                "Expected {} residuals, got {}",
                n_residuals,
                residuals_perturbed.len()
            )));
        }

        for i in 0..n_residuals {
            jac[[i, j]] = (residuals_perturbed[i] - residuals[i]) / eps_j;
        }
    }

    Ok(jac)
}
