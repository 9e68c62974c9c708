//! # Covariance Matrix Calculations
//!
//! Parameter covariance from the residual Jacobian at the minimum.
//!
//! Residuals are normalised so that `Σ r²` is a `-2 ln L`-like quantity, hence
//! `covar = inv(JᵀJ)` without rescaling by the reduced chi-square.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

use crate::error::{Result, SpectrumFitError};

/// `inv(JᵀJ)` for the columns of `jacobian`.
pub fn calculate_covariance(jacobian: &Array2<f64>) -> Result<Array2<f64>> {
    let jtj = jacobian.t().dot(jacobian);
    let n = jtj.nrows();
    if n == 0 {
        return Ok(Array2::zeros((0, 0)));
    }

    let matrix = DMatrix::from_fn(n, n, |i, j| jtj[[i, j]]);
    let inverse = match matrix.clone().cholesky() {
        Some(cholesky) => cholesky.inverse(),
        None => matrix.try_inverse().ok_or_else(|| {
            SpectrumFitError::LinearAlgebra("JᵀJ is singular at the minimum".to_string())
        })?,
    };

    let covar = Array2::from_shape_fn((n, n), |(i, j)| 0.5 * (inverse[(i, j)] + inverse[(j, i)]));
    if covar.iter().any(|v| !v.is_finite()) {
        return Err(SpectrumFitError::LinearAlgebra(
            "covariance matrix is not finite".to_string(),
        ));
    }
    Ok(covar)
}

/// Place the covariance of the free parameters into an `n × n` matrix.
///
/// `free[k]` is the full index of the k-th free parameter; other rows stay zero.
pub fn embed_covariance(free_covar: &Array2<f64>, free: &[usize], n: usize) -> Array2<f64> {
    let mut full = Array2::zeros((n, n));
    for (a, &i) in free.iter().enumerate() {
        for (b, &j) in free.iter().enumerate() {
            full[[i, j]] = free_covar[[a, b]];
        }
    }
    full
}

/// Square roots of the diagonal; non-positive variances give zero.
pub fn standard_errors_from_covariance(covar: &Array2<f64>) -> Array1<f64> {
    covar
        .diag()
        .mapv(|variance| if variance > 0.0 { variance.sqrt() } else { 0.0 })
}
