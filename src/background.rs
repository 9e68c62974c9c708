//! Polynomial background with per-order fit state and covariance.

use serde::Serialize;

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::parameters::{Access, IndexedStore, LowerTriangle};
use crate::peak::FitQuantity;

/// Default coefficient for `order`.
pub fn default_value(order: usize) -> f64 {
    if order == 0 {
        2.0
    } else {
        0.0
    }
}

/// Default `(lower, upper)` bounds for the coefficient of `order`.
pub fn default_bounds(order: usize) -> (f64, f64) {
    if order == 0 {
        (-0.0001, 1e6)
    } else {
        (-1e6, 1e6)
    }
}

/// `c0 + c1*x + ... + co*x^o`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BackgroundPolynomial {
    order: usize,
    terms: IndexedStore<FitQuantity>,
    covariance: LowerTriangle,
}

impl BackgroundPolynomial {
    /// A polynomial of `order` with every term unset.
    pub fn new(order: usize) -> Self {
        Self {
            order,
            terms: IndexedStore::filled("background terms", order + 1, FitQuantity::default()),
            covariance: LowerTriangle::zeros(order + 1),
        }
    }

    /// A polynomial with the given coefficients and zero errors.
    pub fn from_coefficients(coefficients: &[f64]) -> Self {
        let order = coefficients.len().saturating_sub(1);
        let mut poly = Self::new(order);
        for (term, &c) in poly.terms.iter_mut().zip(coefficients) {
            term.value = Some(c);
            term.error = Some(0.0);
        }
        poly
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn term(&self, order: usize) -> Option<&FitQuantity> {
        self.terms.get(order)
    }

    pub fn term_mut(&mut self, order: usize) -> Option<&mut FitQuantity> {
        self.terms.get_mut(order)
    }

    pub fn set_term(&mut self, order: usize, term: FitQuantity) -> Result<()> {
        self.terms.set(order, term)
    }

    pub fn terms(&self) -> &[FitQuantity] {
        self.terms.as_slice()
    }

    /// Coefficient of `order`; zero if unset or out of range.
    pub fn coefficient(&self, order: usize) -> f64 {
        self.terms.get(order).map_or(0.0, FitQuantity::value_or_zero)
    }

    pub fn coefficient_error(&self, order: usize) -> f64 {
        self.terms.get(order).map_or(0.0, FitQuantity::error_or_zero)
    }

    pub fn coefficients(&self) -> Vec<f64> {
        (0..=self.order).map(|i| self.coefficient(i)).collect()
    }

    /// Fill unset values and bounds with the defaults.
    pub fn apply_defaults(&mut self) {
        for (order, term) in self.terms.iter_mut().enumerate() {
            let (lower, upper) = default_bounds(order);
            term.value.get_or_insert(default_value(order));
            term.lower.get_or_insert(lower);
            term.upper.get_or_insert(upper);
        }
    }

    /// Covariance between two coefficients. Off-diagonal only; the diagonal
    /// comes from the term errors. Requests with `j > i` are answered from
    /// `(j, i)` with a warning.
    pub fn covariance(&self, i: usize, j: usize, diag: &mut Diagnostics) -> f64 {
        match self.covariance.get(i, j) {
            Ok((value, access)) => {
                if access == Access::Swapped {
                    diag.warn(format!(
                        "Background covariance requested as ({}, {}); using ({}, {})",
                        i, j, j, i
                    ));
                }
                value
            }
            Err(e) => {
                diag.warn(format!("Background covariance unavailable: {}", e));
                0.0
            }
        }
    }

    pub fn set_covariance(&mut self, i: usize, j: usize, value: f64) -> Result<()> {
        self.covariance.set(i, j, value).map(|_| ())
    }

    pub fn covariance_matrix(&self) -> &LowerTriangle {
        &self.covariance
    }

    /// Copy values, errors and covariance from `other`.
    pub fn adopt(&mut self, other: &BackgroundPolynomial, diag: &mut Diagnostics) {
        if other.order != self.order {
            diag.warn(format!(
                "Background order {} replaced by order {} of its source fit",
                self.order, other.order
            ));
        }
        *self = other.clone();
    }

    pub fn evaluate(&self, x: f64) -> f64 {
        self.terms
            .iter()
            .rev()
            .fold(0.0, |acc, term| acc * x + term.value_or_zero())
    }

    /// First derivative with respect to `x`.
    pub fn derivative(&self, x: f64) -> f64 {
        self.terms
            .iter()
            .enumerate()
            .skip(1)
            .rev()
            .fold(0.0, |acc, (order, term)| {
                acc * x + order as f64 * term.value_or_zero()
            })
    }

    /// Standard error of the polynomial at `x`.
    pub fn error_at(&self, x: f64) -> f64 {
        let mut variance = 0.0;
        for i in 0..=self.order {
            let xi = x.powi(i as i32);
            variance += xi * xi * self.coefficient_error(i).powi(2);
            for j in 0..i {
                variance += 2.0 * xi * x.powi(j as i32) * self.covariance.value(i, j);
            }
        }
        variance.max(0.0).sqrt()
    }

    /// `0f-|1--`: per order, fixed and at-limit flags.
    pub fn info_string(&self) -> String {
        self.terms
            .iter()
            .enumerate()
            .map(|(order, term)| format!("{}{}", order, term.flags()))
            .collect::<Vec<_>>()
            .join("|")
    }
}
