use thiserror::Error;

use crate::formula::FormulaError;
use crate::parameters::BoundsError;

/// Error types for the spectrum-fitter library.
///
/// Only conditions that stop a run are errors. Suspicious configuration and
/// out-of-range lookups are reported through [`crate::Diagnostics`] instead.
#[derive(Error, Debug)]
pub enum SpectrumFitError {
    /// Required configuration is missing or cannot be used.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An index does not address an element of a collection.
    #[error("Index {index} out of range for {what} of length {len}")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// Error indicating a mismatch in vector or matrix dimensions.
    #[error("Dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// Linear algebra error.
    #[error("Linear algebra error: {0}")]
    LinearAlgebra(String),

    /// The minimizer could not produce a result.
    #[error("Minimizer failure: {0}")]
    Minimizer(String),

    /// Error while parsing or evaluating a model formula.
    #[error("Formula error: {0}")]
    Formula(#[from] FormulaError),

    /// Error in a parameter bound.
    #[error("Bounds error: {0}")]
    Bounds(#[from] BoundsError),

    /// I/O error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for spectrum-fitter operations.
pub type Result<T> = std::result::Result<T, SpectrumFitError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SpectrumFitError::IndexOutOfRange {
            what: "peaks",
            index: 4,
            len: 2,
        };
        assert_eq!(
            format!("{}", err),
            "Index 4 out of range for peaks of length 2"
        );

        let err = SpectrumFitError::InvalidConfig("no histogram".to_string());
        assert!(format!("{}", err).contains("no histogram"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: SpectrumFitError = io_err.into();

        match err {
            SpectrumFitError::Io(_) => (),
            _ => panic!("Expected Io variant"),
        }

        let formula_err = FormulaError::UnknownVariable {
            name: "y".to_string(),
        };
        let err: SpectrumFitError = formula_err.into();
        assert!(matches!(err, SpectrumFitError::Formula(_)));
    }
}
