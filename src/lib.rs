//! # spectrum-fitter
//!
//! `spectrum-fitter` fits groups of Gaussian peaks on a polynomial background
//! to one-dimensional histograms and measures background-subtracted integrals
//! and centroids.
//!
//! The library provides:
//! - A [`Spectrum`] aggregate holding peaks, fits and integrals over a [`Histogram`]
//! - Fit model construction with shared, scaled and fixed peak widths ([`Fit`])
//! - A pluggable [`Minimizer`] with a built-in Levenberg-Marquardt implementation
//! - Integrals with fractional edge bins and background crossing corrections
//! - JSON configuration ([`SpectrumConfig`]) and a tabular [`FitReport`]
//!
//! ## Basic Usage
//!
//! ```
//! use std::sync::Arc;
//! use spectrum_fitter::{Diagnostics, FitReport, SpectrumConfig, UniformHistogram};
//!
//! let histogram = UniformHistogram::from_fn(100, 0.0, 100.0, |x| {
//!     if (40.0..60.0).contains(&x) { 12.0 } else { 2.0 }
//! })
//! .unwrap();
//! let config = SpectrumConfig::from_json_str(
//!     r#"{ "integrals": [{ "lb": 40.0, "ub": 60.0, "y1": 2.0, "y2": 2.0 }] }"#,
//! )
//! .unwrap();
//!
//! let mut diag = Diagnostics::new();
//! let mut spectrum = config.build(Arc::new(histogram), &mut diag).unwrap();
//! let fitter = spectrum_fitter::SpectrumFitter::default();
//! fitter.calculate_integrals(&mut spectrum, &mut diag).unwrap();
//!
//! let report = FitReport::from_spectrum(&spectrum);
//! assert!(report.to_table_string().unwrap().contains("I.00"));
//! ```

// Public modules
pub mod error;
pub mod diagnostics;

// Parameter system
pub mod parameters;

// Model pieces
pub mod background;
pub mod formula;
pub mod histogram;
pub mod peak;

// Spectrum objects and the pipeline
pub mod config;
pub mod fit;
pub mod fitter;
pub mod integral;
pub mod minimizer;
pub mod report;
pub mod spectrum;

// Re-exports for convenience
pub use background::BackgroundPolynomial;
pub use config::SpectrumConfig;
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use error::{Result, SpectrumFitError};
pub use fit::{Fit, ParameterRole, ParameterTarget};
pub use fitter::SpectrumFitter;
pub use formula::{Formula, FormulaError};
pub use histogram::{Histogram, UniformHistogram};
pub use integral::{BackgroundSource, IntegralMeasurement, SpectrumIntegral};
pub use minimizer::{FitMode, FitProblem, FitResult, Minimizer};
pub use peak::{FitQuantity, LimitStatus, Peak, WidthMode};
pub use report::FitReport;
pub use spectrum::{GuessDefaults, Spectrum};

#[cfg(feature = "lm")]
pub use minimizer::LevenbergMarquardt;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
