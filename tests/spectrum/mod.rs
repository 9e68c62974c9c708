//! Tests of the spectrum pipeline through the public API.

// Documented behaviour of the fit model, fitter and integrals
pub mod properties;

// Levenberg-Marquardt fits of synthetic spectra
pub mod pipeline;

// JSON configuration to report
pub mod config_report;
