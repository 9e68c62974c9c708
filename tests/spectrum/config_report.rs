//! From a JSON configuration to the written report.

use std::sync::Arc;

use ndarray::Array2;
use spectrum_fitter::report::ReportRow;
use spectrum_fitter::{
    Diagnostics, FitProblem, FitReport, FitResult, Minimizer, Result, SpectrumConfig,
    SpectrumFitError, SpectrumFitter,
};

use crate::test_helpers::{gaussian, init_logging, poisson_histogram};

const CONFIG: &str = r#"{
    "separation_energy": 1200.0,
    "bound_peak_width": 25.0,
    "bound_peak_width_lb": 5.0,
    "bound_peak_width_ub": 60.0,
    "fits": [
        { "lb": 450.0, "ub": 1050.0, "background": [{ "value": 4.0, "lb": 0.0, "ub": 50.0 }] }
    ],
    "integrals": [
        { "lb": 1290.0, "ub": 1410.0, "y1": 5.0, "y2": 5.0 },
        { "lb": 840.0, "ub": 960.0, "fit": 0 }
    ],
    "peaks": [
        { "mean": 605.0, "amplitude": 150.0, "amplitude_lb": 0.0, "amplitude_ub": 1000.0 },
        { "mean": 895.0, "amplitude": 100.0, "amplitude_lb": 0.0, "amplitude_ub": 1000.0 }
    ]
}"#;

fn histogram() -> Arc<spectrum_fitter::UniformHistogram> {
    Arc::new(poisson_histogram(400, 0.0, 2000.0, 3, |x| {
        5.0 + gaussian(x, 200.0, 600.0, 20.0)
            + gaussian(x, 120.0, 900.0, 20.0)
            + gaussian(x, 50.0, 1350.0, 15.0)
    }))
}

/// Returns the initial values as a non-converged result.
struct NotConverged;

impl Minimizer for NotConverged {
    fn minimize(&self, problem: &FitProblem<'_>) -> Result<FitResult> {
        let n = problem.parameters.len();
        Ok(FitResult {
            parameters: problem.parameters.iter().map(|p| p.initial).collect(),
            errors: vec![0.0; n],
            covariance: Array2::zeros((n, n)),
            bounds: vec![None; n],
            chi_square: 1e4,
            ndf: problem.data.len().saturating_sub(n),
            valid: false,
            message: "Terminated: maximum iterations reached".to_string(),
            iterations: 500,
        })
    }
}

#[test]
fn test_configured_run_produces_report() {
    init_logging();
    let config = SpectrumConfig::from_json_str(CONFIG).unwrap();
    let mut diag = Diagnostics::new();
    let mut spectrum = config.build(histogram(), &mut diag).unwrap();
    SpectrumFitter::default()
        .run(&mut spectrum, &mut diag)
        .unwrap();

    let report = FitReport::from_spectrum(&spectrum);
    let order: Vec<String> = report
        .rows
        .iter()
        .map(|row| match row {
            ReportRow::Peak(p) => format!("P.{:02}", p.index),
            ReportRow::Integral(i) => format!("I.{:02}", i.index),
        })
        .collect();
    // Rows merge the two lists in configuration order; the integral at
    // ~1350 holds back the later one that sits on peak 01
    assert_eq!(order, vec!["P.00", "P.01", "I.00", "I.01"]);
    match &report.rows[3] {
        ReportRow::Integral(row) => assert!(row.centroid.is_some_and(|c| (c - 900.0).abs() < 10.0)),
        ReportRow::Peak(_) => panic!("expected an integral row"),
    }

    let fit = &report.fits[0];
    assert!(fit.valid);
    assert_eq!(fit.peaks, vec![0, 1]);
    assert_eq!(fit.background.len(), 1);

    let table = report.to_table_string().unwrap();
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines.len(), 1 + 4 + 1);
    assert!(lines[0].starts_with("Peak num"));
    assert!(lines[5].starts_with("Fit 0 peaks:\t[0, 1]\tBackground:\t"));
    assert!(!table.contains("FIT INVALID"));

    let json: serde_json::Value = serde_json::from_str(&report.to_json_string().unwrap()).unwrap();
    assert_eq!(json["rows"][0]["kind"], "peak");
    assert_eq!(json["rows"][2]["status"], "C");
    assert_eq!(json["rows"][3]["status"], "F");
}

#[test]
fn test_invalid_fit_is_flagged_and_skips_its_integral() {
    init_logging();
    let config = SpectrumConfig::from_json_str(CONFIG).unwrap();
    let mut diag = Diagnostics::new();
    let mut spectrum = config.build(histogram(), &mut diag).unwrap();
    SpectrumFitter::new(NotConverged)
        .run(&mut spectrum, &mut diag)
        .unwrap();

    assert!(diag.has_warning_containing("Fit 0 is invalid"));
    assert!(diag.has_warning_containing("Integral 1 skipped"));
    assert!(spectrum.integral(1).unwrap().measurement().is_none());
    assert!(spectrum.integral(0).unwrap().measurement().is_some());

    let table = FitReport::from_spectrum(&spectrum).to_table_string().unwrap();
    let marker = table.lines().last().unwrap();
    let cells: Vec<&str> = marker.split('\t').map(str::trim_end).collect();
    assert_eq!(cells[5], "FIT INVALID");
    assert_eq!(cells[9], "***  ***");
}

#[test]
fn test_config_from_path() {
    let path = std::env::temp_dir().join("spectrum-fitter-config-test.json");
    std::fs::write(&path, CONFIG).unwrap();
    let config = SpectrumConfig::from_path(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(config.peaks.len(), 2);
    assert_eq!(config.integrals[1].fit, Some(0));

    let missing = SpectrumConfig::from_path("/nonexistent/spectrum-fitter.json");
    assert!(matches!(missing, Err(SpectrumFitError::Io(_))));
}
