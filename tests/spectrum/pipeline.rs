//! Levenberg-Marquardt fits of synthetic Poisson spectra.

use std::sync::Arc;

use approx::assert_abs_diff_eq;
use spectrum_fitter::fitter::peak_area;
use spectrum_fitter::{
    Diagnostics, Fit, FitMode, FitQuantity, LevenbergMarquardt, Peak, Spectrum, SpectrumFitter,
    SpectrumIntegral,
};

use crate::test_helpers::{gaussian, init_logging, poisson_histogram};

const BIN_WIDTH: f64 = 5.0;

fn bound_doublet_spectrum() -> Spectrum {
    let histogram = poisson_histogram(400, 0.0, 2000.0, 7, |x| {
        5.0 + gaussian(x, 200.0, 600.0, 20.0) + gaussian(x, 120.0, 900.0, 20.0)
    });
    let mut spectrum = Spectrum::new(Arc::new(histogram));
    spectrum.set_separation_energy(Some(1200.0));

    for mean in [605.0, 895.0] {
        let mut peak = Peak::at(mean);
        peak.amplitude = FitQuantity::bounded(150.0, 0.0, 1000.0);
        spectrum.add_peak(peak);
    }
    *spectrum.bound_width_mut() = FitQuantity::bounded(25.0, 5.0, 60.0);

    let mut fit = Fit::new(0).with_range(450.0, 1050.0);
    fit.background_mut()
        .set_term(0, FitQuantity::bounded(4.0, 0.0, 50.0))
        .unwrap();
    spectrum.add_fit(fit);
    spectrum.add_integral(SpectrumIntegral::from_fit(540.0, 660.0, 0, 0));
    spectrum
}

#[test]
fn test_bound_peaks_share_a_fitted_width() {
    init_logging();
    let mut spectrum = bound_doublet_spectrum();
    let mut diag = Diagnostics::new();
    SpectrumFitter::default()
        .run(&mut spectrum, &mut diag)
        .unwrap();

    let fit = spectrum.fit(0).unwrap();
    assert!(fit.is_valid(), "{:?}", fit.result().map(|r| r.message.clone()));
    assert!(fit.reduced_chi_square() > 0.0);

    let width = fit.common_width().unwrap();
    assert_abs_diff_eq!(width, 20.0, epsilon = 3.0);
    assert_abs_diff_eq!(fit.background().coefficient(0), 5.0, epsilon = 1.0);

    for (index, (mean, amplitude)) in [(600.0, 200.0), (900.0, 120.0)].into_iter().enumerate() {
        let peak = spectrum.peak(index).unwrap();
        assert_abs_diff_eq!(peak.mean.value.unwrap(), mean, epsilon = 3.0);
        assert_eq!(peak.width.value, Some(width));
        assert!(peak.mean.error.unwrap() > 0.0);

        let truth = peak_area(amplitude, 20.0, BIN_WIDTH);
        let area = peak.area.unwrap();
        assert!((area - truth).abs() < 0.1 * truth, "area {} vs {}", area, truth);
        assert!(peak.area_error.unwrap() > 0.0);
    }

    // Isolated curve of the first peak at its own mean
    let peak = spectrum.peak(0).unwrap();
    let top = fit.evaluate_peak(0, peak.mean.value.unwrap()).unwrap();
    assert_abs_diff_eq!(
        top,
        peak.amplitude.value.unwrap() + fit.background().coefficient(0),
        epsilon = 1e-9
    );

    let measurement = spectrum.integral(0).unwrap().measurement().unwrap();
    let truth = peak_area(200.0, 20.0, BIN_WIDTH);
    assert!((measurement.integral - truth).abs() < 0.1 * truth);
    assert_abs_diff_eq!(measurement.centroid.unwrap(), 600.0, epsilon = 3.0);
}

#[test]
fn test_unbound_peak_scales_the_bound_width() {
    init_logging();
    let histogram = poisson_histogram(400, 0.0, 2000.0, 11, |x| {
        3.0 + gaussian(x, 80.0, 1500.0, 30.0)
    });
    let mut spectrum = Spectrum::new(Arc::new(histogram));
    spectrum.set_separation_energy(Some(1200.0));

    let mut peak = Peak::at(1510.0).with_unbound(true);
    peak.amplitude = FitQuantity::bounded(70.0, 0.0, 500.0);
    spectrum.add_peak(peak);
    *spectrum.bound_width_mut() = FitQuantity {
        fixed: true,
        ..FitQuantity::new(20.0)
    };
    spectrum.add_fit(Fit::new(0).with_range(1300.0, 1700.0));

    let mut diag = Diagnostics::new();
    SpectrumFitter::new(LevenbergMarquardt::new())
        .with_mode(FitMode::Likelihood)
        .run(&mut spectrum, &mut diag)
        .unwrap();

    let fit = spectrum.fit(0).unwrap();
    assert!(fit.is_valid());
    assert_eq!(fit.common_width(), Some(20.0));

    let peak = spectrum.peak(0).unwrap();
    assert_abs_diff_eq!(peak.width.value.unwrap(), 30.0, epsilon = 4.0);
    assert!(peak.width.error.unwrap() > 0.0);
    assert_abs_diff_eq!(peak.mean.value.unwrap(), 1500.0, epsilon = 4.0);
}

#[test]
fn test_chi_square_mode_agrees_on_position() {
    let mut spectrum = bound_doublet_spectrum();
    let mut diag = Diagnostics::new();
    SpectrumFitter::default()
        .with_mode(FitMode::ChiSquare)
        .run(&mut spectrum, &mut diag)
        .unwrap();

    assert!(spectrum.fit(0).unwrap().is_valid());
    assert_abs_diff_eq!(
        spectrum.peak(0).unwrap().mean.value.unwrap(),
        600.0,
        epsilon = 3.0
    );
}

#[test]
fn test_unbound_only_fit_with_free_bound_width_has_finite_errors() {
    init_logging();
    let histogram = poisson_histogram(400, 0.0, 2000.0, 13, |x| {
        3.0 + gaussian(x, 80.0, 1500.0, 30.0)
    });
    let mut spectrum = Spectrum::new(Arc::new(histogram));
    spectrum.set_separation_energy(Some(1200.0));

    let mut peak = Peak::at(1510.0).with_unbound(true);
    peak.amplitude = FitQuantity::bounded(70.0, 0.0, 500.0);
    spectrum.add_peak(peak);
    *spectrum.bound_width_mut() = FitQuantity::bounded(20.0, 5.0, 60.0);
    spectrum.add_fit(Fit::new(0).with_range(1300.0, 1700.0));

    let mut diag = Diagnostics::new();
    SpectrumFitter::default()
        .run(&mut spectrum, &mut diag)
        .unwrap();

    let fit = spectrum.fit(0).unwrap();
    assert!(fit.is_valid());
    assert_eq!(fit.common_width(), Some(20.0));
    let result = fit.result().unwrap();
    assert_eq!(result.errors[0], 0.0);
    for error in &result.errors[1..] {
        assert!(error.is_finite() && *error < 100.0, "{:?}", result.errors);
    }

    let peak = spectrum.peak(0).unwrap();
    assert_abs_diff_eq!(peak.width.value.unwrap(), 30.0, epsilon = 4.0);
    let width_error = peak.width.error.unwrap();
    assert!(width_error > 0.0 && width_error < 5.0, "width error {}", width_error);
}
