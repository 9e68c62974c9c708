//! Documented behaviour of the fit model, the fitter and the integrals.

use std::sync::Arc;

use approx::assert_relative_eq;
use ndarray::Array2;
use spectrum_fitter::fit::{parameter_count, ParameterTarget};
use spectrum_fitter::fitter::{parameter_limit_status, peak_area};
use spectrum_fitter::{
    Diagnostics, Fit, FitResult, LimitStatus, Peak, Spectrum, SpectrumFitter, SpectrumIntegral,
    UniformHistogram,
};

use crate::test_helpers::{gaussian, init_logging};

fn flat_spectrum(content: f64) -> Spectrum {
    let histogram = UniformHistogram::from_fn(1000, 0.0, 1000.0, |_| content).unwrap();
    Spectrum::new(Arc::new(histogram))
}

#[test]
fn test_defaulted_guesses_lie_inside_their_bounds() {
    init_logging();
    let mut spectrum = flat_spectrum(7.0);
    spectrum.set_separation_energy(Some(600.0));
    spectrum.add_peak(Peak::at(40.0));
    spectrum.add_peak(Peak::at(300.0).with_doublet(true));
    spectrum.add_peak(Peak::at(700.0).with_unbound(true));
    spectrum.add_peak(Peak::at(950.0).with_fixed_width(12.0));
    spectrum.add_fit(Fit::new(1));

    let mut diag = Diagnostics::new();
    SpectrumFitter::default()
        .initialise_guesses(&mut spectrum, &mut diag)
        .unwrap();

    for peak in spectrum.peaks() {
        for quantity in [&peak.mean, &peak.amplitude] {
            let value = quantity.value.unwrap();
            assert!(quantity.lower.unwrap() <= value, "{:?}", quantity);
            assert!(value <= quantity.upper.unwrap(), "{:?}", quantity);
        }
        let width = peak.width.value.unwrap();
        if !peak.width.fixed {
            assert!(peak.width.lower.unwrap() <= width);
            assert!(width <= peak.width.upper.unwrap());
        }
    }
    // The lower mean bound is clamped at zero
    assert_eq!(spectrum.peak(0).unwrap().mean.lower, Some(0.0));
    // A fixed width keeps its configured value
    assert_eq!(spectrum.peak(3).unwrap().width.value, Some(12.0));
}

#[test]
fn test_parameter_count_invariant() {
    let cases: [(usize, usize, usize); 4] = [(0, 0, 0), (1, 0, 0), (3, 2, 1), (2, 0, 3)];
    for (shared, fixed, order) in cases {
        let mut peaks = Vec::new();
        for i in 0..shared {
            peaks.push(Peak::at(100.0 + 10.0 * i as f64));
        }
        for i in 0..fixed {
            peaks.push(Peak::at(500.0 + 10.0 * i as f64).with_fixed_width(4.0));
        }

        let mut fit = Fit::new(order).with_range(0.0, 1000.0);
        fit.assign_peaks(&peaks);
        fit.build_parameter_map(&peaks).unwrap();

        let expected = if shared > 0 {
            1 + 2 * shared + 3 * fixed + (order + 1)
        } else {
            3 * fixed + (order + 1)
        };
        assert_eq!(fit.number_of_parameters(), expected, "case {:?}", (shared, fixed, order));
        assert_eq!(parameter_count(shared, fixed, false, order), expected);
        assert_eq!(fit.roles().len(), expected);
    }
}

#[test]
fn test_scaled_peaks_reserve_the_shared_width() {
    let peaks = vec![Peak::at(100.0).with_doublet(true), Peak::at(200.0).with_unbound(true)];
    let mut fit = Fit::new(0).with_range(0.0, 1000.0);
    fit.assign_peaks(&peaks);
    fit.build_parameter_map(&peaks).unwrap();
    assert_eq!(fit.number_of_parameters(), 1 + 3 * 2 + 1);
    let mut diag = Diagnostics::new();
    assert_eq!(
        fit.parameter_target(0, &mut diag),
        Some(ParameterTarget::SharedWidth)
    );
}

#[test]
fn test_background_indices_round_trip_to_orders() {
    let peaks = vec![
        Peak::at(100.0),
        Peak::at(200.0).with_doublet(true),
        Peak::at(300.0).with_fixed_width(5.0),
    ];
    let mut fit = Fit::new(3).with_range(0.0, 1000.0);
    fit.assign_peaks(&peaks);
    fit.build_parameter_map(&peaks).unwrap();

    let mut diag = Diagnostics::new();
    for order in 0..=3 {
        let index = fit.background_index(order).unwrap();
        assert_eq!(
            fit.parameter_target(index, &mut diag),
            Some(ParameterTarget::BackgroundOrder(order))
        );
        assert_eq!(fit.parameter_names()[index], format!("{:02}-bg", order));
    }
    assert_eq!(fit.background_index(4), None);
}

#[test]
fn test_area_of_reference_peak() {
    assert_relative_eq!(peak_area(10.0, 5.0, 2.0), 62.66, epsilon = 0.01);
}

#[test]
fn test_at_limit_detection() {
    let result = FitResult {
        parameters: vec![9.9999995, 5.0],
        errors: vec![0.1, 0.1],
        covariance: Array2::zeros((2, 2)),
        bounds: vec![Some((0.0, 10.0)), Some((0.0, 10.0))],
        chi_square: 1.0,
        ndf: 1,
        valid: true,
        message: String::new(),
        iterations: 1,
    };
    assert_eq!(parameter_limit_status(0, &result), LimitStatus::AtUpper);
    assert_eq!(parameter_limit_status(1, &result), LimitStatus::NotLimited);
}

#[test]
fn test_flat_background_cancels() {
    let spectrum = flat_spectrum(2.0);
    let mut integral = SpectrumIntegral::from_coordinates(100.0, 200.0, 2.0, 2.0).unwrap();
    let mut diag = Diagnostics::new();
    let measurement = integral.calculate(spectrum.histogram(), &mut diag).unwrap();

    assert_relative_eq!(measurement.integral, 0.0, epsilon = 1e-9);
    assert_relative_eq!(measurement.raw, 200.0, epsilon = 1e-9);
    // Raw and background counts both enter the error
    assert_relative_eq!(measurement.integral_error, 400.0f64.sqrt(), epsilon = 1e-9);
}

#[test]
fn test_symmetric_peak_centroid() {
    let histogram =
        UniformHistogram::from_fn(300, 0.0, 300.0, |x| gaussian(x, 50.0, 150.0, 12.0)).unwrap();
    let mut integral = SpectrumIntegral::from_coordinates(100.0, 200.0, 0.0, 0.0).unwrap();
    let mut diag = Diagnostics::new();
    let measurement = integral.calculate(&histogram, &mut diag).unwrap();

    assert_relative_eq!(measurement.centroid.unwrap(), 150.0, epsilon = 1e-6);
    assert!(measurement.centroid_error.unwrap() > 0.0);
    assert!(measurement.integral > 0.0);
}

#[test]
fn test_peak_outside_fit_range_only_warns() {
    init_logging();
    let mut spectrum = flat_spectrum(1.0);
    spectrum.add_peak(Peak::at(500.0));
    spectrum.add_fit(Fit::new(0).with_range(0.0, 400.0));

    let mut diag = Diagnostics::new();
    SpectrumFitter::default()
        .initialise_guesses(&mut spectrum, &mut diag)
        .unwrap();
    assert!(diag.has_warning_containing("not included in any fit"));
}
