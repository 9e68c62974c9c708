//! # Spectrum fitting pipeline
//!
//! [`SpectrumFitter`] drives a [`Spectrum`] through the fixed sequence
//!
//! 1. [`initialise_guesses`](SpectrumFitter::initialise_guesses), which also
//!    runs the [`check_guesses`](SpectrumFitter::check_guesses) validation pass
//!    and assigns peaks to fits,
//! 2. [`generate_initial_fits`](SpectrumFitter::generate_initial_fits),
//! 3. [`set_fitting_options`](SpectrumFitter::set_fitting_options),
//! 4. [`fit_peaks`](SpectrumFitter::fit_peaks),
//! 5. [`calculate_integrals`](SpectrumFitter::calculate_integrals),
//!
//! or all of them through [`run`](SpectrumFitter::run). Suspicious input is
//! reported through [`Diagnostics`] and never stops the run.
//!
//! ```
//! use std::sync::Arc;
//! use spectrum_fitter::{
//!     Diagnostics, Fit, FitQuantity, Peak, Spectrum, SpectrumFitter, UniformHistogram,
//! };
//!
//! let histogram = UniformHistogram::from_fn(200, 0.0, 400.0, |x| {
//!     5.0 + 80.0 * (-0.5 * ((x - 200.0) / 8.0f64).powi(2)).exp()
//! })
//! .unwrap();
//! let mut spectrum = Spectrum::new(Arc::new(histogram));
//! spectrum.add_peak(Peak::at(198.0));
//! spectrum.add_fit(Fit::new(0).with_range(100.0, 300.0));
//! *spectrum.bound_width_mut() = FitQuantity::bounded(10.0, 2.0, 30.0);
//!
//! let mut diag = Diagnostics::new();
//! SpectrumFitter::default().run(&mut spectrum, &mut diag).unwrap();
//! assert!(spectrum.peak(0).unwrap().area.is_some());
//! ```

use std::f64::consts::PI;

use crate::background;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, SpectrumFitError};
use crate::fit::{ParameterRole, PeakSlot};
use crate::minimizer::{BinnedData, FitMode, FitProblem, FitResult, Minimizer, ParameterSetting};
use crate::peak::{FitQuantity, LimitStatus, WidthMode};
use crate::spectrum::Spectrum;

#[cfg(feature = "lm")]
use crate::minimizer::LevenbergMarquardt;

/// Distance from a bound below which a fitted value counts as at the limit.
pub const AT_LIMIT_TOLERANCE: f64 = 1e-6;

/// Peaks closer than this are reported as overlapping.
pub const PEAK_PROXIMITY_THRESHOLD: f64 = 100.0;

const WIDTH_SCALE_START: f64 = 1.01;
const WIDTH_SCALE_BOUNDS: (f64, f64) = (1.0, 3.0);

/// Where `result`'s parameter `index` sits relative to its applied bounds.
pub fn parameter_limit_status(index: usize, result: &FitResult) -> LimitStatus {
    let (Some((lower, upper)), Some(value)) = (result.bounds(index), result.parameter(index))
    else {
        return LimitStatus::NotLimited;
    };
    if (value - lower).abs() < AT_LIMIT_TOLERANCE {
        LimitStatus::AtLower
    } else if (upper - value).abs() < AT_LIMIT_TOLERANCE {
        LimitStatus::AtUpper
    } else {
        LimitStatus::NotLimited
    }
}

/// `amplitude * width * sqrt(2π) / bin_width`
pub fn peak_area(amplitude: f64, width: f64, bin_width: f64) -> f64 {
    amplitude * width * (2.0 * PI).sqrt() / bin_width
}

/// First-order error of [`peak_area`] given the amplitude-width covariance.
pub fn peak_area_error(
    amplitude: f64,
    amplitude_error: f64,
    width: f64,
    width_error: f64,
    covariance: f64,
    bin_width: f64,
) -> f64 {
    let variance = width * width * amplitude_error * amplitude_error
        + amplitude * amplitude * width_error * width_error
        + 2.0 * amplitude * width * covariance;
    variance.max(0.0).sqrt() * (2.0 * PI).sqrt() / bin_width
}

/// Copy the result of fit `fit_index` into its peaks and background.
///
/// Widths, amplitudes and means are written to the peaks with their errors
/// and limit flags; the shared width goes to every shared-width peak of the
/// fit. Background coefficients and their covariance go to the fit. Peak
/// areas are computed last.
pub fn ingest_fit_result(
    spectrum: &mut Spectrum,
    fit_index: usize,
    diag: &mut Diagnostics,
) -> Result<()> {
    let bin_width = spectrum.histogram.bin_width();
    let fits_len = spectrum.fits.len();
    let fit = spectrum
        .fits
        .get_mut(fit_index)
        .ok_or(SpectrumFitError::IndexOutOfRange {
            what: "fits",
            index: fit_index,
            len: fits_len,
        })?;
    let Some(result) = fit.result().cloned() else {
        diag.warn(format!("Fit {} has no result to ingest", fit_index));
        return Ok(());
    };
    let roles = fit.roles().to_vec();
    let slots = fit.slots().to_vec();
    let peaks = &mut spectrum.peaks;

    for (index, role) in roles.iter().enumerate().take(result.parameters.len()) {
        let value = result.parameters[index];
        let error = result.error(index).unwrap_or(0.0);
        let limit = parameter_limit_status(index, &result);

        match *role {
            ParameterRole::Width { peak: None } => {
                for slot in slots.iter().filter(|s| s.mode == WidthMode::Shared) {
                    if let Some(peak) = peaks.get_mut(slot.peak) {
                        peak.width.set_result(value, error, limit);
                    }
                }
            }
            ParameterRole::Width { peak: Some(p) } => match peaks.get_mut(p) {
                Some(peak) => peak.width.set_result(value, error, limit),
                None => warn_missing_peak(diag, fit_index, index, p),
            },
            ParameterRole::WidthScale { peak: p } => match peaks.get_mut(p) {
                Some(peak) => {
                    let shared = result.parameter(0).unwrap_or(0.0);
                    let shared_error = result.error(0).unwrap_or(0.0);
                    let variance = shared * shared * error * error
                        + value * value * shared_error * shared_error
                        + 2.0 * value * shared * result.covariance(0, index);
                    peak.width
                        .set_result(value * shared, variance.max(0.0).sqrt(), limit);
                }
                None => warn_missing_peak(diag, fit_index, index, p),
            },
            ParameterRole::Amplitude { peak: p } => match peaks.get_mut(p) {
                Some(peak) => peak.amplitude.set_result(value, error, limit),
                None => warn_missing_peak(diag, fit_index, index, p),
            },
            ParameterRole::Mean { peak: p } => match peaks.get_mut(p) {
                Some(peak) => peak.mean.set_result(value, error, limit),
                None => warn_missing_peak(diag, fit_index, index, p),
            },
            ParameterRole::Background { order } => {
                match fit.background_mut().term_mut(order) {
                    Some(term) => term.set_result(value, error, limit),
                    None => diag.warn(format!(
                        "Fit {} has no background term of order {}",
                        fit_index, order
                    )),
                }
                for (k, earlier) in roles.iter().enumerate().take(index + 1) {
                    if let ParameterRole::Background { order: other } = *earlier {
                        let cov = result.covariance(index, k);
                        if let Err(e) = fit.background_mut().set_covariance(order, other, cov) {
                            diag.warn(format!("Background covariance not stored: {}", e));
                        }
                    }
                }
            }
            ParameterRole::Null => {
                diag.warn(format!(
                    "Fit {} parameter {} has no role; value {} ignored",
                    fit_index, index, value
                ));
            }
        }
    }

    for slot in &slots {
        let Some(peak) = peaks.get_mut(slot.peak) else {
            continue;
        };
        if peak.area.is_some() {
            diag.warn(format!(
                "Peak {:02} area has already been set, perhaps by another fit; overwriting",
                slot.peak
            ));
        }
        let amplitude = peak.amplitude.value_or_zero();
        let width = peak.width.value_or_zero();
        let covariance = amplitude_width_covariance(slot, &result);
        peak.area = Some(peak_area(amplitude, width, bin_width));
        peak.area_error = Some(peak_area_error(
            amplitude,
            peak.amplitude.error_or_zero(),
            width,
            peak.width.error_or_zero(),
            covariance,
            bin_width,
        ));
    }
    Ok(())
}

/// Covariance between a peak's amplitude and its effective width.
fn amplitude_width_covariance(slot: &PeakSlot, result: &FitResult) -> f64 {
    let amplitude = slot.amplitude_index();
    match slot.scale_index() {
        // width = scale * shared
        Some(scale) => {
            let s = result.parameter(scale).unwrap_or(0.0);
            let shared = result.parameter(0).unwrap_or(0.0);
            s * result.covariance(amplitude, 0) + shared * result.covariance(amplitude, scale)
        }
        None => result.covariance(amplitude, slot.width_index()),
    }
}

fn warn_missing_peak(diag: &mut Diagnostics, fit: usize, parameter: usize, peak: usize) {
    diag.warn(format!(
        "Fit {} parameter {} refers to missing peak {:02}",
        fit, parameter, peak
    ));
}

/// Minimizer input for a quantity: fixed, bounded or free.
fn quantity_setting(name: String, quantity: &FitQuantity) -> ParameterSetting {
    let value = quantity.value_or_zero();
    if quantity.fixed {
        return ParameterSetting::fixed(name, value);
    }
    match (quantity.lower, quantity.upper) {
        (None, None) => ParameterSetting::free(name, value),
        (lower, upper) => ParameterSetting::bounded(
            name,
            value,
            lower.unwrap_or(f64::NEG_INFINITY),
            upper.unwrap_or(f64::INFINITY),
        ),
    }
}

/// Orchestrates guesses, fits and integrals for a [`Spectrum`].
#[derive(Debug, Clone)]
pub struct SpectrumFitter<M: Minimizer> {
    minimizer: M,
    mode: FitMode,
}

#[cfg(feature = "lm")]
impl Default for SpectrumFitter<LevenbergMarquardt> {
    fn default() -> Self {
        Self::new(LevenbergMarquardt::new())
    }
}

impl<M: Minimizer> SpectrumFitter<M> {
    /// A fitter using the Poisson likelihood objective.
    pub fn new(minimizer: M) -> Self {
        Self {
            minimizer,
            mode: FitMode::Likelihood,
        }
    }

    pub fn with_mode(mut self, mode: FitMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> FitMode {
        self.mode
    }

    pub fn minimizer(&self) -> &M {
        &self.minimizer
    }

    /// Run every stage in order.
    pub fn run(&self, spectrum: &mut Spectrum, diag: &mut Diagnostics) -> Result<()> {
        self.initialise_guesses(spectrum, diag)?;
        self.generate_initial_fits(spectrum, diag)?;
        self.set_fitting_options(spectrum, diag)?;
        self.fit_peaks(spectrum, diag)?;
        self.calculate_integrals(spectrum, diag)
    }

    /// Fill unset guesses and bounds, validate them and assign peaks to fits.
    pub fn initialise_guesses(&self, spectrum: &mut Spectrum, diag: &mut Diagnostics) -> Result<()> {
        let guesses = *spectrum.guesses();
        let separation = spectrum.separation_energy();
        let histogram = spectrum.histogram_handle();

        for (index, peak) in spectrum.peaks.iter_mut().enumerate() {
            let Some(mean) = peak.mean.value else {
                diag.warn(format!("Peak {:02} has no mean; its guesses are left unset", index));
                continue;
            };

            peak.mean
                .lower
                .get_or_insert((mean - guesses.mean_half_width).max(0.0));
            peak.mean.upper.get_or_insert(mean + guesses.mean_half_width);

            peak.width.value.get_or_insert(guesses.width);
            peak.width.lower.get_or_insert(guesses.width_lb);
            peak.width.upper.get_or_insert(guesses.width_ub);

            let amplitude = *peak.amplitude.value.get_or_insert_with(|| {
                histogram
                    .find_bin(mean)
                    .map_or(0.0, |bin| histogram.bin_content(bin))
            });
            peak.amplitude
                .lower
                .get_or_insert(guesses.amplitude_fraction_lb * amplitude);
            peak.amplitude
                .upper
                .get_or_insert(guesses.amplitude_fraction_ub * amplitude);

            if let Some(separation) = separation {
                if peak.is_unbound() && mean < separation {
                    diag.warn(format!(
                        "Peak {:02} has been labelled unbound but has a mean ({:.4}) below the separation energy ({:.4})",
                        index, mean, separation
                    ));
                }
            }
        }

        let bound_width = spectrum.bound_width_mut();
        bound_width.value.get_or_insert(guesses.width);
        bound_width.lower.get_or_insert(guesses.width_lb);
        bound_width.upper.get_or_insert(guesses.width_ub);

        let (x_min, x_max) = (histogram.x_min(), histogram.x_max());
        for fit in spectrum.fits.iter_mut() {
            fit.background_mut().apply_defaults();
            if fit.lb().is_none() {
                fit.set_lb(Some(x_min));
            }
            if fit.ub().is_none() {
                fit.set_ub(Some(x_max));
            }
        }

        self.check_guesses(spectrum, diag);

        for (index, fit) in spectrum.fits.iter_mut().enumerate() {
            fit.assign_peaks(&spectrum.peaks);
            fit.build_parameter_map(&spectrum.peaks)?;
            diag.debug(format!(
                "Fit {}: range [{:?}, {:?}], peaks {:?}, {} parameters, background order {}",
                index,
                fit.lb(),
                fit.ub(),
                fit.peaks(),
                fit.number_of_parameters(),
                fit.background().order()
            ));
        }
        for (index, peak) in spectrum.peaks.iter().enumerate() {
            diag.debug(format!("Peak {:02} guesses: {:?}", index, peak));
        }
        Ok(())
    }

    /// Warn about guesses and bounds that are unlikely to fit well.
    pub fn check_guesses(&self, spectrum: &Spectrum, diag: &mut Diagnostics) {
        let separation = spectrum.separation_energy();

        for (i, peak) in spectrum.peaks().iter().enumerate() {
            let Some(mean) = peak.mean.value else {
                continue;
            };

            if !spectrum.fits().iter().any(|fit| fit.contains(mean)) {
                diag.warn(format!("Peak {:02} is not included in any fit", i));
            }

            if let Some(separation) = separation {
                if peak.is_bound() && mean > separation {
                    diag.warn(format!(
                        "Peak {:02} is labelled bound but has energy above the separation energy ({:.2})",
                        i, separation
                    ));
                }
                if peak.is_bound() && peak.mean.upper.is_some_and(|ub| ub > separation) {
                    diag.warn(format!(
                        "Peak {:02} has an upper bound above the separation energy",
                        i
                    ));
                }
                if peak.is_unbound() && peak.mean.lower.is_some_and(|lb| lb < separation) {
                    diag.warn(format!(
                        "Peak {:02} has a lower bound below the separation energy",
                        i
                    ));
                }
            }

            check_quantity(diag, i, "amplitude", &peak.amplitude, true);
            check_quantity(diag, i, "mean", &peak.mean, false);
            check_quantity(diag, i, "width", &peak.width, true);

            for (j, other) in spectrum.peaks()[..i].iter().enumerate() {
                if let Some(other_mean) = other.mean.value {
                    if (mean - other_mean).abs() < PEAK_PROXIMITY_THRESHOLD {
                        diag.warn(format!(
                            "Peaks {:02} and {:02} are within {:.1} of each other",
                            j, i, PEAK_PROXIMITY_THRESHOLD
                        ));
                    }
                }
            }
        }

        if separation.is_some_and(|s| s <= 0.0) {
            diag.warn("Separation energy <= 0");
        }

        for (i, fit) in spectrum.fits().iter().enumerate() {
            let background = fit.background();
            if let Some(flat) = background.term(0) {
                let (default_lb, _) = background::default_bounds(0);
                if flat.value.is_some_and(|v| v < default_lb) {
                    diag.warn(format!(
                        "Flat portion of background below 0 ({:.2}) in fit {}",
                        flat.value_or_zero(),
                        i
                    ));
                }
                if flat.lower.is_some_and(|lb| lb < default_lb) {
                    diag.warn(format!(
                        "Flat portion of background lower bound below 0 in fit {}",
                        i
                    ));
                }
                if flat.upper.is_some_and(|ub| ub < 0.0) {
                    diag.warn(format!(
                        "Flat portion of background upper bound below 0 in fit {}",
                        i
                    ));
                }
            }

            for (order, term) in background.terms().iter().enumerate() {
                let (Some(lb), Some(ub)) = (term.lower, term.upper) else {
                    continue;
                };
                if ub < lb {
                    diag.warn(format!(
                        "Background parameter {:02} of fit {} has upper bound ({:.2}) < lower bound ({:.2})",
                        order, i, ub, lb
                    ));
                }
                let (default_lb, default_ub) = background::default_bounds(order);
                match (lb != default_lb, ub != default_ub) {
                    (true, false) => diag.warn(format!(
                        "Background LB and UB must both be set to impose limits; only LB set (fit {}, order {:02})",
                        i, order
                    )),
                    (false, true) => diag.warn(format!(
                        "Background LB and UB must both be set to impose limits; only UB set (fit {}, order {:02})",
                        i, order
                    )),
                    _ => {}
                }
            }
        }
    }

    /// Build each fit's composite and individual formulas.
    pub fn generate_initial_fits(&self, spectrum: &mut Spectrum, diag: &mut Diagnostics) -> Result<()> {
        for fit in spectrum.fits.iter_mut() {
            fit.generate_formula(&spectrum.peaks, diag)?;
        }
        Ok(())
    }

    /// Derive the minimizer input of every parameter from its role.
    pub fn set_fitting_options(&self, spectrum: &mut Spectrum, diag: &mut Diagnostics) -> Result<()> {
        let bound_width = *spectrum.bound_width();
        let peaks = &spectrum.peaks;

        for (index, fit) in spectrum.fits.iter_mut().enumerate() {
            // Scaled peaks alone only constrain the product of scale and shared width
            let shares_width = fit.slots().iter().any(|s| s.mode == WidthMode::Shared);
            let mut settings = Vec::with_capacity(fit.number_of_parameters());
            for (parameter, role) in fit.roles().iter().enumerate() {
                let name = role.name();
                let peak = role.peak().and_then(|p| peaks.get(p));
                let setting = match (*role, peak) {
                    (ParameterRole::Width { peak: None }, _) if !shares_width => {
                        diag.debug(format!(
                            "Fit {} has no shared-width peak; fixing the shared width at {}",
                            index,
                            bound_width.value_or_zero()
                        ));
                        ParameterSetting::fixed(name, bound_width.value_or_zero())
                    }
                    (ParameterRole::Width { peak: None }, _) => quantity_setting(name, &bound_width),
                    (ParameterRole::Width { peak: Some(_) }, Some(peak)) => {
                        if peak.width_mode() != WidthMode::Fixed {
                            diag.warn(format!(
                                "Fit {} parameter {} is labelled width but the peak does not have a fixed width",
                                index, parameter
                            ));
                        }
                        ParameterSetting::fixed(name, peak.width.value_or_zero())
                    }
                    (ParameterRole::WidthScale { .. }, Some(peak)) => {
                        if peak.width.fixed {
                            diag.warn(format!(
                                "Fit {} parameter {} is labelled width-scale but the peak has a fixed width",
                                index, parameter
                            ));
                        }
                        let (lower, upper) = WIDTH_SCALE_BOUNDS;
                        ParameterSetting::bounded(name, WIDTH_SCALE_START, lower, upper)
                    }
                    (ParameterRole::Amplitude { .. }, Some(peak)) => {
                        quantity_setting(name, &peak.amplitude)
                    }
                    (ParameterRole::Mean { .. }, Some(peak)) => quantity_setting(name, &peak.mean),
                    (ParameterRole::Background { order }, _) => match fit.background().term(order) {
                        Some(term) => quantity_setting(name, term),
                        None => ParameterSetting::fixed(name, 0.0),
                    },
                    _ => {
                        diag.warn(format!(
                            "Fit {} parameter {} has no usable role; fixing it at 0",
                            index, parameter
                        ));
                        ParameterSetting::fixed(name, 0.0)
                    }
                };
                settings.push(setting);
            }
            fit.set_settings(settings);
        }
        Ok(())
    }

    /// Minimize every fit in order and ingest the results.
    ///
    /// A minimizer failure leaves the fit without a result and is reported
    /// as a warning; later fits still run.
    pub fn fit_peaks(&self, spectrum: &mut Spectrum, diag: &mut Diagnostics) -> Result<()> {
        for index in 0..spectrum.fits.len() {
            let outcome = {
                let fit = &spectrum.fits[index];
                let formula = fit.formula().ok_or_else(|| {
                    SpectrumFitError::InvalidInput(format!(
                        "fit {} has no formula; generate the initial fits first",
                        index
                    ))
                })?;
                if fit.settings().len() != fit.number_of_parameters() {
                    return Err(SpectrumFitError::InvalidInput(format!(
                        "fit {} has {} parameter settings for {} parameters; set the fitting options first",
                        index,
                        fit.settings().len(),
                        fit.number_of_parameters()
                    )));
                }
                let (lb, ub) = fit.range().ok_or_else(|| {
                    SpectrumFitError::InvalidInput(format!("fit {} has no range", index))
                })?;
                let data = BinnedData::from_histogram(spectrum.histogram.as_ref(), lb, ub);
                let problem = FitProblem::new(formula, fit.settings(), &data, self.mode);
                self.minimizer.minimize(&problem)
            };

            match outcome {
                Ok(result) => {
                    if !result.valid {
                        diag.warn(format!("Fit {} is invalid: {}", index, result.message));
                    }
                    diag.debug(format!("Fit {}: {}", index, result));
                    spectrum.fits[index].set_result(Some(result));
                    ingest_fit_result(spectrum, index, diag)?;
                    Self::fix_individual_fits(spectrum, index)?;
                }
                Err(e) => {
                    diag.warn(format!("Fit {} failed: {}", index, e));
                    spectrum.fits[index].set_result(None);
                }
            }
        }
        Ok(())
    }

    /// Freeze each peak's isolated curve at its fitted values.
    fn fix_individual_fits(spectrum: &mut Spectrum, index: usize) -> Result<()> {
        let peaks = &spectrum.peaks;
        let fit = &mut spectrum.fits[index];
        let coefficients = fit.background().coefficients();
        let slots = fit.slots().to_vec();
        for (slot_index, slot) in slots.iter().enumerate() {
            let Some(peak) = peaks.get(slot.peak) else {
                continue;
            };
            let mut parameters = vec![
                peak.width.value_or_zero(),
                peak.amplitude.value_or_zero(),
                peak.mean.value_or_zero(),
            ];
            parameters.extend_from_slice(&coefficients);
            fit.set_individual_parameters(slot_index, parameters)?;
        }
        Ok(())
    }

    /// Refresh fit backgrounds and compute every integral.
    ///
    /// Integrals whose fit is missing or invalid are skipped with a warning.
    pub fn calculate_integrals(&self, spectrum: &mut Spectrum, diag: &mut Diagnostics) -> Result<()> {
        let histogram = spectrum.histogram.as_ref();
        let fits = &spectrum.fits;

        for (index, integral) in spectrum.integrals.iter_mut().enumerate() {
            if let Some(fit_index) = integral.fit() {
                match fits.get(fit_index) {
                    Some(fit) if fit.is_valid() => {
                        integral.background_mut().adopt(fit.background(), diag);
                    }
                    Some(_) => {
                        diag.warn(format!(
                            "Integral {} skipped: fit {} has no valid result",
                            index, fit_index
                        ));
                        continue;
                    }
                    None => {
                        diag.warn(format!(
                            "Integral {} skipped: fit {} does not exist",
                            index, fit_index
                        ));
                        continue;
                    }
                }
            }

            if let Err(e) = integral.calculate(histogram, diag) {
                diag.warn(format!("Integral {} could not be calculated: {}", index, e));
            }
        }
        Ok(())
    }
}

/// Sign and ordering checks for one peak quantity.
fn check_quantity(
    diag: &mut Diagnostics,
    peak: usize,
    what: &str,
    quantity: &FitQuantity,
    strictly_positive: bool,
) {
    if let Some(value) = quantity.value {
        if (strictly_positive && value <= 0.0) || value < 0.0 {
            let rule = if strictly_positive { "<= 0" } else { "< 0" };
            diag.warn(format!("Peak {:02} has a {} {} ({:.2})", peak, what, rule, value));
        }
    }
    if let Some(lb) = quantity.lower.filter(|lb| *lb < 0.0) {
        diag.warn(format!(
            "Peak {:02} has a {} lower bound < 0 ({:.2})",
            peak, what, lb
        ));
    }
    if let Some(ub) = quantity.upper.filter(|ub| *ub < 0.0) {
        diag.warn(format!(
            "Peak {:02} has a {} upper bound < 0 ({:.2})",
            peak, what, ub
        ));
    }
    if let (Some(lb), Some(ub)) = (quantity.lower, quantity.upper) {
        if ub < lb {
            diag.warn(format!(
                "Peak {:02} has a {} upper bound ({:.2}) < lower bound ({:.2})",
                peak, what, ub, lb
            ));
        }
    }
}
