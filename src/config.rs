//! JSON configuration for a spectrum.
//!
//! [`SpectrumConfig`] describes peaks, fits and integrals with the defaults the
//! fitter expects; [`SpectrumConfig::build`] turns it into a [`Spectrum`] over
//! a caller-supplied histogram.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::error::Result;
use crate::fit::Fit;
use crate::histogram::Histogram;
use crate::integral::SpectrumIntegral;
use crate::peak::{FitQuantity, Peak};
use crate::spectrum::{GuessDefaults, Spectrum};

/// One background coefficient.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundTermConfig {
    pub value: Option<f64>,
    pub lb: Option<f64>,
    pub ub: Option<f64>,
    pub fixed: bool,
}

impl BackgroundTermConfig {
    fn quantity(&self) -> FitQuantity {
        FitQuantity {
            value: self.value,
            lower: self.lb,
            upper: self.ub,
            fixed: self.fixed,
            ..FitQuantity::default()
        }
    }
}

/// Range and background guesses of one fit. Unset ends default to the
/// histogram axis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub lb: Option<f64>,
    pub ub: Option<f64>,
    /// Indexed by polynomial order.
    pub background: Vec<BackgroundTermConfig>,
}

/// A counting integral.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegralConfig {
    pub lb: f64,
    pub ub: f64,
    /// Background height at `lb`; needs `y2` as well.
    #[serde(default)]
    pub y1: Option<f64>,
    /// Background height at `ub`; needs `y1` as well.
    #[serde(default)]
    pub y2: Option<f64>,
    /// Fit providing the background when no coordinates are given.
    #[serde(default)]
    pub fit: Option<usize>,
}

/// Guesses, bounds and flags of one peak.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeakConfig {
    pub mean: Option<f64>,
    pub mean_lb: Option<f64>,
    pub mean_ub: Option<f64>,
    pub mean_fixed: bool,
    pub amplitude: Option<f64>,
    pub amplitude_lb: Option<f64>,
    pub amplitude_ub: Option<f64>,
    pub amplitude_fixed: bool,
    pub width: Option<f64>,
    pub width_lb: Option<f64>,
    pub width_ub: Option<f64>,
    pub width_fixed: bool,
    pub doublet: bool,
}

/// Everything needed to set up a [`Spectrum`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// Peaks at or above this energy are unbound. Without it every peak is bound.
    pub separation_energy: Option<f64>,
    pub guess_width: f64,
    pub guess_width_lb: f64,
    pub guess_width_ub: f64,
    pub guess_amplitude_fraction_lb: f64,
    pub guess_amplitude_fraction_ub: f64,
    pub guess_mean_half_width: f64,
    pub bound_peak_width: Option<f64>,
    pub bound_peak_width_lb: Option<f64>,
    pub bound_peak_width_ub: Option<f64>,
    pub bound_peak_width_fixed: bool,
    /// Background polynomial order shared by all fits.
    pub background_order: usize,
    pub fits: Vec<FitConfig>,
    pub integrals: Vec<IntegralConfig>,
    pub peaks: Vec<PeakConfig>,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        let guesses = GuessDefaults::default();
        Self {
            separation_energy: None,
            guess_width: guesses.width,
            guess_width_lb: guesses.width_lb,
            guess_width_ub: guesses.width_ub,
            guess_amplitude_fraction_lb: guesses.amplitude_fraction_lb,
            guess_amplitude_fraction_ub: guesses.amplitude_fraction_ub,
            guess_mean_half_width: guesses.mean_half_width,
            bound_peak_width: None,
            bound_peak_width_lb: None,
            bound_peak_width_ub: None,
            bound_peak_width_fixed: false,
            background_order: 0,
            fits: Vec::new(),
            integrals: Vec::new(),
            peaks: Vec::new(),
        }
    }
}

impl SpectrumConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn guesses(&self) -> GuessDefaults {
        GuessDefaults {
            width: self.guess_width,
            width_lb: self.guess_width_lb,
            width_ub: self.guess_width_ub,
            amplitude_fraction_lb: self.guess_amplitude_fraction_lb,
            amplitude_fraction_ub: self.guess_amplitude_fraction_ub,
            mean_half_width: self.guess_mean_half_width,
        }
    }

    /// Build a spectrum over `histogram`.
    ///
    /// Inconsistent settings are reported to `diag` and resolved the same way
    /// each time: ignored width keys on bound peaks, integrals with equal
    /// bounds dropped, a missing fit reference replaced by fit 0.
    pub fn build(&self, histogram: Arc<dyn Histogram>, diag: &mut Diagnostics) -> Result<Spectrum> {
        let mut spectrum = Spectrum::new(histogram);
        spectrum.set_background_order(self.background_order);
        spectrum.set_separation_energy(self.separation_energy);
        if self.separation_energy.is_none() {
            diag.warn(
                "No separation energy specified; peaks cannot be classified as unbound, assuming all bound",
            );
        }
        *spectrum.guesses_mut() = self.guesses();
        *spectrum.bound_width_mut() = FitQuantity {
            value: self.bound_peak_width,
            lower: self.bound_peak_width_lb,
            upper: self.bound_peak_width_ub,
            fixed: self.bound_peak_width_fixed,
            ..FitQuantity::default()
        };

        for (i, fit_config) in self.fits.iter().enumerate() {
            spectrum.add_fit(self.build_fit(i, fit_config, diag)?);
        }

        for (i, integral) in self.integrals.iter().enumerate() {
            if let Some(integral) = self.build_integral(i, integral, diag)? {
                spectrum.add_integral(integral);
            }
        }

        for (i, peak_config) in self.peaks.iter().enumerate() {
            let peak = build_peak(i, peak_config, &spectrum, diag);
            spectrum.add_peak(peak);
        }

        diag.debug(format!(
            "Configured {} peaks, {} fits, {} integrals",
            spectrum.number_of_peaks(),
            spectrum.number_of_fits(),
            spectrum.number_of_integrals()
        ));
        Ok(spectrum)
    }

    fn build_fit(&self, index: usize, config: &FitConfig, diag: &mut Diagnostics) -> Result<Fit> {
        let mut fit = Fit::new(self.background_order);
        fit.set_lb(config.lb);
        fit.set_ub(config.ub);
        if config.background.len() > self.background_order + 1 {
            diag.warn(format!(
                "Fit {} lists {} background terms for order {}; extra terms ignored",
                index,
                config.background.len(),
                self.background_order
            ));
        }
        for (order, term) in config
            .background
            .iter()
            .enumerate()
            .take(self.background_order + 1)
        {
            fit.background_mut().set_term(order, term.quantity())?;
        }
        Ok(fit)
    }

    fn build_integral(
        &self,
        index: usize,
        config: &IntegralConfig,
        diag: &mut Diagnostics,
    ) -> Result<Option<SpectrumIntegral>> {
        if config.lb == config.ub {
            diag.warn(format!(
                "Integral {:02} has the same LB as UB; the limits must be specified, disregarding",
                index
            ));
            return Ok(None);
        }

        match (config.y1, config.y2) {
            (Some(y1), Some(y2)) => {
                return SpectrumIntegral::from_coordinates(config.lb, config.ub, y1, y2).map(Some);
            }
            (Some(_), None) => diag.warn(format!(
                "Integral {:02}: y2 not specified, taking background from fit",
                index
            )),
            (None, Some(_)) => diag.warn(format!(
                "Integral {:02}: y1 not specified, taking background from fit",
                index
            )),
            (None, None) => {}
        }

        let fit = match config.fit {
            Some(fit) if fit < self.fits.len() => fit,
            _ => {
                diag.warn(format!(
                    "Integral {:02}: selected fit outside range, choosing fit 0 as the background source",
                    index
                ));
                0
            }
        };
        Ok(Some(SpectrumIntegral::from_fit(
            config.lb,
            config.ub,
            fit,
            self.background_order,
        )))
    }
}

fn build_peak(index: usize, config: &PeakConfig, spectrum: &Spectrum, diag: &mut Diagnostics) -> Peak {
    let mut peak = Peak {
        mean: FitQuantity {
            value: config.mean,
            lower: config.mean_lb,
            upper: config.mean_ub,
            fixed: config.mean_fixed,
            ..FitQuantity::default()
        },
        amplitude: FitQuantity {
            value: config.amplitude,
            lower: config.amplitude_lb,
            upper: config.amplitude_ub,
            fixed: config.amplitude_fixed,
            ..FitQuantity::default()
        },
        doublet: config.doublet,
        ..Peak::default()
    };

    match config.mean {
        Some(mean) => peak.unbound = spectrum.is_above_separation(mean),
        None => diag.warn(format!(
            "Peak {:02} did not have a mean assigned; is this a mistake?",
            index
        )),
    }

    peak.width.fixed = config.width_fixed;
    let shares_width = !config.width_fixed && peak.is_bound() && !peak.doublet;
    if shares_width {
        let ignored: Vec<String> = [
            ("width", config.width),
            ("width_lb", config.width_lb),
            ("width_ub", config.width_ub),
        ]
        .iter()
        .filter(|(_, value)| value.is_some())
        .map(|(key, _)| format!("peaks[{}].{}", index, key))
        .collect();
        if !ignored.is_empty() {
            diag.warn(format!(
                "{} specified for a bound peak; ignored because all bound peaks share a common width. \
                 Use the bound_peak_width keys to constrain it",
                ignored.join(", ")
            ));
        }
    } else {
        if config.width_fixed && peak.is_bound() && !peak.doublet {
            diag.warn(format!(
                "Fixing the width of bound peak {:02}; are you sure? Trying anyway",
                index
            ));
        }
        peak.width.value = config.width;
        peak.width.lower = config.width_lb;
        peak.width.upper = config.width_ub;
    }
    peak
}
