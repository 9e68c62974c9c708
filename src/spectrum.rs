//! The spectrum aggregate.
//!
//! A [`Spectrum`] owns its peaks, fits and integrals directly. Fits and
//! integrals refer to peaks and fits by index into these collections.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::error::{Result, SpectrumFitError};
use crate::fit::Fit;
use crate::histogram::Histogram;
use crate::integral::SpectrumIntegral;
use crate::peak::{FitQuantity, Peak};

/// Spectrum-wide defaults for unset peak guesses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuessDefaults {
    pub width: f64,
    pub width_lb: f64,
    pub width_ub: f64,
    /// Amplitude bounds as fractions of the bin content at the mean.
    pub amplitude_fraction_lb: f64,
    pub amplitude_fraction_ub: f64,
    /// Mean bounds are `mean ± mean_half_width`.
    pub mean_half_width: f64,
}

impl Default for GuessDefaults {
    fn default() -> Self {
        Self {
            width: 100.0,
            width_lb: 50.0,
            width_ub: 150.0,
            amplitude_fraction_lb: 0.0,
            amplitude_fraction_ub: 1.2,
            mean_half_width: 100.0,
        }
    }
}

/// Histogram plus everything fitted or integrated on it.
#[derive(Clone)]
pub struct Spectrum {
    pub(crate) histogram: Arc<dyn Histogram>,
    pub(crate) peaks: Vec<Peak>,
    pub(crate) fits: Vec<Fit>,
    pub(crate) integrals: Vec<SpectrumIntegral>,
    separation_energy: Option<f64>,
    bound_width: FitQuantity,
    guesses: GuessDefaults,
    background_order: usize,
}

impl std::fmt::Debug for Spectrum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spectrum")
            .field("bins", &self.histogram.bin_count())
            .field("peaks", &self.peaks)
            .field("fits", &self.fits.len())
            .field("integrals", &self.integrals.len())
            .field("separation_energy", &self.separation_energy)
            .field("bound_width", &self.bound_width)
            .finish()
    }
}

impl Spectrum {
    pub fn new(histogram: Arc<dyn Histogram>) -> Self {
        Self {
            histogram,
            peaks: Vec::new(),
            fits: Vec::new(),
            integrals: Vec::new(),
            separation_energy: None,
            bound_width: FitQuantity::default(),
            guesses: GuessDefaults::default(),
            background_order: 0,
        }
    }

    pub fn histogram(&self) -> &dyn Histogram {
        self.histogram.as_ref()
    }

    /// Shared handle to the histogram.
    pub fn histogram_handle(&self) -> Arc<dyn Histogram> {
        Arc::clone(&self.histogram)
    }

    /// Append a peak and return its index.
    pub fn add_peak(&mut self, peak: Peak) -> usize {
        self.peaks.push(peak);
        self.peaks.len() - 1
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn peak(&self, index: usize) -> Option<&Peak> {
        self.peaks.get(index)
    }

    pub fn peak_mut(&mut self, index: usize) -> Option<&mut Peak> {
        self.peaks.get_mut(index)
    }

    pub fn number_of_peaks(&self) -> usize {
        self.peaks.len()
    }

    /// Append a fit and return its index.
    pub fn add_fit(&mut self, fit: Fit) -> usize {
        self.fits.push(fit);
        self.fits.len() - 1
    }

    /// Resize the fit list, creating empty fits with the spectrum's
    /// background order. Resizing a populated list warns.
    pub fn set_number_of_fits(&mut self, n: usize, diag: &mut Diagnostics) {
        if !self.fits.is_empty() && self.fits.len() != n {
            diag.warn(format!(
                "Resizing the fit list from {} to {}",
                self.fits.len(),
                n
            ));
        }
        let order = self.background_order;
        self.fits.resize_with(n, || Fit::new(order));
    }

    pub fn fits(&self) -> &[Fit] {
        &self.fits
    }

    pub fn fit(&self, index: usize) -> Option<&Fit> {
        self.fits.get(index)
    }

    pub fn fit_mut(&mut self, index: usize) -> Option<&mut Fit> {
        self.fits.get_mut(index)
    }

    pub fn number_of_fits(&self) -> usize {
        self.fits.len()
    }

    /// Append an integral and return its index.
    pub fn add_integral(&mut self, integral: SpectrumIntegral) -> usize {
        self.integrals.push(integral);
        self.integrals.len() - 1
    }

    /// Truncate the integral list. Integrals need bounds, so the list can
    /// only shrink; growing it is an error.
    pub fn set_number_of_integrals(&mut self, n: usize, diag: &mut Diagnostics) -> Result<()> {
        if n > self.integrals.len() {
            return Err(SpectrumFitError::InvalidConfig(format!(
                "cannot create {} integrals without bounds; {} are defined",
                n,
                self.integrals.len()
            )));
        }
        if n < self.integrals.len() {
            diag.warn(format!(
                "Discarding {} configured integrals",
                self.integrals.len() - n
            ));
        }
        self.integrals.truncate(n);
        Ok(())
    }

    pub fn integrals(&self) -> &[SpectrumIntegral] {
        &self.integrals
    }

    pub fn integral(&self, index: usize) -> Option<&SpectrumIntegral> {
        self.integrals.get(index)
    }

    pub fn number_of_integrals(&self) -> usize {
        self.integrals.len()
    }

    pub fn separation_energy(&self) -> Option<f64> {
        self.separation_energy
    }

    pub fn set_separation_energy(&mut self, energy: Option<f64>) {
        self.separation_energy = energy;
    }

    /// Whether a peak at `mean` lies above the separation energy.
    pub fn is_above_separation(&self, mean: f64) -> bool {
        self.separation_energy.is_some_and(|s| mean >= s)
    }

    /// Width shared by the bound peaks of every fit.
    pub fn bound_width(&self) -> &FitQuantity {
        &self.bound_width
    }

    pub fn bound_width_mut(&mut self) -> &mut FitQuantity {
        &mut self.bound_width
    }

    pub fn guesses(&self) -> &GuessDefaults {
        &self.guesses
    }

    pub fn guesses_mut(&mut self) -> &mut GuessDefaults {
        &mut self.guesses
    }

    pub fn background_order(&self) -> usize {
        self.background_order
    }

    /// Order used for fits created from now on.
    pub fn set_background_order(&mut self, order: usize) {
        self.background_order = order;
    }
}
