//! # Fit models
//!
//! A [`Fit`] covers one sub-range of a spectrum. It owns the composite
//! formula built from the peaks whose means fall inside its range, the map
//! from flat parameter indices to peak or background identities, its
//! background polynomial and the minimizer result.
//!
//! Parameter layout, in peak order:
//!
//! | width mode | parameters                 |
//! |------------|----------------------------|
//! | `Fixed`    | width, amplitude, mean     |
//! | `Scaled`   | width-scale, amplitude, mean |
//! | `Shared`   | amplitude, mean            |
//!
//! followed by one coefficient per background order. Index 0 holds the width
//! shared by the fit whenever a `Shared` or `Scaled` peak is present.

use serde::Serialize;

use crate::background::BackgroundPolynomial;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, SpectrumFitError};
use crate::formula::Formula;
use crate::minimizer::{FitResult, ParameterSetting};
use crate::peak::{Peak, WidthMode};

/// What a flat parameter index stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParameterRole {
    /// Index outside the parameter map.
    Null,
    /// A width; `None` is the width shared by the fit.
    Width { peak: Option<usize> },
    /// Factor applied to the shared width.
    WidthScale { peak: usize },
    Amplitude { peak: usize },
    Mean { peak: usize },
    /// Background coefficient of `x^order`.
    Background { order: usize },
}

impl ParameterRole {
    /// The peak a parameter belongs to, if any.
    pub fn peak(&self) -> Option<usize> {
        match *self {
            Self::Width { peak } => peak,
            Self::WidthScale { peak } | Self::Amplitude { peak } | Self::Mean { peak } => {
                Some(peak)
            }
            Self::Null | Self::Background { .. } => None,
        }
    }

    /// Minimizer parameter name, e.g. `03-amp`, `01-bg` or `width`.
    pub fn name(&self) -> String {
        match *self {
            Self::Null => "null".to_string(),
            Self::Width { peak: None } => "width".to_string(),
            Self::Width { peak: Some(p) } => format!("{:02}-width", p),
            Self::WidthScale { peak } => format!("{:02}-wscale", peak),
            Self::Amplitude { peak } => format!("{:02}-amp", peak),
            Self::Mean { peak } => format!("{:02}-mean", peak),
            Self::Background { order } => format!("{:02}-bg", order),
        }
    }
}

/// Identity a flat parameter index maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParameterTarget {
    SharedWidth,
    Peak(usize),
    BackgroundOrder(usize),
}

/// Where one peak's parameters sit in the flat parameter vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PeakSlot {
    /// Index of the peak in the spectrum.
    pub peak: usize,
    pub mode: WidthMode,
    /// First parameter index used by this peak.
    pub first: usize,
}

impl PeakSlot {
    pub fn amplitude_index(&self) -> usize {
        match self.mode {
            WidthMode::Shared => self.first,
            WidthMode::Scaled | WidthMode::Fixed => self.first + 1,
        }
    }

    pub fn mean_index(&self) -> usize {
        self.amplitude_index() + 1
    }

    /// Index of the width parameter the peak's width is read from.
    pub fn width_index(&self) -> usize {
        match self.mode {
            WidthMode::Fixed => self.first,
            WidthMode::Scaled | WidthMode::Shared => 0,
        }
    }

    /// Index of the width-scale parameter for scaled peaks.
    pub fn scale_index(&self) -> Option<usize> {
        match self.mode {
            WidthMode::Scaled => Some(self.first),
            WidthMode::Shared | WidthMode::Fixed => None,
        }
    }

    /// Model term for this peak.
    fn gaussian(&self) -> String {
        let a = self.amplitude_index();
        let m = self.mean_index();
        match self.mode {
            WidthMode::Shared => format!("[{}]*exp(-0.5*((x-[{}])/[0])^2)", a, m),
            WidthMode::Scaled => format!(
                "[{}]*exp(-0.5*((x-[{}])/([{}]*[0]))^2)",
                a, m, self.first
            ),
            WidthMode::Fixed => format!(
                "[{}]*exp(-0.5*((x-[{}])/[{}])^2)",
                a, m, self.first
            ),
        }
    }
}

/// `[k] + [k+1]*x + [k+2]*x**2 + ...` up to `order`.
pub fn background_string(first: usize, order: usize) -> String {
    (0..=order)
        .map(|i| match i {
            0 => format!("[{}]", first),
            1 => format!("[{}]*x", first + 1),
            _ => format!("[{}]*x**{}", first + i, i),
        })
        .collect::<Vec<_>>()
        .join(" + ")
}

/// Number of parameters for `shared` shared-width peaks, `own` scaled or
/// fixed-width peaks and a background of `order`.
pub fn parameter_count(shared: usize, own: usize, has_scaled: bool, order: usize) -> usize {
    let width_slot = usize::from(shared > 0 || has_scaled);
    width_slot + 2 * shared + 3 * own + order + 1
}

/// One composite model over `[lb, ub)`.
#[derive(Debug, Clone, Serialize)]
pub struct Fit {
    lb: Option<f64>,
    ub: Option<f64>,
    peaks: Vec<usize>,
    slots: Vec<PeakSlot>,
    roles: Vec<ParameterRole>,
    background: BackgroundPolynomial,
    #[serde(skip)]
    formula: Option<Formula>,
    #[serde(skip)]
    individual: Option<Formula>,
    individual_parameters: Vec<Vec<f64>>,
    #[serde(skip)]
    settings: Vec<ParameterSetting>,
    #[serde(skip)]
    result: Option<FitResult>,
}

impl Fit {
    /// An empty fit with a background of `order` and no range yet.
    pub fn new(order: usize) -> Self {
        Self {
            lb: None,
            ub: None,
            peaks: Vec::new(),
            slots: Vec::new(),
            roles: Vec::new(),
            background: BackgroundPolynomial::new(order),
            formula: None,
            individual: None,
            individual_parameters: Vec::new(),
            settings: Vec::new(),
            result: None,
        }
    }

    pub fn with_range(mut self, lb: f64, ub: f64) -> Self {
        self.set_range(lb, ub);
        self
    }

    pub fn set_range(&mut self, lb: f64, ub: f64) {
        self.lb = Some(lb);
        self.ub = Some(ub);
    }

    pub fn lb(&self) -> Option<f64> {
        self.lb
    }

    pub fn ub(&self) -> Option<f64> {
        self.ub
    }

    pub fn set_lb(&mut self, lb: Option<f64>) {
        self.lb = lb;
    }

    pub fn set_ub(&mut self, ub: Option<f64>) {
        self.ub = ub;
    }

    /// `(lb, ub)` once both ends are set.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.lb.zip(self.ub)
    }

    /// Whether `x` lies in `[lb, ub)`.
    pub fn contains(&self, x: f64) -> bool {
        self.range().is_some_and(|(lb, ub)| lb <= x && x < ub)
    }

    /// Collect the spectrum peaks whose mean lies inside the range.
    ///
    /// Clears any previous parameter map.
    pub fn assign_peaks(&mut self, peaks: &[Peak]) {
        self.peaks = peaks
            .iter()
            .enumerate()
            .filter(|(_, peak)| peak.mean.value.is_some_and(|mean| self.contains(mean)))
            .map(|(index, _)| index)
            .collect();
        self.slots.clear();
        self.roles.clear();
    }

    /// Lay out the flat parameter vector for the assigned peaks.
    pub fn build_parameter_map(&mut self, peaks: &[Peak]) -> Result<()> {
        let modes = self
            .peaks
            .iter()
            .map(|&index| {
                peaks
                    .get(index)
                    .map(Peak::width_mode)
                    .ok_or(SpectrumFitError::IndexOutOfRange {
                        what: "peaks",
                        index,
                        len: peaks.len(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        self.slots.clear();
        self.roles.clear();
        if modes.iter().any(|m| *m != WidthMode::Fixed) {
            self.roles.push(ParameterRole::Width { peak: None });
        }

        for (&peak, &mode) in self.peaks.iter().zip(&modes) {
            self.slots.push(PeakSlot {
                peak,
                mode,
                first: self.roles.len(),
            });
            match mode {
                WidthMode::Fixed => self.roles.push(ParameterRole::Width { peak: Some(peak) }),
                WidthMode::Scaled => self.roles.push(ParameterRole::WidthScale { peak }),
                WidthMode::Shared => {}
            }
            self.roles.push(ParameterRole::Amplitude { peak });
            self.roles.push(ParameterRole::Mean { peak });
        }

        for order in 0..=self.background.order() {
            self.roles.push(ParameterRole::Background { order });
        }
        Ok(())
    }

    /// Build the composite and individual formulas from the parameter map.
    pub fn generate_formula(&mut self, peaks: &[Peak], diag: &mut Diagnostics) -> Result<()> {
        if self.roles.is_empty() {
            self.build_parameter_map(peaks)?;
        }

        let mut terms: Vec<String> = self.slots.iter().map(PeakSlot::gaussian).collect();
        terms.push(background_string(
            self.background_offset(),
            self.background.order(),
        ));
        let source = terms.join(" + ");
        diag.debug(format!("Fit formula: {}", source));

        let formula = Formula::parse(&source)?;
        if formula.parameter_count() != self.roles.len() {
            return Err(SpectrumFitError::DimensionMismatch(format!(
                "formula uses {} parameters but the map holds {}",
                formula.parameter_count(),
                self.roles.len()
            )));
        }
        self.formula = Some(formula);

        let individual = format!(
            "[1]*exp(-0.5*((x-[2])/[0])^2) + {}",
            background_string(3, self.background.order())
        );
        self.individual = Some(Formula::parse(&individual)?);
        self.individual_parameters = vec![Vec::new(); self.slots.len()];
        Ok(())
    }

    /// First background parameter index.
    pub fn background_offset(&self) -> usize {
        self.roles.len() - (self.background.order() + 1).min(self.roles.len())
    }

    pub fn peaks(&self) -> &[usize] {
        &self.peaks
    }

    pub fn slots(&self) -> &[PeakSlot] {
        &self.slots
    }

    pub fn number_of_peaks(&self) -> usize {
        self.peaks.len()
    }

    pub fn number_of_parameters(&self) -> usize {
        self.roles.len()
    }

    pub fn roles(&self) -> &[ParameterRole] {
        &self.roles
    }

    /// Role of parameter `index`; [`ParameterRole::Null`] with a warning
    /// outside the map.
    pub fn parameter_role(&self, index: usize, diag: &mut Diagnostics) -> ParameterRole {
        match self.roles.get(index) {
            Some(role) => *role,
            None => {
                diag.warn(format!(
                    "Parameter {} requested from a fit with {} parameters",
                    index,
                    self.roles.len()
                ));
                ParameterRole::Null
            }
        }
    }

    pub fn parameter_target(&self, index: usize, diag: &mut Diagnostics) -> Option<ParameterTarget> {
        match self.parameter_role(index, diag) {
            ParameterRole::Null => None,
            ParameterRole::Width { peak: None } => Some(ParameterTarget::SharedWidth),
            ParameterRole::Background { order } => Some(ParameterTarget::BackgroundOrder(order)),
            role => role.peak().map(ParameterTarget::Peak),
        }
    }

    /// Spectrum index of the peak owning parameter `index`.
    pub fn peak_number(&self, index: usize, diag: &mut Diagnostics) -> Option<usize> {
        self.parameter_role(index, diag).peak()
    }

    /// Flat index of the background coefficient of `order`.
    pub fn background_index(&self, order: usize) -> Option<usize> {
        self.roles
            .iter()
            .position(|r| *r == ParameterRole::Background { order })
    }

    /// Minimizer names, one per parameter.
    pub fn parameter_names(&self) -> Vec<String> {
        self.roles.iter().map(ParameterRole::name).collect()
    }

    pub fn background(&self) -> &BackgroundPolynomial {
        &self.background
    }

    pub fn background_mut(&mut self) -> &mut BackgroundPolynomial {
        &mut self.background
    }

    pub fn formula(&self) -> Option<&Formula> {
        self.formula.as_ref()
    }

    pub fn individual_formula(&self) -> Option<&Formula> {
        self.individual.as_ref()
    }

    /// Parameters `[width, amplitude, mean, bg...]` of the peak in `slot`.
    pub fn individual_parameters(&self, slot: usize) -> Option<&[f64]> {
        self.individual_parameters
            .get(slot)
            .filter(|p| !p.is_empty())
            .map(Vec::as_slice)
    }

    pub fn set_individual_parameters(&mut self, slot: usize, parameters: Vec<f64>) -> Result<()> {
        let len = self.individual_parameters.len();
        let target = self
            .individual_parameters
            .get_mut(slot)
            .ok_or(SpectrumFitError::IndexOutOfRange {
                what: "individual fits",
                index: slot,
                len,
            })?;
        *target = parameters;
        Ok(())
    }

    pub fn settings(&self) -> &[ParameterSetting] {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Vec<ParameterSetting>) {
        self.settings = settings;
    }

    pub fn result(&self) -> Option<&FitResult> {
        self.result.as_ref()
    }

    pub fn set_result(&mut self, result: Option<FitResult>) {
        self.result = result;
    }

    /// `chi2 / ndf` of the result, zero before fitting.
    pub fn reduced_chi_square(&self) -> f64 {
        self.result
            .as_ref()
            .map_or(0.0, FitResult::reduced_chi_square)
    }

    /// Fitted shared width, if the fit has one.
    pub fn common_width(&self) -> Option<f64> {
        if self.roles.first() != Some(&ParameterRole::Width { peak: None }) {
            return None;
        }
        self.result.as_ref().and_then(|r| r.parameter(0))
    }

    pub fn is_valid(&self) -> bool {
        self.result.as_ref().is_some_and(|r| r.valid)
    }

    /// The fitted model at `x`.
    pub fn evaluate(&self, x: f64) -> Option<f64> {
        let formula = self.formula.as_ref()?;
        let result = self.result.as_ref()?;
        formula.evaluate(x, &result.parameters).ok()
    }

    /// The isolated curve of the peak in `slot` plus background at `x`.
    pub fn evaluate_peak(&self, slot: usize, x: f64) -> Option<f64> {
        let formula = self.individual.as_ref()?;
        let parameters = self.individual_parameters(slot)?;
        formula.evaluate(x, parameters).ok()
    }
}
