//! Peak value objects.

use serde::{Deserialize, Serialize};

/// Position of a fitted value relative to the bounds the minimizer applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LimitStatus {
    #[default]
    NotLimited,
    AtLower,
    AtUpper,
}

impl LimitStatus {
    /// Numeric code used in reports: 0 = none, 1 = at lower, 2 = at upper.
    pub fn code(self) -> u8 {
        match self {
            Self::NotLimited => 0,
            Self::AtLower => 1,
            Self::AtUpper => 2,
        }
    }

    pub fn is_limited(self) -> bool {
        self != Self::NotLimited
    }
}

/// A fitted quantity with its guess bounds and fit state.
///
/// `None` marks a field that has not been set yet; guess initialisation
/// fills unset fields from the spectrum-wide defaults.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct FitQuantity {
    pub value: Option<f64>,
    pub error: Option<f64>,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
    pub fixed: bool,
    pub limit: LimitStatus,
}

impl FitQuantity {
    pub fn new(value: f64) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    /// Value with bounds.
    pub fn bounded(value: f64, lower: f64, upper: f64) -> Self {
        Self {
            value: Some(value),
            lower: Some(lower),
            upper: Some(upper),
            ..Self::default()
        }
    }

    pub fn value_or_zero(&self) -> f64 {
        self.value.unwrap_or(0.0)
    }

    pub fn error_or_zero(&self) -> f64 {
        self.error.unwrap_or(0.0)
    }

    /// Store a fit result.
    pub fn set_result(&mut self, value: f64, error: f64, limit: LimitStatus) {
        self.value = Some(value);
        self.error = Some(error);
        self.limit = limit;
    }

    /// `{f|-}{l|-}` flags for report status strings.
    pub fn flags(&self) -> String {
        format!(
            "{}{}",
            if self.fixed { 'f' } else { '-' },
            if self.limit.is_limited() { 'l' } else { '-' }
        )
    }
}

/// How a peak's width enters the fit model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WidthMode {
    /// Uses the width shared by all bound peaks of the fit.
    Shared,
    /// Shared width multiplied by the peak's own scale factor.
    Scaled,
    /// Own width parameter, held at the configured value.
    Fixed,
}

/// One spectral feature.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Peak {
    pub mean: FitQuantity,
    pub amplitude: FitQuantity,
    pub width: FitQuantity,
    /// The peak lies above the separation energy.
    pub unbound: bool,
    pub doublet: bool,
    pub area: Option<f64>,
    pub area_error: Option<f64>,
}

impl Peak {
    /// A bound peak with only its mean set.
    pub fn at(mean: f64) -> Self {
        Self {
            mean: FitQuantity::new(mean),
            ..Self::default()
        }
    }

    pub fn with_unbound(mut self, unbound: bool) -> Self {
        self.unbound = unbound;
        self
    }

    pub fn with_doublet(mut self, doublet: bool) -> Self {
        self.doublet = doublet;
        self
    }

    /// Fix the width to `width`.
    pub fn with_fixed_width(mut self, width: f64) -> Self {
        self.width.value = Some(width);
        self.width.fixed = true;
        self
    }

    pub fn is_bound(&self) -> bool {
        !self.unbound
    }

    pub fn is_unbound(&self) -> bool {
        self.unbound
    }

    /// A fixed width takes precedence over the doublet and unbound flags.
    pub fn width_mode(&self) -> WidthMode {
        if self.width.fixed {
            WidthMode::Fixed
        } else if self.doublet || self.unbound {
            WidthMode::Scaled
        } else {
            WidthMode::Shared
        }
    }

    pub fn set_mean_guess(&mut self, value: f64, lower: f64, upper: f64) {
        self.mean = FitQuantity {
            fixed: self.mean.fixed,
            ..FitQuantity::bounded(value, lower, upper)
        };
    }

    pub fn set_amplitude_guess(&mut self, value: f64, lower: f64, upper: f64) {
        self.amplitude = FitQuantity {
            fixed: self.amplitude.fixed,
            ..FitQuantity::bounded(value, lower, upper)
        };
    }

    pub fn set_width_guess(&mut self, value: f64, lower: f64, upper: f64) {
        self.width = FitQuantity {
            fixed: self.width.fixed,
            ..FitQuantity::bounded(value, lower, upper)
        };
    }

    /// `A{f|-}{l|-}|W{f|-}{l|-}|M{f|-}{l|-}`
    pub fn status(&self) -> String {
        format!(
            "A{}|W{}|M{}",
            self.amplitude.flags(),
            self.width.flags(),
            self.mean.flags()
        )
    }
}
