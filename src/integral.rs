//! Background-subtracted counting integrals and centroids.
//!
//! An integral sums histogram contents over `[lb, ub]`, scaling the two
//! boundary bins by the fraction of each bin inside the range, and subtracts
//! a polynomial background taken either from a fit or from two explicit end
//! points. The Gaussian model plays no part.

use serde::Serialize;

use crate::background::BackgroundPolynomial;
use crate::diagnostics::Diagnostics;
use crate::error::{Result, SpectrumFitError};
use crate::histogram::Histogram;

/// Largest step that ends the crossing search.
const CROSSING_TOLERANCE: f64 = 1e-5;
const CROSSING_MAX_ITERATIONS: usize = 100;

/// Where an integral's background comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum BackgroundSource {
    /// Copied from the fit with this index each time integrals are computed.
    Fit(usize),
    /// Straight line through `(lb, y1)` and `(ub, y2)`, set once.
    Coordinates { y1: f64, y2: f64 },
}

/// Result of one integral calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntegralMeasurement {
    /// Counts in the range before background subtraction.
    pub raw: f64,
    pub background: f64,
    pub integral: f64,
    pub integral_error: f64,
    /// `None` when the background-subtracted weights sum to zero.
    pub centroid: Option<f64>,
    pub centroid_error: Option<f64>,
}

/// A counting integral over `[lb, ub]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpectrumIntegral {
    lb: f64,
    ub: f64,
    source: BackgroundSource,
    background: BackgroundPolynomial,
    measurement: Option<IntegralMeasurement>,
}

impl SpectrumIntegral {
    /// An integral whose background follows fit `fit`, of the given order.
    pub fn from_fit(lb: f64, ub: f64, fit: usize, order: usize) -> Self {
        Self {
            lb,
            ub,
            source: BackgroundSource::Fit(fit),
            background: BackgroundPolynomial::new(order),
            measurement: None,
        }
    }

    /// An integral with a linear background through `(lb, y1)` and `(ub, y2)`.
    pub fn from_coordinates(lb: f64, ub: f64, y1: f64, y2: f64) -> Result<Self> {
        if lb == ub {
            return Err(SpectrumFitError::InvalidInput(format!(
                "integral bounds coincide at {}",
                lb
            )));
        }
        let slope = (y2 - y1) / (ub - lb);
        let intercept = (y1 * ub - y2 * lb) / (ub - lb);
        Ok(Self {
            lb,
            ub,
            source: BackgroundSource::Coordinates { y1, y2 },
            background: BackgroundPolynomial::from_coefficients(&[intercept, slope]),
            measurement: None,
        })
    }

    pub fn lb(&self) -> f64 {
        self.lb
    }

    pub fn ub(&self) -> f64 {
        self.ub
    }

    pub fn source(&self) -> BackgroundSource {
        self.source
    }

    /// Index of the fit supplying the background, if any.
    pub fn fit(&self) -> Option<usize> {
        match self.source {
            BackgroundSource::Fit(index) => Some(index),
            BackgroundSource::Coordinates { .. } => None,
        }
    }

    pub fn is_background_from_coordinates(&self) -> bool {
        matches!(self.source, BackgroundSource::Coordinates { .. })
    }

    /// `'C'` for a coordinate background, `'F'` for a fit background.
    pub fn status(&self) -> char {
        if self.is_background_from_coordinates() {
            'C'
        } else {
            'F'
        }
    }

    pub fn background(&self) -> &BackgroundPolynomial {
        &self.background
    }

    pub fn background_mut(&mut self) -> &mut BackgroundPolynomial {
        &mut self.background
    }

    pub fn measurement(&self) -> Option<&IntegralMeasurement> {
        self.measurement.as_ref()
    }

    /// End points of the background line over the integration range.
    pub fn background_line(&self) -> ((f64, f64), (f64, f64)) {
        (
            (self.lb, self.background.evaluate(self.lb)),
            (self.ub, self.background.evaluate(self.ub)),
        )
    }

    /// Compute and store the integral and centroid.
    pub fn calculate(
        &mut self,
        histogram: &dyn Histogram,
        diag: &mut Diagnostics,
    ) -> Result<IntegralMeasurement> {
        let (lb, ub) = self.clamped_range(histogram, diag)?;
        let bw = histogram.bin_width();
        let first = histogram.find_bin(lb).unwrap_or(0);
        // The upper axis edge belongs to no bin.
        let last = histogram
            .find_bin(ub)
            .unwrap_or_else(|| histogram.bin_count() - 1);

        let raw = if first == last {
            histogram.bin_content(first) * (ub - lb) / bw
        } else {
            histogram.integral(first + 1, last - 1)
                + histogram.bin_content(first) * (histogram.bin_low_edge(first + 1) - lb) / bw
                + histogram.bin_content(last) * (ub - histogram.bin_low_edge(last)) / bw
        };

        let mut background = 0.0;
        let mut sum_w = 0.0;
        let mut sum_xw = 0.0;
        let mut sum_x = 0.0;
        let mut sum_xx = 0.0;
        let mut sum_n = 0.0;

        for bin in first..=last {
            let x1 = histogram.bin_low_edge(bin).max(lb);
            let x2 = histogram.bin_low_edge(bin + 1).min(ub);
            let fraction = (x2 - x1) / bw;
            let content = histogram.bin_content(bin);
            let contribution = self.bin_background(histogram, bin, x1, x2, fraction);

            background += contribution;

            let w = content * fraction - contribution;
            let centre = histogram.bin_center(bin);
            sum_w += w;
            sum_xw += centre * w;
            sum_x += centre * fraction;
            sum_xx += centre * centre * fraction;
            // Signal share of the bin
            if content > 0.0 {
                sum_n += w / content;
            }
        }

        let (centroid, centroid_error) = if sum_w == 0.0 {
            diag.warn(format!(
                "Integral over [{}, {}] has no net counts; centroid undefined",
                self.lb, self.ub
            ));
            (None, None)
        } else {
            let c = sum_xw / sum_w;
            let variance = sum_xx - 2.0 * c * sum_x + sum_n * c * c;
            (Some(c), Some(variance.max(0.0).sqrt() / sum_w.abs()))
        };

        let measurement = IntegralMeasurement {
            raw,
            background,
            integral: raw - background,
            integral_error: (raw + background).max(0.0).sqrt(),
            centroid,
            centroid_error,
        };
        diag.debug(format!(
            "Integral [{}, {}]: raw {:.3}, background {:.3}, net {:.3}",
            lb, ub, raw, background, measurement.integral
        ));
        self.measurement = Some(measurement);
        Ok(measurement)
    }

    fn clamped_range(&self, histogram: &dyn Histogram, diag: &mut Diagnostics) -> Result<(f64, f64)> {
        if histogram.bin_count() == 0 {
            return Err(SpectrumFitError::InvalidInput(
                "cannot integrate an empty histogram".to_string(),
            ));
        }
        if !(self.lb < self.ub) {
            return Err(SpectrumFitError::InvalidInput(format!(
                "integral lower bound {} is not below upper bound {}",
                self.lb, self.ub
            )));
        }
        let lb = self.lb.max(histogram.x_min());
        let ub = self.ub.min(histogram.x_max());
        if lb >= ub {
            return Err(SpectrumFitError::InvalidInput(format!(
                "integral range [{}, {}] lies outside the histogram axis",
                self.lb, self.ub
            )));
        }
        if lb != self.lb || ub != self.ub {
            diag.warn(format!(
                "Integral range [{}, {}] clipped to the histogram axis [{}, {}]",
                self.lb, self.ub, lb, ub
            ));
        }
        Ok((lb, ub))
    }

    /// Background counts under the part `[x1, x2]` of `bin`.
    fn bin_background(
        &self,
        histogram: &dyn Histogram,
        bin: usize,
        x1: f64,
        x2: f64,
        fraction: f64,
    ) -> f64 {
        let bw = histogram.bin_width();
        let content = histogram.bin_content(bin);
        let y1 = self.background.evaluate(x1);
        let y2 = self.background.evaluate(x2);

        if y1 <= 0.0 && y2 <= 0.0 {
            return 0.0;
        }
        if content < y1 && content < y2 {
            return content * fraction;
        }

        let mut contribution = 0.5 * (y1 + y2) * fraction;
        if content > y1 && content <= y2 {
            let x3 = self
                .crossing(content, histogram.bin_center(bin))
                .clamp(x1, x2);
            contribution -= 0.5 * (x2 - x3) * (y2 - content) / bw;
        } else if content <= y1 && content > y2 {
            let x3 = self
                .crossing(content, histogram.bin_center(bin))
                .clamp(x1, x2);
            contribution -= 0.5 * (x3 - x1) * (y1 - content) / bw;
        }
        contribution
    }

    /// Newton-Raphson search for the `x` where the background equals `y`.
    ///
    /// Returns `guess` when the derivative vanishes.
    fn crossing(&self, y: f64, guess: f64) -> f64 {
        let mut x = guess;
        for _ in 0..CROSSING_MAX_ITERATIONS {
            let slope = self.background.derivative(x);
            if slope == 0.0 || !slope.is_finite() {
                return guess;
            }
            let next = x - (self.background.evaluate(x) - y) / slope;
            if (next - x).abs() < CROSSING_TOLERANCE {
                return next;
            }
            x = next;
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::UniformHistogram;
    use approx::assert_relative_eq;

    fn flat(content: f64) -> UniformHistogram {
        UniformHistogram::from_fn(400, 0.0, 400.0, |_| content).unwrap()
    }

    #[test]
    fn test_flat_background_cancels() {
        let histogram = flat(2.0);
        let mut integral = SpectrumIntegral::from_coordinates(100.0, 200.0, 2.0, 2.0).unwrap();
        let mut diag = Diagnostics::new();
        let m = integral.calculate(&histogram, &mut diag).unwrap();

        assert_relative_eq!(m.raw, 200.0, epsilon = 1e-9);
        assert_relative_eq!(m.background, 200.0, epsilon = 1e-9);
        assert_relative_eq!(m.integral, 0.0, epsilon = 1e-9);
        assert_relative_eq!(m.integral_error, 20.0, epsilon = 1e-9);
        assert_eq!(m.centroid, None);
        assert!(diag.has_warning_containing("centroid undefined"));
    }

    #[test]
    fn test_partial_bin_weights_only_cover_the_window() {
        let histogram = flat(10.0);
        let mut integral = SpectrumIntegral::from_coordinates(10.5, 12.0, 2.0, 2.0).unwrap();
        let mut diag = Diagnostics::new();
        let m = integral.calculate(&histogram, &mut diag).unwrap();

        // Bin 10 is half covered: 5 counts over 1 of background
        assert_relative_eq!(m.integral, 12.0, epsilon = 1e-9);
        assert_relative_eq!(m.centroid.unwrap(), (10.5 * 4.0 + 11.5 * 8.0) / 12.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fractional_boundary_bins() {
        let histogram = flat(4.0);
        let mut integral = SpectrumIntegral::from_coordinates(10.25, 12.5, 0.0, 0.0).unwrap();
        let mut diag = Diagnostics::new();
        let m = integral.calculate(&histogram, &mut diag).unwrap();

        // 0.75 + 1 + 0.5 bins of 4 counts
        assert_relative_eq!(m.raw, 9.0, epsilon = 1e-12);
        assert_relative_eq!(m.background, 0.0);

        let mut inside = SpectrumIntegral::from_coordinates(10.25, 10.75, 0.0, 0.0).unwrap();
        let m = inside.calculate(&histogram, &mut diag).unwrap();
        assert_relative_eq!(m.raw, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_symmetric_peak_centroid() {
        let histogram = UniformHistogram::from_fn(400, 0.0, 400.0, |x| {
            1000.0 * (-0.5 * ((x - 150.0) / 10.0).powi(2)).exp()
        })
        .unwrap();
        let mut integral = SpectrumIntegral::from_fit(100.0, 200.0, 0, 0);
        let mut diag = Diagnostics::new();
        let m = integral.calculate(&histogram, &mut diag).unwrap();

        assert_relative_eq!(m.centroid.unwrap(), 150.0, epsilon = 1e-9);
        assert!(m.centroid_error.unwrap() > 0.0);
        assert_relative_eq!(
            m.integral,
            1000.0 * 10.0 * (2.0 * std::f64::consts::PI).sqrt(),
            max_relative = 1e-3
        );
    }

    #[test]
    fn test_background_above_content_removes_bin() {
        let histogram = flat(1.0);
        let mut integral = SpectrumIntegral::from_coordinates(50.0, 60.0, 5.0, 5.0).unwrap();
        let mut diag = Diagnostics::new();
        let m = integral.calculate(&histogram, &mut diag).unwrap();
        assert_relative_eq!(m.background, m.raw, epsilon = 1e-12);
        assert_relative_eq!(m.integral, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rising_background_crossing_correction() {
        // Background y = x under one bin [4, 6) holding 5 counts
        let histogram = UniformHistogram::from_contents(4.0, 2.0, vec![5.0]).unwrap();
        let mut integral = SpectrumIntegral::from_coordinates(4.0, 6.0, 4.0, 6.0).unwrap();
        let mut diag = Diagnostics::new();
        let m = integral.calculate(&histogram, &mut diag).unwrap();

        // Trapezoid 5 counts less the triangle above the content: 0.5 * 1 * 1 / 2
        assert_relative_eq!(m.background, 5.0 - 0.25, epsilon = 1e-9);
    }

    #[test]
    fn test_crossing_search() {
        let mut integral = SpectrumIntegral::from_fit(0.0, 10.0, 0, 2);
        *integral.background_mut() = BackgroundPolynomial::from_coefficients(&[0.0, 0.0, 1.0]);
        assert_relative_eq!(integral.crossing(4.0, 3.0), 2.0, epsilon = 1e-6);

        *integral.background_mut() = BackgroundPolynomial::from_coefficients(&[3.0]);
        assert_eq!(integral.crossing(4.0, 7.5), 7.5);
    }

    #[test]
    fn test_status_and_line() {
        let integral = SpectrumIntegral::from_coordinates(10.0, 20.0, 1.0, 3.0).unwrap();
        assert_eq!(integral.status(), 'C');
        assert_eq!(integral.fit(), None);
        let ((x1, y1), (x2, y2)) = integral.background_line();
        assert_relative_eq!(x1, 10.0);
        assert_relative_eq!(y1, 1.0, epsilon = 1e-12);
        assert_relative_eq!(x2, 20.0);
        assert_relative_eq!(y2, 3.0, epsilon = 1e-12);

        let integral = SpectrumIntegral::from_fit(10.0, 20.0, 2, 1);
        assert_eq!(integral.status(), 'F');
        assert_eq!(integral.fit(), Some(2));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(SpectrumIntegral::from_coordinates(5.0, 5.0, 0.0, 0.0).is_err());

        let histogram = flat(1.0);
        let mut diag = Diagnostics::new();
        let mut inverted = SpectrumIntegral::from_fit(20.0, 10.0, 0, 0);
        assert!(inverted.calculate(&histogram, &mut diag).is_err());

        let mut outside = SpectrumIntegral::from_fit(500.0, 600.0, 0, 0);
        assert!(outside.calculate(&histogram, &mut diag).is_err());

        let mut clipped = SpectrumIntegral::from_fit(390.0, 410.0, 0, 0);
        let m = clipped.calculate(&histogram, &mut diag).unwrap();
        assert_relative_eq!(m.raw, 10.0, epsilon = 1e-9);
        assert!(diag.has_warning_containing("clipped"));
    }
}
