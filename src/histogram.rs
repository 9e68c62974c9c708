//! Read-only view of binned spectrum data.
//!
//! The fitter and the integral only consume histograms through the
//! [`Histogram`] trait; [`UniformHistogram`] is a small owned implementation
//! with fixed-width bins.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpectrumFitError};

/// One-dimensional histogram with uniform bins and 0-based bin indices.
pub trait Histogram: Send + Sync {
    fn bin_count(&self) -> usize;

    fn bin_width(&self) -> f64;

    /// Low edge of the first bin.
    fn x_min(&self) -> f64;

    /// High edge of the last bin.
    fn x_max(&self) -> f64 {
        self.x_min() + self.bin_width() * self.bin_count() as f64
    }

    /// The bin containing `x`. A bin owns its low edge; `None` outside the axis.
    fn find_bin(&self, x: f64) -> Option<usize> {
        if !x.is_finite() || x < self.x_min() || x >= self.x_max() {
            return None;
        }
        let index = ((x - self.x_min()) / self.bin_width()).floor() as usize;
        Some(index.min(self.bin_count().saturating_sub(1)))
    }

    fn bin_low_edge(&self, bin: usize) -> f64 {
        self.x_min() + bin as f64 * self.bin_width()
    }

    fn bin_center(&self, bin: usize) -> f64 {
        self.bin_low_edge(bin) + 0.5 * self.bin_width()
    }

    /// Content of `bin`, zero outside the axis.
    fn bin_content(&self, bin: usize) -> f64;

    /// Sum of contents over `first..=last`, clamped to the axis.
    fn integral(&self, first: usize, last: usize) -> f64 {
        let n = self.bin_count();
        if n == 0 || first > last || first >= n {
            return 0.0;
        }
        (first..=last.min(n - 1)).map(|b| self.bin_content(b)).sum()
    }
}

/// Fixed-width histogram owning its bin contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniformHistogram {
    x_min: f64,
    bin_width: f64,
    contents: Vec<f64>,
}

impl UniformHistogram {
    /// An empty histogram of `bins` bins spanning `[x_min, x_max)`.
    pub fn new(bins: usize, x_min: f64, x_max: f64) -> Result<Self> {
        if bins == 0 {
            return Err(SpectrumFitError::InvalidInput(
                "histogram needs at least one bin".to_string(),
            ));
        }
        if !(x_max > x_min) || !x_min.is_finite() || !x_max.is_finite() {
            return Err(SpectrumFitError::InvalidInput(format!(
                "invalid histogram axis [{}, {})",
                x_min, x_max
            )));
        }
        Ok(Self {
            x_min,
            bin_width: (x_max - x_min) / bins as f64,
            contents: vec![0.0; bins],
        })
    }

    /// A histogram whose bin contents are `f(bin_center)`.
    pub fn from_fn(bins: usize, x_min: f64, x_max: f64, f: impl Fn(f64) -> f64) -> Result<Self> {
        let mut hist = Self::new(bins, x_min, x_max)?;
        for bin in 0..bins {
            hist.contents[bin] = f(hist.bin_center(bin));
        }
        Ok(hist)
    }

    /// A histogram with the given contents.
    pub fn from_contents(x_min: f64, bin_width: f64, contents: Vec<f64>) -> Result<Self> {
        let x_max = x_min + bin_width * contents.len() as f64;
        let mut hist = Self::new(contents.len(), x_min, x_max)?;
        hist.contents = contents;
        Ok(hist)
    }

    /// Add `weight` to the bin containing `x`. Returns the bin, if any.
    pub fn fill(&mut self, x: f64, weight: f64) -> Option<usize> {
        let bin = self.find_bin(x)?;
        self.contents[bin] += weight;
        Some(bin)
    }

    pub fn set_bin_content(&mut self, bin: usize, content: f64) -> Result<()> {
        let len = self.contents.len();
        let slot = self
            .contents
            .get_mut(bin)
            .ok_or(SpectrumFitError::IndexOutOfRange {
                what: "histogram bins",
                index: bin,
                len,
            })?;
        *slot = content;
        Ok(())
    }

    pub fn contents(&self) -> &[f64] {
        &self.contents
    }
}

impl Histogram for UniformHistogram {
    fn bin_count(&self) -> usize {
        self.contents.len()
    }

    fn bin_width(&self) -> f64 {
        self.bin_width
    }

    fn x_min(&self) -> f64 {
        self.x_min
    }

    fn bin_content(&self, bin: usize) -> f64 {
        self.contents.get(bin).copied().unwrap_or(0.0)
    }
}
