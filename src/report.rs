//! Tabular summary of a fitted spectrum.
//!
//! Peak and integral rows are interleaved by energy (peak mean against
//! integral centroid), followed by one summary line per fit. The same records
//! serialize to JSON.

use std::io::Write;

use serde::Serialize;

use crate::error::Result;
use crate::integral::SpectrumIntegral;
use crate::peak::Peak;
use crate::spectrum::Spectrum;

/// Column width of the text table.
pub const COLUMN_WIDTH: usize = 10;

const HEADER: [&str; 10] = [
    "Peak num",
    "Amplitude",
    "Error",
    "Sigma",
    "Error",
    "Mean",
    "Error",
    "Area",
    "Error",
    "Info",
];

/// Results for one peak.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakRow {
    pub index: usize,
    pub amplitude: Option<f64>,
    pub amplitude_error: Option<f64>,
    pub width: Option<f64>,
    pub width_error: Option<f64>,
    pub mean: Option<f64>,
    pub mean_error: Option<f64>,
    pub area: Option<f64>,
    pub area_error: Option<f64>,
    pub status: String,
}

impl PeakRow {
    fn new(index: usize, peak: &Peak) -> Self {
        Self {
            index,
            amplitude: peak.amplitude.value,
            amplitude_error: peak.amplitude.error,
            width: peak.width.value,
            width_error: peak.width.error,
            mean: peak.mean.value,
            mean_error: peak.mean.error,
            area: peak.area,
            area_error: peak.area_error,
            status: peak.status(),
        }
    }

    fn position(&self) -> f64 {
        self.mean.unwrap_or(0.0)
    }

    fn cells(&self) -> Vec<String> {
        vec![
            format!("P.{:02}", self.index),
            optional(self.amplitude),
            optional(self.amplitude_error),
            optional(self.width),
            optional(self.width_error),
            optional(self.mean),
            optional(self.mean_error),
            optional(self.area),
            optional(self.area_error),
            self.status.clone(),
        ]
    }
}

/// Results for one integral. Centroid and integral are `None` until calculated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegralRow {
    pub index: usize,
    pub lb: f64,
    pub ub: f64,
    pub centroid: Option<f64>,
    pub centroid_error: Option<f64>,
    pub integral: Option<f64>,
    pub integral_error: Option<f64>,
    pub status: char,
}

impl IntegralRow {
    fn new(index: usize, integral: &SpectrumIntegral) -> Self {
        let measurement = integral.measurement();
        Self {
            index,
            lb: integral.lb(),
            ub: integral.ub(),
            centroid: measurement.and_then(|m| m.centroid),
            centroid_error: measurement.and_then(|m| m.centroid_error),
            integral: measurement.map(|m| m.integral),
            integral_error: measurement.map(|m| m.integral_error),
            status: integral.status(),
        }
    }

    /// Centroid, or the window centre when it is undefined.
    fn position(&self) -> f64 {
        self.centroid.unwrap_or(0.5 * (self.lb + self.ub))
    }

    fn cells(&self) -> Vec<String> {
        vec![
            format!("I.{:02}", self.index),
            String::new(),
            String::new(),
            number(self.lb),
            number(self.ub),
            optional(self.centroid),
            optional(self.centroid_error),
            optional(self.integral),
            optional(self.integral_error),
            self.status.to_string(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReportRow {
    Peak(PeakRow),
    Integral(IntegralRow),
}

impl ReportRow {
    fn cells(&self) -> Vec<String> {
        match self {
            ReportRow::Peak(row) => row.cells(),
            ReportRow::Integral(row) => row.cells(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BackgroundTerm {
    pub value: f64,
    pub error: f64,
}

/// Supplementary line for one fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitSummary {
    pub index: usize,
    /// Spectrum indices of the peaks in the fit.
    pub peaks: Vec<usize>,
    pub background: Vec<BackgroundTerm>,
    pub background_info: String,
    pub reduced_chi_square: f64,
    pub valid: bool,
}

impl FitSummary {
    fn write<W: Write>(&self, out: &mut W) -> Result<()> {
        let peaks = self
            .peaks
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(out, "Fit {} peaks:\t[{}]\tBackground:\t", self.index, peaks)?;
        for term in &self.background {
            write!(
                out,
                "{:<w$}\t{:<w$}\t",
                number(term.value),
                number(term.error),
                w = COLUMN_WIDTH
            )?;
        }
        writeln!(
            out,
            "{:<w$}\tRed. chi-sq.\t{}",
            self.background_info,
            number(self.reduced_chi_square),
            w = COLUMN_WIDTH
        )?;

        if !self.valid {
            let cells: Vec<&str> = (0..HEADER.len())
                .map(|column| if column == 5 { "FIT INVALID" } else { "***  ***" })
                .collect();
            write_cells(out, &cells)?;
        }
        Ok(())
    }
}

/// Everything written for a spectrum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitReport {
    pub rows: Vec<ReportRow>,
    pub fits: Vec<FitSummary>,
}

impl FitReport {
    pub fn from_spectrum(spectrum: &Spectrum) -> Self {
        let peaks: Vec<PeakRow> = spectrum
            .peaks()
            .iter()
            .enumerate()
            .map(|(i, peak)| PeakRow::new(i, peak))
            .collect();
        let integrals: Vec<IntegralRow> = spectrum
            .integrals()
            .iter()
            .enumerate()
            .map(|(i, integral)| IntegralRow::new(i, integral))
            .collect();

        // Merge the two lists, each already in configuration order.
        let mut rows = Vec::with_capacity(peaks.len() + integrals.len());
        let mut peaks = peaks.into_iter().peekable();
        let mut integrals = integrals.into_iter().peekable();
        loop {
            let take_peak = match (peaks.peek(), integrals.peek()) {
                (Some(p), Some(i)) => p.position() < i.position(),
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            let row = if take_peak {
                peaks.next().map(ReportRow::Peak)
            } else {
                integrals.next().map(ReportRow::Integral)
            };
            rows.extend(row);
        }

        let fits = spectrum
            .fits()
            .iter()
            .enumerate()
            .map(|(index, fit)| {
                let background = fit.background();
                FitSummary {
                    index,
                    peaks: fit.peaks().to_vec(),
                    background: (0..=background.order())
                        .map(|order| BackgroundTerm {
                            value: background.coefficient(order),
                            error: background.coefficient_error(order),
                        })
                        .collect(),
                    background_info: background.info_string(),
                    reduced_chi_square: fit.reduced_chi_square(),
                    valid: fit.is_valid(),
                }
            })
            .collect();

        Self { rows, fits }
    }

    pub fn write_table<W: Write>(&self, out: &mut W) -> Result<()> {
        write_cells(out, &HEADER)?;
        for row in &self.rows {
            write_cells(out, &row.cells())?;
        }
        for fit in &self.fits {
            fit.write(out)?;
        }
        Ok(())
    }

    pub fn to_table_string(&self) -> Result<String> {
        let mut buffer = Vec::new();
        self.write_table(&mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Pads every cell but the last, so rows carry no trailing whitespace.
fn write_cells<W: Write, S: AsRef<str>>(out: &mut W, cells: &[S]) -> Result<()> {
    let last = cells.len().saturating_sub(1);
    let line = cells
        .iter()
        .enumerate()
        .map(|(i, cell)| {
            if i == last {
                cell.as_ref().to_string()
            } else {
                format!("{:<w$}", cell.as_ref(), w = COLUMN_WIDTH)
            }
        })
        .collect::<Vec<_>>()
        .join("\t");
    writeln!(out, "{}", line)?;
    Ok(())
}

fn optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), number)
}

/// Six significant digits, trailing zeros dropped.
fn number(value: f64) -> String {
    if value == 0.0 || !value.is_finite() {
        return format!("{}", value);
    }
    let magnitude = value.abs().log10().floor() as i32;
    if !(-5..6).contains(&magnitude) {
        return format!("{:.5e}", value);
    }
    let decimals = (5 - magnitude).max(0) as usize;
    let text = format!("{:.*}", decimals, value);
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::fit::Fit;
    use crate::histogram::UniformHistogram;
    use crate::peak::FitQuantity;
    use std::sync::Arc;

    fn spectrum() -> Spectrum {
        let histogram = UniformHistogram::from_fn(100, 0.0, 1000.0, |_| 10.0).unwrap();
        let mut spectrum = Spectrum::new(Arc::new(histogram));
        let mut low = Peak::at(100.0);
        low.amplitude = FitQuantity {
            error: Some(0.5),
            ..FitQuantity::new(25.0)
        };
        low.area = Some(62.665706865775);
        spectrum.add_peak(low);
        spectrum.add_peak(Peak::at(600.0));
        spectrum.add_integral(SpectrumIntegral::from_coordinates(300.0, 400.0, 0.0, 0.0).unwrap());
        spectrum.add_integral(SpectrumIntegral::from_coordinates(800.0, 900.0, 0.0, 0.0).unwrap());
        spectrum.add_fit(Fit::new(1).with_range(0.0, 1000.0));
        spectrum
    }

    #[test]
    fn test_number_format() {
        assert_eq!(number(62.665706865775), "62.6657");
        assert_eq!(number(200.0), "200");
        assert_eq!(number(0.5), "0.5");
        assert_eq!(number(-1.25), "-1.25");
        assert_eq!(number(0.0), "0");
        assert_eq!(number(1.0e7), "1.00000e7");
    }

    #[test]
    fn test_rows_interleave_by_energy() {
        let mut spectrum = spectrum();
        let mut diag = Diagnostics::new();
        let histogram = spectrum.histogram_handle();
        for integral in spectrum.integrals.iter_mut() {
            integral.calculate(histogram.as_ref(), &mut diag).unwrap();
        }

        let report = FitReport::from_spectrum(&spectrum);
        let order: Vec<String> = report
            .rows
            .iter()
            .map(|row| match row {
                ReportRow::Peak(p) => format!("P{}", p.index),
                ReportRow::Integral(i) => format!("I{}", i.index),
            })
            .collect();
        assert_eq!(order, vec!["P0", "I0", "P1", "I1"]);

        match &report.rows[3] {
            ReportRow::Integral(row) => {
                assert_eq!(row.status, 'C');
                assert_eq!(row.integral, Some(100.0));
            }
            other => panic!("unexpected row {:?}", other),
        }
    }

    #[test]
    fn test_uncalculated_integral_uses_window_centre() {
        let report = FitReport::from_spectrum(&spectrum());
        match &report.rows[1] {
            ReportRow::Integral(row) => {
                assert_eq!(row.index, 0);
                assert_eq!(row.centroid, None);
                assert_eq!(row.integral, None);
            }
            other => panic!("unexpected row {:?}", other),
        }
    }

    #[test]
    fn test_table_layout() {
        let report = FitReport::from_spectrum(&spectrum());
        let table = report.to_table_string().unwrap();
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].starts_with("Peak num  \tAmplitude \tError     \tSigma"));
        assert!(lines[1].starts_with("P.00      \t25        \t0.5       \t-"));
        assert!(lines[1].contains("62.6657"));
        assert!(lines[1].ends_with("A--|W--|M--"));
        assert!(lines[2].starts_with("I.00      \t          \t          \t300"));
        assert!(lines[2].ends_with("\tC"));
        assert!(table.lines().all(|line| line == line.trim_end()));
        assert!(lines[5].starts_with("Fit 0 peaks:\t[]\tBackground:\t"));
        assert!(lines[5].contains("Red. chi-sq.\t0"));

        let invalid: Vec<&str> = lines[6].split('\t').map(str::trim_end).collect();
        assert_eq!(invalid.len(), 10);
        assert_eq!(invalid[5], "FIT INVALID");
        assert_eq!(invalid[0], "***  ***");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_json_output() {
        let report = FitReport::from_spectrum(&spectrum());
        let json = report.to_json_string().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["rows"][0]["kind"], "peak");
        assert_eq!(value["rows"][1]["kind"], "integral");
        assert_eq!(value["rows"][1]["status"], "C");
        assert_eq!(value["fits"][0]["valid"], false);
        assert_eq!(value["fits"][0]["background"].as_array().unwrap().len(), 2);
    }
}
