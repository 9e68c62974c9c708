//! Run-scoped diagnostics.
//!
//! A [`Diagnostics`] value is created by the caller for each run and passed by
//! mutable reference through the orchestration chain. Every message is forwarded
//! to the [`log`] facade; warnings are also retained so callers and tests can
//! inspect what happened during a run.

use std::fmt;

/// Severity of a diagnostic record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Progress and intermediate values.
    Debug,
    /// A suspicious condition; processing continues with a fallback.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Debug => write!(f, "DEBUG"),
            Severity::Warning => write!(f, "WARNING"),
        }
    }
}

/// A single diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
}

/// Collects the diagnostics of one run.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
    keep_debug: bool,
}

impl Diagnostics {
    /// A context that retains warnings only.
    pub fn new() -> Self {
        Self::default()
    }

    /// A context that retains debug records as well as warnings.
    pub fn verbose() -> Self {
        Self {
            records: Vec::new(),
            keep_debug: true,
        }
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("{}", message);
        self.records.push(Diagnostic {
            severity: Severity::Warning,
            message,
        });
    }

    pub fn debug(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::debug!("{}", message);
        if self.keep_debug {
            self.records.push(Diagnostic {
                severity: Severity::Debug,
                message,
            });
        }
    }

    /// All retained records in the order they were emitted.
    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    /// Retained warning messages in the order they were emitted.
    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .filter(|r| r.severity == Severity::Warning)
            .map(|r| r.message.as_str())
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    /// Whether any retained warning contains `needle`.
    pub fn has_warning_containing(&self, needle: &str) -> bool {
        self.warnings().any(|w| w.contains(needle))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
