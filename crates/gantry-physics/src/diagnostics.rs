//! Severity-tagged diagnostic messages.
//!
//! The engine reports every failure (and a few notable events) to a
//! [`DiagnosticSink`] supplied at initialization. [`LogSink`] forwards to the
//! `log` facade; [`MemorySink`] keeps the messages for later inspection.

use std::fmt;
use std::panic::Location;
use std::sync::{Arc, Mutex};

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Informational.
    Info,
    /// Something unexpected that did not stop the operation.
    Warning,
    /// The operation failed.
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        })
    }
}

/// A single message with the source location that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity.
    pub severity: Severity,
    /// Human-readable text.
    pub message: String,
    /// Source file of the reporting call.
    pub file: &'static str,
    /// Source line of the reporting call.
    pub line: u32,
}

impl Diagnostic {
    /// Build a diagnostic located at the caller.
    #[track_caller]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        let location = Location::caller();
        Self {
            severity,
            message: message.into(),
            file: location.file(),
            line: location.line(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] : {}\n    {} @ {}",
            self.severity, self.message, self.file, self.line
        )
    }
}

/// Receiver for engine diagnostics.
pub trait DiagnosticSink: Send {
    /// Handle one diagnostic.
    fn report(&self, diagnostic: &Diagnostic);
}

/// Forwards diagnostics to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl DiagnosticSink for LogSink {
    fn report(&self, diagnostic: &Diagnostic) {
        let level = match diagnostic.severity {
            Severity::Info => log::Level::Info,
            Severity::Warning => log::Level::Warn,
            Severity::Error => log::Level::Error,
        };
        log::log!(
            target: "gantry_physics",
            level,
            "{} ({} @ {})",
            diagnostic.message,
            diagnostic.file,
            diagnostic.line
        );
    }
}

/// Collects diagnostics in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<Diagnostic>>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything reported so far.
    pub fn entries(&self) -> Vec<Diagnostic> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of reported diagnostics at `severity`.
    pub fn count(&self, severity: Severity) -> usize {
        self.entries()
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, diagnostic: &Diagnostic) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push(diagnostic.clone());
    }
}
