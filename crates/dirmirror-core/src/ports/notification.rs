//! Notifier port (driven/secondary port)
//!
//! Human-readable status lines emitted by the engine: detected changes,
//! upload and delete results, authorization and connectivity transitions.
//! Delivery is fire-and-forget; a missing consumer must never block or
//! fail the engine.

use std::fmt;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// Timestamp layout used when rendering a [`StatusLine`].
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%y %H:%M:%S";

/// Severity of a status line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// One timestamped status message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusLine {
    pub timestamp: DateTime<Local>,
    pub message: String,
    pub severity: Severity,
}

impl StatusLine {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            message: message.into(),
            severity,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }
}

/// Renders as `dd.mm.yy HH:MM:SS message`.
impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.message
        )
    }
}

// ============================================================================
// INotifier trait
// ============================================================================

/// Port trait for publishing status lines
pub trait INotifier: Send + Sync {
    /// Publishes a line. Must not block and must not fail.
    fn emit(&self, line: StatusLine);

    fn info(&self, message: &str) {
        self.emit(StatusLine::info(message));
    }

    fn error(&self, message: &str) {
        self.emit(StatusLine::error(message));
    }
}
