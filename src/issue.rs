//! Issue model shared by validators, fixers, and the review loop.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a validation finding, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "INFO",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
            Severity::Critical => "CRITICAL",
        }
    }

    /// ERROR and CRITICAL findings block completion; WARNING and INFO never do.
    pub fn is_blocking(&self) -> bool {
        matches!(self, Severity::Error | Severity::Critical)
    }

    /// Tolerant parse used when severities arrive as plain text.
    ///
    /// Collapses namespaced reprs like `Severity.WARNING` to the bare level
    /// and ignores case. Returns `None` for anything unrecognized so callers
    /// can decide how to classify it.
    pub fn parse_lenient(text: &str) -> Option<Severity> {
        let bare = text.trim();
        let bare = bare.rsplit('.').next().unwrap_or(bare);
        match bare.to_ascii_uppercase().as_str() {
            "INFO" => Some(Severity::Info),
            "WARNING" => Some(Severity::Warning),
            "ERROR" => Some(Severity::Error),
            "CRITICAL" => Some(Severity::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single finding produced by a validator.
///
/// Message and field may be empty or absent; consumers substitute neutral
/// defaults rather than failing on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewIssue {
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub line: Option<usize>,
}

impl ReviewIssue {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        ReviewIssue {
            severity,
            message: message.into(),
            field: None,
            line: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    /// Stable key identifying this issue across review iterations.
    pub fn signature(&self) -> String {
        format!("{}: {}", self.severity.as_str(), self.message.trim())
    }

    pub fn field_name(&self) -> &str {
        self.field.as_deref().unwrap_or("")
    }
}

/// Extract the severity level from an issue signature.
///
/// Signatures occasionally carry enum reprs (`Severity.WARNING: ...`) from
/// reviewer payloads; those collapse to the bare name. A prefix that parses
/// to no known level is treated conservatively as blocking.
pub fn signature_is_blocking(signature: &str) -> bool {
    let prefix = signature.split(':').next().unwrap_or(signature);
    match Severity::parse_lenient(prefix) {
        Some(severity) => severity.is_blocking(),
        None => true,
    }
}
