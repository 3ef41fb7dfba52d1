//! Finding severity levels.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Severity of a compliance finding, ordered least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Low,
    Medium,
    High,
    Critical,
}

/// Engine level strings and the severity they map to. Matched case-insensitively.
const ENGINE_LEVELS: &[(&str, Severity)] = &[
    ("informational", Severity::Info),
    ("information", Severity::Info),
    ("info", Severity::Info),
    ("low", Severity::Low),
    ("minor", Severity::Low),
    ("warning", Severity::Medium),
    ("moderate", Severity::Medium),
    ("medium", Severity::Medium),
    ("advisory", Severity::Medium),
    ("major", Severity::High),
    ("important", Severity::High),
    ("high", Severity::High),
    ("error", Severity::High),
    ("critical", Severity::Critical),
    ("severe", Severity::Critical),
    ("fatal", Severity::Critical),
];

impl Severity {
    /// All levels, least severe first.
    pub const ALL: [Severity; 5] = [
        Severity::Info,
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// Numeric rank used for threshold comparisons (INFO=0 .. CRITICAL=4).
    pub fn rank(&self) -> u8 {
        match self {
            Severity::Info => 0,
            Severity::Low => 1,
            Severity::Medium => 2,
            Severity::High => 3,
            Severity::Critical => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// Map a level reported by a rule engine onto a severity.
    ///
    /// Accepts the synonyms engines commonly emit ("warning", "error", "fatal", ...).
    /// Anything unrecognised is treated as [`Severity::Info`].
    pub fn from_engine_level(level: &str) -> Severity {
        let normalized = level.trim().to_ascii_lowercase();
        ENGINE_LEVELS
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|(_, severity)| *severity)
            .unwrap_or(Severity::Info)
    }

    /// True when `self` is at least as severe as `threshold`.
    pub fn meets(&self, threshold: Severity) -> bool {
        self.rank() >= threshold.rank()
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not one of the five canonical level names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown severity '{0}' (expected one of: info, low, medium, high, critical)")]
pub struct ParseSeverityError(pub String);

impl FromStr for Severity {
    type Err = ParseSeverityError;

    /// Parses canonical level names only, ignoring case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Severity::ALL
            .iter()
            .find(|severity| severity.as_str() == normalized)
            .copied()
            .ok_or_else(|| ParseSeverityError(s.to_string()))
    }
}
