//! Rule-evaluation findings.

use super::Severity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single result reported by a rule engine.
///
/// `resource` is the address of the matched [`super::NormalizedResource`], not the resource
/// itself; resolve it against the run's resources when rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub rule_id: String,
    pub message: String,
    pub severity: Severity,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Finding {
    /// Build a finding; an empty message falls back to the rule id.
    pub fn new(rule_id: impl Into<String>, message: impl Into<String>, severity: Severity) -> Self {
        let rule_id = rule_id.into();
        let message = message.into();
        let message = if message.trim().is_empty() {
            rule_id.clone()
        } else {
            message
        };
        Self {
            rule_id,
            message,
            severity,
            resource: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_resource(mut self, address: impl Into<String>) -> Self {
        self.resource = Some(address.into());
        self
    }

    /// Attach a metadata entry. Null values are dropped.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        if !value.is_null() {
            self.metadata.insert(key.into(), value);
        }
        self
    }
}

/// Keep findings at or above `threshold`, preserving order. `None` keeps everything.
pub fn filter_by_threshold(findings: Vec<Finding>, threshold: Option<Severity>) -> Vec<Finding> {
    match threshold {
        None => findings,
        Some(threshold) => findings
            .into_iter()
            .filter(|f| f.severity.meets(threshold))
            .collect(),
    }
}
