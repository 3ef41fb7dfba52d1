//! Validation reports and their renderers.
//!
//! [`ValidationReport`] is the document handed to downstream consumers:
//!
//! ```json
//! {
//!   "metadata": {...},
//!   "summary": {"total_findings": 2, "highest_severity": "high", "counts": {"info": 0, ...}},
//!   "findings": [{"rule_id": ..., "message": ..., "severity": ..., "resource": {...} | null, "metadata": {...}}]
//! }
//! ```

pub mod console;
pub mod github;

use crate::model::{ChangeAction, Finding, NormalizedResource, ResourceIndex, Severity};
use crate::service::ValidationResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Resource fields carried into a report (state documents are left out).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSummary {
    pub address: String,
    pub module_path: Vec<String>,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub provider_name: Option<String>,
    pub mode: String,
    pub index: Option<ResourceIndex>,
    pub change_action: ChangeAction,
}

impl From<&NormalizedResource> for ResourceSummary {
    fn from(r: &NormalizedResource) -> Self {
        Self {
            address: r.address.clone(),
            module_path: r.module_path.clone(),
            resource_type: r.resource_type.clone(),
            name: r.name.clone(),
            provider_name: r.provider_name.clone(),
            mode: r.mode.clone(),
            index: r.index.clone(),
            change_action: r.change_action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportFinding {
    pub rule_id: String,
    pub message: String,
    pub severity: Severity,
    pub resource: Option<ResourceSummary>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_findings: usize,
    pub highest_severity: Option<Severity>,
    /// Every level, zero-filled.
    pub counts: BTreeMap<Severity, usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationReport {
    pub metadata: BTreeMap<String, Value>,
    pub findings: Vec<ReportFinding>,
}

impl ValidationReport {
    /// Build a report, resolving each finding's resource address against the run's resources.
    pub fn from_result(result: &ValidationResult) -> Self {
        Self::new(
            result.metadata.clone(),
            &result.findings,
            &result.resources,
        )
    }

    pub fn new(
        metadata: BTreeMap<String, Value>,
        findings: &[Finding],
        resources: &[NormalizedResource],
    ) -> Self {
        let by_address: HashMap<&str, &NormalizedResource> = resources
            .iter()
            .map(|r| (r.address.as_str(), r))
            .collect();

        let findings = findings
            .iter()
            .map(|f| ReportFinding {
                rule_id: f.rule_id.clone(),
                message: f.message.clone(),
                severity: f.severity,
                resource: f
                    .resource
                    .as_deref()
                    .and_then(|address| by_address.get(address))
                    .map(|r| ResourceSummary::from(*r)),
                metadata: f.metadata.clone(),
            })
            .collect();

        Self { metadata, findings }
    }

    pub fn highest_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    pub fn counts_by_severity(&self) -> BTreeMap<Severity, usize> {
        let mut counts: BTreeMap<Severity, usize> = Severity::ALL.iter().map(|s| (*s, 0)).collect();
        for finding in &self.findings {
            *counts.entry(finding.severity).or_default() += 1;
        }
        counts
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            total_findings: self.findings.len(),
            highest_severity: self.highest_severity(),
            counts: self.counts_by_severity(),
        }
    }

    /// True when any finding is at or above `fail_on`.
    pub fn exceeds(&self, fail_on: Severity) -> bool {
        self.highest_severity()
            .map(|highest| highest.meets(fail_on))
            .unwrap_or(false)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Pretty-printed JSON document.
    pub fn render_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl Serialize for ValidationReport {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Document<'a> {
            metadata: &'a BTreeMap<String, Value>,
            summary: ReportSummary,
            findings: &'a [ReportFinding],
        }

        Document {
            metadata: &self.metadata,
            summary: self.summary(),
            findings: &self.findings,
        }
        .serialize(serializer)
    }
}
