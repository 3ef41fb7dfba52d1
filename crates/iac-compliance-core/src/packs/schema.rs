//! Rule pack model and raw manifest entry handling.

use crate::model::Severity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

/// A named rule pack after all manifests have been merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulePack {
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Engine-side rule module (`--module`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    /// Engine-side rule source path (`--source`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Passed to the engine as `--option KEY=VALUE`, in key order.
    #[serde(default)]
    pub settings: BTreeMap<String, Value>,
    /// Rule id → severity that replaces whatever the engine reports.
    #[serde(default)]
    pub severity_overrides: BTreeMap<String, Severity>,
}

fn default_enabled() -> bool {
    true
}

impl RulePack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            module: None,
            source: None,
            settings: BTreeMap::new(),
            severity_overrides: BTreeMap::new(),
        }
    }

    /// Overlay one manifest entry onto this pack.
    ///
    /// `enabled` is taken whenever the key is present; `module` and `source` only when
    /// non-empty. `settings` and `severity` are merged key by key.
    pub(crate) fn apply(&mut self, entry: &serde_json::Map<String, Value>) {
        if let Some(enabled) = entry.get("enabled") {
            self.enabled = truthy(enabled);
        }
        if let Some(module) = non_empty_string(entry.get("module")) {
            self.module = Some(module);
        }
        if let Some(source) = non_empty_string(entry.get("source")) {
            self.source = Some(source);
        }
        if let Some(Value::Object(settings)) = entry.get("settings") {
            for (key, value) in settings {
                self.settings.insert(key.clone(), value.clone());
            }
        }
        if let Some(Value::Object(severity)) = entry.get("severity") {
            for (rule_id, level) in severity {
                let parsed = level.as_str().and_then(|s| s.parse::<Severity>().ok());
                match parsed {
                    Some(severity) => {
                        self.severity_overrides
                            .insert(rule_id.trim().to_string(), severity);
                    }
                    None => {
                        warn!(pack = %self.name, rule = %rule_id, level = %level, "ignoring unknown severity override");
                    }
                }
            }
        }
    }

    /// Settings rendered as engine `KEY=VALUE` option strings.
    ///
    /// String values are used verbatim; other values are written as compact JSON.
    pub fn option_args(&self) -> Vec<String> {
        self.settings
            .iter()
            .map(|(key, value)| match value {
                Value::String(s) => format!("{}={}", key, s),
                other => format!("{}={}", key, other),
            })
            .collect()
    }
}

/// Truthiness of a manifest scalar: `false`, `null`, `0`, `""` and empty collections are false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Name of a manifest entry, if it has a usable one.
pub(crate) fn entry_name(entry: &serde_json::Map<String, Value>) -> Option<String> {
    non_empty_string(entry.get("name"))
}
