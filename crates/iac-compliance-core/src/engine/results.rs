//! Parsing of rule engine output.

use crate::model::{Finding, NormalizedResource, Severity};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::RuleEvaluationError;

/// Rule id → severity, merged across enabled packs.
pub type SeverityOverrides = BTreeMap<String, Severity>;

const METADATA_KEYS: [&str; 4] = ["recommendation", "link", "reference", "data"];

/// Parse engine stdout into findings.
///
/// Accepts `{"results": [...]}` or a bare list; any other JSON shape yields no findings.
/// Empty output is treated as `{}`.
pub fn parse_results(
    stdout: &str,
    resources: &[NormalizedResource],
    overrides: &SeverityOverrides,
) -> Result<Vec<Finding>, RuleEvaluationError> {
    let data: Value = if stdout.trim().is_empty() {
        Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_str(stdout).map_err(RuleEvaluationError::InvalidOutput)?
    };

    let entries: &[Value] = match &data {
        Value::Object(obj) => obj
            .get("results")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default(),
        Value::Array(list) => list.as_slice(),
        _ => &[],
    };

    // later resources win on duplicate addresses
    let by_address: HashMap<&str, &NormalizedResource> = resources
        .iter()
        .map(|r| (r.address.as_str(), r))
        .collect();

    Ok(entries
        .iter()
        .filter_map(|entry| parse_entry(entry, &by_address, overrides))
        .collect())
}

fn parse_entry(
    entry: &Value,
    by_address: &HashMap<&str, &NormalizedResource>,
    overrides: &SeverityOverrides,
) -> Option<Finding> {
    let entry = entry.as_object()?;
    let field = |primary: &str, fallback: &str| {
        entry
            .get(primary)
            .filter(|v| is_set(v))
            .or_else(|| entry.get(fallback).filter(|v| is_set(v)))
    };

    let rule_id = field("ruleId", "rule").map(scalar_text)?;
    let rule_id = rule_id.trim();
    if rule_id.is_empty() {
        return None;
    }

    let severity = overrides.get(rule_id).copied().unwrap_or_else(|| {
        field("level", "severity")
            .and_then(Value::as_str)
            .map(Severity::from_engine_level)
            .unwrap_or(Severity::Info)
    });
    let message = field("message", "description")
        .map(scalar_text)
        .unwrap_or_default();

    let mut finding = Finding::new(rule_id, message.trim(), severity);
    if let Some(target) = field("targetId", "target").map(scalar_text) {
        if let Some(resource) = by_address.get(target.as_str()) {
            finding = finding.with_resource(resource.address.clone());
        }
    }
    for key in METADATA_KEYS {
        if let Some(value) = entry.get(key) {
            finding = finding.with_metadata(key, value.clone());
        }
    }
    Some(finding)
}

/// Empty strings, `null`, `false`, zero and empty collections count as unset.
fn is_set(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64() != Some(0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
