//! Resource normalization: raw `resource_changes` entries to [`NormalizedResource`].
//!
//! Normalization is lenient. Missing or mistyped fields fall back to their defaults
//! rather than failing the run; a plan without `resource_changes` yields no resources.

use crate::model::{ChangeAction, NormalizedResource, ResourceIndex};
use crate::plan::PlanDocument;
use serde_json::Value;

/// Stateless converter from decoded plan JSON to canonical resource records.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceNormalizer;

impl ResourceNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Normalize a single plan document (the shape `terraform show -json` emits).
    pub fn normalize(&self, plan: &Value) -> Vec<NormalizedResource> {
        plan.get("resource_changes")
            .and_then(Value::as_array)
            .map(|changes| changes.iter().map(normalize_change).collect())
            .unwrap_or_default()
    }

    /// Normalize every module plan in order and concatenate the results.
    ///
    /// Addresses are kept as the plans report them, so two modules declaring the same
    /// resource produce two records with equal addresses.
    pub fn normalize_document(&self, document: &PlanDocument) -> Vec<NormalizedResource> {
        document
            .plans()
            .into_iter()
            .flat_map(|(_, plan)| self.normalize(plan))
            .collect()
    }
}

fn normalize_change(change: &Value) -> NormalizedResource {
    let diff = change.get("change");
    let change_action = diff
        .and_then(|d| d.get("actions"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .map_or(ChangeAction::Unknown, classify_raw);

    NormalizedResource {
        address: string_field(change, "address").unwrap_or_default(),
        module_path: module_path(change.get("module_address").and_then(Value::as_str)),
        resource_type: string_field(change, "type").unwrap_or_default(),
        name: string_field(change, "name").unwrap_or_default(),
        provider_name: string_field(change, "provider_name"),
        mode: string_field(change, "mode").unwrap_or_else(|| "managed".to_string()),
        index: change.get("index").and_then(ResourceIndex::from_json),
        change_action,
        before: state_field(diff, "before"),
        after: state_field(diff, "after"),
    }
}

/// Any non-string entry makes the whole list unclassifiable.
fn classify_raw(actions: &[Value]) -> ChangeAction {
    actions
        .iter()
        .map(Value::as_str)
        .collect::<Option<Vec<&str>>>()
        .map_or(ChangeAction::Unknown, |actions| ChangeAction::classify(&actions))
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn state_field(diff: Option<&Value>, key: &str) -> Option<Value> {
    diff.and_then(|d| d.get(key))
        .filter(|v| !v.is_null())
        .cloned()
}

/// `module.app.module.data` → `["app", "data"]`; absent or empty → root module.
pub fn module_path(module_address: Option<&str>) -> Vec<String> {
    match module_address {
        None | Some("") => Vec::new(),
        Some(address) => address
            .split('.')
            .filter(|segment| *segment != "module")
            .map(str::to_string)
            .collect(),
    }
}

/// Normalize a single plan document with the default normalizer.
pub fn normalize(plan: &Value) -> Vec<NormalizedResource> {
    ResourceNormalizer.normalize(plan)
}

/// Normalize a single or aggregate document with the default normalizer.
pub fn normalize_document(document: &PlanDocument) -> Vec<NormalizedResource> {
    ResourceNormalizer.normalize_document(document)
}
