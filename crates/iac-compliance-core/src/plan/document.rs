//! Decoded plan documents.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Plan output of one evaluated module directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulePlan {
    /// Path relative to the working directory, `"."` for the working directory itself.
    pub module_path: String,
    pub plan: Value,
}

/// What the loader hands to normalization.
///
/// A single evaluated module produces the plan exactly as `terraform show -json` emits it.
/// Several modules produce `{"modules": [{"module_path": ..., "plan": ...}, ...]}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PlanDocument {
    Single(Value),
    Aggregate { modules: Vec<ModulePlan> },
}

impl PlanDocument {
    /// Classify an arbitrary JSON document.
    ///
    /// Objects with a `modules` list of `{module_path, plan}` entries and no
    /// `resource_changes` are aggregates; everything else is a single plan.
    pub fn from_json(value: Value) -> Self {
        let is_aggregate = value
            .as_object()
            .map(|obj| {
                !obj.contains_key("resource_changes")
                    && obj.get("modules").map(Value::is_array).unwrap_or(false)
            })
            .unwrap_or(false);

        if is_aggregate {
            if let Some(modules) = value
                .get("modules")
                .cloned()
                .and_then(|m| serde_json::from_value::<Vec<ModulePlan>>(m).ok())
            {
                return PlanDocument::Aggregate { modules };
            }
        }
        PlanDocument::Single(value)
    }

    /// Collapse per-module results: exactly one module is returned as its bare plan.
    pub fn from_modules(mut modules: Vec<ModulePlan>) -> Self {
        if modules.len() == 1 {
            if let Some(only) = modules.pop() {
                return PlanDocument::Single(only.plan);
            }
        }
        PlanDocument::Aggregate { modules }
    }

    pub fn module_count(&self) -> usize {
        match self {
            PlanDocument::Single(_) => 1,
            PlanDocument::Aggregate { modules } => modules.len(),
        }
    }

    /// Plans in module order, paired with their module path (`None` for a single plan).
    pub fn plans(&self) -> Vec<(Option<&str>, &Value)> {
        match self {
            PlanDocument::Single(plan) => vec![(None, plan)],
            PlanDocument::Aggregate { modules } => modules
                .iter()
                .map(|m| (Some(m.module_path.as_str()), &m.plan))
                .collect(),
        }
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
