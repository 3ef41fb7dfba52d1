//! Canonical resource-change records.

use serde::{Deserialize, Serialize};

/// Planned action for a resource, derived from the plan's raw action list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeAction {
    #[serde(rename = "no-op")]
    Noop,
    #[serde(rename = "create")]
    Create,
    #[serde(rename = "update")]
    Update,
    #[serde(rename = "delete")]
    Delete,
    #[serde(rename = "replace")]
    Replace,
    #[serde(rename = "unknown")]
    Unknown,
}

impl ChangeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeAction::Noop => "no-op",
            ChangeAction::Create => "create",
            ChangeAction::Update => "update",
            ChangeAction::Delete => "delete",
            ChangeAction::Replace => "replace",
            ChangeAction::Unknown => "unknown",
        }
    }

    /// Classify a raw plan action list.
    ///
    /// Single-element lists map directly; `delete` + `create` in either order is a
    /// replacement. Empty lists and anything else are `Unknown`.
    pub fn classify<S: AsRef<str>>(actions: &[S]) -> ChangeAction {
        let actions: Vec<&str> = actions.iter().map(AsRef::as_ref).collect();
        match actions.as_slice() {
            [] => ChangeAction::Unknown,
            ["no-op"] => ChangeAction::Noop,
            ["create"] => ChangeAction::Create,
            ["update"] => ChangeAction::Update,
            ["delete"] => ChangeAction::Delete,
            _ if is_replace(&actions) => ChangeAction::Replace,
            _ => ChangeAction::Unknown,
        }
    }
}

/// Set comparison against {"delete", "create"}; duplicates collapse.
fn is_replace(actions: &[&str]) -> bool {
    actions.iter().all(|a| *a == "delete" || *a == "create")
        && actions.contains(&"delete")
        && actions.contains(&"create")
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `count` / `for_each` key of a resource instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceIndex {
    Number(i64),
    Key(String),
}

impl ResourceIndex {
    /// Accepts integers and strings; every other JSON shape yields `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(ResourceIndex::Number),
            serde_json::Value::String(s) => Some(ResourceIndex::Key(s.clone())),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceIndex::Number(n) => write!(f, "{}", n),
            ResourceIndex::Key(k) => write!(f, "{:?}", k),
        }
    }
}

fn default_mode() -> String {
    "managed".to_string()
}

/// One resource change from a plan, in canonical shape.
///
/// This is also the document handed to rule engines: serializing it yields the flat
/// `{address, module_path, type, name, provider_name, mode, index, change_action, before, after}`
/// object they consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResource {
    pub address: String,
    #[serde(default)]
    pub module_path: Vec<String>,
    #[serde(rename = "type", default)]
    pub resource_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub provider_name: Option<String>,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub index: Option<ResourceIndex>,
    pub change_action: ChangeAction,
    #[serde(default)]
    pub before: Option<serde_json::Value>,
    #[serde(default)]
    pub after: Option<serde_json::Value>,
}

impl NormalizedResource {
    /// True for resources declared in the root module.
    pub fn is_module_root(&self) -> bool {
        self.module_path.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn classify_single_actions() {
        assert_eq!(ChangeAction::classify(&["no-op"]), ChangeAction::Noop);
        assert_eq!(ChangeAction::classify(&["create"]), ChangeAction::Create);
        assert_eq!(ChangeAction::classify(&["update"]), ChangeAction::Update);
        assert_eq!(ChangeAction::classify(&["delete"]), ChangeAction::Delete);
    }

    #[test]
    fn classify_replace_either_order() {
        assert_eq!(
            ChangeAction::classify(&["delete", "create"]),
            ChangeAction::Replace
        );
        assert_eq!(
            ChangeAction::classify(&["create", "delete"]),
            ChangeAction::Replace
        );
    }

    #[test]
    fn classify_everything_else_is_unknown() {
        let empty: [&str; 0] = [];
        assert_eq!(ChangeAction::classify(&empty), ChangeAction::Unknown);
        assert_eq!(ChangeAction::classify(&["read"]), ChangeAction::Unknown);
        assert_eq!(
            ChangeAction::classify(&["create", "update"]),
            ChangeAction::Unknown
        );
        assert_eq!(
            ChangeAction::classify(&["create", "create"]),
            ChangeAction::Unknown
        );
    }

    #[test]
    fn serializes_as_flat_engine_document() {
        let resource = NormalizedResource {
            address: "module.app.aws_s3_bucket.logs[\"a\"]".into(),
            module_path: vec!["app".into()],
            resource_type: "aws_s3_bucket".into(),
            name: "logs".into(),
            provider_name: Some("registry.terraform.io/hashicorp/aws".into()),
            mode: "managed".into(),
            index: Some(ResourceIndex::Key("a".into())),
            change_action: ChangeAction::Replace,
            before: None,
            after: Some(json!({"acl": "private"})),
        };

        let value = serde_json::to_value(&resource).unwrap();
        assert_eq!(value["type"], "aws_s3_bucket");
        assert_eq!(value["change_action"], "replace");
        assert_eq!(value["index"], "a");
        assert_eq!(value["module_path"], json!(["app"]));
        assert!(value["before"].is_null());
        assert!(!resource.is_module_root());
    }

    #[test]
    fn index_accepts_numbers_and_strings_only() {
        assert_eq!(
            ResourceIndex::from_json(&json!(3)),
            Some(ResourceIndex::Number(3))
        );
        assert_eq!(
            ResourceIndex::from_json(&json!("eu")),
            Some(ResourceIndex::Key("eu".into()))
        );
        assert_eq!(ResourceIndex::from_json(&json!(null)), None);
        assert_eq!(ResourceIndex::from_json(&json!([1])), None);
    }
}
