//! Manifest loading and merging.
//!
//! Manifests are processed in a fixed order (defaults first, then caller-supplied paths
//! in argument order) and merged by pack name. Packs keep the position of their first
//! appearance.

use super::schema::{entry_name, RulePack};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Where a manifest comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    /// Embedded at compile time: `(name, content)`.
    BuiltIn(&'static str, &'static str),
    File(PathBuf),
}

impl std::fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestSource::BuiltIn(name, _) => write!(f, "builtin:{}", name),
            ManifestSource::File(path) => write!(f, "file:{}", path.display()),
        }
    }
}

#[derive(Debug, Error)]
pub enum RulePackError {
    #[error("rule pack manifest not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read rule pack manifest {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid rule pack manifest {source_name}: {message}")]
    Parse {
        source_name: String,
        message: String,
    },

    #[error("rule pack manifest {source_name} is not valid JSON and YAML support is not enabled (build with the `yaml` feature): {message}")]
    YamlUnavailable {
        source_name: String,
        message: String,
    },

    #[error("rule pack manifest must be a mapping: {0}")]
    NotAMapping(String),
}

/// Loads rule-pack manifests and resolves the merged pack list.
#[derive(Debug, Clone, Default)]
pub struct RulePackManager {
    defaults: Vec<ManifestSource>,
}

impl RulePackManager {
    /// Manager whose default manifests are exactly `defaults` (possibly none).
    pub fn new(defaults: Vec<ManifestSource>) -> Self {
        Self { defaults }
    }

    /// Manager seeded with the built-in baseline manifests.
    pub fn with_builtin_defaults() -> Self {
        Self::new(
            super::BUILTIN_MANIFESTS
                .iter()
                .map(|&(name, content)| ManifestSource::BuiltIn(name, content))
                .collect(),
        )
    }

    pub fn defaults(&self) -> &[ManifestSource] {
        &self.defaults
    }

    /// All packs from the default manifests followed by `manifests`, merged by name.
    pub fn load(&self, manifests: &[PathBuf]) -> Result<Vec<RulePack>, RulePackError> {
        let sources = self
            .defaults
            .iter()
            .cloned()
            .chain(manifests.iter().cloned().map(ManifestSource::File));

        let mut packs: Vec<RulePack> = Vec::new();
        for source in sources {
            let document = read_manifest(&source)?;
            merge_manifest(&mut packs, &document, &source);
        }
        debug!(packs = packs.len(), "resolved rule packs");
        Ok(packs)
    }

    /// Like [`load`](Self::load), keeping only enabled packs.
    pub fn enabled_packs(&self, manifests: &[PathBuf]) -> Result<Vec<RulePack>, RulePackError> {
        Ok(self
            .load(manifests)?
            .into_iter()
            .filter(|pack| pack.enabled)
            .collect())
    }
}

fn merge_manifest(packs: &mut Vec<RulePack>, document: &Value, source: &ManifestSource) {
    let Some(entries) = document.get("packs").and_then(Value::as_array) else {
        return;
    };

    for entry in entries {
        let Some(entry) = entry.as_object() else {
            warn!(manifest = %source, "skipping non-mapping pack entry");
            continue;
        };
        let Some(name) = entry_name(entry) else {
            warn!(manifest = %source, "skipping pack entry without a name");
            continue;
        };

        match packs.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.apply(entry),
            None => {
                let mut pack = RulePack::new(name);
                pack.apply(entry);
                packs.push(pack);
            }
        }
    }
}

fn read_manifest(source: &ManifestSource) -> Result<Value, RulePackError> {
    let (content, source_name) = match source {
        ManifestSource::BuiltIn(_, content) => (content.to_string(), source.to_string()),
        ManifestSource::File(path) => (read_manifest_file(path)?, path.display().to_string()),
    };
    let value = if content.trim().is_empty() {
        Value::Null
    } else {
        parse_manifest(&content, &source_name)?
    };

    match value {
        // An empty document counts as an empty mapping.
        Value::Null => Ok(Value::Object(serde_json::Map::new())),
        Value::Object(_) => Ok(value),
        _ => Err(RulePackError::NotAMapping(source.to_string())),
    }
}

fn read_manifest_file(path: &Path) -> Result<String, RulePackError> {
    if !path.exists() {
        return Err(RulePackError::NotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|e| RulePackError::Read {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(feature = "yaml")]
fn parse_manifest(content: &str, source_name: &str) -> Result<Value, RulePackError> {
    serde_yaml::from_str::<Value>(content).map_err(|e| RulePackError::Parse {
        source_name: source_name.to_string(),
        message: format_yaml_error(&e),
    })
}

#[cfg(feature = "yaml")]
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    match e.location() {
        Some(loc) => format!("{} at line {}, column {}", e, loc.line(), loc.column()),
        None => e.to_string(),
    }
}

#[cfg(not(feature = "yaml"))]
fn parse_manifest(content: &str, source_name: &str) -> Result<Value, RulePackError> {
    serde_json::from_str::<Value>(content).map_err(|e| RulePackError::YamlUnavailable {
        source_name: source_name.to_string(),
        message: e.to_string(),
    })
}
