//! Module directory discovery.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Files that mark a directory as a Terraform module.
pub const MODULE_FILE_SUFFIXES: &[&str] = &[".tf", ".tf.json"];

/// Terragrunt configuration file; its presence routes a module through terragrunt.
pub const ORCHESTRATOR_CONFIG: &str = "terragrunt.hcl";

/// Tool-internal cache directories that are never scanned.
pub const CACHE_DIRS: &[&str] = &[".terraform", ".terragrunt-cache"];

/// Recursively collect directories under `root` that contain Terraform sources or a
/// terragrunt config. Deduplicated and sorted.
pub fn discover_modules(root: &Path) -> Vec<PathBuf> {
    let mut dirs = BTreeSet::new();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !(entry.depth() > 0 && is_cache_dir(entry)));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable path during module discovery");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if is_module_marker(&name) {
            if let Some(parent) = entry.path().parent() {
                dirs.insert(parent.to_path_buf());
            }
        }
    }

    debug!(root = %root.display(), count = dirs.len(), "module discovery finished");
    dirs.into_iter().collect()
}

/// True when `dir` contains a terragrunt configuration file.
pub fn has_orchestrator_config(dir: &Path) -> bool {
    dir.join(ORCHESTRATOR_CONFIG).is_file()
}

fn is_module_marker(file_name: &str) -> bool {
    file_name == ORCHESTRATOR_CONFIG
        || MODULE_FILE_SUFFIXES
            .iter()
            .any(|suffix| file_name.len() > suffix.len() && file_name.ends_with(suffix))
}

fn is_cache_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && CACHE_DIRS
            .iter()
            .any(|cache| entry.file_name().to_str() == Some(*cache))
}
