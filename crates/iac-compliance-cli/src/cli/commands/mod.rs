use super::args::ManifestArgs;
use iac_compliance_core::RulePackManager;
use std::path::Path;

mod dispatch;
pub mod github_report;
pub mod packs;
pub mod validate;

pub use dispatch::dispatch;

/// Pack manager honoring `--no-default-manifests`.
pub(crate) fn pack_manager(args: &ManifestArgs) -> RulePackManager {
    if args.no_default_manifests {
        RulePackManager::default()
    } else {
        RulePackManager::with_builtin_defaults()
    }
}

/// Write to `path`, or to stdout when there is none.
pub(crate) fn write_output(content: &str, path: Option<&Path>) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    anyhow::anyhow!("failed to create {}: {}", parent.display(), e)
                })?;
            }
            std::fs::write(path, format!("{content}\n"))
                .map_err(|e| anyhow::anyhow!("failed to write {}: {}", path.display(), e))?;
            eprintln!("Report written to {}", path.display());
        }
        None => println!("{content}"),
    }
    Ok(())
}
