//! Rule packs: named engine rule sources with settings and severity overrides.

mod loader;
mod schema;

pub use loader::{ManifestSource, RulePackError, RulePackManager};
pub use schema::RulePack;

/// Built-in manifests embedded at compile time, applied as defaults.
///
/// Format: (manifest_name, manifest_content). Stored as JSON so they load with or
/// without the `yaml` feature.
pub static BUILTIN_MANIFESTS: &[(&str, &str)] = &[(
    "psrule.azure-baseline",
    include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/packs/psrule.azure-baseline.json"
    )),
)];
