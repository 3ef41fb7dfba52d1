//! Plan ingestion: artifacts, binary plan files, or generation from source.

mod discovery;
mod document;
mod loader;

pub use discovery::{
    discover_modules, has_orchestrator_config, CACHE_DIRS, MODULE_FILE_SUFFIXES,
    ORCHESTRATOR_CONFIG,
};
pub use document::{ModulePlan, PlanDocument};
pub use loader::{PlanLoadError, PlanLoader, PlanLoaderOptions};
