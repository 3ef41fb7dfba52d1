//! Compliance checks for Terraform and Terragrunt plans.
//!
//! The pipeline has four stages, each usable on its own:
//!
//! - [`plan`]: obtain a decoded plan from a JSON artifact, a binary plan file, or by
//!   running `terraform`/`terragrunt` over discovered module directories
//! - [`normalize`]: turn `resource_changes` into [`NormalizedResource`] records
//! - [`packs`]: merge rule-pack manifests into the enabled pack set
//! - [`engine`]: evaluate resources with a [`RuleEngine`] and collect [`Finding`]s
//!
//! [`ComplianceService`] runs them in order and [`report`] renders the outcome.
//!
//! # Quick Start
//!
//! ```no_run
//! use iac_compliance_core::{
//!     ComplianceService, PlanLoaderOptions, ProcessRuleEngine, Severity, SystemRunner,
//!     ValidationReport,
//! };
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let runner = Arc::new(SystemRunner::new());
//! let engine = ProcessRuleEngine::new(runner.clone());
//! let service = ComplianceService::new(runner, Box::new(engine));
//!
//! let options = PlanLoaderOptions::new("infra").with_plan_json("plan.json");
//! let result = service.validate(&options, Some(Severity::Medium))?;
//! let report = ValidationReport::from_result(&result);
//! println!("{}", report.render_json()?);
//! # Ok(())
//! # }
//! ```
//!
//! All external commands go through a [`ProcessRunner`], so tests can substitute a fake.

pub mod engine;
pub mod error;
pub mod model;
pub mod normalize;
pub mod packs;
pub mod plan;
pub mod process;
pub mod report;
pub mod service;

// Re-export main types
pub use engine::{ProcessRuleEngine, RuleEngine, RuleEvaluationError};
pub use error::{ComplianceError, ComplianceResult};
pub use model::{
    filter_by_threshold, ChangeAction, Finding, NormalizedResource, ResourceIndex, Severity,
};
pub use normalize::ResourceNormalizer;
pub use packs::{ManifestSource, RulePack, RulePackError, RulePackManager};
pub use plan::{ModulePlan, PlanDocument, PlanLoadError, PlanLoader, PlanLoaderOptions};
pub use process::{Invocation, ProcessError, ProcessOutput, ProcessRunner, SystemRunner};
pub use report::ValidationReport;
pub use service::{ComplianceService, ValidationResult};
