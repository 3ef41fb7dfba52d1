//! Validation pipeline: load → normalize → evaluate.

use crate::engine::RuleEngine;
use crate::error::ComplianceResult;
use crate::model::{Finding, NormalizedResource, Severity};
use crate::normalize::ResourceNormalizer;
use crate::plan::{PlanLoader, PlanLoaderOptions};
use crate::process::ProcessRunner;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Everything a run produced. Findings refer to `resources` by address.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub resources: Vec<NormalizedResource>,
    pub findings: Vec<Finding>,
    pub metadata: BTreeMap<String, Value>,
}

impl ValidationResult {
    pub fn resource(&self, address: &str) -> Option<&NormalizedResource> {
        self.resources.iter().rev().find(|r| r.address == address)
    }
}

/// Runs the full pipeline with a fixed process runner and rule engine.
///
/// Nothing is cached between calls: every [`validate`](Self::validate) reloads the plan
/// and re-invokes the engine.
pub struct ComplianceService {
    runner: Arc<dyn ProcessRunner>,
    engine: Box<dyn RuleEngine>,
    normalizer: ResourceNormalizer,
}

impl ComplianceService {
    pub fn new(runner: Arc<dyn ProcessRunner>, engine: Box<dyn RuleEngine>) -> Self {
        Self {
            runner,
            engine,
            normalizer: ResourceNormalizer::new(),
        }
    }

    pub fn validate(
        &self,
        options: &PlanLoaderOptions,
        threshold: Option<Severity>,
    ) -> ComplianceResult<ValidationResult> {
        let loader = PlanLoader::new(options.clone(), Arc::clone(&self.runner));
        let document = loader.load_plan()?;
        let resources = self.normalizer.normalize_document(&document);
        info!(
            resources = resources.len(),
            modules = document.module_count(),
            "normalized plan"
        );

        let findings = self.engine.evaluate(&resources, threshold)?;

        let metadata = BTreeMap::from([
            (
                "working_dir".to_string(),
                Value::String(options.working_dir.display().to_string()),
            ),
            ("resource_count".to_string(), Value::from(resources.len())),
            (
                "module_count".to_string(),
                Value::from(document.module_count()),
            ),
        ]);

        Ok(ValidationResult {
            resources,
            findings,
            metadata,
        })
    }
}
