//! Error types for a validation run.

use crate::engine::RuleEvaluationError;
use crate::packs::RulePackError;
use crate::plan::PlanLoadError;
use crate::process::ProcessError;

/// Any failure that ends a validation run without a report.
#[derive(Debug, thiserror::Error)]
pub enum ComplianceError {
    /// Plan could not be read, decoded or generated.
    #[error("plan load failed: {0}")]
    PlanLoad(#[from] PlanLoadError),

    /// Rule pack manifests could not be resolved.
    #[error("rule pack error: {0}")]
    RulePack(#[from] RulePackError),

    /// The rule engine failed or produced unreadable output.
    #[error("rule evaluation failed: {0}")]
    RuleEvaluation(#[from] RuleEvaluationError),

    /// A command outside plan loading and evaluation failed.
    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl ComplianceError {
    /// Exit code for CLI. Tooling failures share one code, distinct from "findings present".
    pub fn exit_code(&self) -> i32 {
        2
    }

    /// Stderr of the external command behind this error, if any.
    pub fn command_stderr(&self) -> Option<&str> {
        let process = match self {
            Self::PlanLoad(PlanLoadError::Process(e)) => e,
            Self::RuleEvaluation(RuleEvaluationError::Process(e)) => e,
            Self::RuleEvaluation(RuleEvaluationError::Failed { message, .. }) => {
                return Some(message.as_str())
            }
            Self::Process(e) => e,
            _ => return None,
        };
        Some(process.stderr()).filter(|s| !s.is_empty())
    }
}

/// Result type for validation runs.
pub type ComplianceResult<T> = Result<T, ComplianceError>;
