//! Rule engines evaluate normalized resources and report findings.

mod process;
mod results;

pub use process::{ProcessRuleEngine, DEFAULT_ENGINE_BIN, INPUT_TYPE};
pub use results::{parse_results, SeverityOverrides};

use crate::model::{Finding, NormalizedResource, Severity};
use crate::packs::RulePackError;
use crate::process::ProcessError;

#[derive(Debug, thiserror::Error)]
pub enum RuleEvaluationError {
    #[error(transparent)]
    Packs(#[from] RulePackError),

    #[error(transparent)]
    Process(#[from] ProcessError),

    /// The engine ran and exited non-zero. Carries its stderr.
    #[error("{message}")]
    Failed {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("failed to parse rule engine output: {0}")]
    InvalidOutput(#[source] serde_json::Error),

    #[error("failed to write rule engine input: {0}")]
    Input(#[source] std::io::Error),
}

/// Something that turns resources into findings.
pub trait RuleEngine: Send + Sync {
    /// Findings in discovery order, keeping only those at or above `threshold` when given.
    fn evaluate(
        &self,
        resources: &[NormalizedResource],
        threshold: Option<Severity>,
    ) -> Result<Vec<Finding>, RuleEvaluationError>;
}

impl<T: RuleEngine + ?Sized> RuleEngine for Box<T> {
    fn evaluate(
        &self,
        resources: &[NormalizedResource],
        threshold: Option<Severity>,
    ) -> Result<Vec<Finding>, RuleEvaluationError> {
        (**self).evaluate(resources, threshold)
    }
}
