//! Data model shared by the pipeline stages.

mod finding;
mod resource;
mod severity;

pub use finding::{filter_by_threshold, Finding};
pub use resource::{ChangeAction, NormalizedResource, ResourceIndex};
pub use severity::{ParseSeverityError, Severity};
