//! Exit codes for `iac-compliance`.
//! These codes are part of the public contract: automation distinguishes a compliance
//! failure from a tooling failure by them.

pub const EXIT_SUCCESS: i32 = 0; // No findings at or above the fail threshold
pub const EXIT_FINDINGS: i32 = 1; // Findings at or above the fail threshold
pub const EXIT_ERROR: i32 = 2; // Loading, evaluation or configuration error
