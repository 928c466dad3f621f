//! Turns Kubernetes API errors into actionable diagnostics.
//!
//! Most failure kinds of a server-side apply are only distinguishable by
//! message text. [`classify`] walks an ordered list of rules over the status
//! code, reason and message and always produces an [`ErrorClassification`].

mod api_error;
mod classify;
pub mod conflict;
pub mod groups;
pub mod patterns;
pub mod validation;

pub use api_error::{ApiError, ErrorDetails, StatusReason};
pub use classify::{
	classify, ClassifierConfig, ErrorCategory, ErrorClassification, ErrorClassifier, Severity,
};
pub use conflict::{parse_conflicts, FieldConflict};
pub use groups::{
	expected_api_group, is_builtin_api_group, is_dependency_not_ready_error,
	is_invalid_api_group_error,
};
