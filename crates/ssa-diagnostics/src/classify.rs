//! Mapping of API errors to user-facing diagnostics.

use std::{fmt::Write as _, sync::OnceLock};

use regex::Captures;
use serde::{Deserialize, Serialize};
use ssa_fields::format_ignore_fields;
use tracing::debug;

use crate::{
	conflict::{conflict_paths, parse_conflicts},
	groups::{is_builtin_api_group, is_crd_not_found, is_namespace_not_found},
	patterns::{group, PatternTable},
	validation::{
		cel_patterns, immutable_field_patterns, invalid_value_patterns, is_field_validation_message,
		is_immutable_message, rejected_fields,
	},
	ApiError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
	Warning,
	Error,
}

/// Which rule produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCategory {
	NotFound,
	NamespaceNotFound,
	Forbidden,
	Conflict,
	Timeout,
	Unauthorized,
	FieldValidation,
	Immutable,
	CelValidation,
	InvalidValue,
	Invalid,
	AlreadyExists,
	CrdNotFound,
	Conversion,
	Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorClassification {
	pub severity: Severity,
	pub title: String,
	/// Remediation text, always ending with the raw API error.
	pub detail: String,
	pub category: ErrorCategory,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifierConfig {
	/// Attribute name used in the suggested ignore fragment for conflicts.
	pub ignore_fields_attribute: String,
}

impl Default for ClassifierConfig {
	fn default() -> Self {
		Self {
			ignore_fields_attribute: "ignore_fields".to_string(),
		}
	}
}

fn crd_not_found_detail(captures: &Captures<'_>) -> Option<String> {
	let kind = group(captures, 1)?;
	let version = group(captures, 2)?;
	Some(format!("kind {kind} is not served in {version}"))
}

fn resource_not_served(_: &Captures<'_>) -> Option<String> {
	Some("the resource type is not served by the API server".to_string())
}

fn crd_not_found_patterns() -> &'static PatternTable<String> {
	static TABLE: OnceLock<PatternTable<String>> = OnceLock::new();
	TABLE.get_or_init(|| {
		PatternTable::new(&[
			(
				"no-kind-match",
				r#"(?i)no matches for kind "([^"]+)" in (?:version|group) "([^"]+)""#,
				crd_not_found_detail,
			),
			(
				"resource-not-served",
				r"(?i)could not find the requested resource",
				resource_not_served,
			),
		])
	})
}

fn unmarshal_mismatch(captures: &Captures<'_>) -> Option<String> {
	let got = group(captures, 1)?;
	let expected = group(captures, 3)?;
	Some(match group(captures, 2) {
		Some(field) => format!("{field}: expected {expected}, got {got}"),
		None => format!("expected {expected}, got {got}"),
	})
}

fn quantity_format(_: &Captures<'_>) -> Option<String> {
	Some("value is not a valid quantity, use a plain number or a suffixed value such as 500m or 1Gi".to_string())
}

fn failed_conversion(captures: &Captures<'_>) -> Option<String> {
	Some(format!("conversion failed: {}", group(captures, 1)?.trim()))
}

fn conversion_patterns() -> &'static PatternTable<String> {
	static TABLE: OnceLock<PatternTable<String>> = OnceLock::new();
	TABLE.get_or_init(|| {
		PatternTable::new(&[
			(
				"unmarshal-type-mismatch",
				r"cannot unmarshal (\w+) into Go (?:struct field (\S+)|value) of type ([\w.\[\]*]+)",
				unmarshal_mismatch,
			),
			(
				"quantity-format",
				r"quantities must match the regular expression",
				quantity_format,
			),
			(
				"failed-conversion",
				r"(?i)(?:unable|failed) to convert ([^\n]+)",
				failed_conversion,
			),
			(
				"cannot-convert",
				r"(?i)cannot convert ([^\n]+)",
				failed_conversion,
			),
		])
	})
}

/// Context of the failed call, threaded through the rules.
struct Request<'a> {
	err: &'a ApiError,
	operation: &'a str,
	resource: &'a str,
	api_version: Option<&'a str>,
}

impl Request<'_> {
	fn classification(
		&self,
		severity: Severity,
		category: ErrorCategory,
		title: impl Into<String>,
		detail: impl AsRef<str>,
	) -> ErrorClassification {
		let mut detail = detail.as_ref().to_string();
		let _ = write!(detail, "\n\nAPI error: {}", self.err);
		ErrorClassification {
			severity,
			title: title.into(),
			detail,
			category,
		}
	}

	fn error(
		&self,
		category: ErrorCategory,
		title: impl Into<String>,
		detail: impl AsRef<str>,
	) -> ErrorClassification {
		self.classification(Severity::Error, category, title, detail)
	}

	fn message(&self) -> &str {
		&self.err.message
	}

	/// Whether expression rules may be blamed: custom resource groups only.
	fn is_custom_resource(&self) -> bool {
		self.api_version
			.is_some_and(|api_version| !is_builtin_api_group(api_version))
	}
}

/// Classifies API errors, see [`ErrorClassifier::classify`].
#[derive(Debug, Clone, Default)]
pub struct ErrorClassifier {
	config: ClassifierConfig,
}

impl ErrorClassifier {
	pub fn new(config: ClassifierConfig) -> Self {
		Self { config }
	}

	/// Map `err`, raised while performing `operation` on `resource`, to a
	/// diagnostic.
	///
	/// Rules are tried in a fixed order and the first one that applies
	/// wins. `api_version` of the resource decides whether CEL validation
	/// can be the cause. Every error gets some classification.
	pub fn classify(
		&self,
		err: &ApiError,
		operation: &str,
		resource: &str,
		api_version: Option<&str>,
	) -> ErrorClassification {
		let req = Request {
			err,
			operation,
			resource,
			api_version,
		};
		let classification = self.classify_request(&req);
		debug!(
			category = ?classification.category,
			code = ?err.code,
			reason = ?err.reason,
			"classified API error"
		);
		classification
	}

	fn classify_request(&self, req: &Request<'_>) -> ErrorClassification {
		let err = req.err;
		if err.is_not_found() {
			return not_found(req);
		}
		if err.is_forbidden() {
			return req.error(
				ErrorCategory::Forbidden,
				"Permission denied",
				format!(
					"Not allowed to {} {}. Check the RBAC roles bound to the credentials in use.",
					req.operation, req.resource
				),
			);
		}
		if err.is_conflict() {
			return self.conflict(req);
		}
		if err.is_timeout() {
			return req.error(
				ErrorCategory::Timeout,
				"Request timed out",
				format!(
					"The API server did not finish {} {} in time. It may be overloaded; retry the operation.",
					req.operation, req.resource
				),
			);
		}
		if err.is_unauthorized() {
			return req.error(
				ErrorCategory::Unauthorized,
				"Authentication failed",
				"The API server rejected the credentials. Refresh the token or check the kubeconfig in use.",
			);
		}
		if (err.is_bad_request() || err.is_client_side())
			&& is_field_validation_message(req.message())
		{
			return field_validation(req);
		}
		if err.is_invalid() {
			return invalid(req);
		}
		if err.is_already_exists() {
			return req.error(
				ErrorCategory::AlreadyExists,
				"Resource already exists",
				format!(
					"{} already exists. Import it into state, or remove the existing object before retrying.",
					req.resource
				),
			);
		}
		if is_crd_not_found(err) {
			return crd_not_found(req);
		}
		fallback(req)
	}

	fn conflict(&self, req: &Request<'_>) -> ErrorClassification {
		let conflicts = parse_conflicts(req.message());
		if conflicts.is_empty() {
			return req.error(
				ErrorCategory::Conflict,
				"Field manager conflict",
				format!(
					"Cannot {} {}: multiple conflicts detected with other field managers. Inspect metadata.managedFields to see who owns the contested fields.",
					req.operation, req.resource
				),
			);
		}

		let mut detail = format!(
			"Cannot {} {}: fields are owned by another field manager.\n",
			req.operation, req.resource
		);
		for conflict in &conflicts {
			let _ = writeln!(detail, "  - {} (owned by \"{}\")", conflict.path, conflict.manager);
		}
		let paths = conflict_paths(&conflicts);
		let _ = write!(
			detail,
			"\nTo leave these fields to their current owner, add them to the resource configuration:\n\n{}",
			format_ignore_fields(&self.config.ignore_fields_attribute, &paths)
		);
		req.error(ErrorCategory::Conflict, "Field manager conflict", detail)
	}
}

fn not_found(req: &Request<'_>) -> ErrorClassification {
	if is_namespace_not_found(req.err) {
		return req.error(
			ErrorCategory::NamespaceNotFound,
			"Namespace not found",
			format!(
				"The namespace of {} does not exist. If it is created in the same run, retry once it is ready.",
				req.resource
			),
		);
	}
	req.classification(
		Severity::Warning,
		ErrorCategory::NotFound,
		"Resource not found",
		format!(
			"{} was not found while trying to {} it. It may have been deleted outside of this tool.",
			req.resource, req.operation
		),
	)
}

fn field_validation(req: &Request<'_>) -> ErrorClassification {
	let fields = rejected_fields(req.message());
	let detail = match fields.as_slice() {
		[] => format!("{} does not match the schema of its kind.", req.resource),
		[field] => format!(
			"Field \"{field}\" of {} is not declared in the schema. Check for typos or an outdated apiVersion.",
			req.resource
		),
		fields => format!(
			"{} fields of {} are not declared in the schema: {}. Check for typos or an outdated apiVersion.",
			fields.len(),
			req.resource,
			fields.join(", ")
		),
	};
	req.error(ErrorCategory::FieldValidation, "Schema validation failed", detail)
}

fn invalid(req: &Request<'_>) -> ErrorClassification {
	let message = req.message();

	if is_immutable_message(message) {
		let target = match immutable_field_patterns().first(message) {
			Some(field) => format!("field \"{field}\""),
			None => "a field that".to_string(),
		};
		return req.error(
			ErrorCategory::Immutable,
			"Immutable field changed",
			format!(
				"Cannot {} {}: {target} cannot be changed after creation. Revert the change, or delete and recreate the resource.",
				req.operation, req.resource
			),
		);
	}

	if req.is_custom_resource() {
		let failures = cel_patterns().all(message);
		if !failures.is_empty() {
			return req.error(
				ErrorCategory::CelValidation,
				"Validation rule failed",
				format!(
					"{} violates a validation rule of its CustomResourceDefinition:\n  - {}",
					req.resource,
					failures.join("\n  - ")
				),
			);
		}
	}

	let values = invalid_value_patterns().all(message);
	if !values.is_empty() {
		return req.error(
			ErrorCategory::InvalidValue,
			"Invalid field value",
			format!("{} has invalid values:\n  - {}", req.resource, values.join("\n  - ")),
		);
	}

	req.error(
		ErrorCategory::Invalid,
		"Invalid resource",
		format!("The API server rejected {} as invalid.", req.resource),
	)
}

fn crd_not_found(req: &Request<'_>) -> ErrorClassification {
	let cause = crd_not_found_patterns()
		.first(req.message())
		.unwrap_or_else(|| "the resource type is not served by the API server".to_string());
	req.error(
		ErrorCategory::CrdNotFound,
		"Resource type not found",
		format!(
			"Cannot {} {}: {cause}. If the CustomResourceDefinition is installed in the same run, this is transient; retry once it is established.",
			req.operation, req.resource
		),
	)
}

fn fallback(req: &Request<'_>) -> ErrorClassification {
	if let Some(cause) = conversion_patterns().first(req.message()) {
		return req.error(
			ErrorCategory::Conversion,
			"Type mismatch",
			format!("{} contains a value of the wrong type: {cause}.", req.resource),
		);
	}
	let status = match req.err.code {
		Some(code) => format!(" (status {code})"),
		None => String::new(),
	};
	req.error(
		ErrorCategory::Unknown,
		"API error",
		format!("Failed to {} {}{status}.", req.operation, req.resource),
	)
}

/// [`ErrorClassifier::classify`] with the default configuration.
pub fn classify(
	err: &ApiError,
	operation: &str,
	resource: &str,
	api_version: Option<&str>,
) -> ErrorClassification {
	ErrorClassifier::default().classify(err, operation, resource, api_version)
}
