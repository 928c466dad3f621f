//! Schema and validation rule failures.
//!
//! Strict decoding rejects fields the schema does not declare (status 400).
//! Semantic validation (status 422) reports one `<path>: <Kind of error>`
//! fragment per offending field, e.g.
//! `spec.strategy.type: Unsupported value: "Blue": supported values: "Recreate", "RollingUpdate"`.

use std::sync::OnceLock;

use regex::Captures;
use ssa_fields::path::normalize;

use crate::patterns::{group, PatternTable};

/// Phrases the API server uses when an update touches a field that cannot
/// change after creation. `may not change` is the wording of CEL
/// `self == oldSelf` transition rules.
pub const IMMUTABLE_KEYWORDS: &[&str] = &[
	"immutable",
	"forbidden",
	"cannot be changed",
	"may not be modified",
	"may not change",
];

/// Strict decoding marker present even when no field could be extracted.
const STRICT_DECODING: &str = "strict decoding error";

/// `ValidationError(Deployment.spec)` names the type first, drop it.
fn strip_type_name(path: &str) -> &str {
	match path.split_once('.') {
		Some((head, rest)) if head.starts_with(char::is_uppercase) => rest,
		None if path.starts_with(char::is_uppercase) => "",
		_ => path,
	}
}

fn nested_unknown_field(captures: &Captures<'_>) -> Option<String> {
	let parent = strip_type_name(group(captures, 1)?);
	let field = group(captures, 2)?;
	Some(ssa_fields::path::join_field(parent, field))
}

fn quoted_field(captures: &Captures<'_>) -> Option<String> {
	Some(normalize(group(captures, 1)?).to_string())
}

/// Shapes of strict decoding and schema mismatch messages.
pub fn field_validation_patterns() -> &'static PatternTable<String> {
	static TABLE: OnceLock<PatternTable<String>> = OnceLock::new();
	TABLE.get_or_init(|| {
		PatternTable::new(&[
			(
				"validation-error",
				r#"ValidationError\(([^)]*)\): unknown field "([^"]+)""#,
				nested_unknown_field,
			),
			("unknown-field", r#"unknown field "([^"]+)""#, quoted_field),
			("duplicate-field", r#"duplicate field "([^"]+)""#, quoted_field),
			(
				"not-declared-in-schema",
				r#"(\.?[\w.\[\]="\-]*[\w\]]): field not declared in schema"#,
				quoted_field,
			),
		])
	})
}

/// Whether `message` reports fields rejected by strict decoding.
pub fn is_field_validation_message(message: &str) -> bool {
	message.contains(STRICT_DECODING) || field_validation_patterns().is_match(message)
}

/// Rejected field paths, distinct, in message order.
pub fn rejected_fields(message: &str) -> Vec<String> {
	let mut fields = field_validation_patterns().all(message);
	let mut seen = Vec::with_capacity(fields.len());
	fields.retain(|field| {
		if seen.contains(field) {
			false
		} else {
			seen.push(field.clone());
			true
		}
	});
	fields
}

pub fn is_immutable_message(message: &str) -> bool {
	let message = message.to_lowercase();
	IMMUTABLE_KEYWORDS
		.iter()
		.any(|keyword| message.contains(keyword))
}

fn field_path(captures: &Captures<'_>) -> Option<String> {
	Some(group(captures, 1)?.to_string())
}

/// Field named by an immutability message.
pub fn immutable_field_patterns() -> &'static PatternTable<String> {
	static TABLE: OnceLock<PatternTable<String>> = OnceLock::new();
	TABLE.get_or_init(|| {
		PatternTable::new(&[(
			"field-error",
			r"([\w.\[\]\-]+): (?:Invalid value|Forbidden)",
			field_path,
		)])
	})
}

/// Structural schema failures share the typed `Invalid value` shape with
/// validation rules but are phrased by the OpenAPI validator.
const SCHEMA_PHRASES: &[&str] = &["in body must be of type", "in body should", "must validate"];

fn typed_invalid_value(captures: &Captures<'_>) -> Option<String> {
	let path = group(captures, 1)?;
	let reason = group(captures, 2)?.trim();
	if SCHEMA_PHRASES.iter().any(|phrase| reason.contains(phrase)) {
		return None;
	}
	Some(format!("{path}: {reason}"))
}

fn failed_rule(captures: &Captures<'_>) -> Option<String> {
	Some(format!("rule `{}` failed", group(captures, 1)?.trim()))
}

/// Shapes of CEL validation rule failures. A CEL error reports the value by
/// its OpenAPI type instead of by content.
pub fn cel_patterns() -> &'static PatternTable<String> {
	static TABLE: OnceLock<PatternTable<String>> = OnceLock::new();
	TABLE.get_or_init(|| {
		PatternTable::new(&[
			(
				"typed-invalid-value",
				r#"([\w.\[\]\-]+): Invalid value: "(?:object|string|integer|number|boolean|array)": ([^\n,]+)"#,
				typed_invalid_value,
			),
			("failed-rule", r"failed rule: ([^\n,]+)", failed_rule),
		])
	})
}

fn unsupported_value(captures: &Captures<'_>) -> Option<String> {
	let path = group(captures, 1)?;
	let value = group(captures, 2)?;
	Some(match group(captures, 3) {
		Some(supported) => format!("{path}: \"{value}\" is not one of {}", supported.trim()),
		None => format!("{path}: \"{value}\" is not supported"),
	})
}

fn required_value(captures: &Captures<'_>) -> Option<String> {
	Some(format!("{} is required", group(captures, 1)?))
}

/// Field-specific invalid value shapes with a discoverable path.
pub fn invalid_value_patterns() -> &'static PatternTable<String> {
	static TABLE: OnceLock<PatternTable<String>> = OnceLock::new();
	TABLE.get_or_init(|| {
		PatternTable::new(&[
			(
				"unsupported-value",
				r#"([\w.\[\]\-]+): Unsupported value: "([^"]*)"(?:: supported values: ([^\n\]]+))?"#,
				unsupported_value,
			),
			("required-value", r"([\w.\[\]\-]+): Required value", required_value),
		])
	})
}

#[cfg(test)]
mod tests {
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case::flat(
		r#"Deployment in version "v1" cannot be handled as a Deployment: strict decoding error: unknown field "spec.replica""#,
		&["spec.replica"]
	)]
	#[case::bracketed(
		r#"error validating data: [ValidationError(Deployment.spec): unknown field "replica" in io.k8s.api.apps.v1.DeploymentSpec, ValidationError(Deployment.spec.template): unknown field "labels" in io.k8s.api.core.v1.PodTemplateSpec]"#,
		&["spec.replica", "spec.template.labels"]
	)]
	#[case::top_level(
		r#"error validating data: ValidationError(Deployment): unknown field "extra" in io.k8s.api.apps.v1.Deployment"#,
		&["extra"]
	)]
	#[case::duplicate(
		r#"strict decoding error: duplicate field "replicas""#,
		&["replicas"]
	)]
	#[case::not_declared(
		r#"failed to create typed patch object (default/web; apps/v1, Kind=Deployment): .spec.template.spec.containers[name="nginx"].imagePolicy: field not declared in schema"#,
		&[r#"spec.template.spec.containers[name="nginx"].imagePolicy"#]
	)]
	#[case::several_flat(
		r#"strict decoding error: unknown field "spec.a", unknown field "spec.b", unknown field "spec.a""#,
		&["spec.a", "spec.b"]
	)]
	fn test_rejected_fields(#[case] message: &str, #[case] expected: &[&str]) {
		assert!(is_field_validation_message(message));
		assert_eq!(rejected_fields(message), expected);
	}

	#[test]
	fn test_strict_decoding_without_field() {
		let message = "strict decoding error: json: cannot unmarshal";
		assert!(is_field_validation_message(message));
		assert!(rejected_fields(message).is_empty());
	}

	#[rstest]
	#[case::immutable("spec.selector: Invalid value: {...}: field is immutable", true)]
	#[case::forbidden("spec: Forbidden: pod updates may not change fields other than `spec.containers[*].image`", true)]
	#[case::cannot_be_changed("spec.clusterIP: Invalid value: \"None\": cannot be changed", true)]
	#[case::may_not_be_modified("spec.volumeName: may not be modified once set", true)]
	#[case::cel_transition("spec.region: Invalid value: \"string\": may not change once set", true)]
	#[case::other("spec.replicas: Invalid value: -1: must be greater than or equal to 0", false)]
	fn test_is_immutable_message(#[case] message: &str, #[case] expected: bool) {
		assert_eq!(is_immutable_message(message), expected);
	}

	#[test]
	fn test_immutable_field() {
		let message = r#"Deployment.apps "web" is invalid: spec.selector: Invalid value: v1.LabelSelector{MatchLabels:map[string]string{"app":"web2"}}: field is immutable"#;
		assert_eq!(immutable_field_patterns().first(message).as_deref(), Some("spec.selector"));
	}

	#[rstest]
	#[case::typed_value(
		r#"Widget.example.com "w" is invalid: spec.replicas: Invalid value: "integer": replicas must be below 10"#,
		&["spec.replicas: replicas must be below 10"]
	)]
	#[case::failed_rule(
		r#"Widget.example.com "w" is invalid: spec: Invalid value: "object": failed rule: self.min <= self.max"#,
		&["spec: failed rule: self.min <= self.max"]
	)]
	#[case::bare_rule("failed rule: self.size() > 0", &["rule `self.size() > 0` failed"])]
	fn test_cel_patterns(#[case] message: &str, #[case] expected: &[&str]) {
		assert_eq!(cel_patterns().all(message), expected);
	}

	#[rstest]
	#[case::wrong_type(r#"spec.replicas: Invalid value: "string": spec.replicas in body must be of type integer: "string""#)]
	#[case::maximum(r#"spec.replicas: Invalid value: "integer": spec.replicas in body should be less than or equal to 10"#)]
	#[case::one_of(r#"spec: Invalid value: "object": must validate one and only one schema (oneOf)"#)]
	fn test_schema_failures_are_not_cel(#[case] message: &str) {
		assert!(cel_patterns().all(message).is_empty());
		assert_eq!(cel_patterns().first(message), None);
	}

	#[test]
	fn test_plain_invalid_value_is_not_cel() {
		assert!(!cel_patterns().is_match("spec.replicas: Invalid value: -1: must be greater than or equal to 0"));
	}

	#[rstest]
	#[case::with_supported(
		r#"Deployment.apps "web" is invalid: spec.strategy.type: Unsupported value: "Blue": supported values: "Recreate", "RollingUpdate""#,
		r#"spec.strategy.type: "Blue" is not one of "Recreate", "RollingUpdate""#
	)]
	#[case::without_supported(
		r#"spec.restartPolicy: Unsupported value: "Sometimes""#,
		r#"spec.restartPolicy: "Sometimes" is not supported"#
	)]
	#[case::required(
		r#"Service "web" is invalid: spec.ports: Required value"#,
		"spec.ports is required"
	)]
	fn test_invalid_value_patterns(#[case] message: &str, #[case] expected: &str) {
		assert_eq!(invalid_value_patterns().first(message).as_deref(), Some(expected));
	}

	#[test]
	fn test_every_pattern_compiles() {
		assert_eq!(field_validation_patterns().len(), 4);
		assert_eq!(immutable_field_patterns().len(), 1);
		assert_eq!(cel_patterns().len(), 2);
		assert_eq!(invalid_value_patterns().len(), 2);
	}
}
