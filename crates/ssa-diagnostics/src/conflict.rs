//! Field manager conflicts reported by server-side apply.
//!
//! The server names the other manager and the contested paths in the
//! message text only, in one of two shapes:
//!
//! ```text
//! Apply failed with 1 conflict: conflict with "kubectl" using apps/v1: .spec.replicas
//! Apply failed with 2 conflicts: conflicts with "helm" using apps/v1:
//! - .spec.replicas
//! - .spec.template.spec.containers[name="nginx"].image
//! ```

use std::sync::OnceLock;

use regex::Captures;
use ssa_fields::path::normalize;

use crate::patterns::{group, PatternTable};

/// One contested path and the manager currently owning it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldConflict {
	pub manager: String,
	/// Path without the leading separator the server prints.
	pub path: String,
}

impl FieldConflict {
	fn new(manager: &str, path: &str) -> Self {
		Self {
			manager: manager.to_string(),
			path: normalize(path).to_string(),
		}
	}
}

fn single_line(captures: &Captures<'_>) -> Option<Vec<FieldConflict>> {
	let manager = group(captures, 1)?;
	let conflict = FieldConflict::new(manager, group(captures, 2)?);
	(!conflict.path.is_empty()).then(|| vec![conflict])
}

fn path_list(captures: &Captures<'_>) -> Option<Vec<FieldConflict>> {
	let manager = group(captures, 1)?;
	let conflicts: Vec<_> = group(captures, 2)?
		.lines()
		.filter_map(|line| line.trim().strip_prefix("- "))
		.map(|path| FieldConflict::new(manager, path))
		.filter(|conflict| !conflict.path.is_empty())
		.collect();
	(!conflicts.is_empty()).then_some(conflicts)
}

/// Conflict message shapes, most specific first.
pub fn conflict_patterns() -> &'static PatternTable<Vec<FieldConflict>> {
	static TABLE: OnceLock<PatternTable<Vec<FieldConflict>>> = OnceLock::new();
	TABLE.get_or_init(|| {
		PatternTable::new(&[
			(
				"path-list",
				r#"conflicts? with "([^"]+)"[^:\n]*:((?:\n[ \t]*- [^\n]+)+)"#,
				path_list,
			),
			(
				"single-line",
				r#"conflicts? with "([^"]+)"[^:\n]*:[ \t]*([^\n]*)"#,
				single_line,
			),
		])
	})
}

/// Every manager/path pair named in `message`, in message order.
pub fn parse_conflicts(message: &str) -> Vec<FieldConflict> {
	conflict_patterns()
		.all(message)
		.into_iter()
		.flatten()
		.collect()
}

/// Distinct paths of `conflicts`, first occurrence first.
pub fn conflict_paths(conflicts: &[FieldConflict]) -> Vec<&str> {
	let mut paths: Vec<&str> = Vec::with_capacity(conflicts.len());
	for conflict in conflicts {
		if !paths.contains(&conflict.path.as_str()) {
			paths.push(&conflict.path);
		}
	}
	paths
}

#[cfg(test)]
mod tests {
	use indoc::indoc;

	use super::*;

	#[test]
	fn test_single_line() {
		let conflicts = parse_conflicts(r#"conflict with "kubectl" using apps/v1: .spec.replicas"#);
		assert_eq!(conflicts, vec![FieldConflict::new("kubectl", "spec.replicas")]);
		assert_eq!(conflicts[0].path, "spec.replicas");
	}

	#[test]
	fn test_single_line_with_subresource() {
		let conflicts = parse_conflicts(
			r#"Apply failed with 1 conflict: conflict with "hpa-controller" with subresource "scale" using autoscaling/v2: .spec.replicas"#,
		);
		assert_eq!(conflicts, vec![FieldConflict::new("hpa-controller", ".spec.replicas")]);
	}

	#[test]
	fn test_path_list() {
		let message = indoc! {r#"
			Apply failed with 2 conflicts: conflicts with "helm" using apps/v1:
			- .spec.replicas
			- .spec.template.spec.containers[name="nginx"].image"#};
		let conflicts = parse_conflicts(message);
		assert_eq!(
			conflicts,
			vec![
				FieldConflict::new("helm", "spec.replicas"),
				FieldConflict::new("helm", r#"spec.template.spec.containers[name="nginx"].image"#),
			]
		);
	}

	#[test]
	fn test_several_managers() {
		let message = indoc! {r#"
			Apply failed with 3 conflicts: conflicts with "helm" using apps/v1:
			- .spec.replicas
			- .metadata.labels.app
			conflict with "kubectl-edit" using apps/v1: .spec.paused"#};
		let conflicts = parse_conflicts(message);
		let managers: Vec<_> = conflicts.iter().map(|c| c.manager.as_str()).collect();
		assert_eq!(managers, vec!["helm", "helm", "kubectl-edit"]);
		assert_eq!(conflicts[2].path, "spec.paused");
	}

	#[test]
	fn test_single_line_keeps_spaces_in_path() {
		let conflicts = parse_conflicts(r#"conflict with "kubectl" using v1: .data.my key"#);
		assert_eq!(conflicts, vec![FieldConflict::new("kubectl", "data.my key")]);
	}

	#[test]
	fn test_empty_paths_are_rejected() {
		assert!(parse_conflicts(r#"conflict with "a" using v1: ."#).is_empty());
		assert!(parse_conflicts(r#"conflict with "a" using v1:   "#).is_empty());
		let message = indoc! {r#"
			conflicts with "helm" using apps/v1:
			- .
			- .spec.replicas"#};
		assert_eq!(parse_conflicts(message), vec![FieldConflict::new("helm", "spec.replicas")]);
	}

	#[test]
	fn test_unparseable_message() {
		assert!(parse_conflicts("Operation cannot be fulfilled on deployments.apps \"web\": the object has been modified").is_empty());
		assert!(parse_conflicts(r#"conflicts with "helm" using apps/v1:"#).is_empty());
	}

	#[test]
	fn test_conflict_paths_are_distinct() {
		let conflicts = vec![
			FieldConflict::new("a", ".spec.replicas"),
			FieldConflict::new("b", ".spec.replicas"),
			FieldConflict::new("b", ".spec.paused"),
		];
		assert_eq!(conflict_paths(&conflicts), vec!["spec.replicas", "spec.paused"]);
	}

	#[test]
	fn test_every_pattern_compiles() {
		assert_eq!(conflict_patterns().len(), 2);
	}
}
