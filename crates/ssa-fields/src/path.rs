//! Field path vocabulary.
//!
//! Paths are field names joined with `.`, with `[<index>]` appended right
//! after a list element was resolved, e.g. `spec.containers[1].image`.
//! There is never a leading separator.

/// Append a field name to `prefix`.
pub fn join_field(prefix: &str, field: &str) -> String {
	if prefix.is_empty() {
		field.to_string()
	} else {
		format!("{prefix}.{field}")
	}
}

/// Append a resolved list position to `prefix`.
pub fn join_index(prefix: &str, index: usize) -> String {
	format!("{prefix}[{index}]")
}

/// Append an unresolved list selector to `prefix`, verbatim.
pub fn join_selector(prefix: &str, selector: &str) -> String {
	format!("{prefix}[{selector}]")
}

/// Drop leading separators, as found in paths reported by the API server
/// (`.spec.replicas`).
pub fn normalize(path: &str) -> &str {
	path.trim().trim_start_matches('.')
}
