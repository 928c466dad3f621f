//! Walking a `FieldsV1` tree into field paths.
//!
//! The resolved walk descends the ownership tree and the user's document in
//! lock-step so that list selectors can be turned into positions. The simple
//! walk only needs the ownership tree and keeps selectors verbatim.

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::{
	fields_v1::{owns_self, FieldsKey},
	merge_key::{find_array_index, render_scalar, resolve_array_key, MergeKeyMatcher},
	path::{join_field, join_index, join_selector},
};

/// Resolves ownership trees against a user document.
///
/// Holds the merge key matcher, so parsed keys are shared between all trees
/// walked by the same extractor.
#[derive(Default)]
pub struct PathExtractor {
	matcher: MergeKeyMatcher,
}

impl PathExtractor {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_matcher(matcher: MergeKeyMatcher) -> Self {
		Self { matcher }
	}

	pub fn matcher(&self) -> &MergeKeyMatcher {
		&self.matcher
	}

	/// Every path owned according to `fields`, with list selectors resolved
	/// to positions in `user`.
	///
	/// Selectors that fail to parse or that match no element of the user's
	/// list contribute nothing.
	pub fn extract(&mut self, fields: &Value, user: &Value) -> Vec<String> {
		let mut out = Vec::new();
		if let Value::Object(node) = fields {
			self.walk(node, "", Some(user), &mut out);
		}
		out
	}

	fn walk(
		&mut self,
		node: &Map<String, Value>,
		prefix: &str,
		user: Option<&Value>,
		out: &mut Vec<String>,
	) {
		for (key, child) in node {
			match FieldsKey::parse(key) {
				FieldsKey::Field(name) => {
					let path = join_field(prefix, name);
					let next = user.and_then(|value| value.get(name));
					self.descend(path, child, next, out);
				}
				FieldsKey::MergeKey(_) => self.walk_merge_key(key, child, prefix, user, out),
				FieldsKey::SetValue(raw) => self.walk_set_value(raw, child, prefix, user, out),
				FieldsKey::SelfMarker => {}
				FieldsKey::Unknown(key) => {
					trace!(key, prefix, "ignoring unsupported ownership key");
				}
			}
		}
	}

	/// Emit `path` for a leaf, or for a subtree carrying the `.` marker, and
	/// keep walking the subtree.
	fn descend(&mut self, path: String, child: &Value, user: Option<&Value>, out: &mut Vec<String>) {
		match child {
			Value::Object(sub) if !sub.is_empty() => {
				if owns_self(sub) {
					out.push(path.clone());
				}
				self.walk(sub, &path, user, out);
			}
			_ => out.push(path),
		}
	}

	fn walk_merge_key(
		&mut self,
		key: &str,
		child: &Value,
		prefix: &str,
		user: Option<&Value>,
		out: &mut Vec<String>,
	) {
		let merge_key = match self.matcher.parse(key) {
			Ok(merge_key) => merge_key,
			Err(error) => {
				debug!(key, prefix, %error, "skipping undecodable merge key");
				return;
			}
		};

		let resolved = match user {
			Some(Value::Array(items)) => find_array_index(items, &merge_key)
				.map(|index| (join_index(prefix, index), &items[index])),
			Some(Value::Object(parent)) => {
				resolve_array_key(parent, &merge_key).and_then(|(field, index)| {
					let element = parent.get(field)?.get(index)?;
					Some((join_index(&join_field(prefix, field), index), element))
				})
			}
			_ => None,
		};

		let Some((path, element)) = resolved else {
			debug!(key, prefix, "merge key matches no element of the user document");
			return;
		};

		if let Value::Object(sub) = child {
			self.walk(sub, &path, Some(element), out);
		}
	}

	fn walk_set_value(
		&mut self,
		raw: &str,
		child: &Value,
		prefix: &str,
		user: Option<&Value>,
		out: &mut Vec<String>,
	) {
		let Some(Value::Array(items)) = user else {
			debug!(value = raw, prefix, "set value without a list in the user document");
			return;
		};
		let wanted: Value = match serde_json::from_str(raw) {
			Ok(value) => value,
			Err(error) => {
				debug!(value = raw, prefix, %error, "skipping undecodable set value");
				return;
			}
		};
		let wanted = render_scalar(&wanted);
		let Some(index) = items.iter().position(|item| render_scalar(item) == wanted) else {
			debug!(value = raw, prefix, "set value matches no element of the user document");
			return;
		};
		self.descend(join_index(prefix, index), child, Some(&items[index]), out);
	}
}

/// Every path owned according to `fields`, without a user document.
///
/// List selectors are kept verbatim as the bracketed segment, e.g.
/// `spec.containers[{"name":"nginx"}].image`.
pub fn extract_simple(fields: &Value) -> Vec<String> {
	let mut out = Vec::new();
	if let Value::Object(node) = fields {
		walk_simple(node, "", &mut out);
	}
	out
}

fn walk_simple(node: &Map<String, Value>, prefix: &str, out: &mut Vec<String>) {
	for (key, child) in node {
		match FieldsKey::parse(key) {
			FieldsKey::Field(name) => descend_simple(join_field(prefix, name), child, out),
			FieldsKey::SetValue(raw) => descend_simple(join_selector(prefix, raw), child, out),
			FieldsKey::MergeKey(raw) => {
				if let Value::Object(sub) = child {
					walk_simple(sub, &join_selector(prefix, raw), out);
				}
			}
			FieldsKey::SelfMarker => {}
			FieldsKey::Unknown(key) => {
				trace!(key, prefix, "ignoring unsupported ownership key");
			}
		}
	}
}

fn descend_simple(path: String, child: &Value, out: &mut Vec<String>) {
	match child {
		Value::Object(sub) if !sub.is_empty() => {
			if owns_self(sub) {
				out.push(path.clone());
			}
			walk_simple(sub, &path, out);
		}
		_ => out.push(path),
	}
}
