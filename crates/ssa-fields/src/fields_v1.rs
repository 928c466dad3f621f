//! Sentinel keys of the `FieldsV1` ownership encoding.
//!
//! Every key in a `FieldsV1` tree carries a two character prefix that tells
//! how the rest of the key is to be read:
//!
//! - `f:<name>` - a regular object field
//! - `k:<json object>` - a list element identified by its merge key
//! - `v:<json scalar>` - a member of a set-like list of scalars
//! - `.` - the node itself is owned, not only its children

pub const FIELD_PREFIX: &str = "f:";
pub const MERGE_KEY_PREFIX: &str = "k:";
pub const SET_VALUE_PREFIX: &str = "v:";
pub const SELF_MARKER: &str = ".";

/// A decoded `FieldsV1` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldsKey<'a> {
	/// `f:` key, holds the field name.
	Field(&'a str),
	/// `k:` key, holds the JSON text after the prefix.
	MergeKey(&'a str),
	/// `v:` key, holds the JSON text after the prefix.
	SetValue(&'a str),
	/// The `.` marker.
	SelfMarker,
	/// Anything else, e.g. the rarely used `i:` index form.
	Unknown(&'a str),
}

impl<'a> FieldsKey<'a> {
	pub fn parse(key: &'a str) -> Self {
		if key == SELF_MARKER {
			return FieldsKey::SelfMarker;
		}
		if let Some(name) = key.strip_prefix(FIELD_PREFIX) {
			return FieldsKey::Field(name);
		}
		if let Some(raw) = key.strip_prefix(MERGE_KEY_PREFIX) {
			return FieldsKey::MergeKey(raw);
		}
		if let Some(raw) = key.strip_prefix(SET_VALUE_PREFIX) {
			return FieldsKey::SetValue(raw);
		}
		FieldsKey::Unknown(key)
	}
}

/// Whether an ownership node carries the `.` marker.
pub fn owns_self(node: &serde_json::Map<String, serde_json::Value>) -> bool {
	node.contains_key(SELF_MARKER)
}
