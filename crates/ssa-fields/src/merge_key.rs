//! Merge keys and the matcher that resolves them against live lists.
//!
//! Server-side apply identifies list elements by a partial set of their
//! fields (`k:{"name":"nginx"}`) instead of by position. To attribute
//! ownership to a concrete index the key has to be matched against the
//! user's document, where the element may lack fields the server defaulted
//! (`protocol` on container ports is the classic one).

use std::{borrow::Cow, collections::HashMap, num::NonZeroUsize, rc::Rc};

use lru::LruCache;
use serde_json::{Map, Value};

use crate::{
	error::{FieldsError, Result},
	fields_v1::MERGE_KEY_PREFIX,
};

/// Partial identity of a list element, decoded from a `k:` key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeKey(Map<String, Value>);

impl MergeKey {
	pub fn fields(&self) -> &Map<String, Value> {
		&self.0
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// See [`item_matches`].
	pub fn matches(&self, item: &Value) -> bool {
		item_matches(item, self)
	}
}

impl From<Map<String, Value>> for MergeKey {
	fn from(fields: Map<String, Value>) -> Self {
		Self(fields)
	}
}

/// Decode a `k:`-prefixed key without touching any cache.
pub fn parse_merge_key(key: &str) -> Result<MergeKey> {
	let raw = key
		.strip_prefix(MERGE_KEY_PREFIX)
		.ok_or_else(|| FieldsError::MissingPrefix {
			key: key.to_string(),
			prefix: MERGE_KEY_PREFIX,
		})?;
	let fields: Map<String, Value> =
		serde_json::from_str(raw).map_err(|source| FieldsError::InvalidMergeKey {
			key: key.to_string(),
			source,
		})?;
	Ok(MergeKey(fields))
}

/// Render a value the way it is compared against merge keys, so that `"80"`,
/// `80` and `80.0` are equal.
///
/// Numbers go through `f64` like every JSON number on the server side; whole
/// values print without a fractional part.
pub(crate) fn render_scalar(value: &Value) -> Cow<'_, str> {
	match value {
		Value::String(s) => Cow::Borrowed(s),
		Value::Bool(true) => Cow::Borrowed("true"),
		Value::Bool(false) => Cow::Borrowed("false"),
		Value::Null => Cow::Borrowed("null"),
		Value::Number(n) => Cow::Owned(match n.as_f64() {
			Some(float) => float.to_string(),
			None => n.to_string(),
		}),
		Value::Array(_) | Value::Object(_) => Cow::Owned(value.to_string()),
	}
}

/// Whether `item` is identified by `key`.
///
/// Only the key fields present in `item` are compared, and every one of
/// them must agree. At least one field has to be present: an element that
/// shares nothing with the key never matches, even for an empty key.
pub fn item_matches(item: &Value, key: &MergeKey) -> bool {
	let Value::Object(fields) = item else {
		return false;
	};

	let mut verified = 0usize;
	for (name, expected) in key.fields() {
		let Some(actual) = fields.get(name) else {
			continue;
		};
		if render_scalar(actual) != render_scalar(expected) {
			return false;
		}
		verified += 1;
	}
	verified > 0
}

/// Position of the first element of `array` identified by `key`.
pub fn find_array_index(array: &[Value], key: &MergeKey) -> Option<usize> {
	array.iter().position(|item| item_matches(item, key))
}

/// Find the list field of `parent` holding an element identified by `key`.
///
/// Fields are scanned in document order; the first list with a matching
/// element wins.
pub fn resolve_array_key<'v>(
	parent: &'v Map<String, Value>,
	key: &MergeKey,
) -> Option<(&'v str, usize)> {
	parent.iter().find_map(|(name, value)| match value {
		Value::Array(items) => find_array_index(items, key).map(|index| (name.as_str(), index)),
		_ => None,
	})
}

enum KeyCache {
	Unbounded(HashMap<String, Rc<MergeKey>>),
	Bounded(LruCache<String, Rc<MergeKey>>),
}

impl KeyCache {
	fn get(&mut self, key: &str) -> Option<Rc<MergeKey>> {
		match self {
			KeyCache::Unbounded(map) => map.get(key).cloned(),
			KeyCache::Bounded(lru) => lru.get(key).cloned(),
		}
	}

	fn insert(&mut self, key: String, value: Rc<MergeKey>) {
		match self {
			KeyCache::Unbounded(map) => {
				map.insert(key, value);
			}
			KeyCache::Bounded(lru) => {
				lru.push(key, value);
			}
		}
	}

	fn len(&self) -> usize {
		match self {
			KeyCache::Unbounded(map) => map.len(),
			KeyCache::Bounded(lru) => lru.len(),
		}
	}
}

/// Merge key parser with a memo table keyed by the verbatim key string.
///
/// The table is owned by the instance and is not synchronized; resolutions
/// running on different threads need their own matcher.
pub struct MergeKeyMatcher {
	cache: KeyCache,
}

impl Default for MergeKeyMatcher {
	fn default() -> Self {
		Self::new()
	}
}

impl MergeKeyMatcher {
	/// Matcher that never evicts parsed keys.
	pub fn new() -> Self {
		Self {
			cache: KeyCache::Unbounded(HashMap::new()),
		}
	}

	/// Matcher keeping at most `capacity` parsed keys, least recently used
	/// evicted first.
	pub fn with_capacity(capacity: NonZeroUsize) -> Self {
		Self {
			cache: KeyCache::Bounded(LruCache::new(capacity)),
		}
	}

	pub fn from_capacity(capacity: Option<usize>) -> Self {
		match capacity.and_then(NonZeroUsize::new) {
			Some(capacity) => Self::with_capacity(capacity),
			None => Self::new(),
		}
	}

	/// Decode a `k:` key, reusing an earlier result for the same string.
	/// Failures are not cached.
	pub fn parse(&mut self, key: &str) -> Result<Rc<MergeKey>> {
		if let Some(found) = self.cache.get(key) {
			return Ok(found);
		}
		let parsed = Rc::new(parse_merge_key(key)?);
		self.cache.insert(key.to_string(), parsed.clone());
		Ok(parsed)
	}

	/// Number of keys currently memoized.
	pub fn cached_keys(&self) -> usize {
		self.cache.len()
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use rstest::rstest;
	use serde_json::json;

	use super::*;

	fn key(value: Value) -> MergeKey {
		match value {
			Value::Object(fields) => MergeKey::from(fields),
			other => panic!("merge key must be an object, got {other}"),
		}
	}

	#[test]
	fn test_parse_requires_prefix() {
		let result = parse_merge_key(r#"{"name":"nginx"}"#);
		assert_matches!(result, Err(FieldsError::MissingPrefix { .. }));
	}

	#[test]
	fn test_parse_rejects_invalid_json() {
		assert_matches!(
			parse_merge_key("k:{name:nginx}"),
			Err(FieldsError::InvalidMergeKey { .. })
		);
		assert_matches!(
			parse_merge_key(r#"k:["nginx"]"#),
			Err(FieldsError::InvalidMergeKey { .. })
		);
	}

	#[test]
	fn test_parse_decodes_fields() {
		let parsed = parse_merge_key(r#"k:{"containerPort":80,"protocol":"TCP"}"#).unwrap();
		assert_eq!(parsed.fields().len(), 2);
		assert_eq!(parsed.fields()["containerPort"], json!(80));
		assert_eq!(parsed.fields()["protocol"], json!("TCP"));
	}

	#[test]
	fn test_parse_allows_empty_key() {
		let parsed = parse_merge_key("k:{}").unwrap();
		assert!(parsed.is_empty());
	}

	#[test]
	fn test_cache_hit_equals_fresh_parse() {
		let raw = r#"k:{"name":"nginx","port":8080}"#;
		let mut matcher = MergeKeyMatcher::new();

		let first = matcher.parse(raw).unwrap();
		let second = matcher.parse(raw).unwrap();
		let fresh = parse_merge_key(raw).unwrap();

		assert_eq!(*first, fresh);
		assert_eq!(*second, fresh);
		assert!(Rc::ptr_eq(&first, &second), "second parse should come from cache");
		assert_eq!(matcher.cached_keys(), 1);
	}

	#[test]
	fn test_cache_is_keyed_by_verbatim_string() {
		let mut matcher = MergeKeyMatcher::new();
		matcher.parse(r#"k:{"name":"a","port":1}"#).unwrap();
		matcher.parse(r#"k:{"port":1,"name":"a"}"#).unwrap();
		assert_eq!(matcher.cached_keys(), 2);
	}

	#[test]
	fn test_failed_parse_is_not_cached() {
		let mut matcher = MergeKeyMatcher::new();
		assert!(matcher.parse("k:not json").is_err());
		assert_eq!(matcher.cached_keys(), 0);
	}

	#[test]
	fn test_bounded_cache_evicts() {
		let mut matcher = MergeKeyMatcher::from_capacity(Some(2));
		matcher.parse(r#"k:{"name":"a"}"#).unwrap();
		matcher.parse(r#"k:{"name":"b"}"#).unwrap();
		matcher.parse(r#"k:{"name":"c"}"#).unwrap();
		assert_eq!(matcher.cached_keys(), 2);
	}

	#[test]
	fn test_zero_capacity_means_unbounded() {
		let mut matcher = MergeKeyMatcher::from_capacity(Some(0));
		for name in ["a", "b", "c", "d"] {
			matcher.parse(&format!(r#"k:{{"name":"{name}"}}"#)).unwrap();
		}
		assert_eq!(matcher.cached_keys(), 4);
	}

	#[rstest]
	#[case::exact(json!({"name": "nginx"}), json!({"name": "nginx", "image": "nginx:1"}), true)]
	#[case::string_vs_number(json!({"containerPort": "80"}), json!({"containerPort": 80}), true)]
	#[case::number_vs_string(json!({"containerPort": 80}), json!({"containerPort": "80"}), true)]
	#[case::defaulted_field_missing(
		json!({"containerPort": 80, "protocol": "TCP"}),
		json!({"containerPort": 80}),
		true
	)]
	#[case::present_field_disagrees(
		json!({"containerPort": 80, "protocol": "TCP"}),
		json!({"containerPort": 80, "protocol": "UDP"}),
		false
	)]
	#[case::no_overlap(json!({"name": "nginx"}), json!({"image": "nginx:1"}), false)]
	#[case::empty_key(json!({}), json!({"name": "nginx"}), false)]
	#[case::int_vs_float(json!({"containerPort": 80}), json!({"containerPort": 80.0}), true)]
	#[case::float_vs_string(json!({"weight": 0.5}), json!({"weight": "0.5"}), true)]
	#[case::different_numbers(json!({"containerPort": 80}), json!({"containerPort": 80.5}), false)]
	#[case::bool_value(json!({"enabled": true}), json!({"enabled": "true"}), true)]
	#[case::not_an_object(json!({"name": "nginx"}), json!("nginx"), false)]
	fn test_item_matches(#[case] merge_key: Value, #[case] item: Value, #[case] expected: bool) {
		assert_eq!(item_matches(&item, &key(merge_key)), expected);
	}

	#[test]
	fn test_find_array_index() {
		let items = vec![
			json!({"name": "sidecar", "image": "envoy"}),
			json!("not an object"),
			json!({"name": "nginx", "image": "nginx:1"}),
			json!({"name": "nginx", "image": "nginx:2"}),
		];
		assert_eq!(find_array_index(&items, &key(json!({"name": "nginx"}))), Some(2));
		assert_eq!(find_array_index(&items, &key(json!({"name": "redis"}))), None);
		assert_eq!(find_array_index(&[], &key(json!({"name": "nginx"}))), None);
	}

	#[test]
	fn test_resolve_array_key() {
		let parent = json!({
			"name": "pod",
			"initContainers": [{"name": "init"}],
			"containers": [{"name": "sidecar"}, {"name": "nginx"}],
		});
		let parent = parent.as_object().unwrap();

		assert_eq!(
			resolve_array_key(parent, &key(json!({"name": "nginx"}))),
			Some(("containers", 1))
		);
		assert_eq!(
			resolve_array_key(parent, &key(json!({"name": "init"}))),
			Some(("initContainers", 0))
		);
		assert_eq!(resolve_array_key(parent, &key(json!({"name": "missing"}))), None);
	}
}
