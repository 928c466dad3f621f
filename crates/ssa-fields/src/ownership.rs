//! Aggregation of `managedFields` entries into a path -> owner map.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::{FieldsV1, ManagedFieldsEntry, ObjectMeta};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{
	config::{ResolutionMode, ResolverConfig},
	error::{FieldsError, Result},
	extract::{extract_simple, PathExtractor},
	merge_key::MergeKeyMatcher,
};

/// The only ownership encoding Kubernetes defines.
const FIELDS_TYPE_V1: &str = "FieldsV1";

/// Owner of a single field path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOwnership {
	pub manager: String,
	/// apiVersion the manager used when it last wrote the field.
	pub version: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub operation: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub subresource: Option<String>,
}

impl FieldOwnership {
	fn from_entry(entry: &ManagedFieldsEntry) -> Self {
		Self {
			manager: entry.manager.clone().unwrap_or_default(),
			version: entry.api_version.clone().unwrap_or_default(),
			operation: entry.operation.clone(),
			subresource: entry.subresource.clone(),
		}
	}
}

/// Field path -> owner, sorted by path.
pub type OwnershipMap = BTreeMap<String, FieldOwnership>;

/// Builds ownership maps, reusing one merge key cache across calls.
pub struct OwnershipResolver {
	config: ResolverConfig,
	extractor: PathExtractor,
}

impl Default for OwnershipResolver {
	fn default() -> Self {
		Self::new(ResolverConfig::default())
	}
}

impl OwnershipResolver {
	pub fn new(config: ResolverConfig) -> Self {
		let matcher = MergeKeyMatcher::from_capacity(config.merge_key_cache_capacity);
		Self {
			config,
			extractor: PathExtractor::with_matcher(matcher),
		}
	}

	pub fn config(&self) -> &ResolverConfig {
		&self.config
	}

	/// Build the map with the configured mode. Without a user document the
	/// simple walk is used regardless of the mode.
	pub fn resolve(&mut self, entries: &[ManagedFieldsEntry], user: Option<&Value>) -> OwnershipMap {
		match (self.config.mode, user) {
			(ResolutionMode::Resolved, Some(user)) => self.build_ownership_map(entries, user),
			_ => self.build_simple_ownership_map(entries),
		}
	}

	/// Attribute every field of every entry, resolving list selectors
	/// against `user`.
	///
	/// Entries are processed in the order given, so when two managers claim
	/// the same path the one listed last is recorded.
	#[instrument(skip_all, fields(entries = entries.len()))]
	pub fn build_ownership_map(
		&mut self,
		entries: &[ManagedFieldsEntry],
		user: &Value,
	) -> OwnershipMap {
		let mut map = OwnershipMap::new();
		for entry in entries {
			let Some(payload) = self.payload(entry) else {
				continue;
			};
			let owner = FieldOwnership::from_entry(entry);
			for path in self.extractor.extract(payload, user) {
				map.insert(path, owner.clone());
			}
		}
		debug!(paths = map.len(), "built ownership map");
		map
	}

	/// Same as [`Self::build_ownership_map`], with list selectors kept
	/// verbatim instead of resolved.
	#[instrument(skip_all, fields(entries = entries.len()))]
	pub fn build_simple_ownership_map(&self, entries: &[ManagedFieldsEntry]) -> OwnershipMap {
		let mut map = OwnershipMap::new();
		for entry in entries {
			let Some(payload) = self.payload(entry) else {
				continue;
			};
			let owner = FieldOwnership::from_entry(entry);
			for path in extract_simple(payload) {
				map.insert(path, owner.clone());
			}
		}
		debug!(paths = map.len(), "built simple ownership map");
		map
	}

	/// The decoded ownership tree of `entry`, or `None` when the entry is to
	/// be skipped.
	fn payload<'e>(&self, entry: &'e ManagedFieldsEntry) -> Option<&'e Value> {
		let manager = entry.manager.as_deref().unwrap_or_default();
		if self.config.is_ignored(manager) {
			debug!(manager, "skipping ignored manager");
			return None;
		}
		if let Some(fields_type) = entry.fields_type.as_deref() {
			if fields_type != FIELDS_TYPE_V1 {
				debug!(manager, fields_type, "skipping unsupported ownership encoding");
				return None;
			}
		}
		let Some(FieldsV1(payload)) = &entry.fields_v1 else {
			debug!(manager, "entry carries no ownership payload");
			return None;
		};
		if !payload.is_object() {
			debug!(manager, "skipping undecodable ownership payload");
			return None;
		}
		Some(payload)
	}
}

/// [`OwnershipResolver::build_ownership_map`] with default settings.
pub fn build_ownership_map(entries: &[ManagedFieldsEntry], user: &Value) -> OwnershipMap {
	OwnershipResolver::default().build_ownership_map(entries, user)
}

/// [`OwnershipResolver::build_simple_ownership_map`] with default settings.
pub fn build_simple_ownership_map(entries: &[ManagedFieldsEntry]) -> OwnershipMap {
	OwnershipResolver::default().build_simple_ownership_map(entries)
}

/// Project `map` onto `requested`, keeping only the manager names.
pub fn filter_to_paths<S: AsRef<str>>(
	map: &OwnershipMap,
	requested: &[S],
) -> BTreeMap<String, String> {
	requested
		.iter()
		.filter_map(|path| {
			let path = path.as_ref();
			map.get(path)
				.map(|owner| (path.to_string(), owner.manager.clone()))
		})
		.collect()
}

/// Requested paths owned by someone other than `own_manager`.
pub fn conflicting_paths<S: AsRef<str>>(
	map: &OwnershipMap,
	own_manager: &str,
	requested: &[S],
) -> BTreeMap<String, String> {
	let mut owners = filter_to_paths(map, requested);
	owners.retain(|_, manager| manager != own_manager);
	owners
}

/// Ownership payload of `manager`, re-serialized, or `{}` when the manager
/// owns nothing.
///
/// The first entry of the manager that carries a payload is used.
pub fn extract_payload_for_manager(
	entries: &[ManagedFieldsEntry],
	manager: &str,
) -> Result<String> {
	let payload = entries
		.iter()
		.filter(|entry| entry.manager.as_deref() == Some(manager))
		.find_map(|entry| entry.fields_v1.as_ref());

	let Some(FieldsV1(payload)) = payload else {
		return Ok("{}".to_string());
	};
	if !payload.is_object() {
		return Err(FieldsError::InvalidPayload {
			manager: manager.to_string(),
		});
	}
	serde_json::to_string(payload).map_err(|source| FieldsError::PayloadSerialization {
		manager: manager.to_string(),
		source,
	})
}

/// `managedFields` of a typed object, empty when absent.
pub fn managed_fields(meta: &ObjectMeta) -> &[ManagedFieldsEntry] {
	meta.managed_fields.as_deref().unwrap_or_default()
}

/// `metadata.managedFields` of a raw resource document.
///
/// Entries are decoded one by one, a malformed entry is skipped without
/// affecting the others.
pub fn managed_fields_from_object(object: &Value) -> Vec<ManagedFieldsEntry> {
	let Some(Value::Array(raw_entries)) = object.pointer("/metadata/managedFields") else {
		return Vec::new();
	};
	raw_entries
		.iter()
		.enumerate()
		.filter_map(|(index, raw)| {
			match serde_json::from_value::<ManagedFieldsEntry>(raw.clone()) {
				Ok(entry) => Some(entry),
				Err(error) => {
					debug!(index, %error, "skipping malformed managedFields entry");
					None
				}
			}
		})
		.collect()
}

/// Copy-pasteable configuration fragment excluding `paths` from apply.
/// Each path becomes a double-quoted string literal.
pub fn format_ignore_fields<S: AsRef<str>>(attribute: &str, paths: &[S]) -> String {
	let mut out = format!("{attribute} = [\n");
	for path in paths {
		let escaped = path.as_ref().replace('\\', "\\\\").replace('"', "\\\"");
		out.push_str(&format!("  \"{escaped}\",\n"));
	}
	out.push(']');
	out
}
