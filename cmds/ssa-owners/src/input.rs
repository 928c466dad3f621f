//! Loading of resource documents and API error bodies.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Fields the API server adds to metadata that are not part of a desired
/// document.
const SERVER_METADATA_FIELDS: &[&str] = &["managedFields"];

/// Read a JSON or YAML file. `.json` files are parsed as JSON, anything else
/// as YAML.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
	let content = fs::read_to_string(path)
		.with_context(|| format!("failed to read file: {}", path.display()))?;
	let is_json = path
		.extension()
		.is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
	if is_json {
		serde_json::from_str(&content)
			.with_context(|| format!("failed to parse JSON: {}", path.display()))
	} else {
		serde_yaml_with_quirks::from_str(&content)
			.with_context(|| format!("failed to parse YAML: {}", path.display()))
	}
}

/// A copy of `object` without the server-maintained metadata fields, usable
/// as the desired document of a live object.
pub fn strip_server_fields(object: &Value) -> Value {
	let mut cleaned = object.clone();
	if let Some(Value::Object(meta)) = cleaned.get_mut("metadata") {
		for field in SERVER_METADATA_FIELDS {
			meta.remove(*field);
		}
	}
	cleaned
}
