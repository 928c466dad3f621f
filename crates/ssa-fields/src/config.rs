use serde::Deserialize;

/// Settings for [`crate::OwnershipResolver`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverConfig {
	/// How list selectors are rendered.
	#[serde(default)]
	pub mode: ResolutionMode,

	/// Upper bound for memoized merge keys. Unset (or zero) keeps every
	/// parsed key for the lifetime of the resolver.
	#[serde(default)]
	pub merge_key_cache_capacity: Option<usize>,

	/// Managers whose entries are left out of the ownership map, typically
	/// the caller's own field manager.
	#[serde(default)]
	pub ignore_managers: Vec<String>,
}

/// Selects between the two extraction walks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMode {
	/// Resolve list selectors to positions in the user document.
	#[default]
	Resolved,

	/// Keep list selectors verbatim, no user document needed.
	Simple,
}

impl ResolverConfig {
	pub fn is_ignored(&self, manager: &str) -> bool {
		self.ignore_managers.iter().any(|m| m == manager)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_deserialize_defaults() {
		let config: ResolverConfig = serde_json::from_str("{}").unwrap();
		assert_eq!(config, ResolverConfig::default());
		assert_eq!(config.mode, ResolutionMode::Resolved);
	}

	#[test]
	fn test_deserialize_camel_case() {
		let config: ResolverConfig = serde_json::from_str(
			r#"{"mode": "simple", "mergeKeyCacheCapacity": 128, "ignoreManagers": ["ssa-owners"]}"#,
		)
		.unwrap();
		assert_eq!(config.mode, ResolutionMode::Simple);
		assert_eq!(config.merge_key_cache_capacity, Some(128));
		assert!(config.is_ignored("ssa-owners"));
		assert!(!config.is_ignored("kubectl"));
	}
}
