//! Configuration file support for ssa-owners
//!
//! Supports `.ssa-owners.yaml` files placed anywhere in the directory
//! hierarchy. The nearest one, searching from the working directory upward,
//! is used unless `--config` names one explicitly.

use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;
use ssa_diagnostics::ClassifierConfig;
use ssa_fields::ResolverConfig;
use tracing::debug;

/// The name of the config file ssa-owners looks for
pub const CONFIG_FILE_NAME: &str = ".ssa-owners.yaml";

/// Root configuration structure for .ssa-owners.yaml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnersConfig {
	/// Ownership resolution settings
	#[serde(default)]
	pub resolver: ResolverConfig,

	/// Error classification settings
	#[serde(default)]
	pub classifier: ClassifierConfig,
}

impl OwnersConfig {
	/// Load `explicit` if given, otherwise the nearest config file above
	/// `start_dir`, otherwise defaults.
	pub fn load(explicit: Option<&Path>, start_dir: &Path) -> Result<Self> {
		if let Some(path) = explicit {
			return Self::load_from_file(path);
		}
		match find_config_file(start_dir) {
			Some(path) => Self::load_from_file(&path),
			None => {
				debug!(start_dir = %start_dir.display(), "no config file found, using defaults");
				Ok(Self::default())
			}
		}
	}

	/// Load config from a specific file path
	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file: {}", path.display()))?;
		let config: OwnersConfig = serde_yaml_with_quirks::from_str(&content)
			.with_context(|| format!("failed to parse config file: {}", path.display()))?;
		debug!(path = %path.display(), "loaded config file");
		Ok(config)
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let mut current = start_dir.to_path_buf();
	if let Ok(canonical) = current.canonicalize() {
		current = canonical;
	}

	loop {
		let config_path = current.join(CONFIG_FILE_NAME);
		if config_path.exists() {
			return Some(config_path);
		}
		match current.parent() {
			Some(parent) if parent != current => current = parent.to_path_buf(),
			_ => return None,
		}
	}
}
