//! Payload command handler.

use std::{io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use ssa_fields::{extract_payload_for_manager, managed_fields_from_object};

use crate::input;

#[derive(Args)]
pub struct PayloadArgs {
	/// Live object as returned by the API server (JSON or YAML)
	#[arg(long)]
	pub object: PathBuf,

	/// Field manager whose ownership payload to print
	#[arg(long)]
	pub manager: String,
}

/// Run the payload command.
pub fn run<W: Write>(args: PayloadArgs, mut writer: W) -> Result<()> {
	let object: Value = input::load(&args.object)?;
	let entries = managed_fields_from_object(&object);
	let payload = extract_payload_for_manager(&entries, &args.manager)
		.with_context(|| format!("reading ownership of {} in {}", args.manager, args.object.display()))?;
	writeln!(writer, "{payload}")?;
	writer.flush()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use std::fs;

	use tempfile::TempDir;

	use super::*;

	fn run_to_string(object: &str, manager: &str) -> Result<String> {
		let dir = TempDir::new()?;
		let path = dir.path().join("live.yaml");
		fs::write(&path, object)?;
		let mut out = Vec::new();
		run(
			PayloadArgs {
				object: path,
				manager: manager.to_string(),
			},
			&mut out,
		)?;
		Ok(String::from_utf8(out)?)
	}

	const LIVE: &str = "
metadata:
  name: settings
  managedFields:
  - manager: kubectl
    operation: Apply
    apiVersion: v1
    fieldsType: FieldsV1
    fieldsV1:
      f:data:
        f:key: {}
";

	#[test]
	fn test_prints_payload() {
		assert_eq!(run_to_string(LIVE, "kubectl").unwrap(), "{\"f:data\":{\"f:key\":{}}}\n");
	}

	#[test]
	fn test_unknown_manager_owns_nothing() {
		assert_eq!(run_to_string(LIVE, "helm").unwrap(), "{}\n");
	}
}
