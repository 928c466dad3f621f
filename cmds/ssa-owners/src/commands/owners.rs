//! Owners command handler.

use std::{io::Write, path::PathBuf};

use anyhow::Result;
use clap::Args;
use serde_json::Value;
use ssa_fields::{
	conflicting_paths, filter_to_paths, managed_fields_from_object, path::normalize,
	OwnershipResolver, ResolutionMode,
};
use tracing::{info, warn};

use super::util::write_json;
use crate::{config::OwnersConfig, input};

#[derive(Args)]
pub struct OwnersArgs {
	/// Live object as returned by the API server (JSON or YAML)
	#[arg(long)]
	pub object: PathBuf,

	/// Desired document to resolve list positions against. Defaults to the live object itself
	#[arg(long)]
	pub desired: Option<PathBuf>,

	/// Keep list selectors verbatim instead of resolving them to positions
	#[arg(long)]
	pub simple: bool,

	/// Only report these paths (repeatable)
	#[arg(long = "path")]
	pub paths: Vec<String>,

	/// Only report paths owned by managers other than this one
	#[arg(long)]
	pub conflicts_with: Option<String>,
}

/// Run the owners command.
pub fn run<W: Write>(args: OwnersArgs, config: &OwnersConfig, writer: W) -> Result<()> {
	let object: Value = input::load(&args.object)?;
	let entries = managed_fields_from_object(&object);
	if entries.is_empty() {
		warn!(object = %args.object.display(), "object has no managedFields");
	}

	let desired = match &args.desired {
		Some(path) => input::load(path)?,
		None => input::strip_server_fields(&object),
	};

	let mut resolver_config = config.resolver.clone();
	if args.simple {
		resolver_config.mode = ResolutionMode::Simple;
	}
	let mut resolver = OwnershipResolver::new(resolver_config);
	let map = resolver.resolve(&entries, Some(&desired));
	info!(entries = entries.len(), paths = map.len(), "resolved field ownership");

	let requested: Vec<&str> = if args.paths.is_empty() {
		map.keys().map(String::as_str).collect()
	} else {
		args.paths.iter().map(|path| normalize(path)).collect()
	};

	match (&args.conflicts_with, args.paths.is_empty()) {
		(Some(manager), _) => write_json(writer, &conflicting_paths(&map, manager, &requested)),
		(None, false) => write_json(writer, &filter_to_paths(&map, &requested)),
		(None, true) => write_json(writer, &map),
	}
}
