//! Classify command handler.

use std::{io::Write, path::PathBuf};

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use ssa_diagnostics::{
	expected_api_group, is_dependency_not_ready_error, is_invalid_api_group_error, ApiError,
	ErrorClassification, ErrorClassifier,
};

use super::util::write_json;
use crate::{config::OwnersConfig, input};

#[derive(Args)]
pub struct ClassifyArgs {
	/// API error body (a `Status` object, JSON or YAML)
	#[arg(long)]
	pub error: PathBuf,

	/// Operation that failed, e.g. apply or delete
	#[arg(long, default_value = "apply")]
	pub operation: String,

	/// Human readable description of the resource, e.g. "Deployment default/web"
	#[arg(long)]
	pub resource: String,

	/// apiVersion of the resource
	#[arg(long)]
	pub api_version: Option<String>,

	/// Kind of the resource, enables the API group check
	#[arg(long)]
	pub kind: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassifyReport {
	#[serde(flatten)]
	classification: ErrorClassification,
	/// Retrying after other resources are in place may succeed.
	dependency_not_ready: bool,
	/// The kind was requested under a group it does not belong to.
	invalid_api_group: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	expected_api_group: Option<&'static str>,
}

fn report(args: &ClassifyArgs, err: &ApiError, classifier: &ErrorClassifier) -> ClassifyReport {
	let api_version = args.api_version.as_deref();
	let classification = classifier.classify(err, &args.operation, &args.resource, api_version);

	let invalid_api_group = match (args.kind.as_deref(), api_version) {
		(Some(kind), Some(api_version)) => is_invalid_api_group_error(err, kind, api_version),
		_ => false,
	};
	ClassifyReport {
		classification,
		dependency_not_ready: is_dependency_not_ready_error(err),
		invalid_api_group,
		expected_api_group: invalid_api_group
			.then(|| args.kind.as_deref().and_then(expected_api_group))
			.flatten(),
	}
}

/// Run the classify command.
pub fn run<W: Write>(args: ClassifyArgs, config: &OwnersConfig, writer: W) -> Result<()> {
	let err: ApiError = input::load(&args.error)?;
	let classifier = ErrorClassifier::new(config.classifier.clone());
	write_json(writer, &report(&args, &err, &classifier))
}
