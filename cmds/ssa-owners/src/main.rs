use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ssa_owners::{
	commands::{self, util::BrokenPipeGuard},
	config::OwnersConfig,
	telemetry,
};
use tracing::Level;

#[derive(Parser)]
#[command(name = "ssa-owners")]
#[command(about = "Server-side apply field ownership and API error diagnostics", long_about = None)]
#[command(version)]
struct Cli {
	/// Log level (possible values: error, warn, info, debug, trace). Defaults to RUST_LOG, then info
	#[arg(long, global = true)]
	log_level: Option<Level>,

	/// Config file to use instead of the nearest .ssa-owners.yaml
	#[arg(long, global = true)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Print which field manager owns each field path of an object
	Owners(commands::owners::OwnersArgs),

	/// Print the raw ownership payload of one field manager
	Payload(commands::payload::PayloadArgs),

	/// Explain an API error returned for a resource
	Classify(commands::classify::ClassifyArgs),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	telemetry::init(cli.log_level)?;

	let cwd = std::env::current_dir().context("failed to read the working directory")?;
	let config = OwnersConfig::load(cli.config.as_deref(), &cwd)?;

	let stdout = BrokenPipeGuard::new(std::io::stdout());

	match cli.command {
		Commands::Owners(args) => commands::owners::run(args, &config, stdout),
		Commands::Payload(args) => commands::payload::run(args, stdout),
		Commands::Classify(args) => commands::classify::run(args, &config, stdout),
	}
}
