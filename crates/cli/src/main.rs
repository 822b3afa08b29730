//! Scenario replay for the duplex sync core.
//!
//! Runs a JSON scenario through an in-memory editor and engine and checks
//! that both sides end up with the same text.

mod scenario;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use duplex_sync::SyncConfig;
use scenario::Scenario;
use tracing::{error, info};

/// Replay command line arguments.
#[derive(Parser, Debug)]
#[command(name = "duplex-replay")]
#[command(about = "Replay an editor/engine edit scenario and check convergence")]
#[command(version)]
struct Args {
	/// Scenario file (JSON)
	#[arg(value_name = "SCENARIO")]
	scenario: PathBuf,

	/// Sync configuration (TOML)
	#[arg(short, long, value_name = "PATH")]
	config: Option<PathBuf>,

	/// Print the outcome as JSON
	#[arg(long)]
	json: bool,

	/// Verbose logging
	#[arg(short, long)]
	verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
	let args = Args::parse();
	setup_tracing(args.verbose);

	let config = match &args.config {
		Some(path) => SyncConfig::load(path).with_context(|| format!("loading config {}", path.display()))?,
		None => SyncConfig::default(),
	};
	let scenario = Scenario::load(&args.scenario)?;
	info!(steps = scenario.steps.len(), path = %args.scenario.display(), "replay.start");

	let outcome = scenario::run(&scenario, config).await?;

	if args.json {
		println!("{}", serde_json::to_string_pretty(&outcome)?);
	} else {
		println!("--- editor\n{}", outcome.editor);
		println!("--- engine\n{}", outcome.engine);
	}

	if outcome.converged() {
		info!("replay.converged");
		Ok(ExitCode::SUCCESS)
	} else {
		error!("replay.diverged");
		Ok(ExitCode::FAILURE)
	}
}

fn setup_tracing(verbose: bool) {
	use tracing_subscriber::EnvFilter;

	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
		if verbose {
			EnvFilter::new("duplex_sync=debug,duplex_replay=debug,info")
		} else {
			EnvFilter::new("info")
		}
	});
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
