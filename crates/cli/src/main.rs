use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use warpfox_lib::consts::DEFAULT_MANIFEST;

mod cmd;
mod output;

/// warpfox - resumable Firefox fork builder
#[derive(Parser)]
#[command(name = "warpfox")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Command to run: build, init, bootstrap or status
  command: String,

  /// Path to the package manifest
  #[arg(short, long, default_value = DEFAULT_MANIFEST)]
  manifest: PathBuf,

  /// Work directory (default: $WARPFOX_WORKDIR or .warpfox)
  #[arg(long)]
  workdir: Option<PathBuf>,

  /// Parallel build jobs (default: available CPUs)
  #[arg(short, long)]
  jobs: Option<usize>,

  /// Limit on the source download, e.g. "45m"; "0" disables it
  #[arg(long, value_parser = humantime::parse_duration)]
  fetch_timeout: Option<Duration>,

  /// Limit on each mach invocation, e.g. "6h"
  #[arg(long, value_parser = humantime::parse_duration)]
  driver_timeout: Option<Duration>,

  /// Print the state as JSON (status only)
  #[arg(long)]
  json: bool,

  /// Enable verbose output
  #[arg(short, long)]
  verbose: bool,
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "warpfox=debug" } else { "warpfox=info" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  match cmd::cmd_run(&cli) {
    Ok(code) => code,
    Err(e) => {
      output::say(output::Tone::Failed, format!("{e:#}"));
      ExitCode::FAILURE
    }
  }
}
