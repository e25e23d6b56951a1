//! Entry point shared by every command.
//!
//! Builds the configuration and adapters from the command line, runs the
//! orchestrator on a current-thread runtime, and reports the outcome.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use warpfox_lib::config::Config;
use warpfox_lib::driver::MachDriver;
use warpfox_lib::extract::TarExtractor;
use warpfox_lib::fetch::{HttpTransport, Progress};
use warpfox_lib::orchestrator::{self, RunOutcome};
use warpfox_lib::paths::WorkDir;
use warpfox_lib::pipeline::{Command, Pipeline, Stage};

use crate::Cli;
use crate::cmd::print_status;
use crate::output::{Tone, say};

pub fn cmd_run(cli: &Cli) -> Result<ExitCode> {
  let command: Command = match cli.command.parse() {
    Ok(command) => command,
    Err(e) => {
      say(Tone::Failed, e);
      return Ok(ExitCode::FAILURE);
    }
  };

  let work_dir = match &cli.workdir {
    Some(dir) => WorkDir::new(dir),
    None => WorkDir::from_env(),
  };

  let mut config = Config::new(work_dir).context("Failed to load source defaults")?;
  if let Some(jobs) = cli.jobs {
    config = config.jobs(jobs).context("Invalid --jobs")?;
  }
  if let Some(limit) = cli.fetch_timeout {
    config = config.fetch_timeout(non_zero(limit));
  }
  if let Some(limit) = cli.driver_timeout {
    config = config.driver_timeout(non_zero(limit));
  }

  let transport = HttpTransport::new(config.fetch_timeout).context("Failed to create HTTP client")?;
  let driver = MachDriver::new(config.driver_timeout);

  let bar = download_bar();
  let mut pipeline = Pipeline::new(config, transport, TarExtractor, driver).on_progress(track(bar.clone()));

  let rt = tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .context("Failed to create async runtime")?;
  let outcome = rt.block_on(orchestrator::run(&mut pipeline, command, &cli.manifest));
  bar.finish_and_clear();

  report(&outcome, &pipeline.config().work_dir, cli.json)?;

  Ok(ExitCode::from(outcome.exit_code()))
}

/// Print the result of a successful run. Failures and the elapsed time are
/// already logged by the orchestrator.
fn report(outcome: &RunOutcome, work_dir: &WorkDir, json: bool) -> Result<()> {
  let Ok(report) = &outcome.result else {
    return Ok(());
  };

  if outcome.command == Command::Status {
    if let Some(state) = &outcome.state {
      print_status(state, work_dir, json)?;
    }
    return Ok(());
  }

  if report.did_work() {
    say(
      Tone::Done,
      format_args!("{} complete: ran {}", outcome.command, stage_list(&report.executed)),
    );
  } else {
    say(Tone::Done, format_args!("{} complete: nothing to do", outcome.command));
  }
  if !report.skipped.is_empty() {
    say(Tone::Note, format_args!("Already complete: {}", stage_list(&report.skipped)));
  }

  Ok(())
}

fn stage_list(stages: &[Stage]) -> String {
  stages.iter().map(|stage| stage.as_str()).collect::<Vec<_>>().join(", ")
}

fn non_zero(limit: Duration) -> Option<Duration> {
  (!limit.is_zero()).then_some(limit)
}

/// A download bar that stays invisible until the first progress event.
fn download_bar() -> ProgressBar {
  let bar = ProgressBar::hidden();
  bar.set_message("Downloading Firefox source");
  bar
}

fn track(bar: ProgressBar) -> impl FnMut(Progress) + 'static {
  let mut started = false;
  move |progress: Progress| {
    if !started {
      started = true;
      let template = match progress.total {
        Some(total) => {
          bar.set_length(total);
          "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} {msg}"
        }
        None => "{spinner:.green} [{elapsed_precise}] {bytes} {msg}",
      };
      if let Ok(style) = ProgressStyle::with_template(template) {
        bar.set_style(style.progress_chars("#>-"));
      }
      bar.set_draw_target(ProgressDrawTarget::stderr());
    }
    bar.set_position(progress.downloaded);
  }
}
