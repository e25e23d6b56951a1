//! One invocation, start to finish.
//!
//! [`run`] ties the pieces together: load the manifest, take the work
//! directory lock, load the state, run the pipeline up to the command's
//! target, and persist the state. It never panics and never returns early
//! without reporting; the caller turns the [`RunOutcome`] into an exit code.

use std::path::Path;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::driver::BuildDriver;
use crate::extract::Extractor;
use crate::fetch::Transport;
use crate::manifest::Manifest;
use crate::pipeline::{Command, Pipeline, PipelineError, RunReport};
use crate::state::{PipelineState, StateStore, keys};
use crate::workdir_lock::WorkdirLock;

/// Result of one invocation.
#[derive(Debug)]
pub struct RunOutcome {
  pub command: Command,
  pub elapsed: Duration,
  pub result: Result<RunReport, PipelineError>,
  /// State as it stood when the run ended; `None` if it was never loaded.
  pub state: Option<PipelineState>,
}

impl RunOutcome {
  pub fn is_success(&self) -> bool {
    self.result.is_ok()
  }

  /// Process exit code: 0 on success, 1 on any failure.
  pub fn exit_code(&self) -> u8 {
    if self.is_success() { 0 } else { 1 }
  }
}

/// Run `command` against the manifest at `manifest_path`.
///
/// The state file is written back whenever it was loaded, including after a
/// stage failure, so completed stages are not repeated. It is left untouched
/// when the manifest or the state itself could not be read.
pub async fn run<T: Transport, X: Extractor, D: BuildDriver>(
  pipeline: &mut Pipeline<T, X, D>,
  command: Command,
  manifest_path: &Path,
) -> RunOutcome {
  let started = Instant::now();
  let mut state = None;

  let result = execute(pipeline, command, manifest_path, &mut state).await;

  let elapsed = started.elapsed();
  if let Err(e) = &result {
    error!(command = %command, error = %e, "run failed");
  }
  info!(elapsed = ?elapsed, "finished in {:.2}s", elapsed.as_secs_f64());

  RunOutcome {
    command,
    elapsed,
    result,
    state,
  }
}

async fn execute<T: Transport, X: Extractor, D: BuildDriver>(
  pipeline: &mut Pipeline<T, X, D>,
  command: Command,
  manifest_path: &Path,
  loaded: &mut Option<PipelineState>,
) -> Result<RunReport, PipelineError> {
  let manifest = Manifest::load(manifest_path)?;
  info!(command = %command, package = %manifest, "running command");

  let work_dir = pipeline.config().work_dir.clone();
  let store = StateStore::new(work_dir.root());

  let Some(target) = command.target() else {
    *loaded = Some(store.load()?);
    return Ok(RunReport::default());
  };

  let _lock = WorkdirLock::acquire(&work_dir, command.as_str())?;

  let mut state = store.load()?;
  let result = pipeline.run(&manifest, &mut state, target).await;

  state.set(keys::LAST_RUN, command.as_str());
  let saved = store.save(&state);
  *loaded = Some(state);

  // A stage failure is the more useful report when both go wrong.
  let report = result?;
  saved?;
  Ok(report)
}
