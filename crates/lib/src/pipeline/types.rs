//! Types for the stage runner.

use std::fmt;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::config::ConfigError;
use crate::driver::DriverError;
use crate::extract::ExtractError;
use crate::fetch::FetchError;
use crate::manifest::ManifestError;
use crate::state::{StateError, keys};
use crate::workdir_lock::LockError;

/// One unit of the pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
  Acquire,
  Extract,
  Bootstrap,
  Build,
}

impl Stage {
  pub const ALL: [Stage; 4] = [Stage::Acquire, Stage::Extract, Stage::Bootstrap, Stage::Build];

  /// Completion flag recorded in the state file.
  pub fn flag(self) -> &'static str {
    match self {
      Stage::Acquire => keys::ACQUIRED,
      Stage::Extract => keys::EXTRACTED,
      Stage::Bootstrap => keys::BOOTSTRAPPED,
      Stage::Build => keys::BUILT,
    }
  }

  /// Stages that consume this stage's output.
  pub fn downstream(self) -> impl Iterator<Item = Stage> {
    Self::ALL.into_iter().filter(move |stage| *stage > self)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Stage::Acquire => "acquire",
      Stage::Extract => "extract",
      Stage::Bootstrap => "bootstrap",
      Stage::Build => "build",
    }
  }
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// What the user asked for on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  /// Run every stage.
  Build,
  /// Acquire and extract the source only.
  Init,
  /// Run up to and including the toolchain bootstrap.
  Bootstrap,
  /// Report the persisted state without running anything.
  Status,
}

impl Command {
  pub const ALL: [Command; 4] = [Command::Build, Command::Init, Command::Bootstrap, Command::Status];

  /// Last stage this command runs, `None` for read-only commands.
  pub fn target(self) -> Option<Stage> {
    match self {
      Command::Build => Some(Stage::Build),
      Command::Init => Some(Stage::Extract),
      Command::Bootstrap => Some(Stage::Bootstrap),
      Command::Status => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Command::Build => "build",
      Command::Init => "init",
      Command::Bootstrap => "bootstrap",
      Command::Status => "status",
    }
  }
}

impl fmt::Display for Command {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error)]
#[error("unknown command '{0}' (expected one of: build, init, bootstrap, status)")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
  type Err = UnknownCommand;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|command| command.as_str().eq_ignore_ascii_case(s))
      .ok_or_else(|| UnknownCommand(s.to_string()))
  }
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum PipelineError {
  #[error(transparent)]
  UnknownCommand(#[from] UnknownCommand),

  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Manifest(#[from] ManifestError),

  #[error(transparent)]
  State(#[from] StateError),

  #[error(transparent)]
  Lock(#[from] LockError),

  #[error("acquire failed: {0}")]
  Transport(#[from] FetchError),

  #[error("extract failed: {0}")]
  Extraction(#[from] ExtractError),

  #[error("driver failed: {0}")]
  Driver(#[from] DriverError),

  #[error("failed to prepare {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

impl PipelineError {
  pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
    let path = path.into();
    move |source| PipelineError::Io { path, source }
  }
}

/// Which stages a run executed and which it skipped as already complete.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
  pub executed: Vec<Stage>,
  pub skipped: Vec<Stage>,
}

impl RunReport {
  pub fn did_work(&self) -> bool {
    !self.executed.is_empty()
  }
}
