//! Build driver invocation.
//!
//! The extracted source tree ships its own driver (`mach`). The pipeline talks
//! to it through [`BuildDriver`]; [`MachDriver`] spawns it with an explicit
//! argument list, never through a shell.

use std::ffi::OsString;
use std::future::Future;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Errors that can occur while running the build driver.
#[derive(Debug, Error)]
pub enum DriverError {
  /// The driver could not be started.
  #[error("failed to spawn {}: {source}", program.display())]
  Spawn {
    program: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The driver exited unsuccessfully. `code` is `None` when killed by a signal.
  #[error("`{command}` failed with exit code {code:?}")]
  Failed { command: String, code: Option<i32> },

  /// The driver did not finish within the configured limit and was killed.
  #[error("`{command}` timed out after {}s", limit.as_secs())]
  Timeout { command: String, limit: Duration },

  #[error("io error while running driver: {0}")]
  Io(#[from] io::Error),
}

/// Runs the external toolchain's bootstrap and build commands.
pub trait BuildDriver {
  /// Install the toolchain the source tree needs.
  fn bootstrap(&self, source_dir: &Path) -> impl Future<Output = Result<(), DriverError>>;

  /// Build the source tree with `jobs` parallel jobs.
  fn build(&self, source_dir: &Path, jobs: NonZeroUsize) -> impl Future<Output = Result<(), DriverError>>;
}

/// Drives a Firefox source tree through its `mach` script.
#[derive(Debug, Clone)]
pub struct MachDriver {
  program: OsString,
  timeout: Option<Duration>,
}

impl MachDriver {
  /// Create a driver; `timeout` bounds each invocation.
  pub fn new(timeout: Option<Duration>) -> Self {
    Self {
      program: OsString::from("mach"),
      timeout,
    }
  }

  /// Use a different script name inside the source tree.
  pub fn with_program(mut self, program: impl Into<OsString>) -> Self {
    self.program = program.into();
    self
  }

  fn bootstrap_args() -> Vec<String> {
    vec![
      "bootstrap".to_string(),
      "--no-interactive".to_string(),
      "--application-choice=browser".to_string(),
    ]
  }

  fn build_args(jobs: NonZeroUsize) -> Vec<String> {
    vec!["build".to_string(), format!("-j{jobs}")]
  }

  async fn run(&self, source_dir: &Path, args: &[String]) -> Result<(), DriverError> {
    let source_dir = std::path::absolute(source_dir)?;
    let program = source_dir.join(&self.program);
    let command_line = format!("{} {}", self.program.to_string_lossy(), args.join(" "));

    info!(command = %command_line, cwd = %source_dir.display(), "running build driver");

    let mut child = Command::new(&program)
      .args(args)
      .current_dir(&source_dir)
      .kill_on_drop(true)
      .spawn()
      .map_err(|e| DriverError::Spawn {
        program: program.clone(),
        source: e,
      })?;

    let status: ExitStatus = match self.timeout {
      Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
        Ok(status) => status?,
        Err(_) => {
          warn!(command = %command_line, "build driver timed out, killing");
          child.kill().await?;
          return Err(DriverError::Timeout {
            command: command_line,
            limit,
          });
        }
      },
      None => child.wait().await?,
    };

    debug!(command = %command_line, status = %status, "build driver exited");

    if !status.success() {
      return Err(DriverError::Failed {
        command: command_line,
        code: status.code(),
      });
    }

    Ok(())
  }
}

impl Default for MachDriver {
  fn default() -> Self {
    Self::new(None)
  }
}

impl BuildDriver for MachDriver {
  async fn bootstrap(&self, source_dir: &Path) -> Result<(), DriverError> {
    self.run(source_dir, &Self::bootstrap_args()).await?;
    info!("bootstrap completed successfully");
    Ok(())
  }

  async fn build(&self, source_dir: &Path, jobs: NonZeroUsize) -> Result<(), DriverError> {
    self.run(source_dir, &Self::build_args(jobs)).await?;
    info!("build completed successfully");
    Ok(())
  }
}
