//! Run configuration.
//!
//! A [`Config`] is built once per process from the bundled source defaults
//! (`firefox.json`, embedded at compile time) and command-line overrides, then
//! passed by reference to the pipeline. Nothing mutates it after construction.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::paths::WorkDir;

/// Bundled source defaults shipped with the binary.
const BUNDLED_SOURCE: &str = include_str!("../firefox.json");

/// Placeholder substituted with the resolved version in the URL template.
const VERSION_PLACEHOLDER: &str = "{version}";

/// Default whole-transfer limit for the archive download.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("failed to parse bundled source defaults: {0}")]
  Bundled(#[source] serde_json::Error),

  #[error("source url template does not contain {VERSION_PLACEHOLDER}: {0}")]
  UrlTemplate(String),

  #[error("build jobs must be at least 1")]
  ZeroJobs,
}

/// Where the source archive comes from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceDefaults {
  /// Version used when the state file has not pinned one yet.
  pub version: String,

  /// Archive URL template; `{version}` is replaced with the resolved version.
  #[serde(rename = "url")]
  pub url_template: String,

  /// Expected SHA-256 of the archive, when known.
  #[serde(default)]
  pub sha256: Option<String>,
}

impl SourceDefaults {
  /// Parse the defaults compiled into the binary.
  pub fn bundled() -> Result<Self, ConfigError> {
    let defaults: Self = serde_json::from_str(BUNDLED_SOURCE).map_err(ConfigError::Bundled)?;
    defaults.validate()?;
    Ok(defaults)
  }

  fn validate(&self) -> Result<(), ConfigError> {
    if !self.url_template.contains(VERSION_PLACEHOLDER) {
      return Err(ConfigError::UrlTemplate(self.url_template.clone()));
    }
    Ok(())
  }

  /// Derive the archive URL for a version.
  pub fn source_url(&self, version: &str) -> String {
    self.url_template.replace(VERSION_PLACEHOLDER, version)
  }
}

/// Immutable settings for one pipeline run.
#[derive(Debug, Clone)]
pub struct Config {
  pub work_dir: WorkDir,
  pub source: SourceDefaults,
  /// Parallel jobs passed to `mach build -j`.
  pub jobs: NonZeroUsize,
  /// Limit on the whole archive transfer; `None` waits forever.
  pub fetch_timeout: Option<Duration>,
  /// Limit on each `mach` invocation; `None` waits forever.
  pub driver_timeout: Option<Duration>,
}

impl Config {
  /// Configuration with bundled defaults rooted at `work_dir`.
  pub fn new(work_dir: WorkDir) -> Result<Self, ConfigError> {
    Ok(Self::with_source(work_dir, SourceDefaults::bundled()?))
  }

  pub fn with_source(work_dir: WorkDir, source: SourceDefaults) -> Self {
    Self {
      work_dir,
      source,
      jobs: default_jobs(),
      fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
      driver_timeout: None,
    }
  }

  pub fn jobs(mut self, jobs: usize) -> Result<Self, ConfigError> {
    self.jobs = NonZeroUsize::new(jobs).ok_or(ConfigError::ZeroJobs)?;
    Ok(self)
  }

  pub fn fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.fetch_timeout = timeout;
    self
  }

  pub fn driver_timeout(mut self, timeout: Option<Duration>) -> Self {
    self.driver_timeout = timeout;
    self
  }
}

fn default_jobs() -> NonZeroUsize {
  std::thread::available_parallelism().unwrap_or(NonZeroUsize::MIN)
}
