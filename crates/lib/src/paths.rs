//! Work directory layout.
//!
//! ```text
//! {work_dir}/
//! ├── .lock                      # WorkdirLock, held for the duration of a run
//! ├── cache.json                 # PipelineState
//! ├── firefox-source.tar.gz      # acquired archive
//! ├── firefox-source.tar.gz.part # in-flight download
//! └── firefox-source/            # extracted tree (contains `mach`, `mozconfig`)
//! ```

use std::path::{Path, PathBuf};

use crate::consts::{
  ARCHIVE_FILENAME, DEFAULT_WORK_DIR, LOCK_FILENAME, MOZCONFIG_FILENAME, SOURCE_DIRNAME, STATE_FILENAME, WORK_DIR_ENV,
};

/// Returns the work directory, honouring `WARPFOX_WORKDIR` when set.
pub fn work_dir() -> PathBuf {
  std::env::var_os(WORK_DIR_ENV)
    .filter(|value| !value.is_empty())
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from(DEFAULT_WORK_DIR))
}

/// Well-known paths inside a work directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDir {
  root: PathBuf,
}

impl WorkDir {
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self { root: root.into() }
  }

  /// Work directory from the environment, falling back to `.warpfox`.
  pub fn from_env() -> Self {
    Self::new(work_dir())
  }

  pub fn root(&self) -> &Path {
    &self.root
  }

  pub fn state_file(&self) -> PathBuf {
    self.root.join(STATE_FILENAME)
  }

  pub fn archive(&self) -> PathBuf {
    self.root.join(ARCHIVE_FILENAME)
  }

  /// Download target; renamed onto [`WorkDir::archive`] once complete.
  pub fn partial_archive(&self) -> PathBuf {
    self.root.join(format!("{ARCHIVE_FILENAME}.part"))
  }

  pub fn source_dir(&self) -> PathBuf {
    self.root.join(SOURCE_DIRNAME)
  }

  pub fn mozconfig(&self) -> PathBuf {
    self.source_dir().join(MOZCONFIG_FILENAME)
  }

  pub fn lock_file(&self) -> PathBuf {
    self.root.join(LOCK_FILENAME)
  }
}

impl Default for WorkDir {
  fn default() -> Self {
    Self::new(DEFAULT_WORK_DIR)
  }
}
