use std::io;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Keys recognized in the state file.
///
/// Any other key is carried through untouched.
pub mod keys {
  /// Resolved source version. Set once, never recomputed while present.
  pub const FIREFOX_VERSION: &str = "firefox-version";

  /// The archive is fully downloaded (and verified, when a digest is known).
  pub const ACQUIRED: &str = "acquired";

  /// The archive is fully unpacked into the source directory.
  pub const EXTRACTED: &str = "extracted";

  /// Legacy flag covering both acquisition and extraction. The spelling is
  /// what older state files contain.
  pub const LEGACY_INITIALIZED: &str = "intialized";

  /// `mach bootstrap` exited successfully.
  pub const BOOTSTRAPPED: &str = "bootstrapped";

  /// `mach build` exited successfully.
  pub const BUILT: &str = "built";

  /// SHA-256 of the mozconfig used by the last successful build.
  pub const MOZCONFIG_HASH: &str = "mozconfig-hash";

  /// Command name of the most recent run.
  pub const LAST_RUN: &str = "last-run";
}

/// Errors that can occur when reading or writing the state file.
#[derive(Debug, Error)]
pub enum StateError {
  /// The state file exists but is not a JSON object.
  #[error("state file {} is corrupt: {message}", path.display())]
  Corrupt { path: PathBuf, message: String },

  #[error("failed to read state file: {0}")]
  Read(#[source] io::Error),

  #[error("failed to write state file: {0}")]
  Write(#[source] io::Error),

  #[error("failed to create state directory: {0}")]
  CreateDir(#[source] io::Error),

  #[error("failed to serialize state: {0}")]
  Serialize(#[source] serde_json::Error),
}

/// Key/value record of completion flags and resolved parameters.
///
/// Key order is preserved on round-trip and unknown keys are kept, so files
/// written by newer versions survive a run of an older one.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PipelineState {
  entries: Map<String, Value>,
}

impl PipelineState {
  pub fn new() -> Self {
    Self::default()
  }

  pub(crate) fn from_map(entries: Map<String, Value>) -> Self {
    Self { entries }
  }

  /// Typed lookup. Missing keys and values of another type both yield `None`.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    self
      .entries
      .get(key)
      .and_then(|value| serde_json::from_value(value.clone()).ok())
  }

  /// Typed lookup with a fallback.
  pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
    self.get(key).unwrap_or(default)
  }

  /// Completion flag; anything other than `true` reads as not completed.
  pub fn flag(&self, key: &str) -> bool {
    self.get_or(key, false)
  }

  pub fn set(&mut self, key: &str, value: impl Into<Value>) {
    self.entries.insert(key.to_string(), value.into());
  }

  pub fn remove(&mut self, key: &str) -> Option<Value> {
    self.entries.shift_remove(key)
  }

  pub fn contains(&self, key: &str) -> bool {
    self.entries.contains_key(key)
  }

  pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
    self.entries.iter()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }
}
