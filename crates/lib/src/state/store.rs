//! State file storage.
//!
//! The state lives in a single JSON object at `{work_dir}/cache.json`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::consts::STATE_FILENAME;

use super::types::{PipelineState, StateError};

/// Reads and writes the pipeline state file.
///
/// Writes are atomic (temp file + rename) so a crash mid-save never leaves a
/// truncated state file behind.
#[derive(Debug, Clone)]
pub struct StateStore {
  base_path: PathBuf,
}

impl StateStore {
  /// Create a store rooted at the given work directory.
  pub fn new(base_path: impl Into<PathBuf>) -> Self {
    Self {
      base_path: base_path.into(),
    }
  }

  pub fn base_path(&self) -> &Path {
    &self.base_path
  }

  pub fn state_path(&self) -> PathBuf {
    self.base_path.join(STATE_FILENAME)
  }

  /// Load the persisted state.
  ///
  /// Returns an empty state if the file doesn't exist (first run).
  pub fn load(&self) -> Result<PipelineState, StateError> {
    let path = self.state_path();

    let content = match fs::read_to_string(&path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => {
        debug!(path = %path.display(), "no state file, starting fresh");
        return Ok(PipelineState::new());
      }
      Err(e) => return Err(StateError::Read(e)),
    };

    let value: Value = serde_json::from_str(&content).map_err(|e| StateError::Corrupt {
      path: path.clone(),
      message: e.to_string(),
    })?;

    match value {
      Value::Object(entries) => {
        debug!(path = %path.display(), keys = entries.len(), "loaded state");
        Ok(PipelineState::from_map(entries))
      }
      other => Err(StateError::Corrupt {
        path,
        message: format!("expected a JSON object, found {}", json_kind(&other)),
      }),
    }
  }

  /// Write the full state, replacing any previous contents.
  ///
  /// Creates the work directory if it doesn't exist yet.
  pub fn save(&self, state: &PipelineState) -> Result<(), StateError> {
    fs::create_dir_all(&self.base_path).map_err(StateError::CreateDir)?;

    let path = self.state_path();
    let temp_path = self.base_path.join(format!("{STATE_FILENAME}.tmp"));

    let content = serde_json::to_string_pretty(state).map_err(StateError::Serialize)?;
    fs::write(&temp_path, &content).map_err(StateError::Write)?;
    fs::rename(&temp_path, &path).map_err(StateError::Write)?;

    debug!(path = %path.display(), keys = state.len(), "saved state");
    Ok(())
  }
}

fn json_kind(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}
