//! Package manifest loading.
//!
//! A manifest (`warpfox.json` by default) describes the package being built:
//!
//! ```json
//! {
//!   "name": "Foo",
//!   "brands": ["A", "B"],
//!   "description": "A custom browser"
//! }
//! ```
//!
//! Unknown keys are ignored so manifests can carry data for other tools.

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors that can occur when loading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
  /// The manifest file does not exist.
  #[error("manifest not found: {}", .0.display())]
  NotFound(PathBuf),

  /// The manifest file exists but could not be read.
  #[error("failed to read manifest {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  /// The manifest is not valid JSON or has fields of the wrong type.
  #[error("malformed manifest {}: {source}", path.display())]
  Malformed {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },
}

/// Declarative description of the package being built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
  /// Package name. A manifest without one is accepted but unidentified.
  #[serde(default)]
  pub name: Option<String>,

  /// Display brands, in declaration order.
  #[serde(default, deserialize_with = "null_as_default")]
  pub brands: Vec<String>,

  #[serde(default, deserialize_with = "null_as_default")]
  pub description: String,
}

/// An explicit `null` reads the same as an absent key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

impl Manifest {
  /// Load a manifest from `path`.
  pub fn load(path: &Path) -> Result<Self, ManifestError> {
    let content = match fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(ManifestError::NotFound(path.to_path_buf())),
      Err(e) => {
        return Err(ManifestError::Read {
          path: path.to_path_buf(),
          source: e,
        });
      }
    };

    let manifest: Manifest = serde_json::from_str(&content).map_err(|e| ManifestError::Malformed {
      path: path.to_path_buf(),
      source: e,
    })?;

    if manifest.name.is_none() {
      warn!(path = %path.display(), "manifest has no name; package is unidentified");
    }

    Ok(manifest)
  }

  /// Name for display, `<unnamed>` when absent.
  pub fn display_name(&self) -> &str {
    self.name.as_deref().unwrap_or("<unnamed>")
  }
}

impl fmt::Display for Manifest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{} ({})", self.display_name(), self.description)
  }
}
