//! The resumable stage runner.
//!
//! A run walks `Acquire → Extract → Bootstrap → Build` in order, up to a
//! target stage. Before each stage it asks whether the stage is already
//! complete; complete stages are skipped, so re-running after a failure
//! resumes from the first incomplete stage.
//!
//! A stage is complete when its flag is recorded in the state *and* the
//! artifact it produced is still on disk:
//!
//! | stage     | flag           | artifact                                   |
//! |-----------|----------------|--------------------------------------------|
//! | Acquire   | `acquired`     | archive file (or Extract already complete) |
//! | Extract   | `extracted`    | source directory                           |
//! | Bootstrap | `bootstrapped` | source directory                           |
//! | Build     | `built`        | source directory + unchanged mozconfig     |
//!
//! The mozconfig is rendered on every run, before the Build check, and its
//! hash is compared with the one recorded by the last successful build.
//!
//! Flags are only ever set after a stage body returns successfully. The first
//! error aborts the run; nothing is rolled back or retried.

mod types;

pub use types::{Command, PipelineError, RunReport, Stage, UnknownCommand};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::driver::BuildDriver;
use crate::extract::Extractor;
use crate::fetch::{FetchError, Progress, Transport};
use crate::manifest::Manifest;
use crate::mozconfig;
use crate::state::{PipelineState, keys};
use crate::util::hash::{hash_bytes, hash_file};

/// Sequences the stages and owns the adapters they call.
pub struct Pipeline<T, X, D> {
  config: Config,
  transport: T,
  extractor: X,
  driver: D,
  on_progress: Box<dyn FnMut(Progress)>,
}

impl<T: Transport, X: Extractor, D: BuildDriver> Pipeline<T, X, D> {
  pub fn new(config: Config, transport: T, extractor: X, driver: D) -> Self {
    Self {
      config,
      transport,
      extractor,
      driver,
      on_progress: Box::new(|_| {}),
    }
  }

  /// Receive download progress events during Acquire.
  pub fn on_progress(mut self, callback: impl FnMut(Progress) + 'static) -> Self {
    self.on_progress = Box::new(callback);
    self
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Run every stage up to and including `target`.
  ///
  /// `state` is updated in place as stages complete; the caller persists it
  /// whether or not this returns an error.
  pub async fn run(
    &mut self,
    manifest: &Manifest,
    state: &mut PipelineState,
    target: Stage,
  ) -> Result<RunReport, PipelineError> {
    let version = self.resolve_version(state);
    info!(version = %version, "using Firefox version");

    let mut report = RunReport::default();

    for stage in Stage::ALL.into_iter().filter(|stage| *stage <= target) {
      let mozconfig_hash = match stage {
        Stage::Build => Some(self.write_mozconfig(manifest)?),
        _ => None,
      };

      if self.is_complete(stage, state, mozconfig_hash.as_deref()) {
        info!(stage = %stage, "stage already complete, skipping");
        report.skipped.push(stage);
        continue;
      }

      info!(stage = %stage, "running stage");
      self.invalidate(stage, state);

      match stage {
        Stage::Acquire => self.acquire(&version).await?,
        Stage::Extract => self.extract().await?,
        Stage::Bootstrap => self.driver.bootstrap(&self.config.work_dir.source_dir()).await?,
        Stage::Build => {
          self
            .driver
            .build(&self.config.work_dir.source_dir(), self.config.jobs)
            .await?
        }
      }

      state.set(stage.flag(), true);
      if let Some(hash) = mozconfig_hash {
        state.set(keys::MOZCONFIG_HASH, hash);
      }

      info!(stage = %stage, "stage complete");
      report.executed.push(stage);
    }

    Ok(report)
  }

  /// The pinned version from the state, or the bundled default (which is
  /// then pinned).
  fn resolve_version(&self, state: &mut PipelineState) -> String {
    if let Some(version) = state.get::<String>(keys::FIREFOX_VERSION)
      && !version.is_empty()
    {
      return version;
    }

    let version = self.config.source.version.clone();
    debug!(version = %version, "pinning bundled default version");
    state.set(keys::FIREFOX_VERSION, version.clone());
    version
  }

  fn is_complete(&self, stage: Stage, state: &PipelineState, mozconfig_hash: Option<&str>) -> bool {
    let work_dir = &self.config.work_dir;
    let tree_present = || work_dir.source_dir().is_dir();

    match stage {
      // Once the tree is unpacked the archive has served its purpose and may
      // have been deleted to reclaim space.
      Stage::Acquire => {
        (recorded(stage, state) && work_dir.archive().is_file()) || self.is_complete(Stage::Extract, state, None)
      }
      Stage::Extract => recorded(stage, state) && tree_present(),
      Stage::Bootstrap => recorded(stage, state) && tree_present(),
      Stage::Build => {
        recorded(stage, state)
          && tree_present()
          && mozconfig_hash.is_some_and(|hash| state.get::<String>(keys::MOZCONFIG_HASH).as_deref() == Some(hash))
      }
    }
  }

  /// Clear the flags a stage is about to make stale.
  fn invalidate(&self, stage: Stage, state: &mut PipelineState) {
    state.set(stage.flag(), false);

    if matches!(stage, Stage::Acquire | Stage::Extract) {
      state.remove(keys::LEGACY_INITIALIZED);
    }

    // A fresh tree has not been bootstrapped or built.
    if stage == Stage::Extract {
      for later in stage.downstream() {
        state.set(later.flag(), false);
      }
      state.remove(keys::MOZCONFIG_HASH);
    }
  }

  async fn acquire(&mut self, version: &str) -> Result<(), PipelineError> {
    let work_dir = &self.config.work_dir;
    let archive = work_dir.archive();
    let expected = self.config.source.sha256.as_deref();

    if archive.is_file() {
      match expected {
        None => {
          info!(path = %archive.display(), "archive already present, skipping download");
          return Ok(());
        }
        Some(expected) => {
          if digest_of(&archive).await?.eq_ignore_ascii_case(expected) {
            info!(path = %archive.display(), "archive already present and verified");
            return Ok(());
          }
          warn!(path = %archive.display(), "archive digest mismatch, downloading again");
        }
      }
    }

    let url = self.config.source.source_url(version);
    let partial = work_dir.partial_archive();

    fs::create_dir_all(work_dir.root()).map_err(PipelineError::io(work_dir.root()))?;
    remove_if_exists(&partial)?;

    info!(url = %url, "downloading Firefox source");
    self.transport.fetch(&url, &partial, &mut *self.on_progress).await?;

    if !partial.is_file() {
      return Err(FetchError::Missing { url, path: partial }.into());
    }

    if let Some(expected) = expected {
      let actual = digest_of(&partial).await?;
      if !actual.eq_ignore_ascii_case(expected) {
        remove_if_exists(&partial)?;
        return Err(
          FetchError::HashMismatch {
            url,
            expected: expected.to_string(),
            actual,
          }
          .into(),
        );
      }
      debug!(digest = %actual, "archive digest verified");
    }

    fs::rename(&partial, &archive).map_err(PipelineError::io(&archive))?;
    Ok(())
  }

  async fn extract(&self) -> Result<(), PipelineError> {
    let work_dir = &self.config.work_dir;
    let source_dir = work_dir.source_dir();

    // Whatever is here was left by an interrupted extraction.
    if source_dir.exists() {
      info!(path = %source_dir.display(), "clearing partially extracted source");
      tokio::fs::remove_dir_all(&source_dir)
        .await
        .map_err(PipelineError::io(&source_dir))?;
    }
    fs::create_dir_all(&source_dir).map_err(PipelineError::io(&source_dir))?;

    info!("extracting Firefox source");
    self.extractor.extract(&work_dir.archive(), &source_dir).await?;
    Ok(())
  }

  /// Render the mozconfig into the source tree and return its hash.
  fn write_mozconfig(&self, manifest: &Manifest) -> Result<String, PipelineError> {
    let path = self.config.work_dir.mozconfig();
    let contents = mozconfig::render(manifest);

    fs::write(&path, &contents).map_err(PipelineError::io(&path))?;
    info!(path = %path.display(), "populated mozconfig");

    Ok(hash_bytes(contents.as_bytes()))
  }
}

/// Stage flag, honouring the legacy combined flag for the first two stages.
fn recorded(stage: Stage, state: &PipelineState) -> bool {
  state.flag(stage.flag())
    || (matches!(stage, Stage::Acquire | Stage::Extract) && state.flag(keys::LEGACY_INITIALIZED))
}

fn remove_if_exists(path: &Path) -> Result<(), PipelineError> {
  match fs::remove_file(path) {
    Ok(()) => Ok(()),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
    Err(e) => Err(PipelineError::io(path)(e)),
  }
}

async fn digest_of(path: &Path) -> Result<String, PipelineError> {
  let owned: PathBuf = path.to_path_buf();
  tokio::task::spawn_blocking(move || hash_file(&owned))
    .await
    .map_err(io::Error::other)
    .and_then(|result| result)
    .map_err(PipelineError::io(path))
}
