//! Shared fixtures for pipeline integration tests.
//!
//! The stub adapters record every call into a shared [`CallLog`] so tests can
//! assert exactly which external operations a run performed.

use std::cell::{Cell, RefCell};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tempfile::TempDir;

use warpfox_lib::config::{Config, SourceDefaults};
use warpfox_lib::driver::{BuildDriver, DriverError};
use warpfox_lib::extract::{ExtractError, Extractor};
use warpfox_lib::fetch::{FetchError, Progress, Transport};
use warpfox_lib::orchestrator::{self, RunOutcome};
use warpfox_lib::paths::WorkDir;
use warpfox_lib::pipeline::{Command, Pipeline};
use warpfox_lib::state::{PipelineState, StateStore};

pub const ARCHIVE_BYTES: &[u8] = b"pretend this is a firefox tarball";
pub const DEFAULT_VERSION: &str = "130.0";

/// Ordered record of adapter calls, shared between the stubs and the test.
#[derive(Clone, Default)]
pub struct CallLog(Rc<RefCell<Vec<String>>>);

impl CallLog {
  fn push(&self, call: impl Into<String>) {
    self.0.borrow_mut().push(call.into());
  }

  pub fn calls(&self) -> Vec<String> {
    self.0.borrow().clone()
  }

  pub fn clear(&self) {
    self.0.borrow_mut().clear();
  }
}

pub struct StubTransport {
  log: CallLog,
  pub body: Rc<RefCell<Vec<u8>>>,
}

impl Transport for StubTransport {
  async fn fetch(&self, url: &str, dest: &Path, on_progress: &mut dyn FnMut(Progress)) -> Result<u64, FetchError> {
    self.log.push(format!("fetch {url}"));
    let body = self.body.borrow().clone();
    fs::write(dest, &body)?;
    on_progress(Progress {
      downloaded: body.len() as u64,
      chunk: body.len() as u64,
      total: Some(body.len() as u64),
    });
    Ok(body.len() as u64)
  }
}

pub struct StubExtractor {
  log: CallLog,
}

impl Extractor for StubExtractor {
  async fn extract(&self, _archive: &Path, dest: &Path) -> Result<(), ExtractError> {
    self.log.push("extract");
    fs::write(dest.join("mach"), "#!/bin/sh\n").map_err(|source| ExtractError::Prepare {
      path: dest.to_path_buf(),
      source,
    })
  }
}

pub struct StubDriver {
  log: CallLog,
  pub fail_bootstrap: Rc<Cell<bool>>,
}

impl BuildDriver for StubDriver {
  async fn bootstrap(&self, source_dir: &Path) -> Result<(), DriverError> {
    self.log.push("bootstrap");
    assert!(source_dir.join("mach").is_file(), "bootstrap ran before extract");
    if self.fail_bootstrap.get() {
      return Err(DriverError::Failed {
        command: "mach bootstrap".to_string(),
        code: Some(1),
      });
    }
    Ok(())
  }

  async fn build(&self, source_dir: &Path, jobs: NonZeroUsize) -> Result<(), DriverError> {
    self.log.push(format!("build -j{jobs}"));
    assert!(source_dir.join("mozconfig").is_file(), "build ran without a mozconfig");
    Ok(())
  }
}

/// Isolated project: a manifest, a work directory and stub adapters.
pub struct TestEnv {
  pub temp: TempDir,
  pub manifest_path: PathBuf,
  pub log: CallLog,
  pub body: Rc<RefCell<Vec<u8>>>,
  pub fail_bootstrap: Rc<Cell<bool>>,
  pub sha256: Option<String>,
  pub default_version: String,
}

impl TestEnv {
  pub fn new() -> Self {
    let temp = TempDir::new().unwrap();
    let manifest_path = temp.path().join("warpfox.json");
    fs::write(
      &manifest_path,
      r#"{"name": "Foo", "brands": ["A", "B"], "description": "D"}"#,
    )
    .unwrap();

    Self {
      temp,
      manifest_path,
      log: CallLog::default(),
      body: Rc::new(RefCell::new(ARCHIVE_BYTES.to_vec())),
      fail_bootstrap: Rc::new(Cell::new(false)),
      sha256: None,
      default_version: DEFAULT_VERSION.to_string(),
    }
  }

  pub fn work_dir(&self) -> WorkDir {
    WorkDir::new(self.temp.path().join(".warpfox"))
  }

  pub fn write_manifest(&self, content: &str) {
    fs::write(&self.manifest_path, content).unwrap();
  }

  pub fn pipeline(&self) -> Pipeline<StubTransport, StubExtractor, StubDriver> {
    let source = SourceDefaults {
      version: self.default_version.clone(),
      url_template: "https://example.com/firefox-v{version}/firefox-source.tar.gz".to_string(),
      sha256: self.sha256.clone(),
    };
    let config = Config::with_source(self.work_dir(), source).jobs(2).unwrap();

    Pipeline::new(
      config,
      StubTransport {
        log: self.log.clone(),
        body: self.body.clone(),
      },
      StubExtractor { log: self.log.clone() },
      StubDriver {
        log: self.log.clone(),
        fail_bootstrap: self.fail_bootstrap.clone(),
      },
    )
  }

  /// Run a command the way the binary does, persisting state.
  pub async fn run(&self, command: Command) -> RunOutcome {
    let mut pipeline = self.pipeline();
    orchestrator::run(&mut pipeline, command, &self.manifest_path).await
  }

  pub fn store(&self) -> StateStore {
    StateStore::new(self.work_dir().root())
  }

  pub fn saved_state(&self) -> PipelineState {
    self.store().load().unwrap()
  }

  pub fn state_bytes(&self) -> Vec<u8> {
    fs::read(self.work_dir().state_file()).unwrap()
  }
}

pub fn url_for(version: &str) -> String {
  format!("fetch https://example.com/firefox-v{version}/firefox-source.tar.gz")
}

/// The calls a full run from scratch makes.
pub fn full_run_calls() -> Vec<String> {
  vec![
    url_for(DEFAULT_VERSION),
    "extract".to_string(),
    "bootstrap".to_string(),
    "build -j2".to_string(),
  ]
}
