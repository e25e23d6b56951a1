//! Pipeline integration tests.
//!
//! Each test drives full runs through the orchestrator with stub adapters and
//! checks both the calls made and what was persisted to `cache.json`.

mod common;

use std::fs;

use serde_json::{Value, json};

use warpfox_lib::pipeline::{Command, PipelineError, Stage};
use warpfox_lib::state::keys;
use warpfox_lib::util::hash::hash_bytes;

use common::{ARCHIVE_BYTES, DEFAULT_VERSION, TestEnv, full_run_calls, url_for};

// =============================================================================
// Fresh runs
// =============================================================================

#[tokio::test]
async fn fresh_build_runs_every_stage_in_order() {
  let env = TestEnv::new();

  let outcome = env.run(Command::Build).await;

  assert_eq!(outcome.exit_code(), 0);
  assert_eq!(env.log.calls(), full_run_calls());

  let report = outcome.result.unwrap();
  assert_eq!(report.executed, Stage::ALL.to_vec());
  assert!(report.skipped.is_empty());

  let state = env.saved_state();
  for stage in Stage::ALL {
    assert!(state.flag(stage.flag()), "{stage} not recorded");
  }
  assert_eq!(state.get::<String>(keys::FIREFOX_VERSION).as_deref(), Some(DEFAULT_VERSION));
  assert_eq!(state.get::<String>(keys::LAST_RUN).as_deref(), Some("build"));
}

#[tokio::test]
async fn fresh_build_leaves_expected_artifacts() {
  let env = TestEnv::new();

  env.run(Command::Build).await;

  let work_dir = env.work_dir();
  assert_eq!(fs::read(work_dir.archive()).unwrap(), ARCHIVE_BYTES);
  assert!(!work_dir.partial_archive().exists());
  assert!(work_dir.source_dir().join("mach").is_file());

  let mozconfig = fs::read_to_string(work_dir.mozconfig()).unwrap();
  assert!(mozconfig.contains("MOZ_APP_NAME=foo"));
  assert!(mozconfig.contains("Foo (D)"));
  assert_eq!(
    env.saved_state().get::<String>(keys::MOZCONFIG_HASH),
    Some(hash_bytes(mozconfig.as_bytes()))
  );
}

#[tokio::test]
async fn init_stops_after_extract() {
  let env = TestEnv::new();

  let outcome = env.run(Command::Init).await;

  assert_eq!(outcome.exit_code(), 0);
  assert_eq!(env.log.calls(), vec![url_for(DEFAULT_VERSION), "extract".to_string()]);

  let state = env.saved_state();
  assert!(state.flag(keys::ACQUIRED));
  assert!(state.flag(keys::EXTRACTED));
  assert!(!state.flag(keys::BOOTSTRAPPED));
  assert!(!state.flag(keys::BUILT));
  assert!(!env.work_dir().mozconfig().exists());
}

#[tokio::test]
async fn bootstrap_command_stops_before_build() {
  let env = TestEnv::new();

  env.run(Command::Bootstrap).await;

  assert_eq!(env.log.calls().last().map(String::as_str), Some("bootstrap"));
  assert!(!env.saved_state().flag(keys::BUILT));
}

// =============================================================================
// Idempotence and resume
// =============================================================================

#[tokio::test]
async fn second_build_makes_no_external_calls() {
  let env = TestEnv::new();
  env.run(Command::Build).await;
  env.log.clear();

  let outcome = env.run(Command::Build).await;

  assert_eq!(outcome.exit_code(), 0);
  assert!(env.log.calls().is_empty(), "unexpected calls: {:?}", env.log.calls());
  let report = outcome.result.unwrap();
  assert!(!report.did_work());
  assert_eq!(report.skipped, Stage::ALL.to_vec());
}

#[tokio::test]
async fn resume_after_bootstrap_failure() {
  let env = TestEnv::new();
  env.fail_bootstrap.set(true);

  let failed = env.run(Command::Build).await;

  assert_eq!(failed.exit_code(), 1);
  assert!(matches!(failed.result, Err(PipelineError::Driver(_))));
  let state = env.saved_state();
  assert!(state.flag(keys::ACQUIRED));
  assert!(state.flag(keys::EXTRACTED));
  assert!(!state.flag(keys::BOOTSTRAPPED));
  assert!(!state.flag(keys::BUILT));

  env.fail_bootstrap.set(false);
  env.log.clear();

  let resumed = env.run(Command::Build).await;

  assert_eq!(resumed.exit_code(), 0);
  assert_eq!(env.log.calls(), vec!["bootstrap".to_string(), "build -j2".to_string()]);
  assert!(env.saved_state().flag(keys::BUILT));
}

#[tokio::test]
async fn later_command_reuses_earlier_stages() {
  let env = TestEnv::new();
  env.run(Command::Init).await;
  env.log.clear();

  env.run(Command::Build).await;

  assert_eq!(env.log.calls(), vec!["bootstrap".to_string(), "build -j2".to_string()]);
}

#[tokio::test]
async fn manifest_change_rebuilds_only() {
  let env = TestEnv::new();
  env.run(Command::Build).await;
  env.log.clear();

  env.write_manifest(r#"{"name": "Bar", "description": "renamed"}"#);
  env.run(Command::Build).await;

  assert_eq!(env.log.calls(), vec!["build -j2".to_string()]);
  let mozconfig = fs::read_to_string(env.work_dir().mozconfig()).unwrap();
  assert!(mozconfig.contains("MOZ_APP_NAME=bar"));
}

// =============================================================================
// State durability
// =============================================================================

#[tokio::test]
async fn deleted_source_tree_is_extracted_again() {
  let env = TestEnv::new();
  env.run(Command::Build).await;
  env.log.clear();

  fs::remove_dir_all(env.work_dir().source_dir()).unwrap();
  env.run(Command::Build).await;

  // The archive is still there, so nothing is downloaded; the fresh tree has
  // to be bootstrapped and built again.
  assert_eq!(
    env.log.calls(),
    vec!["extract".to_string(), "bootstrap".to_string(), "build -j2".to_string()]
  );
}

#[tokio::test]
async fn deleted_archive_after_extract_is_not_fetched() {
  let env = TestEnv::new();
  env.run(Command::Build).await;
  env.log.clear();

  fs::remove_file(env.work_dir().archive()).unwrap();
  env.run(Command::Build).await;

  assert!(env.log.calls().is_empty());
}

#[tokio::test]
async fn flags_without_artifacts_rerun_everything() {
  let env = TestEnv::new();
  let mut state = warpfox_lib::state::PipelineState::new();
  for stage in Stage::ALL {
    state.set(stage.flag(), true);
  }
  env.store().save(&state).unwrap();

  env.run(Command::Build).await;

  assert_eq!(env.log.calls(), full_run_calls());
}

#[tokio::test]
async fn unknown_keys_survive_a_run() {
  let env = TestEnv::new();
  fs::create_dir_all(env.work_dir().root()).unwrap();
  fs::write(
    env.work_dir().state_file(),
    r#"{"custom": {"nested": [1, 2]}, "note": "keep me"}"#,
  )
  .unwrap();

  env.run(Command::Init).await;

  let raw: Value = serde_json::from_slice(&env.state_bytes()).unwrap();
  assert_eq!(raw["custom"], json!({"nested": [1, 2]}));
  assert_eq!(raw["note"], json!("keep me"));
  assert_eq!(raw[keys::ACQUIRED], json!(true));
}

#[tokio::test]
async fn legacy_initialized_flag_skips_acquire_and_extract() {
  let env = TestEnv::new();
  let work_dir = env.work_dir();
  fs::create_dir_all(work_dir.source_dir()).unwrap();
  fs::write(work_dir.source_dir().join("mach"), "#!/bin/sh\n").unwrap();
  fs::write(work_dir.archive(), ARCHIVE_BYTES).unwrap();
  fs::write(
    work_dir.state_file(),
    r#"{"firefox-version": "128.0", "intialized": true}"#,
  )
  .unwrap();

  env.run(Command::Bootstrap).await;

  assert_eq!(env.log.calls(), vec!["bootstrap".to_string()]);
  assert!(env.saved_state().flag(keys::BOOTSTRAPPED));
}

// =============================================================================
// Version pinning
// =============================================================================

#[tokio::test]
async fn pinned_version_survives_default_change() {
  let mut env = TestEnv::new();
  env.run(Command::Init).await;

  // Simulate an upgrade that ships a newer default and a lost archive.
  env.default_version = "131.0".to_string();
  fs::remove_dir_all(env.work_dir().source_dir()).unwrap();
  fs::remove_file(env.work_dir().archive()).unwrap();
  env.log.clear();

  env.run(Command::Init).await;

  assert_eq!(env.log.calls()[0], url_for(DEFAULT_VERSION));
  assert_eq!(
    env.saved_state().get::<String>(keys::FIREFOX_VERSION).as_deref(),
    Some(DEFAULT_VERSION)
  );
}

#[tokio::test]
async fn state_version_selects_url() {
  let env = TestEnv::new();
  fs::create_dir_all(env.work_dir().root()).unwrap();
  fs::write(env.work_dir().state_file(), r#"{"firefox-version": "115.0esr"}"#).unwrap();

  env.run(Command::Init).await;

  assert_eq!(env.log.calls()[0], url_for("115.0esr"));
}

// =============================================================================
// Archive verification
// =============================================================================

#[tokio::test]
async fn verified_existing_archive_is_not_fetched() {
  let mut env = TestEnv::new();
  env.sha256 = Some(hash_bytes(ARCHIVE_BYTES));
  fs::create_dir_all(env.work_dir().root()).unwrap();
  fs::write(env.work_dir().archive(), ARCHIVE_BYTES).unwrap();

  env.run(Command::Init).await;

  assert_eq!(env.log.calls(), vec!["extract".to_string()]);
}

#[tokio::test]
async fn uppercase_digest_verifies_existing_archive() {
  let mut env = TestEnv::new();
  env.sha256 = Some(hash_bytes(ARCHIVE_BYTES).to_uppercase());
  fs::create_dir_all(env.work_dir().root()).unwrap();
  fs::write(env.work_dir().archive(), ARCHIVE_BYTES).unwrap();

  let outcome = env.run(Command::Init).await;

  assert_eq!(outcome.exit_code(), 0);
  assert_eq!(env.log.calls(), vec!["extract".to_string()]);
}

#[tokio::test]
async fn uppercase_digest_accepts_download() {
  let mut env = TestEnv::new();
  env.sha256 = Some(hash_bytes(ARCHIVE_BYTES).to_uppercase());

  let outcome = env.run(Command::Init).await;

  assert_eq!(outcome.exit_code(), 0);
  assert_eq!(env.log.calls()[0], url_for(DEFAULT_VERSION));
  assert_eq!(fs::read(env.work_dir().archive()).unwrap(), ARCHIVE_BYTES);
  assert!(env.saved_state().flag(keys::ACQUIRED));
}

#[tokio::test]
async fn mismatched_existing_archive_is_fetched_again() {
  let mut env = TestEnv::new();
  env.sha256 = Some(hash_bytes(ARCHIVE_BYTES));
  fs::create_dir_all(env.work_dir().root()).unwrap();
  fs::write(env.work_dir().archive(), b"stale partial download").unwrap();

  let outcome = env.run(Command::Init).await;

  assert_eq!(outcome.exit_code(), 0);
  assert_eq!(env.log.calls()[0], url_for(DEFAULT_VERSION));
  assert_eq!(fs::read(env.work_dir().archive()).unwrap(), ARCHIVE_BYTES);
}

#[tokio::test]
async fn corrupt_download_is_rejected() {
  let mut env = TestEnv::new();
  env.sha256 = Some(hash_bytes(b"the real archive"));

  let outcome = env.run(Command::Init).await;

  assert_eq!(outcome.exit_code(), 1);
  assert!(matches!(outcome.result, Err(PipelineError::Transport(_))));
  assert!(!env.work_dir().archive().exists());
  assert!(!env.work_dir().partial_archive().exists());
  assert!(!env.saved_state().flag(keys::ACQUIRED));
  assert_eq!(env.log.calls(), vec![url_for(DEFAULT_VERSION)]);
}

// =============================================================================
// Manifest and state failures
// =============================================================================

#[tokio::test]
async fn malformed_manifest_leaves_state_untouched() {
  let env = TestEnv::new();
  env.run(Command::Build).await;
  let before = env.state_bytes();
  env.log.clear();

  env.write_manifest("not valid json {{{");
  let outcome = env.run(Command::Build).await;

  assert_eq!(outcome.exit_code(), 1);
  assert!(matches!(outcome.result, Err(PipelineError::Manifest(_))));
  assert!(env.log.calls().is_empty());
  assert_eq!(env.state_bytes(), before);
}

#[tokio::test]
async fn status_reports_without_running() {
  let env = TestEnv::new();
  env.run(Command::Init).await;
  let before = env.state_bytes();
  env.log.clear();

  let outcome = env.run(Command::Status).await;

  assert_eq!(outcome.exit_code(), 0);
  assert!(env.log.calls().is_empty());
  assert!(outcome.state.unwrap().flag(keys::EXTRACTED));
  assert_eq!(env.state_bytes(), before);
}
