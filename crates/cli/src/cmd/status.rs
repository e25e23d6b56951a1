//! Status command implementation.
//!
//! Displays the persisted pipeline state: pinned version, per-stage
//! completion and the size of the downloaded archive.

use anyhow::Result;
use serde_json::Value;

use warpfox_lib::paths::WorkDir;
use warpfox_lib::pipeline::Stage;
use warpfox_lib::state::{PipelineState, keys};

use crate::output::{Tone, field, human_size, print_json, row, say, short_digest};

pub fn print_status(state: &PipelineState, work_dir: &WorkDir, json: bool) -> Result<()> {
  if json {
    return print_json(state);
  }

  if state.is_empty() {
    say(
      Tone::Note,
      format_args!("No state at {}. Run 'warpfox build' to start.", work_dir.state_file().display()),
    );
    return Ok(());
  }

  say(Tone::Done, format_args!("Work directory: {}", work_dir.root().display()));
  field(
    "Firefox version",
    state
      .get::<String>(keys::FIREFOX_VERSION)
      .unwrap_or_else(|| "unresolved".to_string()),
  );
  if let Some(last) = state.get::<String>(keys::LAST_RUN) {
    field("Last run", last);
  }

  println!();
  for stage in Stage::ALL {
    if state.flag(stage.flag()) {
      row(Tone::Done, stage.as_str(), "done");
    } else {
      row(Tone::Pending, stage.as_str(), "pending");
    }
  }

  if let Some(hash) = state.get::<String>(keys::MOZCONFIG_HASH) {
    println!();
    field("Mozconfig", short_digest(&hash));
  }

  if let Ok(metadata) = std::fs::metadata(work_dir.archive()) {
    field("Archive", human_size(metadata.len()));
  }

  let known = known_keys();
  let extra: Vec<_> = state.iter().filter(|(key, _)| !known.contains(&key.as_str())).collect();
  if !extra.is_empty() {
    println!();
    println!("Other entries:");
    for (key, value) in extra {
      row(Tone::Note, key, &render(value));
    }
  }

  Ok(())
}

fn known_keys() -> [&'static str; 8] {
  [
    keys::FIREFOX_VERSION,
    keys::ACQUIRED,
    keys::EXTRACTED,
    keys::LEGACY_INITIALIZED,
    keys::BOOTSTRAPPED,
    keys::BUILT,
    keys::MOZCONFIG_HASH,
    keys::LAST_RUN,
  ]
}

fn render(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}
