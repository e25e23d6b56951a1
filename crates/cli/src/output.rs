//! Human-facing lines printed by the CLI.
//!
//! Diagnostics go to stderr through `tracing`; what is printed here is the
//! command's answer. Each line is led by a mark whose meaning and color come
//! from its [`Tone`].

use std::fmt::Display;
use std::io::{self, Write};

use anyhow::Context;
use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

/// Width of the label column in [`field`] rows.
const LABEL_WIDTH: usize = 16;

/// Characters of a digest kept by [`short_digest`].
const DIGEST_CHARS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
  Done,
  Pending,
  Note,
  Failed,
}

impl Tone {
  fn mark(self) -> &'static str {
    match self {
      Tone::Done => "✓",
      Tone::Pending => "○",
      Tone::Note => "•",
      Tone::Failed => "✗",
    }
  }

  fn stream(self) -> Stream {
    match self {
      Tone::Failed => Stream::Stderr,
      _ => Stream::Stdout,
    }
  }

  fn painted(self) -> String {
    let (mark, stream) = (self.mark(), self.stream());
    match self {
      Tone::Done => mark.if_supports_color(stream, |s| s.green()).to_string(),
      Tone::Pending => mark.if_supports_color(stream, |s| s.yellow()).to_string(),
      Tone::Note => mark.if_supports_color(stream, |s| s.blue()).to_string(),
      Tone::Failed => mark.if_supports_color(stream, |s| s.red()).to_string(),
    }
  }
}

/// One marked line; `Failed` lines go to stderr.
pub fn say(tone: Tone, message: impl Display) {
  match tone.stream() {
    Stream::Stderr => eprintln!("{} {message}", tone.painted()),
    _ => println!("{} {message}", tone.painted()),
  }
}

/// Indented `label value` row with the label column aligned.
pub fn field(label: &str, value: impl Display) {
  let label = format!("{label:<LABEL_WIDTH$}");
  println!("  {}{value}", label.if_supports_color(Stream::Stdout, |s| s.dimmed()));
}

/// Indented marked row: `name` padded, then `value`.
pub fn row(tone: Tone, name: &str, value: &str) {
  println!("  {} {name:<10} {value}", tone.painted());
}

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
  let mut out = io::stdout().lock();
  serde_json::to_writer_pretty(&mut out, value).context("Failed to write JSON")?;
  writeln!(out).context("Failed to write JSON")?;
  Ok(())
}

/// First few characters of a stored digest. The value comes from the state
/// file, so it is cut on a char boundary rather than assumed to be hex.
pub fn short_digest(digest: &str) -> &str {
  match digest.char_indices().nth(DIGEST_CHARS) {
    Some((end, _)) => &digest[..end],
    None => digest,
  }
}

/// Size in binary units, one decimal place above a kibibyte.
pub fn human_size(bytes: u64) -> String {
  const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

  if bytes < 1024 {
    return format!("{bytes} B");
  }
  let mut size = bytes as f64 / 1024.0;
  let mut unit = 0;
  while size >= 1024.0 && unit + 1 < UNITS.len() {
    size /= 1024.0;
    unit += 1;
  }
  format!("{size:.1} {}", UNITS[unit])
}
