//! Exclusive claim on a work directory.
//!
//! A state-mutating run holds `{work_dir}/.lock` from before the state is
//! loaded until after it is saved. The file body names the holder, so a
//! second run that finds the directory busy can say who it is waiting on.
//! The OS releases the claim when the holding process exits, even on a crash;
//! a leftover file on its own never blocks anyone.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::paths::WorkDir;

/// Who holds the work directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
  pub pid: u32,
  /// Command the holder is running, e.g. `build`.
  pub command: String,
  /// Seconds since the Unix epoch when the claim was taken.
  pub since: u64,
}

#[derive(Debug, Error)]
pub enum LockError {
  /// Another run holds the work directory. `holder` is `None` when the lock
  /// file could not be read back.
  #[error("work directory {} is busy{}", work_dir.display(), describe(.holder))]
  Busy {
    work_dir: PathBuf,
    holder: Option<Holder>,
  },

  #[error("failed to lock {}: {source}", path.display())]
  Io {
    path: PathBuf,
    #[source]
    source: io::Error,
  },
}

fn describe(holder: &Option<Holder>) -> String {
  match holder {
    Some(holder) => format!(": `warpfox {}` is running as pid {}", holder.command, holder.pid),
    None => String::new(),
  }
}

/// Held for the lifetime of a run; dropping it releases the directory.
#[derive(Debug)]
pub struct WorkdirLock {
  _file: File,
  path: PathBuf,
}

impl WorkdirLock {
  /// Claim `work_dir` for `command` without waiting, creating the directory
  /// if needed.
  pub fn acquire(work_dir: &WorkDir, command: &str) -> Result<Self, LockError> {
    let path = work_dir.lock_file();
    let io_err = |source: io::Error| LockError::Io {
      path: path.clone(),
      source,
    };

    fs::create_dir_all(work_dir.root()).map_err(io_err)?;
    let file = OpenOptions::new()
      .read(true)
      .write(true)
      .create(true)
      .truncate(false)
      .open(&path)
      .map_err(io_err)?;

    if let Err(err) = try_lock_exclusive(&file) {
      if is_contention(&err) {
        return Err(LockError::Busy {
          work_dir: work_dir.root().to_path_buf(),
          holder: read_holder(&path),
        });
      }
      return Err(io_err(err));
    }

    let holder = Holder {
      pid: std::process::id(),
      command: command.to_string(),
      since: SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default(),
    };
    record(&file, &holder).map_err(io_err)?;

    debug!(path = %path.display(), command, "work directory claimed");
    Ok(Self { _file: file, path })
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

/// Replace the lock file body with `holder`.
fn record(file: &File, holder: &Holder) -> io::Result<()> {
  let body = serde_json::to_vec(holder).map_err(io::Error::other)?;
  file.set_len(0)?;
  let mut writer = file;
  writer.write_all(&body)?;
  writer.flush()
}

fn read_holder(path: &Path) -> Option<Holder> {
  let body = fs::read(path).ok()?;
  serde_json::from_slice(&body).ok()
}

#[cfg(unix)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
  use rustix::fs::{FlockOperation, flock};

  flock(file, FlockOperation::NonBlockingLockExclusive).map_err(io::Error::from)
}

#[cfg(unix)]
fn is_contention(err: &io::Error) -> bool {
  err.kind() == io::ErrorKind::WouldBlock
}

#[cfg(windows)]
fn try_lock_exclusive(file: &File) -> io::Result<()> {
  use std::os::windows::io::AsRawHandle;
  use windows_sys::Win32::Foundation::HANDLE;
  use windows_sys::Win32::Storage::FileSystem::{LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY, LockFileEx};

  let handle = file.as_raw_handle() as HANDLE;
  // SAFETY: `handle` is owned by `file` and outlives the call; a zeroed
  // OVERLAPPED selects offset 0 for a synchronous lock.
  let locked = unsafe {
    let mut overlapped = std::mem::zeroed();
    LockFileEx(
      handle,
      LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
      0,
      1,
      0,
      &mut overlapped,
    )
  };

  if locked == 0 { Err(io::Error::last_os_error()) } else { Ok(()) }
}

#[cfg(windows)]
fn is_contention(err: &io::Error) -> bool {
  use windows_sys::Win32::Foundation::ERROR_LOCK_VIOLATION;

  err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32)
}
