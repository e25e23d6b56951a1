//! Archive extraction.

use std::fs::{self, File};
use std::future::Future;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while unpacking an archive.
#[derive(Debug, Error)]
pub enum ExtractError {
  #[error("unsupported archive format: {}", .0.display())]
  UnsupportedArchive(PathBuf),

  #[error("failed to unpack {}: {source}", archive.display())]
  Unpack {
    archive: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to prepare {}: {source}", path.display())]
  Prepare {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("extraction task panicked or was cancelled: {0}")]
  Join(#[from] tokio::task::JoinError),
}

/// Unpacks an archive into a directory.
pub trait Extractor {
  /// Unpack `archive` into `dest`. `dest` already exists and is empty.
  fn extract(&self, archive: &Path, dest: &Path) -> impl Future<Output = Result<(), ExtractError>>;
}

/// Unpacks `.tar.gz`, `.tgz` and `.tar` archives with `tar` + `flate2`.
///
/// Decoding runs on the blocking pool. When the archive wraps everything in a
/// single top-level directory (as release tarballs do), that directory is
/// flattened so `dest` holds the tree root directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct TarExtractor;

impl Extractor for TarExtractor {
  async fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ExtractError> {
    info!(archive = %archive.display(), dest = %dest.display(), "extracting archive");

    let archive = archive.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || unpack_archive(&archive, &dest)).await?
  }
}

/// Unpack an archive to the destination directory.
///
/// Supports:
/// - `.tar.gz` / `.tgz`
/// - `.tar`
pub fn unpack_archive(archive_path: &Path, dest: &Path) -> Result<(), ExtractError> {
  let name = archive_path
    .file_name()
    .map(|name| name.to_string_lossy().into_owned())
    .unwrap_or_default();

  let file = File::open(archive_path).map_err(|e| ExtractError::Unpack {
    archive: archive_path.to_path_buf(),
    source: e,
  })?;
  let reader = BufReader::new(file);

  if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
    unpack_tar(GzDecoder::new(reader), archive_path, dest)?;
  } else if name.ends_with(".tar") {
    unpack_tar(reader, archive_path, dest)?;
  } else {
    return Err(ExtractError::UnsupportedArchive(archive_path.to_path_buf()));
  }

  flatten_single_root(dest)?;

  info!(dest = %dest.display(), "unpacked archive");
  Ok(())
}

fn unpack_tar<R: Read>(reader: R, archive_path: &Path, dest: &Path) -> Result<(), ExtractError> {
  let mut archive = Archive::new(reader);
  archive.set_preserve_permissions(true);
  archive.set_overwrite(true);

  // `unpack` refuses entries that would escape `dest`.
  archive.unpack(dest).map_err(|e| ExtractError::Unpack {
    archive: archive_path.to_path_buf(),
    source: e,
  })
}

/// If `dest` contains exactly one directory and nothing else, move that
/// directory's children up into `dest` and remove it.
fn flatten_single_root(dest: &Path) -> Result<(), ExtractError> {
  let prepare_err = |path: &Path| {
    let path = path.to_path_buf();
    move |source: io::Error| ExtractError::Prepare { path, source }
  };

  let entries: Vec<_> = fs::read_dir(dest)
    .map_err(prepare_err(dest))?
    .collect::<Result<_, _>>()
    .map_err(prepare_err(dest))?;

  let [only] = entries.as_slice() else {
    return Ok(());
  };
  if !only.file_type().map_err(prepare_err(dest))?.is_dir() {
    return Ok(());
  }

  let root = only.path();
  debug!(root = %root.display(), "flattening single top-level directory");

  // Park the root under a name no child can collide with before hoisting.
  let parked = dest.join(".warpfox-extract-root");
  fs::rename(&root, &parked).map_err(prepare_err(&root))?;

  for child in fs::read_dir(&parked).map_err(prepare_err(&parked))? {
    let child = child.map_err(prepare_err(&parked))?;
    let target = dest.join(child.file_name());
    fs::rename(child.path(), &target).map_err(prepare_err(&target))?;
  }

  fs::remove_dir(&parked).map_err(prepare_err(&parked))
}
