//! SHA-256 helpers for archive verification and build-config fingerprints.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Hash arbitrary bytes, returning the lowercase hex digest.
pub fn hash_bytes(data: &[u8]) -> String {
  let mut hasher = Sha256::new();
  hasher.update(data);
  hex::encode(hasher.finalize())
}

/// Hash a file's contents without loading it into memory.
///
/// Source archives run to several hundred megabytes, so the file is streamed
/// through a fixed buffer.
pub fn hash_file(path: &Path) -> io::Result<String> {
  let mut file = fs::File::open(path)?;
  let mut hasher = Sha256::new();
  let mut buffer = [0u8; 64 * 1024];

  loop {
    let bytes_read = file.read(&mut buffer)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(hex::encode(hasher.finalize()))
}
