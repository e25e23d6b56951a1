//! Archive transport.
//!
//! The pipeline only needs "put the bytes at this URL into this file and tell
//! me how far along you are"; [`Transport`] is that seam. [`HttpTransport`]
//! is the production implementation.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Errors that can occur while fetching an archive.
#[derive(Debug, Error)]
pub enum FetchError {
  /// The HTTP client could not be constructed.
  #[error("failed to create http client: {0}")]
  Client(#[source] reqwest::Error),

  /// The request failed before or during the transfer.
  #[error("fetch failed for {url}: {source}")]
  Request {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  /// The server answered with a non-success status.
  #[error("fetch failed for {url}: HTTP {status}")]
  Status { url: String, status: u16 },

  /// The connection closed before the advertised length arrived.
  #[error("fetch of {url} ended early: received {received} of {expected} bytes")]
  Incomplete { url: String, received: u64, expected: u64 },

  /// The transfer did not finish within the configured limit.
  #[error("fetch of {url} timed out after {}s", limit.as_secs())]
  Timeout { url: String, limit: Duration },

  /// The downloaded archive does not match the configured digest.
  #[error("hash mismatch for {url}: expected {expected}, got {actual}")]
  HashMismatch {
    url: String,
    expected: String,
    actual: String,
  },

  /// The transport reported success but left nothing at the destination.
  #[error("fetch of {url} produced no file at {}", path.display())]
  Missing { url: String, path: PathBuf },

  #[error("io error while fetching: {0}")]
  Io(#[from] std::io::Error),
}

/// A download progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
  /// Bytes written so far.
  pub downloaded: u64,
  /// Size of the chunk that triggered this event.
  pub chunk: u64,
  /// Total size, when the server advertised one.
  pub total: Option<u64>,
}

impl Progress {
  /// Completed fraction in `0.0..=1.0`, when the total is known.
  pub fn fraction(&self) -> Option<f64> {
    match self.total {
      Some(0) => Some(1.0),
      Some(total) => Some((self.downloaded as f64 / total as f64).min(1.0)),
      None => None,
    }
  }
}

/// Fetches a remote archive to a local path.
pub trait Transport {
  /// Download `url` into `dest`, calling `on_progress` after every chunk.
  ///
  /// Returns the number of bytes written.
  fn fetch(
    &self,
    url: &str,
    dest: &Path,
    on_progress: &mut dyn FnMut(Progress),
  ) -> impl Future<Output = Result<u64, FetchError>>;
}

/// Streams archives over HTTP(S) with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
  timeout: Option<Duration>,
}

impl HttpTransport {
  /// Create a transport; `timeout` bounds each whole transfer.
  pub fn new(timeout: Option<Duration>) -> Result<Self, FetchError> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("warpfox/", env!("CARGO_PKG_VERSION")))
      .connect_timeout(Duration::from_secs(30))
      .build()
      .map_err(FetchError::Client)?;

    Ok(Self { client, timeout })
  }

  async fn transfer(&self, url: &str, dest: &Path, on_progress: &mut dyn FnMut(Progress)) -> Result<u64, FetchError> {
    if let Some(parent) = dest.parent() {
      fs::create_dir_all(parent).await?;
    }

    let mut response = self.client.get(url).send().await.map_err(|e| FetchError::Request {
      url: url.to_string(),
      source: e,
    })?;

    if !response.status().is_success() {
      return Err(FetchError::Status {
        url: url.to_string(),
        status: response.status().as_u16(),
      });
    }

    let total = response.content_length();
    debug!(url = %url, total = ?total, "response received");

    let mut file = fs::File::create(dest).await?;
    let mut downloaded: u64 = 0;

    while let Some(chunk) = response.chunk().await.map_err(|e| FetchError::Request {
      url: url.to_string(),
      source: e,
    })? {
      file.write_all(&chunk).await?;
      downloaded += chunk.len() as u64;
      on_progress(Progress {
        downloaded,
        chunk: chunk.len() as u64,
        total,
      });
    }

    file.flush().await?;
    file.sync_all().await?;

    if let Some(expected) = total
      && downloaded != expected
    {
      return Err(FetchError::Incomplete {
        url: url.to_string(),
        received: downloaded,
        expected,
      });
    }

    Ok(downloaded)
  }
}

impl Transport for HttpTransport {
  async fn fetch(&self, url: &str, dest: &Path, on_progress: &mut dyn FnMut(Progress)) -> Result<u64, FetchError> {
    info!(url = %url, "fetching URL");

    let transfer = self.transfer(url, dest, on_progress);
    let size = match self.timeout {
      Some(limit) => tokio::time::timeout(limit, transfer)
        .await
        .map_err(|_| FetchError::Timeout {
          url: url.to_string(),
          limit,
        })??,
      None => transfer.await?,
    };

    info!(path = %dest.display(), size, "download complete");
    Ok(size)
  }
}
