//! Media file fetcher.
//!
//! Downloads a remote media resource into the app-private storage root and
//! returns the resulting local path. Every call produces an independent,
//! freshly named file (`img_<uuid>.jpg` / `audio_<uuid>.mp3`), so repeated
//! fetches of the same URL never collide and never overwrite another
//! record's media.
//!
//! A download only counts as successful once the response streamed to disk
//! and the file is verifiably non-empty; anything else is a typed
//! [`FetchError`] and the partially written file is removed.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::BoxFuture;

/// Default bound on establishing the connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default bound on reading the response body.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// The kind of media being fetched; decides local file naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// A still image.
    Image,
    /// An audio recording.
    Audio,
}

impl MediaKind {
    /// Prefix for local file names of this kind.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            MediaKind::Image => "img_",
            MediaKind::Audio => "audio_",
        }
    }

    /// Extension for local file names of this kind.
    pub fn file_extension(&self) -> &'static str {
        match self {
            MediaKind::Image => ".jpg",
            MediaKind::Audio => ".mp3",
        }
    }
}

/// Why a media download failed.
///
/// These failures are per-item and non-fatal to a sync pass: the affected
/// local path stays unset and is re-attempted on the next pass.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The remote host could not be reached (DNS, connect, timeout, or a
    /// transport error mid-stream).
    #[error("could not reach remote host: {0}")]
    RemoteUnreachable(String),

    /// The server answered with a non-200 status.
    #[error("server responded with status {0}")]
    ServerError(u16),

    /// The transport reported success but the body was empty.
    #[error("download completed but the body was empty")]
    EmptyBody,

    /// Writing the local file failed.
    #[error("failed to write local file: {0}")]
    IoWrite(#[from] std::io::Error),
}

/// Result type for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Trait for media downloaders.
///
/// Object-safe so the reconciler can be tested against a fake that never
/// touches the network.
pub trait FileFetcher: Send + Sync {
    /// Download `remote_ref` and return the path of the stored local file.
    fn fetch<'a>(
        &'a self,
        remote_ref: &'a str,
        kind: MediaKind,
    ) -> BoxFuture<'a, FetchResult<PathBuf>>;
}

/// HTTP(S) media downloader with bounded connect and read timeouts.
pub struct HttpFetcher {
    client: reqwest::Client,
    storage_root: PathBuf,
}

impl HttpFetcher {
    /// Create a fetcher storing files under `storage_root`, with the default
    /// timeout bounds.
    pub fn new(storage_root: impl Into<PathBuf>) -> crate::error::Result<Self> {
        Self::with_timeouts(storage_root, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT)
    }

    /// Create a fetcher with explicit timeout bounds.
    ///
    /// Both bounds must be finite; they exist so a stalled transfer can
    /// never wedge a sync pass.
    pub fn with_timeouts(
        storage_root: impl Into<PathBuf>,
        connect_timeout: Duration,
        read_timeout: Duration,
    ) -> crate::error::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .read_timeout(read_timeout)
            .build()?;
        Ok(Self {
            client,
            storage_root: storage_root.into(),
        })
    }

    /// Directory downloaded media is stored under.
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    async fn download(&self, remote_ref: &str, kind: MediaKind) -> FetchResult<PathBuf> {
        if remote_ref.is_empty() {
            return Err(FetchError::RemoteUnreachable(
                "empty remote reference".to_string(),
            ));
        }

        tokio::fs::create_dir_all(&self.storage_root).await?;

        let file_name = format!(
            "{}{}{}",
            kind.file_prefix(),
            Uuid::new_v4(),
            kind.file_extension()
        );
        let destination = self.storage_root.join(file_name);

        log::debug!("Downloading {} to {}", remote_ref, destination.display());

        let response = self
            .client
            .get(remote_ref)
            .send()
            .await
            .map_err(|e| FetchError::RemoteUnreachable(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::ServerError(status.as_u16()));
        }

        let mut file = tokio::fs::File::create(&destination).await?;
        let mut stream = response.bytes_stream();
        let mut total_bytes: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    remove_partial(&destination).await;
                    return Err(FetchError::RemoteUnreachable(e.to_string()));
                }
            };
            if let Err(e) = file.write_all(&chunk).await {
                remove_partial(&destination).await;
                return Err(FetchError::IoWrite(e));
            }
            total_bytes += chunk.len() as u64;
        }

        if let Err(e) = file.flush().await {
            remove_partial(&destination).await;
            return Err(FetchError::IoWrite(e));
        }
        drop(file);

        // A zero-length result is a failure even if the transport said OK.
        if total_bytes == 0 {
            remove_partial(&destination).await;
            return Err(FetchError::EmptyBody);
        }

        log::debug!(
            "Downloaded {} ({} bytes) to {}",
            remote_ref,
            total_bytes,
            destination.display()
        );
        Ok(destination)
    }
}

/// Best-effort removal of an incomplete download.
async fn remove_partial(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        log::warn!("Could not remove partial file {}: {}", path.display(), e);
    }
}

impl FileFetcher for HttpFetcher {
    fn fetch<'a>(
        &'a self,
        remote_ref: &'a str,
        kind: MediaKind,
    ) -> BoxFuture<'a, FetchResult<PathBuf>> {
        Box::pin(self.download(remote_ref, kind))
    }
}
