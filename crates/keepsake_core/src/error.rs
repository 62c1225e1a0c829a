use thiserror::Error;

/// Unified error type for keepsake operations.
///
/// Only source-level failures are surfaced through this type: an unreachable
/// remote or local catalog aborts the current pass, a failed authentication
/// bootstrap aborts before any remote read. Per-item media download failures
/// are *not* errors; they are swallowed into the
/// [`SyncReport`](crate::sync::SyncReport) and re-attempted on the next pass.
#[derive(Debug, Error)]
pub enum KeepsakeError {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Pass-aborting source failures
    #[error("Remote catalog unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Local catalog unavailable: {0}")]
    LocalUnavailable(String),

    #[error("Authentication bootstrap failed: {0}")]
    AuthFailure(String),

    // Transport / storage errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    // Config errors
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config serialize error: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Result type alias for keepsake operations
pub type Result<T> = std::result::Result<T, KeepsakeError>;
