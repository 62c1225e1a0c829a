//! Configuration types for Keepsake.
//!
//! This module provides the [`SyncConfig`] struct which stores the settings
//! a host application passes to the synchronizer. Configuration is persisted
//! as TOML (typically at `~/.config/keepsake/config.toml` on Unix systems).
//!
//! # Key Configuration Fields
//!
//! - `remote_base_url`: base URL of the remote collection server
//! - `auth_url`: anonymous-session endpoint (optional; unauthenticated
//!   reads when unset)
//! - `storage_root`: app-private directory downloaded media lands in
//! - `connect_timeout_secs` / `read_timeout_secs`: download timeout bounds
//! - `max_concurrent_fetches`: bound on parallel media downloads per pass

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{KeepsakeError, Result};

/// `SyncConfig` is a data structure that represents the parts of the
/// synchronizer that the host application can configure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the remote collection server.
    pub remote_base_url: String,

    /// Anonymous-session endpoint. When unset, remote reads are attempted
    /// without an authenticated session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,

    /// Directory downloaded media files are stored under.
    pub storage_root: PathBuf,

    /// Bound on establishing a download connection, in seconds.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// Bound on reading a download response body, in seconds.
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,

    /// How many media downloads a pass may run concurrently.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// `host:port` endpoints the connectivity probe tries before a pass.
    /// When empty, the probe's built-in defaults are used.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub probe_endpoints: Vec<String>,
}

fn default_connect_timeout_secs() -> u64 {
    15
}

fn default_read_timeout_secs() -> u64 {
    30
}

fn default_max_concurrent_fetches() -> usize {
    4
}

impl SyncConfig {
    /// Create a config for the given server with default tuning.
    pub fn new(remote_base_url: impl Into<String>, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            remote_base_url: remote_base_url.into(),
            auth_url: None,
            storage_root: storage_root.into(),
            connect_timeout_secs: default_connect_timeout_secs(),
            read_timeout_secs: default_read_timeout_secs(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            probe_endpoints: Vec::new(),
        }
    }

    /// Connect timeout as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Read timeout as a [`Duration`].
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// Get the config file path (`~/.config/keepsake/config.toml`).
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("keepsake").join("config.toml"))
    }

    /// Default media storage root (`~/.local/share/keepsake/media` on Unix).
    pub fn default_storage_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keepsake")
            .join("media")
    }

    /// Load config from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: SyncConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Save config to a specific path, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Load config from the default location.
    ///
    /// Returns an error if no config directory can be determined or the
    /// file doesn't parse; a missing file is an `Io` error the caller may
    /// treat as "not configured yet".
    pub fn load() -> Result<Self> {
        let path = Self::config_path().ok_or(KeepsakeError::NoConfigDir)?;
        Self::load_from_path(&path)
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path().ok_or(KeepsakeError::NoConfigDir)?;
        self.save_to_path(&path)
    }
}
