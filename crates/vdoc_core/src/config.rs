//! Configuration types for a vdoc store.

use crate::error::{Result, StoreError};
use crate::rcs::CommandSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the configuration file inside a store root.
pub const CONFIG_FILE: &str = "config.toml";

/// Comprehensive configuration for a vdoc store.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Storage locations and permissions.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Revision-control backend configuration.
    #[serde(default)]
    pub history: HistoryConfig,

    /// Change log configuration.
    #[serde(default)]
    pub changes: ChangesConfig,
}

impl Config {
    /// Load configuration from `<root>/config.toml`, falling back to defaults.
    ///
    /// Relative storage directories are resolved against `root`.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let content = fs::read_to_string(&path)
                .map_err(|e| StoreError::ConfigError(format!("failed to read config: {}", e)))?;
            toml::from_str(&content)
                .map_err(|e| StoreError::ConfigError(format!("failed to parse config: {}", e)))?
        } else {
            Config::default()
        };
        config.storage.anchor(root);
        Ok(config)
    }

    /// Save configuration to `<root>/config.toml`.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = root.join(CONFIG_FILE);
        let content = toml::to_string_pretty(self)
            .map_err(|e| StoreError::ConfigError(format!("failed to serialize config: {}", e)))?;
        fs::write(&path, content)
            .map_err(|e| StoreError::ConfigError(format!("failed to write config: {}", e)))?;
        Ok(())
    }

    /// Builds a default configuration rooted at `root`.
    pub fn rooted(root: &Path) -> Self {
        let mut config = Config::default();
        config.storage.anchor(root);
        config
    }
}

/// Storage locations and permissions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Topic content root (default: "data").
    pub data_dir: PathBuf,

    /// Attachment content root (default: "pub").
    pub pub_dir: PathBuf,

    /// Metadata root for caches, leases, change logs and mutex files
    /// (default: "work").
    pub work_dir: PathBuf,

    /// Permission bits applied to content files (default: 0o644).
    pub file_mode: u32,

    /// Permission bits applied to created directories (default: 0o755).
    pub dir_mode: u32,
}

impl StorageConfig {
    fn anchor(&mut self, root: &Path) {
        for dir in [&mut self.data_dir, &mut self.pub_dir, &mut self.work_dir] {
            if dir.is_relative() {
                *dir = root.join(&*dir);
            }
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            pub_dir: PathBuf::from("pub"),
            work_dir: PathBuf::from("work"),
            file_mode: 0o644,
            dir_mode: 0o755,
        }
    }
}

/// Which revision-control backend drives history files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process history files.
    #[default]
    Lite,
    /// External RCS tools.
    Rcs,
}

/// Revision-control backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Backend implementation (default: lite).
    pub backend: BackendKind,

    /// Backend locks held longer than this are broken once (default: 1 hour).
    pub stale_lock_secs: u64,

    /// A save by the same author within this window replaces the latest
    /// revision instead of creating a new one (default: 1 hour).
    pub replace_window_secs: u64,

    /// Identity recorded as the backend lock holder.
    pub lock_owner: String,

    /// Command templates for the RCS backend.
    #[serde(default)]
    pub commands: CommandSet,
}

impl HistoryConfig {
    /// Returns the stale lock threshold as a Duration.
    pub fn stale_lock(&self) -> Duration {
        Duration::from_secs(self.stale_lock_secs)
    }

    /// Returns the replace window as a Duration.
    pub fn replace_window(&self) -> Duration {
        Duration::from_secs(self.replace_window_secs)
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Lite,
            stale_lock_secs: 60 * 60,
            replace_window_secs: 60 * 60,
            lock_owner: std::env::var("USER").unwrap_or_else(|_| "vdoc".to_string()),
            commands: CommandSet::default(),
        }
    }
}

/// Change log configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangesConfig {
    /// Entries older than this are pruned on every append (default: 31 days).
    pub retention_secs: u64,
}

impl Default for ChangesConfig {
    fn default() -> Self {
        Self {
            retention_secs: 31 * 24 * 60 * 60,
        }
    }
}
