//! Configuration management for wavestrap
//!
//! A user-wide file (`~/.config/wavestrap/config.toml`) provides defaults,
//! and the workspace's `wavestrap.toml` overrides them key by key.

pub mod schema;

pub use schema::Config;

use crate::error::{WavestrapError, WavestrapResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Workspace configuration file name
pub const CONFIG_FILE: &str = "wavestrap.toml";

/// Per-workspace state directory name, below the workspace root
pub const STATE_DIR: &str = ".wavestrap";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a new config manager with the user-wide default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Get the user-wide config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wavestrap")
            .join("config.toml")
    }

    /// Walk up from `start` looking for a workspace `wavestrap.toml`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Get the per-workspace state directory
    pub fn state_dir(workspace_root: &Path) -> PathBuf {
        workspace_root.join(STATE_DIR)
    }

    /// Get the run journal path
    pub fn journal_path(workspace_root: &Path) -> PathBuf {
        Self::state_dir(workspace_root).join("journal.log")
    }

    /// Load configuration, using defaults if the file does not exist
    pub async fn load(&self) -> WavestrapResult<Config> {
        self.load_merged(None).await
    }

    /// Load this manager's file, then overlay the local workspace file
    pub async fn load_merged(&self, local: Option<&Path>) -> WavestrapResult<Config> {
        let mut merged = toml::Value::Table(toml::map::Map::new());

        for path in std::iter::once(self.config_path.as_path()).chain(local) {
            if !path.exists() {
                debug!("Config file {} not found, skipping", path.display());
                continue;
            }
            merge_values(&mut merged, Self::read_value(path).await?);
        }

        merged.try_into().map_err(|e: toml::de::Error| WavestrapError::ConfigInvalid {
            path: local.unwrap_or(&self.config_path).to_path_buf(),
            reason: e.to_string(),
        })
    }

    async fn read_value(path: &Path) -> WavestrapResult<toml::Value> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            WavestrapError::io(format!("reading config from {}", path.display()), e)
        })?;

        toml::from_str(&content).map_err(|e| WavestrapError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-merge `overlay` into `base`; tables merge, everything else replaces
fn merge_values(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
