//! Configuration schema for wavestrap
//!
//! Configuration is stored in `wavestrap.toml` at the workspace root.

use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Project discovery
    pub workspace: WorkspaceConfig,

    /// Bootstrap run options
    pub bootstrap: BootstrapConfig,

    /// Fingerprint inputs
    pub fingerprint: FingerprintConfig,

    /// Cache record settings
    pub cache: CacheConfig,

    /// External commands
    pub commands: CommandsConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append run events to `.wavestrap/journal.log`
    pub journal: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            journal: true,
        }
    }
}

/// Workspace project discovery
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Project directories relative to the workspace root; `dir/*` matches
    /// every immediate subdirectory
    pub projects: Vec<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            projects: vec![
                ".".to_string(),
                "packages/*".to_string(),
                "plugins/*".to_string(),
            ],
        }
    }
}

/// Options for a bootstrap run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Skip bootstrap steps whose inputs did not change
    pub cache: bool,

    /// Pass `--frozen-lockfile` to installs
    pub frozen_lockfile: bool,

    /// Pass `--prefer-offline` to installs
    pub prefer_offline: bool,

    /// Package that must resolve to exactly one version (case-insensitive)
    pub single_version: Option<String>,

    /// Max concurrent bootstrap steps (unbounded when unset)
    pub concurrency: Option<usize>,

    /// Emit source maps during bootstrap steps
    pub source_maps: bool,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            cache: true,
            frozen_lockfile: false,
            prefer_offline: false,
            single_version: None,
            concurrency: None,
            source_maps: false,
        }
    }
}

/// Fingerprint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FingerprintConfig {
    /// Paths never hashed: plain names match any path component,
    /// entries with `/` match a project-relative prefix
    pub ignore: Vec<String>,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            ignore: vec![
                "node_modules".to_string(),
                "target".to_string(),
                "build".to_string(),
                ".git".to_string(),
            ],
        }
    }
}

/// Cache record configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Record location relative to each project root
    pub record_path: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            record_path: "target/.bootstrap-cache".to_string(),
        }
    }
}

/// External command configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Install command, run in each project root
    pub install: Vec<String>,

    /// Script runner; the script or target name is appended
    pub run: Vec<String>,

    /// Lockfile relative to the workspace root
    pub lockfile: String,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            install: vec![
                "yarn".to_string(),
                "install".to_string(),
                "--non-interactive".to_string(),
            ],
            run: vec!["yarn".to_string(), "run".to_string()],
            lockfile: "yarn.lock".to_string(),
        }
    }
}
