//! Project manifest parsing
//!
//! Each project has a `package.json` manifest describing its name,
//! dependencies, scripts, executables and optional build targets.

use crate::error::{WavestrapError, WavestrapResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Script name that marks a project as having a bootstrap step
pub const BOOTSTRAP_SCRIPT: &str = "osd:bootstrap";

/// Manifest file name inside every project root
pub const MANIFEST_FILE: &str = "package.json";

/// Parsed `package.json`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectManifest {
    /// Package name
    pub name: String,

    /// Runtime dependencies (`name -> range`)
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,

    /// Development dependencies (`name -> range`)
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,

    /// Named scripts
    #[serde(default)]
    pub scripts: BTreeMap<String, String>,

    /// Workspace globs; present only on aggregator projects
    #[serde(default)]
    pub workspaces: Option<serde_json::Value>,

    /// Executables exposed to dependents
    #[serde(default)]
    pub bin: Option<BinField>,

    /// Tool-specific section
    #[serde(default)]
    pub osd: OsdSection,
}

/// `bin` is either a single path (named after the package) or a map
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum BinField {
    Single(String),
    Named(BTreeMap<String, String>),
}

/// The `osd` section of the manifest
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsdSection {
    /// Scripts to run, in order, instead of the bootstrap script
    #[serde(default)]
    pub build_targets: Vec<String>,
}

impl ProjectManifest {
    /// Parse a manifest from a file on disk
    pub async fn from_file(path: &Path) -> WavestrapResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            WavestrapError::io(format!("reading manifest {}", path.display()), e)
        })?;
        Self::parse(&content, path)
    }

    /// Parse a manifest from a JSON string
    pub fn parse(content: &str, path: &Path) -> WavestrapResult<Self> {
        let manifest: Self =
            serde_json::from_str(content).map_err(|e| WavestrapError::ManifestInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        if manifest.name.trim().is_empty() {
            return Err(WavestrapError::ManifestInvalid {
                path: path.to_path_buf(),
                reason: "missing package name".to_string(),
            });
        }
        Ok(manifest)
    }

    /// All declared dependencies, dev dependencies included
    ///
    /// A runtime entry wins when a name appears in both tables.
    pub fn all_dependencies(&self) -> BTreeMap<String, String> {
        let mut all = self.dev_dependencies.clone();
        all.extend(
            self.dependencies
                .iter()
                .map(|(name, range)| (name.clone(), range.clone())),
        );
        all
    }

    /// Executables as `(command name, relative path)` pairs
    pub fn executables(&self) -> Vec<(String, String)> {
        match &self.bin {
            None => vec![],
            Some(BinField::Single(path)) => {
                // Scoped packages expose the unscoped part as the command
                let command = self.name.rsplit('/').next().unwrap_or(&self.name);
                vec![(command.to_string(), path.clone())]
            }
            Some(BinField::Named(map)) => map
                .iter()
                .map(|(name, path)| (name.clone(), path.clone()))
                .collect(),
        }
    }

    pub fn has_bootstrap_script(&self) -> bool {
        self.scripts.contains_key(BOOTSTRAP_SCRIPT)
    }

    pub fn is_workspace_aggregator(&self) -> bool {
        self.workspaces.is_some()
    }
}
