//! Content fingerprints for bootstrap inputs
//!
//! A fingerprint is a SHA256 digest over every non-ignored file below a
//! project root (path and content hash, sorted by path) followed by the
//! resolved versions of the project's external dependencies. Same inputs =
//! same fingerprint, whatever order the filesystem lists them in.

use crate::config::STATE_DIR;
use crate::error::{WavestrapError, WavestrapResult};
use crate::lock::LockInfo;
use crate::project::Project;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Hex-encoded digest of a project's bootstrap inputs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 12 hex characters, for logs
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum IgnoreRule {
    /// Matches any path component with this exact name
    Component(String),
    /// Matches a path relative to the project root and everything below it
    Prefix(PathBuf),
}

/// Computes fingerprints, skipping derived paths such as build output
#[derive(Debug, Clone)]
pub struct FingerprintComputer {
    ignore: Vec<IgnoreRule>,
}

impl FingerprintComputer {
    /// Create a computer from ignore entries
    ///
    /// Entries without a `/` match a path component anywhere (`node_modules`),
    /// entries with one match a root-relative prefix (`public/generated`).
    /// The wavestrap state directory is always ignored.
    pub fn new(ignore: &[String]) -> Self {
        let mut rules: Vec<IgnoreRule> = ignore
            .iter()
            .map(|entry| entry.trim_matches('/'))
            .filter(|entry| !entry.is_empty())
            .map(|entry| {
                if entry.contains('/') {
                    IgnoreRule::Prefix(PathBuf::from(entry))
                } else {
                    IgnoreRule::Component(entry.to_string())
                }
            })
            .collect();
        rules.push(IgnoreRule::Component(STATE_DIR.to_string()));
        Self { ignore: rules }
    }

    /// Also ignore the given root-relative paths
    pub fn excluding(mut self, paths: impl IntoIterator<Item = PathBuf>) -> Self {
        for path in paths {
            let rule = IgnoreRule::Prefix(path);
            if !self.ignore.contains(&rule) {
                self.ignore.push(rule);
            }
        }
        self
    }

    /// Compute the fingerprint of `project` against the given lock information
    pub fn compute(&self, project: &Project, lock: &LockInfo) -> WavestrapResult<Fingerprint> {
        let inputs = self.collect_inputs(&project.root)?;

        let mut hasher = Sha256::new();
        for (path, hash) in &inputs {
            hasher.update(path.as_bytes());
            hasher.update([0u8]);
            hasher.update(hash.as_bytes());
            hasher.update(b"\n");
        }

        hasher.update(b"\0dependencies\n");
        for (name, range) in &project.external_dependencies {
            let version = lock.resolve(name, range).unwrap_or("unresolved");
            hasher.update(format!("{}@{}={}\n", name, range, version).as_bytes());
        }

        let fingerprint = Fingerprint(hex::encode(hasher.finalize()));
        debug!(
            "Fingerprint for {}: {} ({} files)",
            project.name,
            fingerprint.short(),
            inputs.len()
        );
        Ok(fingerprint)
    }

    /// Relative path (with `/` separators) -> content hash, sorted by path
    fn collect_inputs(&self, root: &Path) -> WavestrapResult<BTreeMap<String, String>> {
        let mut inputs = BTreeMap::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let entries = fs::read_dir(&dir)
                .map_err(|e| WavestrapError::io(format!("reading directory {}", dir.display()), e))?;

            for entry in entries {
                let entry =
                    entry.map_err(|e| WavestrapError::io("reading directory entry", e))?;
                let path = entry.path();
                let relative = path.strip_prefix(root).unwrap_or(&path);
                if self.is_ignored(relative) {
                    continue;
                }

                let file_type = entry
                    .file_type()
                    .map_err(|e| WavestrapError::io(format!("inspecting {}", path.display()), e))?;

                // Symlinks are produced by the link phase, never inputs
                if file_type.is_symlink() {
                    continue;
                } else if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    let key = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/");
                    inputs.insert(key, hash_file_contents(&path)?);
                }
            }
        }

        Ok(inputs)
    }

    fn is_ignored(&self, relative: &Path) -> bool {
        self.ignore.iter().any(|rule| match rule {
            IgnoreRule::Component(name) => relative
                .components()
                .any(|c| c.as_os_str() == name.as_str()),
            IgnoreRule::Prefix(prefix) => relative.starts_with(prefix),
        })
    }
}

/// Hash a file's contents using SHA256, returning the hex digest
fn hash_file_contents(path: &Path) -> WavestrapResult<String> {
    let contents = fs::read(path)
        .map_err(|e| WavestrapError::io(format!("reading {}", path.display()), e))?;

    let mut hasher = Sha256::new();
    hasher.update(&contents);
    Ok(hex::encode(hasher.finalize()))
}
