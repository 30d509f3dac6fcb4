//! Resolved dependency versions from the workspace lockfile
//!
//! The lockfile is read once per run, after installs finished. Its contents
//! feed both single-version validation and project fingerprints.

use crate::error::{WavestrapError, WavestrapResult};
use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolved versions keyed by dependency spec and by package name
#[derive(Debug, Clone, Default)]
pub struct LockInfo {
    /// `name@range -> version`
    resolved: HashMap<String, String>,
    /// `name -> {version, ...}`
    versions: BTreeMap<String, BTreeSet<String>>,
}

impl LockInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `name@range` resolved to `version`
    pub fn insert(&mut self, name: &str, range: &str, version: &str) {
        self.resolved
            .insert(format!("{}@{}", name, range), version.to_string());
        self.versions
            .entry(name.to_string())
            .or_default()
            .insert(version.to_string());
    }

    /// Version a declared dependency resolved to
    ///
    /// Falls back to the only known version of `name` when the exact range
    /// is not in the lockfile.
    pub fn resolve(&self, name: &str, range: &str) -> Option<&str> {
        if let Some(version) = self.resolved.get(&format!("{}@{}", name, range)) {
            return Some(version);
        }
        match self.versions.get(name) {
            Some(set) if set.len() == 1 => set.iter().next().map(String::as_str),
            _ => None,
        }
    }

    /// Distinct versions of `package`, name compared case-insensitively
    pub fn versions_of(&self, package: &str) -> Vec<String> {
        let mut versions: Vec<String> = self
            .versions
            .iter()
            .filter(|(name, _)| name.eq_ignore_ascii_case(package))
            .flat_map(|(_, set)| set.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        versions.sort_by(|a, b| compare_versions(a, b));
        versions
    }

    /// Fail when `package` resolves to more than one version
    pub fn validate_single_version(&self, package: &str) -> WavestrapResult<()> {
        let versions = self.versions_of(package);
        if versions.len() > 1 {
            return Err(WavestrapError::LockValidation {
                package: package.to_string(),
                versions,
            });
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }

    /// Parse a yarn lockfile (v1 syntax, with tolerance for `version: x`)
    pub fn parse_yarn_lock(content: &str, path: &Path) -> WavestrapResult<Self> {
        let mut info = Self::new();
        let mut specs: Vec<(String, String)> = Vec::new();

        for (number, line) in content.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            if !line.starts_with(char::is_whitespace) {
                let header = trimmed.strip_suffix(':').ok_or_else(|| {
                    WavestrapError::LockfileParse {
                        path: path.to_path_buf(),
                        line: number + 1,
                        reason: "entry header must end with ':'".to_string(),
                    }
                })?;
                specs = header
                    .split(", ")
                    .map(|spec| split_spec(spec.trim().trim_matches('"')))
                    .collect();
                continue;
            }

            // Entry fields sit at two spaces; nested dependency lists go deeper
            let field = line.starts_with("  ") && !line.starts_with("   ");
            let version_field = trimmed
                .strip_prefix("version")
                .filter(|rest| rest.starts_with([':', ' ']));
            if let (true, Some(rest)) = (field, version_field) {
                let version = rest.trim_start_matches(':').trim().trim_matches('"');
                if specs.is_empty() {
                    return Err(WavestrapError::LockfileParse {
                        path: path.to_path_buf(),
                        line: number + 1,
                        reason: "version outside of an entry".to_string(),
                    });
                }
                for (name, range) in &specs {
                    info.insert(name, range, version);
                }
            }
        }

        Ok(info)
    }
}

/// Split `name@range`, keeping the leading `@` of scoped names
fn split_spec(spec: &str) -> (String, String) {
    match spec.get(1..).and_then(|rest| rest.find('@')) {
        Some(i) => (spec[..=i].to_string(), spec[i + 2..].to_string()),
        None => (spec.to_string(), String::new()),
    }
}

fn compare_versions(a: &str, b: &str) -> Ordering {
    match (semver::Version::parse(a), semver::Version::parse(b)) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        _ => a.cmp(b),
    }
}

/// Source of resolved dependency versions
#[async_trait]
pub trait LockfileReader: Send + Sync {
    /// Read the current lock information
    async fn read(&self) -> WavestrapResult<LockInfo>;
}

/// Reads `yarn.lock` from the workspace root
pub struct YarnLockReader {
    path: PathBuf,
}

impl YarnLockReader {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl LockfileReader for YarnLockReader {
    async fn read(&self) -> WavestrapResult<LockInfo> {
        if !self.path.exists() {
            debug!("No lockfile at {}, using empty lock info", self.path.display());
            return Ok(LockInfo::new());
        }

        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            WavestrapError::io(format!("reading lockfile {}", self.path.display()), e)
        })?;
        LockInfo::parse_yarn_lock(&content, &self.path)
    }
}
