//! Per-project cache records
//!
//! Each project keeps its own record file below its root, so the store is
//! naturally partitioned by project and concurrent commits never touch the
//! same file.

use crate::cache::fingerprint::Fingerprint;
use crate::error::{WavestrapError, WavestrapResult};
use crate::project::{Project, ProjectSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Fingerprint recorded after a successful bootstrap step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Inputs the step ran against
    pub fingerprint: Fingerprint,

    /// When the step completed
    pub recorded_at: DateTime<Utc>,
}

/// Whether a project's bootstrap step can be skipped this run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheDecision {
    Valid,
    Stale,
}

impl fmt::Display for CacheDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid => write!(f, "valid"),
            Self::Stale => write!(f, "stale"),
        }
    }
}

/// Locates cache records relative to project roots
#[derive(Debug, Clone)]
pub struct CacheStore {
    record_path: PathBuf,
}

impl CacheStore {
    /// Create a store keeping records at `record_path` inside each project
    pub fn new(record_path: impl Into<PathBuf>) -> Self {
        Self {
            record_path: record_path.into(),
        }
    }

    /// Root-relative paths the store writes inside every project
    pub fn owned_paths(&self) -> Vec<PathBuf> {
        vec![
            self.record_path.clone(),
            self.record_path.with_extension("tmp"),
        ]
    }

    /// The cache handle for one project
    pub fn handle(&self, project: &Project) -> ProjectCache {
        ProjectCache {
            project: project.name.clone(),
            path: project.root.join(&self.record_path),
        }
    }

    /// Remove every project's record, returning how many existed
    pub async fn clear(&self, projects: &ProjectSet) -> WavestrapResult<usize> {
        let mut removed = 0;
        for project in projects.iter() {
            let cache = self.handle(project);
            if cache.path.exists() {
                cache.invalidate().await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Cache record access for a single project
///
/// The orchestrator creates exactly one handle per project per run.
#[derive(Debug)]
pub struct ProjectCache {
    project: String,
    path: PathBuf,
}

impl ProjectCache {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record, if one exists
    ///
    /// An unreadable or corrupt record counts as absent so the next build
    /// simply overwrites it.
    pub async fn read(&self) -> WavestrapResult<Option<CacheRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).await.map_err(|e| {
            WavestrapError::io(format!("reading cache record {}", self.path.display()), e)
        })?;

        match serde_json::from_str::<CacheRecord>(&content) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Ignoring corrupt cache record for {}: {}", self.project, e);
                Ok(None)
            }
        }
    }

    /// `caching_enabled && record exists && record.fingerprint == fresh`
    pub async fn is_valid(&self, fresh: &Fingerprint, caching_enabled: bool) -> WavestrapResult<bool> {
        if !caching_enabled {
            return Ok(false);
        }
        Ok(self
            .read()
            .await?
            .is_some_and(|record| record.fingerprint == *fresh))
    }

    pub async fn decide(&self, fresh: &Fingerprint, caching_enabled: bool) -> WavestrapResult<CacheDecision> {
        Ok(if self.is_valid(fresh, caching_enabled).await? {
            CacheDecision::Valid
        } else {
            CacheDecision::Stale
        })
    }

    /// Delete the record. Must run before the bootstrap step starts.
    pub async fn invalidate(&self) -> WavestrapResult<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!("Invalidated cache for {}", self.project);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WavestrapError::io(
                format!("removing cache record {}", self.path.display()),
                e,
            )),
        }
    }

    /// Record `fingerprint` after a successful bootstrap step
    ///
    /// Written to a sibling temp file and renamed into place, so a reader
    /// sees either no record or a complete one.
    pub async fn commit(&self, fingerprint: &Fingerprint) -> WavestrapResult<CacheRecord> {
        let record = CacheRecord {
            fingerprint: fingerprint.clone(),
            recorded_at: Utc::now(),
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                WavestrapError::io(format!("creating cache directory {}", parent.display()), e)
            })?;
        }

        let content = serde_json::to_string_pretty(&record)?;
        let temp = self.path.with_extension("tmp");
        fs::write(&temp, content).await.map_err(|e| {
            WavestrapError::io(format!("writing cache record {}", temp.display()), e)
        })?;
        fs::rename(&temp, &self.path).await.map_err(|e| {
            WavestrapError::io(format!("moving cache record to {}", self.path.display()), e)
        })?;

        debug!("Committed cache for {}: {}", self.project, fingerprint.short());
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::fingerprint::FingerprintComputer;
    use crate::lock::LockInfo;
    use tempfile::TempDir;

    const RECORD_PATH: &str = "target/.bootstrap-cache";

    fn setup() -> (TempDir, Project, Fingerprint) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.js"), "module.exports = 1").unwrap();
        let project = Project::new("core", dir.path());
        let fingerprint = FingerprintComputer::new(&["target".to_string()])
            .compute(&project, &LockInfo::new())
            .unwrap();
        (dir, project, fingerprint)
    }

    #[tokio::test]
    async fn missing_record_is_stale() {
        let (_dir, project, fingerprint) = setup();
        let cache = CacheStore::new(RECORD_PATH).handle(&project);

        assert!(cache.read().await.unwrap().is_none());
        assert_eq!(cache.decide(&fingerprint, true).await.unwrap(), CacheDecision::Stale);
    }

    #[tokio::test]
    async fn commit_then_valid() {
        let (dir, project, fingerprint) = setup();
        let cache = CacheStore::new(RECORD_PATH).handle(&project);

        let record = cache.commit(&fingerprint).await.unwrap();
        assert_eq!(cache.read().await.unwrap(), Some(record));
        assert!(cache.is_valid(&fingerprint, true).await.unwrap());
        assert!(dir.path().join(RECORD_PATH).exists());
        assert!(!dir.path().join("target/.bootstrap-cache.tmp").exists());
    }

    #[tokio::test]
    async fn record_outside_ignored_paths_keeps_fingerprint() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.js"), "module.exports = 1").unwrap();
        let project = Project::new("core", dir.path());
        let store = CacheStore::new(".bootstrap-cache");
        let computer = FingerprintComputer::new(&[]).excluding(store.owned_paths());

        let fingerprint = computer.compute(&project, &LockInfo::new()).unwrap();
        store.handle(&project).commit(&fingerprint).await.unwrap();

        let fresh = computer.compute(&project, &LockInfo::new()).unwrap();
        assert_eq!(fresh, fingerprint);
        assert!(store.handle(&project).is_valid(&fresh, true).await.unwrap());
    }

    #[tokio::test]
    async fn disabled_caching_is_never_valid() {
        let (_dir, project, fingerprint) = setup();
        let cache = CacheStore::new(RECORD_PATH).handle(&project);
        cache.commit(&fingerprint).await.unwrap();

        assert!(!cache.is_valid(&fingerprint, false).await.unwrap());
    }

    #[tokio::test]
    async fn changed_fingerprint_is_stale() {
        let (dir, project, fingerprint) = setup();
        let cache = CacheStore::new(RECORD_PATH).handle(&project);
        cache.commit(&fingerprint).await.unwrap();

        std::fs::write(dir.path().join("index.js"), "module.exports = 2").unwrap();
        let fresh = FingerprintComputer::new(&["target".to_string()])
            .compute(&project, &LockInfo::new())
            .unwrap();

        assert_eq!(cache.decide(&fresh, true).await.unwrap(), CacheDecision::Stale);
    }

    #[tokio::test]
    async fn invalidate_without_commit_stays_stale() {
        let (_dir, project, fingerprint) = setup();
        let store = CacheStore::new(RECORD_PATH);
        store.handle(&project).commit(&fingerprint).await.unwrap();

        // A step that dies after invalidate never reaches commit
        let cache = store.handle(&project);
        cache.invalidate().await.unwrap();
        drop(cache);

        let next_run = store.handle(&project);
        assert_eq!(next_run.decide(&fingerprint, true).await.unwrap(), CacheDecision::Stale);
    }

    #[tokio::test]
    async fn invalidate_missing_record_is_ok() {
        let (_dir, project, _) = setup();
        CacheStore::new(RECORD_PATH)
            .handle(&project)
            .invalidate()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn corrupt_record_counts_as_absent() {
        let (dir, project, fingerprint) = setup();
        std::fs::create_dir_all(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join(RECORD_PATH), "not json").unwrap();

        let cache = CacheStore::new(RECORD_PATH).handle(&project);
        assert!(cache.read().await.unwrap().is_none());
        assert!(!cache.is_valid(&fingerprint, true).await.unwrap());
    }

    #[tokio::test]
    async fn clear_removes_all_records() {
        let (_dir, project, fingerprint) = setup();
        let other_dir = TempDir::new().unwrap();
        let other = Project::new("other", other_dir.path());
        let store = CacheStore::new(RECORD_PATH);
        store.handle(&project).commit(&fingerprint).await.unwrap();

        let projects = ProjectSet::new(vec![project.clone(), other]).unwrap();
        assert_eq!(store.clear(&projects).await.unwrap(), 1);
        assert!(store.handle(&project).read().await.unwrap().is_none());
    }
}
