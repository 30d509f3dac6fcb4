//! Bootstrap orchestration
//!
//! Drives a run through its phases:
//!
//! | Phase | Scheduling | Effect |
//! |-------|------------|--------|
//! | Plan | none | install and build batches; cycles fail here |
//! | Install | sequential | install external deps, then link executables |
//! | Checksum | none | read lockfile, validate, fingerprint, decide |
//! | Build | parallel | skip valid projects; invalidate, build, commit the rest |
//!
//! Any phase can end the run in `Failed`; the returned error carries the
//! phase and, where there is one, the project.

use crate::cache::{CacheDecision, CacheStore, Fingerprint, FingerprintComputer};
use crate::config::schema::BootstrapConfig;
use crate::error::{WavestrapError, WavestrapResult};
use crate::graph::{Batch, BatchScope, ProjectGraph};
use crate::invoke::{BuildRequest, InstallOptions, ProjectInvoker};
use crate::journal::RunJournal;
use crate::lock::{LockInfo, LockfileReader};
use crate::project::{Project, ProjectSet};
use crate::scheduler::{BatchScheduler, SchedulePolicy};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Orchestration state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Plan,
    Install,
    Checksum,
    Build,
    Done,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Plan => "plan",
            Self::Install => "install",
            Self::Checksum => "checksum",
            Self::Build => "build",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Options recognized by a bootstrap run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapOptions {
    /// Skip bootstrap steps with a valid cache record
    pub cache: bool,
    pub frozen_lockfile: bool,
    pub prefer_offline: bool,
    /// Package that must resolve to a single version
    pub single_version: Option<String>,
    /// Max concurrent bootstrap steps per batch
    pub concurrency: Option<usize>,
    pub source_maps: bool,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self::from_config(&BootstrapConfig::default())
    }
}

impl BootstrapOptions {
    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self {
            cache: config.cache,
            frozen_lockfile: config.frozen_lockfile,
            prefer_offline: config.prefer_offline,
            single_version: config.single_version.clone(),
            concurrency: config.concurrency,
            source_maps: config.source_maps,
        }
    }

    fn install_options(&self) -> InstallOptions {
        InstallOptions {
            frozen_lockfile: self.frozen_lockfile,
            prefer_offline: self.prefer_offline,
        }
    }
}

/// Fresh fingerprint and cache decision for one project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumEntry {
    pub fingerprint: Fingerprint,
    pub decision: CacheDecision,
}

/// What happened to a project during the build phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuildAction {
    Built,
    Skipped,
    NoStep,
}

/// Summary of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Projects whose dependencies were installed
    pub installed: Vec<String>,
    /// Projects that received dependency executables
    pub linked: Vec<String>,
    /// Projects whose bootstrap step ran
    pub built: Vec<String>,
    /// Projects whose bootstrap step was skipped as unchanged
    pub skipped: Vec<String>,
}

/// Top-level driver of a bootstrap run
pub struct BootstrapOrchestrator {
    options: BootstrapOptions,
    invoker: Arc<dyn ProjectInvoker>,
    lock_reader: Arc<dyn LockfileReader>,
    fingerprints: FingerprintComputer,
    cache: CacheStore,
    journal: Arc<RunJournal>,
}

impl BootstrapOrchestrator {
    pub fn new(
        options: BootstrapOptions,
        invoker: Arc<dyn ProjectInvoker>,
        lock_reader: Arc<dyn LockfileReader>,
        fingerprints: FingerprintComputer,
        cache: CacheStore,
    ) -> Self {
        // The store's own files must never feed a fingerprint
        let fingerprints = fingerprints.excluding(cache.owned_paths());
        Self {
            options,
            invoker,
            lock_reader,
            fingerprints,
            cache,
            journal: Arc::new(RunJournal::disabled()),
        }
    }

    /// Record run events in `journal`
    pub fn with_journal(mut self, journal: RunJournal) -> Self {
        self.journal = Arc::new(journal);
        self
    }

    /// Run every phase over `projects`
    pub async fn bootstrap(
        &self,
        projects: &ProjectSet,
        graph: &ProjectGraph,
    ) -> WavestrapResult<BootstrapReport> {
        self.journal
            .record(
                "bootstrap.started",
                serde_json::json!({
                    "projects": projects.len(),
                    "cache": self.options.cache,
                }),
            )
            .await;

        let result = self.run_phases(projects, graph).await;

        match &result {
            Ok(report) => {
                info!(
                    "Bootstrap {}: {} built, {} skipped",
                    Phase::Done,
                    report.built.len(),
                    report.skipped.len()
                );
                self.journal
                    .record(
                        "bootstrap.finished",
                        serde_json::json!({
                            "built": report.built,
                            "skipped": report.skipped,
                        }),
                    )
                    .await;
            }
            Err(e) => {
                let phase = e.phase().map(|p| p.to_string()).unwrap_or_default();
                error!("Bootstrap {} in {} phase: {}", Phase::Failed, phase, e);
                self.journal
                    .record(
                        "bootstrap.failed",
                        serde_json::json!({
                            "phase": e.phase(),
                            "project": e.project(),
                            "error": e.to_string(),
                        }),
                    )
                    .await;
            }
        }

        result
    }

    async fn run_phases(
        &self,
        projects: &ProjectSet,
        graph: &ProjectGraph,
    ) -> WavestrapResult<BootstrapReport> {
        info!("Phase: {}", Phase::Plan);
        let install_batches = resolve(projects, graph.batches(BatchScope::InstallableOnly)?)?;
        let build_batches = resolve(projects, graph.batches(BatchScope::All)?)?;

        info!("Phase: {}", Phase::Install);
        let installed = self.install_phase(install_batches).await?;
        let linked = self.link_phase(projects, graph).await?;

        info!("Phase: {}", Phase::Checksum);
        let checksums = self.checksum_phase(projects).await?;

        info!("Phase: {}", Phase::Build);
        let outcomes = self.build_phase(build_batches, checksums).await?;

        let mut report = BootstrapReport {
            installed,
            linked,
            ..BootstrapReport::default()
        };
        for (name, action) in outcomes {
            match action {
                BuildAction::Built => report.built.push(name),
                BuildAction::Skipped => report.skipped.push(name),
                BuildAction::NoStep => {}
            }
        }
        Ok(report)
    }

    /// Installs share the package store and lockfile, so they run one at a time
    async fn install_phase(&self, batches: Vec<Vec<Arc<Project>>>) -> WavestrapResult<Vec<String>> {
        let invoker = Arc::clone(&self.invoker);
        let options = self.options.install_options();

        let installed = BatchScheduler::new(SchedulePolicy::Sequential)
            .run(batches, move |project: Arc<Project>| {
                let invoker = Arc::clone(&invoker);
                async move {
                    if !project.has_external_dependencies() {
                        debug!("{} has no external dependencies", project.name);
                        return Ok(None);
                    }
                    invoker
                        .install(&project, options)
                        .await
                        .map_err(|e| WavestrapError::Install {
                            project: project.name.clone(),
                            reason: e.to_string(),
                        })?;
                    Ok::<_, WavestrapError>(Some(project.name.clone()))
                }
            })
            .await
            .map_err(|e| e.in_phase(Phase::Install))?;

        Ok(installed.into_iter().flatten().collect())
    }

    async fn link_phase(&self, projects: &ProjectSet, graph: &ProjectGraph) -> WavestrapResult<Vec<String>> {
        let mut linked = Vec::new();

        for project in projects.iter() {
            let dependencies: Vec<Arc<Project>> = graph
                .dependencies_of(&project.name)
                .into_iter()
                .filter_map(|name| projects.get(name).cloned())
                .collect();
            if dependencies.is_empty() {
                continue;
            }

            self.invoker
                .link(project, &dependencies)
                .await
                .map_err(|e| WavestrapError::Install {
                    project: project.name.clone(),
                    reason: format!("linking executables: {}", e),
                })?;
            linked.push(project.name.clone());
        }

        Ok(linked)
    }

    /// Read the lockfile, validate it, and decide every project's cache state
    ///
    /// Completes before any build unit starts, so every decision is taken
    /// against the same lockfile snapshot.
    async fn checksum_phase(&self, projects: &ProjectSet) -> WavestrapResult<BTreeMap<String, ChecksumEntry>> {
        let lock = self.read_lock().await?;
        if let Some(package) = &self.options.single_version {
            lock.validate_single_version(package)?;
        }
        self.decide(projects, lock).await
    }

    /// Fingerprints and cache decisions without running anything
    pub async fn checksums(&self, projects: &ProjectSet) -> WavestrapResult<BTreeMap<String, ChecksumEntry>> {
        let lock = self.read_lock().await?;
        self.decide(projects, lock).await
    }

    async fn read_lock(&self) -> WavestrapResult<LockInfo> {
        self.lock_reader.read().await.map_err(|e| match e.phase() {
            Some(_) => e,
            None => WavestrapError::LockfileRead {
                reason: e.to_string(),
            },
        })
    }

    async fn decide(
        &self,
        projects: &ProjectSet,
        lock: LockInfo,
    ) -> WavestrapResult<BTreeMap<String, ChecksumEntry>> {
        let lock = Arc::new(lock);

        // Projects without a bootstrap step never get a fingerprint
        let pending: Vec<Arc<Project>> = projects
            .iter()
            .filter(|p| p.bootstrap_step().is_some())
            .cloned()
            .collect();

        let hashing = pending.iter().map(|project| {
            let project = Arc::clone(project);
            let lock = Arc::clone(&lock);
            let computer = self.fingerprints.clone();
            tokio::task::spawn_blocking(move || computer.compute(&project, &lock))
        });
        let fingerprints = join_all(hashing).await;

        let mut entries = BTreeMap::new();
        for (project, fingerprint) in pending.iter().zip(fingerprints) {
            let checksum_error = |reason: String| WavestrapError::Checksum {
                project: project.name.clone(),
                reason,
            };
            let fingerprint = fingerprint
                .map_err(|e| checksum_error(format!("fingerprint task failed: {}", e)))?
                .map_err(|e| checksum_error(e.to_string()))?;
            let decision = self
                .cache
                .handle(project)
                .decide(&fingerprint, self.options.cache)
                .await
                .map_err(|e| checksum_error(e.to_string()))?;
            debug!("{}: {} ({})", project.name, decision, fingerprint.short());
            entries.insert(
                project.name.clone(),
                ChecksumEntry {
                    fingerprint,
                    decision,
                },
            );
        }

        Ok(entries)
    }

    async fn build_phase(
        &self,
        batches: Vec<Vec<Arc<Project>>>,
        checksums: BTreeMap<String, ChecksumEntry>,
    ) -> WavestrapResult<Vec<(String, BuildAction)>> {
        let unit = Arc::new(BuildUnit {
            invoker: Arc::clone(&self.invoker),
            cache: self.cache.clone(),
            journal: Arc::clone(&self.journal),
            source_maps: self.options.source_maps,
        });
        let checksums = Arc::new(checksums);

        BatchScheduler::new(SchedulePolicy::Parallel {
            limit: self.options.concurrency,
        })
        .run(batches, move |project: Arc<Project>| {
            let unit = Arc::clone(&unit);
            let entry = checksums.get(&project.name).cloned();
            async move {
                let name = project.name.clone();
                let action = unit.run(project, entry).await?;
                Ok::<_, WavestrapError>((name, action))
            }
        })
        .await
        .map_err(|e| e.in_phase(Phase::Build))
    }
}

/// Everything one build unit needs; each unit owns its project's cache handle
struct BuildUnit {
    invoker: Arc<dyn ProjectInvoker>,
    cache: CacheStore,
    journal: Arc<RunJournal>,
    source_maps: bool,
}

impl BuildUnit {
    async fn run(&self, project: Arc<Project>, entry: Option<ChecksumEntry>) -> WavestrapResult<BuildAction> {
        let Some(step) = project.bootstrap_step() else {
            return Ok(BuildAction::NoStep);
        };
        let entry = entry.ok_or_else(|| {
            WavestrapError::Internal(format!("no checksum computed for {}", project.name))
        })?;

        if entry.decision == CacheDecision::Valid {
            info!("{}: unchanged, skipping bootstrap step", project.name);
            self.journal
                .record("project.skipped", serde_json::json!({ "project": project.name }))
                .await;
            return Ok(BuildAction::Skipped);
        }

        let build_error = |e: WavestrapError| WavestrapError::Build {
            project: project.name.clone(),
            reason: e.to_string(),
        };

        let cache = self.cache.handle(&project);
        cache.invalidate().await.map_err(build_error)?;

        let request = BuildRequest {
            step,
            source_maps: self.source_maps,
        };
        self.invoker
            .build(&project, &request)
            .await
            .map_err(build_error)?;

        cache.commit(&entry.fingerprint).await.map_err(build_error)?;

        info!("{}: bootstrap step complete", project.name);
        self.journal
            .record(
                "project.built",
                serde_json::json!({
                    "project": project.name,
                    "fingerprint": entry.fingerprint,
                }),
            )
            .await;
        Ok(BuildAction::Built)
    }
}

/// Map batches of names to the projects they name
fn resolve(projects: &ProjectSet, batches: Vec<Batch>) -> WavestrapResult<Vec<Vec<Arc<Project>>>> {
    batches
        .into_iter()
        .map(|batch| {
            batch
                .iter()
                .map(|name| {
                    projects.get(name).cloned().ok_or_else(|| {
                        WavestrapError::Internal(format!("batched unknown project {}", name))
                    })
                })
                .collect()
        })
        .collect()
}
