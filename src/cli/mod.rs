//! Command line interface

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};

use crate::cache::{CacheStore, FingerprintComputer};
use crate::config::{Config, ConfigManager};
use crate::error::WavestrapResult;
use crate::graph::ProjectGraph;
use crate::invoke::ShellInvoker;
use crate::journal::RunJournal;
use crate::lock::YarnLockReader;
use crate::orchestrator::{BootstrapOptions, BootstrapOrchestrator};
use crate::project::ProjectSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Everything a command needs about the workspace it runs in
pub struct Context {
    /// Workspace root
    pub root: PathBuf,
    /// Effective configuration
    pub config: Config,
    /// User-wide configuration file
    pub global_config: PathBuf,
    /// Workspace configuration file, when one was found
    pub local_config: Option<PathBuf>,
}

impl Context {
    /// Discover projects and build their dependency graph
    pub async fn load_projects(&self) -> WavestrapResult<(ProjectSet, ProjectGraph)> {
        let projects = ProjectSet::load(&self.root, &self.config.workspace.projects).await?;
        debug!("Loaded {} project(s) from {}", projects.len(), self.root.display());
        let graph = ProjectGraph::from_projects(&projects)?;
        Ok((projects, graph))
    }

    /// Cache store for the configured record path
    pub fn cache_store(&self) -> CacheStore {
        CacheStore::new(&self.config.cache.record_path)
    }

    /// Orchestrator wired to the process invoker and the workspace lockfile
    pub fn orchestrator(&self, options: BootstrapOptions) -> BootstrapOrchestrator {
        let commands = &self.config.commands;
        BootstrapOrchestrator::new(
            options,
            Arc::new(ShellInvoker::new(commands)),
            Arc::new(YarnLockReader::new(self.root.join(&commands.lockfile))),
            FingerprintComputer::new(&self.config.fingerprint.ignore),
            self.cache_store(),
        )
        .with_journal(RunJournal::new(&self.root, self.config.general.journal))
    }

    /// Config manager for the user-wide file
    pub fn config_manager(&self) -> ConfigManager {
        ConfigManager::with_path(self.global_config.clone())
    }
}
