//! Package manager invocation
//!
//! The orchestrator only talks to a [`ProjectInvoker`]; the process based
//! [`ShellInvoker`] is the production implementation.

mod shell;

pub use shell::ShellInvoker;

use crate::error::WavestrapResult;
use crate::project::{BootstrapStep, Project};
use async_trait::async_trait;
use std::sync::Arc;

/// Max number of output lines to include in command error messages.
const ERROR_TAIL_LINES: usize = 50;

/// Flags passed through to the install command
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstallOptions {
    /// Forbid silent lockfile updates
    pub frozen_lockfile: bool,
    /// Prefer the local package cache over the network
    pub prefer_offline: bool,
}

/// What to run for a project's bootstrap step
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRequest {
    pub step: BootstrapStep,
    /// Emit source maps next to build output
    pub source_maps: bool,
}

/// Installs, links and builds single projects
#[async_trait]
pub trait ProjectInvoker: Send + Sync {
    /// Install the project's external dependencies
    async fn install(&self, project: &Project, options: InstallOptions) -> WavestrapResult<()>;

    /// Expose the executables of `dependencies` to `project`
    async fn link(&self, project: &Project, dependencies: &[Arc<Project>]) -> WavestrapResult<()>;

    /// Run the project's bootstrap step
    async fn build(&self, project: &Project, request: &BuildRequest) -> WavestrapResult<()>;
}

/// Extract the useful tail of command output for error diagnostics.
///
/// Combines stdout and stderr, then returns the last `ERROR_TAIL_LINES`
/// lines so error messages are actionable without being overwhelming.
pub(crate) fn error_output(stdout: &str, stderr: &str) -> String {
    let lines: Vec<&str> = stdout.lines().chain(stderr.lines()).collect();
    let start = lines.len().saturating_sub(ERROR_TAIL_LINES);
    lines[start..].join("\n")
}
