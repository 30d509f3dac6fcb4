//! Error types for wavestrap
//!
//! All modules use `WavestrapResult<T>` as their return type.

use crate::orchestrator::Phase;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for wavestrap operations
pub type WavestrapResult<T> = Result<T, WavestrapError>;

/// All errors that can occur in wavestrap
#[derive(Error, Debug)]
pub enum WavestrapError {
    // Graph errors
    #[error("Dependency cycle detected: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Project {dependent} depends on unknown project {dependency}")]
    ProjectNotFound {
        dependent: String,
        dependency: String,
    },

    // Phase errors
    #[error("Install failed for project {project}: {reason}")]
    Install { project: String, reason: String },

    #[error("Package {package} resolves to multiple versions: {}", versions.join(", "))]
    LockValidation {
        package: String,
        versions: Vec<String>,
    },

    #[error("Build failed for project {project}: {reason}")]
    Build { project: String, reason: String },

    #[error("Checksum failed for project {project}: {reason}")]
    Checksum { project: String, reason: String },

    #[error("Failed to read lock information: {reason}")]
    LockfileRead { reason: String },

    #[error("Unit {unit} panicked: {message}")]
    UnitPanicked { unit: String, message: String },

    #[error("{} projects failed in one batch: {}", errors.len(), summarize(errors))]
    BatchFailed { errors: Vec<WavestrapError> },

    // Project registry errors
    #[error("Invalid manifest at {path}: {reason}")]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("Duplicate project name {name} at {first} and {second}")]
    DuplicateProject {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Failed to parse lockfile {path}: line {line}: {reason}")]
    LockfileParse {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command execution error: {command}, output: {output}")]
    CommandExecution { command: String, output: String },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

fn summarize(errors: &[WavestrapError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl WavestrapError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a command execution error
    pub fn command_exec(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self::CommandExecution {
            command: command.into(),
            output: output.into(),
        }
    }

    /// Phase of the bootstrap run this error belongs to, if any
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::CyclicDependency { .. } | Self::ProjectNotFound { .. } => Some(Phase::Plan),
            Self::Install { .. } => Some(Phase::Install),
            Self::LockValidation { .. }
            | Self::LockfileParse { .. }
            | Self::LockfileRead { .. }
            | Self::Checksum { .. } => Some(Phase::Checksum),
            Self::Build { .. } => Some(Phase::Build),
            Self::BatchFailed { errors } => errors.first().and_then(Self::phase),
            _ => None,
        }
    }

    /// Attribute untagged unit failures to `phase`
    ///
    /// A panicked unit becomes that phase's project error; everything
    /// already tagged is left alone.
    pub fn in_phase(self, phase: Phase) -> Self {
        match self {
            Self::UnitPanicked { unit, message } => {
                let reason = format!("panicked: {}", message);
                match phase {
                    Phase::Install => Self::Install { project: unit, reason },
                    Phase::Checksum => Self::Checksum { project: unit, reason },
                    Phase::Build => Self::Build { project: unit, reason },
                    _ => Self::UnitPanicked { unit, message },
                }
            }
            Self::BatchFailed { errors } => Self::BatchFailed {
                errors: errors.into_iter().map(|e| e.in_phase(phase)).collect(),
            },
            other => other,
        }
    }

    /// Project the error is tagged with, if any
    pub fn project(&self) -> Option<&str> {
        match self {
            Self::Install { project, .. }
            | Self::Build { project, .. }
            | Self::Checksum { project, .. } => Some(project),
            Self::UnitPanicked { unit, .. } => Some(unit),
            Self::ProjectNotFound { dependent, .. } => Some(dependent),
            _ => None,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::CyclicDependency { .. } => {
                Some("Remove one of the listed dependencies to break the cycle")
            }
            Self::LockValidation { .. } => {
                Some("Pin a single version with a `resolutions` entry and reinstall")
            }
            Self::Build { .. } | Self::BatchFailed { .. } => {
                Some("Fix the failing project and rerun; completed projects stay cached")
            }
            Self::Install { .. } => Some("Installs are idempotent; rerun after fixing the cause"),
            _ => None,
        }
    }
}
