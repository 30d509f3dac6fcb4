//! Wavestrap - dependency-aware workspace bootstrap
//!
//! Installs, links and builds the projects of a multi-project workspace in
//! dependency order, running independent projects concurrently and skipping
//! those whose inputs are unchanged since their last successful build.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod invoke;
pub mod journal;
pub mod lock;
pub mod orchestrator;
pub mod project;
pub mod scheduler;

pub use error::{WavestrapError, WavestrapResult};
