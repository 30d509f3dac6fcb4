//! CLI command implementations

pub mod bootstrap;
pub mod cache;
pub mod config;
pub mod projects;

pub use bootstrap::execute as bootstrap;
pub use cache::execute as cache;
pub use config::execute as config;
pub use projects::execute as projects;
