//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Wavestrap - dependency-aware workspace bootstrap
///
/// Installs, links and builds every project of a multi-project
/// workspace in dependency order, skipping projects whose inputs
/// did not change since their last successful build.
#[derive(Parser, Debug)]
#[command(name = "wavestrap")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "WAVESTRAP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Workspace root (defaults to the directory holding wavestrap.toml,
    /// or the current directory)
    #[arg(short, long, global = true)]
    pub workspace: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install, link and build every project
    Bootstrap(BootstrapArgs),

    /// List workspace projects and their build batches
    Projects(ProjectsArgs),

    /// Inspect or clear bootstrap cache records
    Cache(CacheArgs),

    /// Show configuration
    Config(ConfigArgs),
}

/// Arguments for the bootstrap command
#[derive(Parser, Debug, Default)]
pub struct BootstrapArgs {
    /// Run every bootstrap step regardless of cache records
    #[arg(long)]
    pub no_cache: bool,

    /// Fail installs that would update the lockfile
    #[arg(long)]
    pub frozen_lockfile: bool,

    /// Prefer the local package cache over the network
    #[arg(long)]
    pub prefer_offline: bool,

    /// Fail if this package resolves to more than one version
    #[arg(long, value_name = "PKG")]
    pub single_version: Option<String>,

    /// Max concurrent bootstrap steps per batch
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub concurrency: Option<u16>,

    /// Emit source maps during bootstrap steps
    #[arg(long)]
    pub source_maps: bool,
}

/// Arguments for the projects command
#[derive(Parser, Debug)]
pub struct ProjectsArgs {
    /// Output format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments for the cache command
#[derive(Parser, Debug)]
pub struct CacheArgs {
    /// Subcommand for cache
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache subcommands
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Show each project's cache decision for the next run
    Status {
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Remove every cache record
    Clear,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Subcommand for config
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show configuration file paths
    Path,
}

/// Output format for listings
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table
    Table,
    /// JSON output
    Json,
    /// Simple text (one per line)
    Plain,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_bootstrap_flags() {
        let cli = Cli::parse_from([
            "wavestrap",
            "bootstrap",
            "--no-cache",
            "--single-version",
            "lodash",
            "--concurrency",
            "4",
        ]);
        match cli.command {
            Commands::Bootstrap(args) => {
                assert!(args.no_cache);
                assert_eq!(args.single_version.as_deref(), Some("lodash"));
                assert_eq!(args.concurrency, Some(4));
                assert!(!args.frozen_lockfile);
            }
            _ => panic!("expected Bootstrap command"),
        }
    }

    #[test]
    fn cli_rejects_zero_concurrency() {
        let result = Cli::try_parse_from(["wavestrap", "bootstrap", "--concurrency", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn cli_parses_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["wavestrap", "projects", "-vv", "--workspace", "/tmp/ws"]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.workspace, Some(PathBuf::from("/tmp/ws")));
        assert!(matches!(cli.command, Commands::Projects(_)));
    }

    #[test]
    fn cli_parses_cache_clear() {
        let cli = Cli::parse_from(["wavestrap", "cache", "clear"]);
        match cli.command {
            Commands::Cache(args) => assert!(matches!(args.action, CacheAction::Clear)),
            _ => panic!("expected Cache command"),
        }
    }

    #[test]
    fn cli_parses_config_without_action() {
        let cli = Cli::parse_from(["wavestrap", "config"]);
        match cli.command {
            Commands::Config(args) => assert!(args.action.is_none()),
            _ => panic!("expected Config command"),
        }
    }

    #[test]
    fn cli_parses_json_format() {
        let cli = Cli::parse_from(["wavestrap", "cache", "status", "--format", "json"]);
        match cli.command {
            Commands::Cache(CacheArgs {
                action: CacheAction::Status { format },
            }) => assert!(matches!(format, OutputFormat::Json)),
            _ => panic!("expected cache status"),
        }
    }
}
