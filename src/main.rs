//! Wavestrap - dependency-aware workspace bootstrap
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use wavestrap::cli::{Cli, Commands, Context};
use wavestrap::config::ConfigManager;
use wavestrap::error::{WavestrapError, WavestrapResult};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> WavestrapResult<()> {
    let cli = Cli::parse();
    let ctx = load_context(&cli).await?;

    // Initialize logging: 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("wavestrap=warn"),
        1 => EnvFilter::new("wavestrap=info"),
        _ => EnvFilter::new("wavestrap=debug"),
    };

    if ctx.config.general.log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .without_time()
            .init();
    }

    debug!("Workspace root: {}", ctx.root.display());
    if let Some(ref path) = ctx.local_config {
        debug!("Using workspace config: {}", path.display());
    }

    // Dispatch to command
    match cli.command {
        Commands::Bootstrap(args) => wavestrap::cli::commands::bootstrap(args, &ctx).await,
        Commands::Projects(args) => wavestrap::cli::commands::projects(args, &ctx).await,
        Commands::Cache(args) => wavestrap::cli::commands::cache(args, &ctx).await,
        Commands::Config(args) => wavestrap::cli::commands::config(args, &ctx).await,
    }
}

/// Resolve the workspace root and load the merged configuration
///
/// Without `--workspace`, the root is the directory of the nearest
/// `wavestrap.toml` above the current directory, or the current directory.
async fn load_context(cli: &Cli) -> WavestrapResult<Context> {
    let cwd = std::env::current_dir()
        .map_err(|e| WavestrapError::io("getting current directory", e))?;

    let (root, local_config) = match &cli.workspace {
        Some(workspace) => {
            let root = if workspace.is_absolute() {
                workspace.clone()
            } else {
                cwd.join(workspace)
            };
            if !root.is_dir() {
                return Err(WavestrapError::User(format!(
                    "workspace {} is not a directory",
                    root.display()
                )));
            }
            let local = root.join(wavestrap::config::CONFIG_FILE);
            let local = local.is_file().then_some(local);
            (root, local)
        }
        None => match ConfigManager::find_local_config(&cwd) {
            Some(found) => {
                let root = found
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| cwd.clone());
                (root, Some(found))
            }
            None => (cwd, None),
        },
    };

    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = manager.load_merged(local_config.as_deref()).await?;

    Ok(Context {
        root,
        config,
        global_config: manager.path().to_path_buf(),
        local_config,
    })
}
