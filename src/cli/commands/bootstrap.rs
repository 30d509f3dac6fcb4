//! Bootstrap command - install, link and build the workspace

use crate::cli::args::BootstrapArgs;
use crate::cli::Context;
use crate::error::WavestrapResult;
use crate::orchestrator::{BootstrapOptions, BootstrapReport};
use console::style;
use std::time::Instant;

/// Execute the bootstrap command
pub async fn execute(args: BootstrapArgs, ctx: &Context) -> WavestrapResult<()> {
    let options = apply_overrides(BootstrapOptions::from_config(&ctx.config.bootstrap), &args);
    let (projects, graph) = ctx.load_projects().await?;

    println!(
        "{} Bootstrapping {} project(s) in {}",
        style("→").cyan(),
        projects.len(),
        ctx.root.display()
    );

    let started = Instant::now();
    let report = ctx.orchestrator(options).bootstrap(&projects, &graph).await?;

    print_report(&report);
    println!(
        "{} Bootstrap complete in {:.1}s",
        style("✓").green(),
        started.elapsed().as_secs_f64()
    );
    Ok(())
}

/// Command line flags override configuration values
fn apply_overrides(mut options: BootstrapOptions, args: &BootstrapArgs) -> BootstrapOptions {
    if args.no_cache {
        options.cache = false;
    }
    options.frozen_lockfile |= args.frozen_lockfile;
    options.prefer_offline |= args.prefer_offline;
    options.source_maps |= args.source_maps;
    if let Some(package) = &args.single_version {
        options.single_version = Some(package.clone());
    }
    if let Some(limit) = args.concurrency {
        options.concurrency = Some(usize::from(limit));
    }
    options
}

fn print_report(report: &BootstrapReport) {
    println!(
        "  {} installed, {} linked",
        report.installed.len(),
        report.linked.len()
    );
    for name in &report.built {
        println!("  {} {}", style("built").green(), name);
    }
    for name in &report.skipped {
        println!("  {} {}", style("cached").dim(), name);
    }
}
