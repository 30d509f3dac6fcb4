//! Cache command - inspect or clear bootstrap cache records

use crate::cache::CacheDecision;
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::cli::Context;
use crate::error::WavestrapResult;
use crate::orchestrator::{BootstrapOptions, ChecksumEntry};
use crate::project::ProjectSet;
use console::style;
use std::collections::BTreeMap;

/// Execute the cache command
pub async fn execute(args: CacheArgs, ctx: &Context) -> WavestrapResult<()> {
    match args.action {
        CacheAction::Status { format } => show_status(ctx, format).await,
        CacheAction::Clear => clear_records(ctx).await,
    }
}

/// Show what the next run would build
async fn show_status(ctx: &Context, format: OutputFormat) -> WavestrapResult<()> {
    let (projects, _graph) = ctx.load_projects().await?;
    let options = BootstrapOptions::from_config(&ctx.config.bootstrap);
    let checksums = ctx.orchestrator(options).checksums(&projects).await?;

    match format {
        OutputFormat::Table => print_table(&projects, &checksums),
        OutputFormat::Json => print_json(ctx, &projects, &checksums).await?,
        OutputFormat::Plain => {
            for (name, entry) in &checksums {
                println!("{} {}", name, entry.decision);
            }
        }
    }

    Ok(())
}

fn print_table(projects: &ProjectSet, checksums: &BTreeMap<String, ChecksumEntry>) {
    if checksums.is_empty() {
        println!("No project declares a bootstrap step.");
        return;
    }

    println!(
        "{:<30} {:<10} {:<16}",
        style("PROJECT").bold(),
        style("STATE").bold(),
        style("FINGERPRINT").bold()
    );
    println!("{}", "-".repeat(58));

    // Registry order, not map order
    for project in projects.iter() {
        let Some(entry) = checksums.get(&project.name) else {
            continue;
        };
        let state = match entry.decision {
            CacheDecision::Valid => style("valid").green(),
            CacheDecision::Stale => style("stale").yellow(),
        };
        println!(
            "{:<30} {:<10} {:<16}",
            project.name,
            state,
            entry.fingerprint.short()
        );
    }

    let stale = checksums
        .values()
        .filter(|e| e.decision == CacheDecision::Stale)
        .count();
    println!();
    println!("{} of {} project(s) will be rebuilt", stale, checksums.len());
}

async fn print_json(
    ctx: &Context,
    projects: &ProjectSet,
    checksums: &BTreeMap<String, ChecksumEntry>,
) -> WavestrapResult<()> {
    let store = ctx.cache_store();
    let mut entries = Vec::with_capacity(checksums.len());

    for project in projects.iter() {
        let Some(entry) = checksums.get(&project.name) else {
            continue;
        };
        let record = store.handle(project).read().await?;
        entries.push(serde_json::json!({
            "project": project.name,
            "decision": entry.decision,
            "fingerprint": entry.fingerprint,
            "recorded_at": record.map(|r| r.recorded_at.to_rfc3339()),
        }));
    }

    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}

/// Remove every project's cache record
async fn clear_records(ctx: &Context) -> WavestrapResult<()> {
    let (projects, _graph) = ctx.load_projects().await?;
    let removed = ctx.cache_store().clear(&projects).await?;

    if removed == 0 {
        println!("No cache records to clear.");
    } else {
        println!("{} cleared {} cache record(s)", style("✓").green(), removed);
    }
    Ok(())
}
