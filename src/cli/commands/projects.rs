//! Projects command - list workspace projects and their build batches

use crate::cli::args::{OutputFormat, ProjectsArgs};
use crate::cli::Context;
use crate::error::WavestrapResult;
use crate::graph::{BatchScope, ProjectGraph};
use crate::project::{BootstrapStep, ProjectSet, BOOTSTRAP_SCRIPT};
use console::style;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Serialize)]
struct ProjectRow {
    name: String,
    batch: usize,
    path: String,
    dependencies: Vec<String>,
    step: String,
    aggregator: bool,
}

/// Execute the projects command
pub async fn execute(args: ProjectsArgs, ctx: &Context) -> WavestrapResult<()> {
    let (projects, graph) = ctx.load_projects().await?;

    if projects.is_empty() {
        match args.format {
            OutputFormat::Json => println!("[]"),
            OutputFormat::Plain => {}
            OutputFormat::Table => println!("No projects found in {}", ctx.root.display()),
        }
        return Ok(());
    }

    let rows = rows(&projects, &graph, ctx)?;
    match args.format {
        OutputFormat::Table => print_table(&rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.name);
            }
        }
    }

    Ok(())
}

/// One row per project, ordered by build batch
fn rows(projects: &ProjectSet, graph: &ProjectGraph, ctx: &Context) -> WavestrapResult<Vec<ProjectRow>> {
    let batches = graph.batches(BatchScope::All)?;
    let batch_of: HashMap<&str, usize> = batches
        .iter()
        .enumerate()
        .flat_map(|(i, batch)| batch.iter().map(move |name| (name.as_str(), i + 1)))
        .collect();

    let mut rows: Vec<ProjectRow> = projects
        .iter()
        .map(|project| ProjectRow {
            name: project.name.clone(),
            batch: batch_of.get(project.name.as_str()).copied().unwrap_or_default(),
            path: project
                .root
                .strip_prefix(&ctx.root)
                .unwrap_or(&project.root)
                .display()
                .to_string(),
            dependencies: project.internal_dependencies.clone(),
            step: match project.bootstrap_step() {
                Some(BootstrapStep::Targets(targets)) => targets.join(", "),
                Some(BootstrapStep::Script) => BOOTSTRAP_SCRIPT.to_string(),
                None => "-".to_string(),
            },
            aggregator: project.workspace_aggregator,
        })
        .collect();
    rows.sort_by_key(|row| row.batch);
    Ok(rows)
}

fn print_table(rows: &[ProjectRow]) {
    println!(
        "{:<6} {:<30} {:<30} {:<30}",
        style("BATCH").bold(),
        style("NAME").bold(),
        style("PATH").bold(),
        style("STEP").bold()
    );
    println!("{}", "-".repeat(96));

    for row in rows {
        let name = if row.aggregator {
            format!("{} {}", row.name, style("(workspace)").dim())
        } else {
            row.name.clone()
        };
        println!("{:<6} {:<30} {:<30} {:<30}", row.batch, name, row.path, row.step);
    }

    println!();
    println!("{} project(s)", rows.len());
}
