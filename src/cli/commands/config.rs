//! Config command - show configuration

use crate::cli::args::{ConfigAction, ConfigArgs};
use crate::cli::Context;
use crate::error::WavestrapResult;
use console::style;

/// Execute the config command
pub async fn execute(args: ConfigArgs, ctx: &Context) -> WavestrapResult<()> {
    match args.action {
        None | Some(ConfigAction::Show) => show_config(ctx)?,
        Some(ConfigAction::Path) => show_path(ctx),
    }

    Ok(())
}

fn show_config(ctx: &Context) -> WavestrapResult<()> {
    println!("{}", toml::to_string_pretty(&ctx.config)?);
    Ok(())
}

fn show_path(ctx: &Context) {
    let manager = ctx.config_manager();
    let global = manager.path();

    if global.exists() {
        println!("{}", global.display());
    } else {
        println!("{} {}", global.display(), style("(not found)").dim());
    }
    if let Some(local) = &ctx.local_config {
        println!("{}", local.display());
    }
}
