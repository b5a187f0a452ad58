//! Jot CLI - notes and checklists from the terminal
//!
//! Edits land in the local collection first; `jot sync` and `jot watch`
//! reconcile it with the notes server.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands, ConfigCommands};
use crate::commands::add::run_add;
use crate::commands::check::run_check;
use crate::commands::common::Context;
use crate::commands::config::{run_config_set_server, run_config_set_username, run_config_show};
use crate::commands::delete::run_delete;
use crate::commands::list::run_list;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jot=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let ctx = Context::load(cli.config, cli.data_dir)?;

    match cli.command {
        Commands::Add {
            title,
            body,
            items,
            tags,
            shared,
        } => run_add(&ctx, &title, &body, &items, &tags, shared).await?,
        Commands::List {
            limit,
            tag,
            all,
            json,
        } => run_list(&ctx, limit, tag.as_deref(), all, json).await?,
        Commands::Delete { id } => run_delete(&ctx, &id).await?,
        Commands::Check { note, item } => run_check(&ctx, &note, &item).await?,
        Commands::Sync => run_sync(&ctx).await?,
        Commands::Watch => run_watch(&ctx).await?,
        Commands::Config { command } => match command {
            ConfigCommands::Show => run_config_show(&ctx)?,
            ConfigCommands::SetServer { url } => run_config_set_server(&ctx, &url)?,
            ConfigCommands::SetUsername { name } => run_config_set_username(&ctx, &name)?,
        },
    }

    Ok(())
}
