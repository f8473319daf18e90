//! Basket CLI - keep a shopping list offline and sync it when the network allows
//!
//! Every edit lands in the local replica first; `sync` and `watch` reconcile
//! it with the remote service.

mod cli;
mod commands;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands, RemoteCommands};
use crate::commands::add::run_add;
use crate::commands::bought::run_bought;
use crate::commands::common::resolve_db_path;
use crate::commands::delete::run_delete;
use crate::commands::list::run_list;
use crate::commands::remote::run_remote_get;
use crate::commands::rename::run_rename;
use crate::commands::status::run_status;
use crate::commands::sync::{run_sync, run_watch};
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

    let filter = tracing_subscriber::EnvFilter::from_default_env();
    let filter = match "basket=info".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Add { name } => run_add(&name, &db_path).await?,
        Commands::List { all, json } => run_list(all, json, &db_path).await?,
        Commands::Rename { id, name } => run_rename(&id, &name, &db_path).await?,
        Commands::Bought { id, undo } => run_bought(&id, !undo, &db_path).await?,
        Commands::Delete { id } => run_delete(&id, &db_path).await?,
        Commands::Status { json } => run_status(json, &db_path).await?,
        Commands::Sync { endpoint } => run_sync(endpoint, &db_path).await?,
        Commands::Watch { endpoint } => run_watch(endpoint, &db_path).await?,
        Commands::Remote {
            command: RemoteCommands::Get { id, endpoint },
        } => run_remote_get(&id, endpoint, &db_path).await?,
    }

    Ok(())
}
