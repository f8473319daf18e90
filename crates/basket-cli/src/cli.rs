use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "basket")]
#[command(about = "Keep a shopping list offline and sync it when the network allows")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add an item to the list
    #[command(alias = "new")]
    Add {
        /// Item name
        name: Vec<String>,
    },
    /// List items, newest first
    #[command(alias = "ls")]
    List {
        /// Include items deleted locally but not yet synced
        #[arg(long)]
        all: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rename an item
    Rename {
        /// Item ID or unique ID prefix
        id: String,
        /// New name
        name: Vec<String>,
    },
    /// Mark an item as bought
    Bought {
        /// Item ID or unique ID prefix
        id: String,
        /// Mark the item as not bought again
        #[arg(long)]
        undo: bool,
    },
    /// Delete an item
    #[command(alias = "rm")]
    Delete {
        /// Item ID or unique ID prefix
        id: String,
    },
    /// Show replication state of the local list
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a single sync cycle against the remote service
    Sync {
        /// Remote base URL (defaults to BASKET_ENDPOINT or the last one used)
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,
    },
    /// Sync continuously; reads JSON control messages and `online`/`offline` from stdin
    Watch {
        /// Remote base URL (defaults to BASKET_ENDPOINT or the last one used)
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,
    },
    /// Query the remote service directly
    Remote {
        #[command(subcommand)]
        command: RemoteCommands,
    },
}

#[derive(Subcommand)]
pub enum RemoteCommands {
    /// Fetch one item from the remote service
    Get {
        /// Item ID or unique prefix of a local item
        id: String,
        /// Remote base URL (defaults to BASKET_ENDPOINT or the last one used)
        #[arg(long, value_name = "URL")]
        endpoint: Option<String>,
    },
}
