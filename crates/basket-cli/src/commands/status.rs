use std::path::Path;

use basket_core::util::format_timestamp;
use basket_core::SyncState;
use serde::Serialize;

use crate::commands::common::open_store;
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub db_path: String,
    pub endpoint: Option<String>,
    pub last_sync: Option<String>,
    pub counts: Vec<StateCount>,
    pub unsynced: usize,
}

#[derive(Debug, Serialize)]
pub struct StateCount {
    pub state: SyncState,
    pub count: usize,
}

pub async fn collect_status(db_path: &Path) -> Result<StatusReport, CliError> {
    let store = open_store(db_path).await?;
    let counts = store.state_counts().await?;
    let unsynced = counts
        .iter()
        .filter(|(state, _)| state.is_dirty())
        .map(|(_, count)| count)
        .sum();

    Ok(StatusReport {
        db_path: db_path.display().to_string(),
        endpoint: store.endpoint().await?,
        last_sync: store.last_sync().await?.as_ref().map(format_timestamp),
        counts: counts
            .into_iter()
            .map(|(state, count)| StateCount { state, count })
            .collect(),
        unsynced,
    })
}

pub async fn run_status(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let status = collect_status(db_path).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("Database:  {}", status.db_path);
    println!(
        "Endpoint:  {}",
        status.endpoint.as_deref().unwrap_or("(not configured)")
    );
    println!(
        "Last sync: {}",
        status.last_sync.as_deref().unwrap_or("never")
    );
    for entry in &status.counts {
        println!("  {:<10} {}", entry.state.label(), entry.count);
    }
    println!("Unsynced changes: {}", status.unsynced);
    Ok(())
}
