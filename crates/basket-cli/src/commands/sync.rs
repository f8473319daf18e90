use std::path::Path;

use basket_core::config::SyncSettings;
use basket_core::remote::HttpConnector;
use basket_core::services::ItemStore;
use basket_core::sync::{spawn, CycleReport, OrchestratorHandle, SharedConnectivity, SyncCommand, SyncEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info};

use crate::commands::common::{format_cycle_report, open_store, resolve_endpoint};
use crate::error::CliError;

pub async fn run_sync(endpoint: Option<String>, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let endpoint = resolve_endpoint(endpoint, &store).await?;

    let report = sync_once(&store, &endpoint, SyncSettings::from_env()).await?;
    println!("{}", format_cycle_report(&report));

    if let Some(error) = report.error {
        return Err(CliError::SyncFailed(error));
    }
    store.save_endpoint(&endpoint).await?;
    if report.has_errors() {
        return Err(CliError::SyncFailed(
            "some changes could not be synced, run `basket sync` again later".to_string(),
        ));
    }
    Ok(())
}

/// Run one cycle on a short-lived orchestrator, persisting the new watermark.
///
/// The user asked to sync right now, so the network is assumed reachable;
/// an unreachable remote shows up as per-phase errors in the report.
pub async fn sync_once(
    store: &ItemStore,
    endpoint: &str,
    settings: SyncSettings,
) -> Result<CycleReport, CliError> {
    let last_sync = store.last_sync().await?;
    let (handle, mut events) = spawn(
        store.clone(),
        HttpConnector::new(settings.request_timeout),
        SharedConnectivity::default(),
        settings,
    );
    handle.once(endpoint, last_sync).await?;

    let mut report = None;
    while let Some(event) = events.recv().await {
        match event {
            SyncEvent::LastSync { last_sync } => store.save_last_sync(&last_sync).await?,
            SyncEvent::CycleFinished(finished) => {
                report = Some(finished);
                break;
            }
        }
    }

    handle.shutdown().await;
    report.ok_or_else(|| CliError::SyncFailed("sync stopped before finishing".to_string()))
}

pub async fn run_watch(endpoint: Option<String>, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let endpoint = resolve_endpoint(endpoint, &store).await?;
    let settings = SyncSettings::from_env();
    let connectivity = SharedConnectivity::default();

    let (handle, mut events) = spawn(
        store.clone(),
        HttpConnector::new(settings.request_timeout),
        connectivity.clone(),
        settings,
    );
    handle.start(&endpoint, store.last_sync().await?).await?;
    store.save_endpoint(&endpoint).await?;
    eprintln!(
        "Syncing with {endpoint} every {}s. Send control messages or `online`/`offline` on stdin, Ctrl-C to stop.",
        settings.interval.as_secs()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => record_event(&store, event).await?,
                None => break,
            },
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => forward_control(&handle, &store, &connectivity, &line).await?,
                None => {
                    debug!("stdin closed, control messages disabled");
                    stdin_open = false;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping sync");
                break;
            }
        }
    }

    handle.shutdown().await;
    while let Some(event) = events.recv().await {
        record_event(&store, event).await?;
    }
    Ok(())
}

/// Persist watermarks and report events.
///
/// Watermark notifications go to stdout as JSON lines, cycle summaries to stderr.
pub async fn record_event(store: &ItemStore, event: SyncEvent) -> Result<(), CliError> {
    match &event {
        SyncEvent::LastSync { last_sync } => {
            store.save_last_sync(last_sync).await?;
            println!("{}", event.to_json()?);
        }
        SyncEvent::CycleFinished(report) => eprintln!("{}", format_cycle_report(report)),
    }
    Ok(())
}

/// Parse a plain `online`/`offline` line into the connectivity it announces.
pub fn parse_connectivity(line: &str) -> Option<bool> {
    match line.trim().to_ascii_lowercase().as_str() {
        "online" => Some(true),
        "offline" => Some(false),
        _ => None,
    }
}

async fn forward_control(
    handle: &OrchestratorHandle,
    store: &ItemStore,
    connectivity: &SharedConnectivity,
    line: &str,
) -> Result<(), CliError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }
    if let Some(online) = parse_connectivity(line) {
        connectivity.set_online(online);
        return Ok(());
    }

    let Some(command) = SyncCommand::parse(line) else {
        eprintln!("Ignored unrecognized control message: {line}");
        return Ok(());
    };
    if let Some(target) = command.target() {
        store.save_endpoint(target.endpoint.trim()).await?;
    }
    handle.send(command).await?;
    Ok(())
}
