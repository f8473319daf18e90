use std::env;
use std::path::{Path, PathBuf};

use basket_core::services::ItemStore;
use basket_core::sync::CycleReport;
use basket_core::util::{format_timestamp, normalize_text_option};
use basket_core::{Item, ItemId, SyncState};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct ItemListItem {
    pub id: String,
    pub name: String,
    pub bought: bool,
    pub bought_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub state: SyncState,
    pub relative_time: String,
}

pub fn item_to_list_item(item: &Item) -> ItemListItem {
    ItemListItem {
        id: item.id.to_string(),
        name: item.name.clone(),
        bought: item.is_bought(),
        bought_at: item.bought_at.as_ref().map(format_timestamp),
        created_at: format_timestamp(&item.created_at),
        updated_at: format_timestamp(&item.updated_at),
        state: item.state,
        relative_time: format_relative_time(&item.updated_at, &Utc::now()),
    }
}

pub fn format_item_lines(items: &[Item]) -> Vec<String> {
    let now = Utc::now();
    items
        .iter()
        .map(|item| {
            let id = item.id.to_string();
            let short_id = id.chars().take(13).collect::<String>();
            let check = if item.is_bought() { "[x]" } else { "[ ]" };
            let relative_time = format_relative_time(&item.updated_at, &now);

            if item.state == SyncState::Synced {
                format!("{short_id}  {check} {}  ({relative_time})", item.name)
            } else {
                format!(
                    "{short_id}  {check} {}  ({relative_time}, {})",
                    item.name,
                    item.state.label()
                )
            }
        })
        .collect()
}

pub fn format_relative_time(then: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    let seconds = (*now - *then).num_seconds().max(0);

    if seconds < 60 {
        "just now".to_string()
    } else if seconds < 60 * 60 {
        format!("{}m ago", seconds / 60)
    } else if seconds < 24 * 60 * 60 {
        format!("{}h ago", seconds / (60 * 60))
    } else {
        format!("{}d ago", seconds / (24 * 60 * 60))
    }
}

/// One-line summary of a sync cycle for terminal output.
pub fn format_cycle_report(report: &CycleReport) -> String {
    if report.offline {
        return "Offline, sync skipped".to_string();
    }
    if let Some(error) = &report.error {
        return format!("Sync failed: {error}");
    }

    let push = &report.push;
    let pull = &report.pull;
    let mut line = format!(
        "Pushed {} (created {}, updated {}, deleted {}), pulled {} (new {}, updated {}), removed {}",
        push.created + push.replaced + push.deleted,
        push.created,
        push.replaced,
        push.deleted,
        pull.inserted + pull.updated,
        pull.inserted,
        pull.updated,
        report.reconcile.removed,
    );
    if push.rejected + push.failed > 0 {
        line.push_str(&format!(
            "; {} left pending ({} rejected, {} failed)",
            push.rejected + push.failed,
            push.rejected,
            push.failed
        ));
    }
    if push.superseded > 0 {
        line.push_str(&format!(
            "; {} changed while syncing, will resend",
            push.superseded
        ));
    }
    for (phase, error) in [
        ("push", &push.error),
        ("pull", &pull.error),
        ("reconcile", &report.reconcile.error),
    ] {
        if let Some(error) = error {
            line.push_str(&format!("; {phase} failed: {error}"));
        }
    }
    line
}

pub fn resolve_item_name(parts: &[String]) -> Result<String, CliError> {
    normalize_text_option(Some(parts.join(" "))).ok_or(CliError::EmptyName)
}

pub fn normalize_item_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        return Err(CliError::EmptyItemId);
    }
    Ok(trimmed.to_string())
}

pub async fn resolve_item(item_query: &str, store: &ItemStore) -> Result<Item, CliError> {
    if let Ok(item_id) = item_query.parse::<ItemId>() {
        if let Some(item) = store.get_item(&item_id).await? {
            if item.state.is_active() {
                return Ok(item);
            }
        }
    }

    let matching_ids = store.list_item_ids_by_prefix(item_query, 3).await?;

    match matching_ids.len() {
        0 => Err(CliError::ItemNotFound(item_query.to_string())),
        1 => {
            let resolved_id = matching_ids[0]
                .parse::<ItemId>()
                .map_err(|_| CliError::ItemNotFound(item_query.to_string()))?;
            store
                .get_item(&resolved_id)
                .await?
                .ok_or_else(|| CliError::ItemNotFound(item_query.to_string()))
        }
        _ => {
            let options = matching_ids
                .iter()
                .map(|id| id.chars().take(13).collect::<String>())
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousItemId(format!(
                "ID prefix '{item_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("BASKET_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("basket")
        .join("basket.db")
}

/// Pick the endpoint: flag, then `BASKET_ENDPOINT`, then the one remembered by the store.
pub async fn resolve_endpoint(
    cli_endpoint: Option<String>,
    store: &ItemStore,
) -> Result<String, CliError> {
    if let Some(endpoint) = normalize_text_option(cli_endpoint)
        .or_else(|| normalize_text_option(env::var("BASKET_ENDPOINT").ok()))
    {
        return Ok(endpoint);
    }

    store
        .endpoint()
        .await?
        .ok_or(CliError::EndpointNotConfigured)
}

pub async fn open_store(path: &Path) -> Result<ItemStore, CliError> {
    Ok(ItemStore::open_path(path).await?)
}
