use std::path::Path;

use basket_core::config::SyncSettings;
use basket_core::remote::{HttpRemoteGateway, RemoteGateway};
use basket_core::ItemId;

use crate::commands::common::{normalize_item_identifier, open_store, resolve_endpoint, resolve_item};
use crate::error::CliError;

pub async fn run_remote_get(
    id: &str,
    endpoint: Option<String>,
    db_path: &Path,
) -> Result<(), CliError> {
    let normalized_id = normalize_item_identifier(id)?;
    let store = open_store(db_path).await?;
    let item_id = match normalized_id.parse::<ItemId>() {
        Ok(item_id) => item_id,
        Err(_) => resolve_item(&normalized_id, &store).await?.id,
    };
    let endpoint = resolve_endpoint(endpoint, &store).await?;

    let settings = SyncSettings::from_env();
    let gateway = HttpRemoteGateway::with_timeout(endpoint, settings.request_timeout)?;
    let item = gateway
        .fetch(&item_id)
        .await?
        .ok_or_else(|| CliError::RemoteItemNotFound(item_id.to_string()))?;

    println!("{}", serde_json::to_string_pretty(&item)?);
    Ok(())
}
