use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] basket_core::Error),
    #[error(transparent)]
    Remote(#[from] basket_core::remote::RemoteError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No item name provided")]
    EmptyName,
    #[error("Item ID cannot be empty")]
    EmptyItemId,
    #[error("Item not found for id/prefix: {0}")]
    ItemNotFound(String),
    #[error("{0}")]
    AmbiguousItemId(String),
    #[error("Item {0} does not exist on the remote")]
    RemoteItemNotFound(String),
    #[error("No sync endpoint configured. Pass --endpoint or set BASKET_ENDPOINT.")]
    EndpointNotConfigured,
    #[error("Sync failed: {0}")]
    SyncFailed(String),
}
