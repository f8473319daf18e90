//! Local store surface consumed by the sync engine.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::{BatchOutcome, StoreWrite};
use crate::models::{Item, ItemId};
use crate::Result;

/// Query and mutate surface the sync engine needs from the local replica.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Items with unacknowledged changes.
    async fn list_dirty(&self) -> Result<Vec<Item>>;

    /// Items the remote has confirmed at least once.
    async fn list_from_remote(&self) -> Result<Vec<Item>>;

    async fn get(&self, id: &ItemId) -> Result<Option<Item>>;

    async fn insert(&self, item: &Item) -> Result<()>;

    /// Mark the item known to the remote, and clear `dirty` unless it
    /// changed after `seen_updated_at`. Returns whether `dirty` was cleared.
    async fn mark_synced(&self, id: &ItemId, seen_updated_at: &DateTime<Utc>) -> Result<bool>;

    async fn delete(&self, id: &ItemId) -> Result<bool>;

    /// Apply all writes atomically with respect to other readers.
    async fn apply(&self, writes: Vec<StoreWrite>) -> Result<BatchOutcome>;
}
