//! Shared item store used by hosts and the sync orchestrator.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::db::{
    BatchOutcome, Database, ItemRepository, LibSqlItemRepository, LibSqlMetaRepository,
    MetaRepository, StoreWrite,
};
use crate::models::{Item, ItemId, SyncState};
use crate::sync::LocalStore;
use crate::Result;

/// Thread-safe handle over the local item database.
///
/// Every call takes the connection lock for its whole duration, so a batch
/// applied through [`LocalStore::apply`] is never observed half-written.
#[derive(Clone)]
pub struct ItemStore {
    db: Arc<Mutex<Database>>,
    db_path: Option<PathBuf>,
}

impl ItemStore {
    /// Open a store at the given filesystem path.
    pub async fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: Some(db_path),
        })
    }

    /// Open an in-memory store (primarily for tests).
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            db_path: None,
        })
    }

    /// Path of the backing database file, if any.
    pub fn db_path(&self) -> Option<&std::path::Path> {
        self.db_path.as_deref()
    }

    /// Add a new item.
    pub async fn create_item(&self, name: &str) -> Result<Item> {
        let db = self.db.lock().await;
        LibSqlItemRepository::new(db.connection()).create(name).await
    }

    /// Fetch an item by id, tombstones included.
    pub async fn get_item(&self, id: &ItemId) -> Result<Option<Item>> {
        let db = self.db.lock().await;
        LibSqlItemRepository::new(db.connection()).get(id).await
    }

    /// List items newest-first.
    pub async fn list_items(&self, include_inactive: bool) -> Result<Vec<Item>> {
        let db = self.db.lock().await;
        LibSqlItemRepository::new(db.connection())
            .list(include_inactive)
            .await
    }

    /// List active item ids that start with the given prefix.
    pub async fn list_item_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        let db = self.db.lock().await;
        LibSqlItemRepository::new(db.connection())
            .list_ids_by_prefix(prefix, limit)
            .await
    }

    /// Rename an item.
    pub async fn rename_item(&self, id: &ItemId, name: &str) -> Result<Item> {
        let db = self.db.lock().await;
        LibSqlItemRepository::new(db.connection())
            .rename(id, name)
            .await
    }

    /// Mark or unmark an item as bought.
    pub async fn set_item_bought(&self, id: &ItemId, bought: bool) -> Result<Item> {
        let db = self.db.lock().await;
        LibSqlItemRepository::new(db.connection())
            .set_bought(id, bought)
            .await
    }

    /// Tombstone an item; the next sync removes it.
    pub async fn remove_item(&self, id: &ItemId) -> Result<Item> {
        let db = self.db.lock().await;
        LibSqlItemRepository::new(db.connection()).remove(id).await
    }

    /// Row counts per replication state.
    pub async fn state_counts(&self) -> Result<Vec<(SyncState, usize)>> {
        let db = self.db.lock().await;
        LibSqlItemRepository::new(db.connection())
            .count_by_state()
            .await
    }

    /// Load the persisted pull watermark.
    pub async fn last_sync(&self) -> Result<Option<DateTime<Utc>>> {
        let db = self.db.lock().await;
        LibSqlMetaRepository::new(db.connection()).last_sync().await
    }

    /// Persist the pull watermark reported by the orchestrator.
    pub async fn save_last_sync(&self, last_sync: &DateTime<Utc>) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlMetaRepository::new(db.connection())
            .set_last_sync(last_sync)
            .await
    }

    /// Load the endpoint remembered from the last sync.
    pub async fn endpoint(&self) -> Result<Option<String>> {
        let db = self.db.lock().await;
        LibSqlMetaRepository::new(db.connection()).endpoint().await
    }

    /// Remember the endpoint for later syncs.
    pub async fn save_endpoint(&self, endpoint: &str) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlMetaRepository::new(db.connection())
            .set_endpoint(endpoint)
            .await
    }
}

#[async_trait]
impl LocalStore for ItemStore {
    async fn list_dirty(&self) -> Result<Vec<Item>> {
        let db = self.db.lock().await;
        LibSqlItemRepository::new(db.connection()).list_dirty().await
    }

    async fn list_from_remote(&self) -> Result<Vec<Item>> {
        let db = self.db.lock().await;
        LibSqlItemRepository::new(db.connection())
            .list_from_remote()
            .await
    }

    async fn get(&self, id: &ItemId) -> Result<Option<Item>> {
        self.get_item(id).await
    }

    async fn insert(&self, item: &Item) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlItemRepository::new(db.connection()).insert(item).await
    }

    async fn mark_synced(&self, id: &ItemId, seen_updated_at: &DateTime<Utc>) -> Result<bool> {
        let db = self.db.lock().await;
        LibSqlItemRepository::new(db.connection())
            .mark_synced(id, seen_updated_at)
            .await
    }

    async fn delete(&self, id: &ItemId) -> Result<bool> {
        let db = self.db.lock().await;
        LibSqlItemRepository::new(db.connection()).delete(id).await
    }

    async fn apply(&self, writes: Vec<StoreWrite>) -> Result<BatchOutcome> {
        let db = self.db.lock().await;
        LibSqlItemRepository::new(db.connection())
            .apply(&writes)
            .await
    }
}
