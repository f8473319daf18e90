//! Item repository implementation

#![allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation, clippy::cast_sign_loss)] // SQLite uses i64 for LIMIT/COUNT

use chrono::{DateTime, Utc};
use libsql::Connection;

use super::rows::{flag, optional_timestamp, parse_item, text, timestamp, ITEM_COLUMNS};
use crate::error::{Error, Result};
use crate::models::{Item, ItemId, SyncState};

/// A single write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWrite {
    /// Insert a new row; skipped if the id already exists
    Insert(Item),
    /// Replace a row, but only if it still has the version that was read
    Overwrite {
        item: Item,
        seen_updated_at: DateTime<Utc>,
        seen_state: SyncState,
    },
    /// Remove a row
    Delete(ItemId),
}

/// How many writes of a batch changed a row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: usize,
    pub skipped: usize,
}

/// Trait for item storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ItemRepository {
    /// Create a new local item
    async fn create(&self, name: &str) -> Result<Item>;

    /// Get an item by ID, including tombstones
    async fn get(&self, id: &ItemId) -> Result<Option<Item>>;

    /// List items newest first, optionally including tombstones
    async fn list(&self, include_inactive: bool) -> Result<Vec<Item>>;

    /// List active item ids starting with the given prefix
    async fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>>;

    /// Rename an active item
    async fn rename(&self, id: &ItemId, name: &str) -> Result<Item>;

    /// Mark or unmark an active item as bought
    async fn set_bought(&self, id: &ItemId, bought: bool) -> Result<Item>;

    /// Tombstone an active item
    async fn remove(&self, id: &ItemId) -> Result<Item>;

    /// Count rows per replication state
    async fn count_by_state(&self) -> Result<Vec<(SyncState, usize)>>;

    /// All items with unacknowledged changes
    async fn list_dirty(&self) -> Result<Vec<Item>>;

    /// All items the remote has confirmed at least once
    async fn list_from_remote(&self) -> Result<Vec<Item>>;

    /// Insert an item as-is
    async fn insert(&self, item: &Item) -> Result<()>;

    /// Record that the remote accepted the version stamped `seen_updated_at`.
    ///
    /// The row always becomes known to the remote; `dirty` is cleared only
    /// if it was not edited since. Returns whether `dirty` was cleared.
    async fn mark_synced(&self, id: &ItemId, seen_updated_at: &DateTime<Utc>) -> Result<bool>;

    /// Delete a row outright
    async fn delete(&self, id: &ItemId) -> Result<bool>;

    /// Apply writes atomically
    async fn apply(&self, writes: &[StoreWrite]) -> Result<BatchOutcome>;
}

/// libSQL implementation of `ItemRepository`
pub struct LibSqlItemRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlItemRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    async fn query_items(&self, sql: &str, params: Vec<libsql::Value>) -> Result<Vec<Item>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut items = Vec::new();
        while let Some(row) = rows.next().await? {
            items.push(parse_item(&row)?);
        }
        Ok(items)
    }

    async fn get_active(&self, id: &ItemId) -> Result<Item> {
        match self.get(id).await? {
            Some(item) if item.state.is_active() => Ok(item),
            _ => Err(Error::NotFound(id.to_string())),
        }
    }

    /// Persist a host edit: every column, unconditionally.
    async fn save(&self, item: &Item) -> Result<()> {
        let (from_remote, dirty, active) = item.state.flags();
        self.conn
            .execute(
                "UPDATE items
                 SET name = ?, bought_at = ?, updated_at = ?, from_remote = ?, dirty = ?, active = ?
                 WHERE id = ?",
                vec![
                    text(item.name.as_str()),
                    optional_timestamp(item.bought_at.as_ref()),
                    timestamp(&item.updated_at),
                    flag(from_remote),
                    flag(dirty),
                    flag(active),
                    text(item.id.as_str()),
                ],
            )
            .await?;
        Ok(())
    }

    async fn write(&self, write: &StoreWrite) -> Result<bool> {
        let changed = match write {
            StoreWrite::Insert(item) => {
                let (from_remote, dirty, active) = item.state.flags();
                self.conn
                    .execute(
                        "INSERT OR IGNORE INTO items
                         (id, name, bought_at, created_at, updated_at, from_remote, dirty, active)
                         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                        vec![
                            text(item.id.as_str()),
                            text(item.name.as_str()),
                            optional_timestamp(item.bought_at.as_ref()),
                            timestamp(&item.created_at),
                            timestamp(&item.updated_at),
                            flag(from_remote),
                            flag(dirty),
                            flag(active),
                        ],
                    )
                    .await?
            }
            StoreWrite::Overwrite {
                item,
                seen_updated_at,
                seen_state,
            } => {
                let (from_remote, dirty, active) = item.state.flags();
                let (seen_remote, seen_dirty, seen_active) = seen_state.flags();
                self.conn
                    .execute(
                        "UPDATE items
                         SET name = ?, bought_at = ?, created_at = ?, updated_at = ?,
                             from_remote = ?, dirty = ?, active = ?
                         WHERE id = ? AND updated_at = ?
                           AND from_remote = ? AND dirty = ? AND active = ?",
                        vec![
                            text(item.name.as_str()),
                            optional_timestamp(item.bought_at.as_ref()),
                            timestamp(&item.created_at),
                            timestamp(&item.updated_at),
                            flag(from_remote),
                            flag(dirty),
                            flag(active),
                            text(item.id.as_str()),
                            timestamp(seen_updated_at),
                            flag(seen_remote),
                            flag(seen_dirty),
                            flag(seen_active),
                        ],
                    )
                    .await?
            }
            StoreWrite::Delete(id) => {
                self.conn
                    .execute("DELETE FROM items WHERE id = ?", vec![text(id.as_str())])
                    .await?
            }
        };
        Ok(changed > 0)
    }
}

impl ItemRepository for LibSqlItemRepository<'_> {
    async fn create(&self, name: &str) -> Result<Item> {
        let item = Item::new(name)?;
        self.insert(&item).await?;
        Ok(item)
    }

    async fn get(&self, id: &ItemId) -> Result<Option<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?");
        let mut items = self.query_items(&sql, vec![text(id.as_str())]).await?;
        Ok(items.pop())
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<Item>> {
        let filter = if include_inactive { "" } else { "WHERE active = 1" };
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items {filter} ORDER BY created_at DESC, id DESC");
        self.query_items(&sql, Vec::new()).await
    }

    async fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        let prefix = prefix.trim();
        if prefix.is_empty() {
            return Ok(Vec::new());
        }

        let mut rows = self
            .conn
            .query(
                "SELECT id FROM items WHERE active = 1 AND id LIKE ? ORDER BY id LIMIT ?",
                vec![
                    text(format!("{}%", prefix.replace(['%', '_'], ""))),
                    libsql::Value::Integer(limit as i64),
                ],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }
        Ok(ids)
    }

    async fn rename(&self, id: &ItemId, name: &str) -> Result<Item> {
        let mut item = self.get_active(id).await?;
        item.rename(name)?;
        self.save(&item).await?;
        Ok(item)
    }

    async fn set_bought(&self, id: &ItemId, bought: bool) -> Result<Item> {
        let mut item = self.get_active(id).await?;
        item.set_bought(bought);
        self.save(&item).await?;
        Ok(item)
    }

    async fn remove(&self, id: &ItemId) -> Result<Item> {
        let mut item = self.get_active(id).await?;
        item.remove();
        self.save(&item).await?;
        Ok(item)
    }

    async fn count_by_state(&self) -> Result<Vec<(SyncState, usize)>> {
        let mut rows = self
            .conn
            .query(
                "SELECT from_remote, dirty, active, COUNT(*) FROM items
                 GROUP BY from_remote, dirty, active",
                (),
            )
            .await?;

        let mut counts = Vec::new();
        while let Some(row) = rows.next().await? {
            let from_remote: i64 = row.get(0)?;
            let dirty: i64 = row.get(1)?;
            let active: i64 = row.get(2)?;
            let count: i64 = row.get(3)?;
            let state = SyncState::from_flags(from_remote != 0, dirty != 0, active != 0)
                .ok_or_else(|| Error::Database("invalid sync state in items table".into()))?;
            counts.push((state, count as usize));
        }
        Ok(counts)
    }

    async fn list_dirty(&self) -> Result<Vec<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE dirty = 1");
        self.query_items(&sql, Vec::new()).await
    }

    async fn list_from_remote(&self) -> Result<Vec<Item>> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM items WHERE from_remote = 1");
        self.query_items(&sql, Vec::new()).await
    }

    async fn insert(&self, item: &Item) -> Result<()> {
        if self.write(&StoreWrite::Insert(item.clone())).await? {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!("item {} already exists", item.id)))
        }
    }

    async fn mark_synced(&self, id: &ItemId, seen_updated_at: &DateTime<Utc>) -> Result<bool> {
        let changed = self
            .conn
            .execute(
                "UPDATE items SET from_remote = 1, dirty = 0
                 WHERE id = ? AND updated_at = ? AND active = 1",
                vec![text(id.as_str()), timestamp(seen_updated_at)],
            )
            .await?;
        if changed > 0 {
            return Ok(true);
        }

        // Edited while in flight: the remote holds the record now, but this version is unsent.
        if let Some(mut item) = self.get(id).await? {
            item.state = item.state.confirmed();
            self.save(&item).await?;
        }
        Ok(false)
    }

    async fn delete(&self, id: &ItemId) -> Result<bool> {
        self.write(&StoreWrite::Delete(*id)).await
    }

    async fn apply(&self, writes: &[StoreWrite]) -> Result<BatchOutcome> {
        let mut outcome = BatchOutcome::default();
        if writes.is_empty() {
            return Ok(outcome);
        }

        self.conn.execute("BEGIN TRANSACTION", ()).await?;

        for write in writes {
            match self.write(write).await {
                Ok(true) => outcome.applied += 1,
                Ok(false) => outcome.skipped += 1,
                Err(e) => {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e);
                }
            }
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        Ok(outcome)
    }
}
