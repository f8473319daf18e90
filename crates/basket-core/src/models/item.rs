//! Item model

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{RemoteItem, SyncState};
use crate::error::{Error, Result};
use crate::util::now_millis;

/// A unique identifier for an item, using UUID v7 (time-sortable)
///
/// Generated on the device that creates the item and never reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(Uuid);

impl ItemId {
    /// Create a new unique item ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s.trim())?))
    }
}

/// A shopping list item as held in the local replica
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier
    pub id: ItemId,
    /// Display name, never empty
    pub name: String,
    /// When the item was marked bought, if it was
    #[serde(with = "super::timestamp::option")]
    pub bought_at: Option<DateTime<Utc>>,
    /// Creation timestamp
    #[serde(with = "super::timestamp")]
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp, the only clock used for conflicts
    #[serde(with = "super::timestamp")]
    pub updated_at: DateTime<Utc>,
    /// Replication state
    pub state: SyncState,
}

impl Item {
    /// Create a new local item that has never been synced.
    pub fn new(name: &str) -> Result<Self> {
        let name = normalize_name(name)?;
        let now = now_millis();
        Ok(Self {
            id: ItemId::new(),
            name,
            bought_at: None,
            created_at: now,
            updated_at: now,
            state: SyncState::Pending,
        })
    }

    /// Build a resolved local copy of a remote item.
    #[must_use]
    pub fn from_remote(remote: RemoteItem) -> Self {
        Self {
            id: remote.id,
            name: remote.name,
            bought_at: remote.bought_at,
            created_at: remote.created_at,
            updated_at: remote.updated_at,
            state: SyncState::Synced,
        }
    }

    /// The wire representation, without replication flags.
    #[must_use]
    pub fn to_remote(&self) -> RemoteItem {
        RemoteItem {
            id: self.id,
            name: self.name.clone(),
            bought_at: self.bought_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Whether the item has unacknowledged local changes.
    pub const fn is_dirty(&self) -> bool {
        self.state.is_dirty()
    }

    /// Whether the item is bought.
    pub const fn is_bought(&self) -> bool {
        self.bought_at.is_some()
    }

    /// Whether this copy already equals the given remote version and is resolved.
    pub fn matches_remote(&self, remote: &RemoteItem) -> bool {
        self.state == SyncState::Synced
            && self.name == remote.name
            && self.bought_at == remote.bought_at
            && self.created_at == remote.created_at
            && self.updated_at == remote.updated_at
    }

    /// Rename the item as a host edit.
    pub fn rename(&mut self, name: &str) -> Result<()> {
        self.name = normalize_name(name)?;
        self.touch();
        Ok(())
    }

    /// Mark or unmark the item as bought as a host edit.
    pub fn set_bought(&mut self, bought: bool) {
        self.bought_at = if bought { Some(now_millis()) } else { None };
        self.touch();
    }

    /// Tombstone the item as a host delete.
    pub fn remove(&mut self) {
        self.state = self.state.removed();
        self.updated_at = next_update(self.updated_at);
    }

    fn touch(&mut self) {
        self.state = self.state.edited();
        self.updated_at = next_update(self.updated_at);
    }
}

/// Keep `updated_at` strictly increasing even if the wall clock stalls or steps back.
fn next_update(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = now_millis();
    if now > previous {
        now
    } else {
        previous + Duration::milliseconds(1)
    }
}

fn normalize_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidInput("item name cannot be empty".into()));
    }
    Ok(name.to_string())
}
