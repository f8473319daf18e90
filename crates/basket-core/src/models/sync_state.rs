//! Replication state of a local item

use serde::{Deserialize, Serialize};

/// Where an item stands relative to the remote service.
///
/// Each variant is one of the reachable `(from_remote, dirty, active)` flag
/// combinations; the other three combinations cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Created locally and never pushed: `(0, 1, 1)`
    Pending,
    /// Created and deleted locally before any push: `(0, 1, 0)`
    Discarded,
    /// Matches the remote as last seen: `(1, 0, 1)`
    Synced,
    /// Known to the remote and edited locally: `(1, 1, 1)`
    Modified,
    /// Known to the remote and deleted locally: `(1, 1, 0)`
    Deleted,
}

impl SyncState {
    /// Rebuild a state from its persisted flags.
    ///
    /// Returns `None` for combinations no transition can produce.
    pub const fn from_flags(from_remote: bool, dirty: bool, active: bool) -> Option<Self> {
        match (from_remote, dirty, active) {
            (false, true, true) => Some(Self::Pending),
            (false, true, false) => Some(Self::Discarded),
            (true, false, true) => Some(Self::Synced),
            (true, true, true) => Some(Self::Modified),
            (true, true, false) => Some(Self::Deleted),
            _ => None,
        }
    }

    /// The `(from_remote, dirty, active)` flags for persistence.
    pub const fn flags(self) -> (bool, bool, bool) {
        (self.from_remote(), self.is_dirty(), self.is_active())
    }

    /// Whether the remote has ever confirmed this item.
    pub const fn from_remote(self) -> bool {
        matches!(self, Self::Synced | Self::Modified | Self::Deleted)
    }

    /// Whether the item carries changes the remote has not acknowledged.
    pub const fn is_dirty(self) -> bool {
        !matches!(self, Self::Synced)
    }

    /// Whether the item is visible (not locally deleted).
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Discarded | Self::Deleted)
    }

    /// State after the host edits the item.
    pub const fn edited(self) -> Self {
        match self {
            Self::Synced | Self::Modified => Self::Modified,
            other => other,
        }
    }

    /// State after the host deletes the item.
    pub const fn removed(self) -> Self {
        match self {
            Self::Pending | Self::Discarded => Self::Discarded,
            Self::Synced | Self::Modified | Self::Deleted => Self::Deleted,
        }
    }

    /// State after the remote accepted a version the host has since changed.
    ///
    /// The item stays dirty but is now known remotely, so a later push
    /// replaces or deletes instead of creating.
    pub const fn confirmed(self) -> Self {
        match self {
            Self::Pending => Self::Modified,
            Self::Discarded => Self::Deleted,
            other => other,
        }
    }

    /// Stable label used in logs and CLI output.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Discarded => "discarded",
            Self::Synced => "synced",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
