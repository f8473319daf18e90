//! Last-write-wins conflict resolution at item granularity.

use crate::models::{Item, RemoteItem};

/// Outcome of comparing a local item with the remote's version of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The local edit is strictly newer; leave it for the push phase
    KeepLocal,
    /// The remote version wins and overwrites the local copy
    TakeRemote,
}

/// Decide which version of an item survives.
///
/// Only a dirty local copy with a strictly later `updated_at` is kept.
/// Equal timestamps go to the remote.
pub fn resolve(local: &Item, remote: &RemoteItem) -> Resolution {
    if local.is_dirty() && local.updated_at > remote.updated_at {
        Resolution::KeepLocal
    } else {
        Resolution::TakeRemote
    }
}
