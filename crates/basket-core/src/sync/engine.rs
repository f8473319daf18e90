//! A single sync cycle.
//!
//! Phases run as push, then pull, then reconcile. A local creation is on the
//! remote before reconcile compares id sets.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::local::LocalStore;
use super::resolver::{resolve, Resolution};
use crate::config::SyncSettings;
use crate::db::StoreWrite;
use crate::models::{Item, RemoteItem, SyncState};
use crate::remote::{Rejection, RemoteError, RemoteGateway};
use crate::util::{format_timestamp, now_millis};

/// Counts for the push phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub created: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub discarded: usize,
    /// Accepted by the remote, but edited locally while the request was in flight
    pub superseded: usize,
    pub rejected: usize,
    pub failed: usize,
    pub error: Option<String>,
}

impl PushReport {
    /// Local rows changed by this phase.
    pub const fn mutations(&self) -> usize {
        self.created + self.replaced + self.deleted + self.discarded + self.superseded
    }
}

/// Counts for the pull phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PullReport {
    pub fetched: usize,
    pub inserted: usize,
    pub updated: usize,
    pub kept_local: usize,
    pub unchanged: usize,
    /// Writes dropped because the host edited the row mid-pull
    pub skipped: usize,
    pub error: Option<String>,
}

/// Counts for the reconcile phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub removed: usize,
    pub error: Option<String>,
}

/// Outcome of a whole cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    /// The cycle was skipped because the network was unavailable
    pub offline: bool,
    pub push: PushReport,
    pub pull: PullReport,
    pub reconcile: ReconcileReport,
    /// New watermark, present only when the pull phase succeeded
    #[serde(with = "crate::models::timestamp::option")]
    pub last_sync: Option<DateTime<Utc>>,
    /// Failure that prevented every phase from running
    pub error: Option<String>,
}

impl CycleReport {
    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Local rows changed by the cycle.
    pub const fn mutations(&self) -> usize {
        let pulled = (self.pull.inserted + self.pull.updated).saturating_sub(self.pull.skipped);
        self.push.mutations() + pulled + self.reconcile.removed
    }

    /// Whether any phase reported a failure.
    pub const fn has_errors(&self) -> bool {
        self.error.is_some()
            || self.push.error.is_some()
            || self.push.failed > 0
            || self.pull.error.is_some()
            || self.reconcile.error.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushOutcome {
    Created,
    Replaced,
    Deleted,
    Discarded,
    Superseded,
    Rejected,
    Failed,
    Unchanged,
}

/// Runs sync cycles against a local store.
pub struct SyncEngine<S> {
    store: S,
    settings: SyncSettings,
}

impl<S: LocalStore> SyncEngine<S> {
    pub const fn new(store: S, settings: SyncSettings) -> Self {
        Self { store, settings }
    }

    pub const fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Run push, pull, and reconcile in order.
    ///
    /// A failing phase is recorded in the report and the next phase still runs.
    pub async fn run_cycle<G>(&self, gateway: &G, watermark: Option<DateTime<Utc>>) -> CycleReport
    where
        G: RemoteGateway + ?Sized,
    {
        let push = self.push(gateway).await;
        let (pull, last_sync) = self.pull(gateway, watermark).await;
        let reconcile = self.reconcile(gateway).await;

        let report = CycleReport {
            offline: false,
            push,
            pull,
            reconcile,
            last_sync,
            error: None,
        };
        info!(
            "Sync cycle finished: pushed {} upserts and {} deletions (rejected {}, failed {}), pulled {} (inserted {}, updated {}, kept local {}), removed {}",
            report.push.created + report.push.replaced,
            report.push.deleted + report.push.discarded,
            report.push.rejected,
            report.push.failed,
            report.pull.fetched,
            report.pull.inserted,
            report.pull.updated,
            report.pull.kept_local,
            report.reconcile.removed,
        );
        report
    }

    /// Phase 1: send every dirty item to the remote.
    pub async fn push<G>(&self, gateway: &G) -> PushReport
    where
        G: RemoteGateway + ?Sized,
    {
        let mut report = PushReport::default();
        let dirty = match self.store.list_dirty().await {
            Ok(items) => items,
            Err(error) => {
                warn!("Push phase aborted, could not list dirty items: {error}");
                report.error = Some(error.to_string());
                return report;
            }
        };
        debug!("Pushing {} dirty items", dirty.len());

        let pushes: Vec<_> = dirty
            .into_iter()
            .map(|item| self.push_item(gateway, item))
            .collect();
        let outcomes: Vec<PushOutcome> = stream::iter(pushes)
            .buffer_unordered(self.settings.push_concurrency.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                PushOutcome::Created => report.created += 1,
                PushOutcome::Replaced => report.replaced += 1,
                PushOutcome::Deleted => report.deleted += 1,
                PushOutcome::Discarded => report.discarded += 1,
                PushOutcome::Superseded => report.superseded += 1,
                PushOutcome::Rejected => report.rejected += 1,
                PushOutcome::Failed => report.failed += 1,
                PushOutcome::Unchanged => {}
            }
        }

        if report.rejected + report.failed > 0 {
            warn!(
                "Push phase left {} items dirty ({} rejected, {} failed)",
                report.rejected + report.failed,
                report.rejected,
                report.failed
            );
        }
        report
    }

    async fn push_item<G>(&self, gateway: &G, item: Item) -> PushOutcome
    where
        G: RemoteGateway + ?Sized,
    {
        match item.state {
            SyncState::Pending => match gateway.create(&item.to_remote()).await {
                Ok(_) => self.acknowledge(&item, PushOutcome::Created).await,
                Err(error) => Self::push_failed(&item, "create", &error),
            },
            SyncState::Modified => match gateway.replace(&item.id, &item.to_remote()).await {
                Ok(_) => self.acknowledge(&item, PushOutcome::Replaced).await,
                Err(error) => Self::push_failed(&item, "replace", &error),
            },
            SyncState::Deleted => match gateway.delete(&item.id).await {
                Ok(()) => self.forget(&item, PushOutcome::Deleted).await,
                Err(error) => Self::push_failed(&item, "delete", &error),
            },
            SyncState::Discarded => self.forget(&item, PushOutcome::Discarded).await,
            SyncState::Synced => {
                debug!("Item {} is already synced, nothing to push", item.id);
                PushOutcome::Unchanged
            }
        }
    }

    async fn acknowledge(&self, item: &Item, outcome: PushOutcome) -> PushOutcome {
        match self.store.mark_synced(&item.id, &item.updated_at).await {
            Ok(true) => {
                debug!("Item {} acknowledged ({outcome:?})", item.id);
                outcome
            }
            Ok(false) => {
                debug!("Item {} changed during push, keeping it dirty", item.id);
                PushOutcome::Superseded
            }
            Err(error) => {
                warn!("Item {} pushed but not marked synced: {error}", item.id);
                PushOutcome::Failed
            }
        }
    }

    async fn forget(&self, item: &Item, outcome: PushOutcome) -> PushOutcome {
        match self.store.delete(&item.id).await {
            Ok(_) => {
                debug!("Item {} removed locally ({outcome:?})", item.id);
                outcome
            }
            Err(error) => {
                warn!("Item {} could not be removed locally: {error}", item.id);
                PushOutcome::Failed
            }
        }
    }

    fn push_failed(item: &Item, action: &str, error: &RemoteError) -> PushOutcome {
        match error.rejection() {
            Some(Rejection::Conflict) => {
                warn!("Remote holds a newer version of {}, {action} deferred", item.id);
                PushOutcome::Rejected
            }
            Some(rejection) => {
                warn!("Remote rejected {action} of {}: {rejection}", item.id);
                PushOutcome::Rejected
            }
            None if error.is_transient() => {
                warn!("Failed to {action} item {}, retrying next cycle: {error}", item.id);
                PushOutcome::Failed
            }
            None => {
                warn!("Failed to {action} item {}: {error}", item.id);
                PushOutcome::Failed
            }
        }
    }

    /// Phase 2: fetch remote changes since the watermark and apply them atomically.
    ///
    /// Returns the new watermark only when the whole phase succeeded.
    pub async fn pull<G>(
        &self,
        gateway: &G,
        watermark: Option<DateTime<Utc>>,
    ) -> (PullReport, Option<DateTime<Utc>>)
    where
        G: RemoteGateway + ?Sized,
    {
        let mut report = PullReport::default();
        let started_at = now_millis();
        let since = watermark.and_then(|watermark| self.pull_since(watermark));

        let remote_items = match gateway.list_since(since).await {
            Ok(items) => items,
            Err(error) => {
                warn!("Pull phase aborted, listing failed: {error}");
                report.error = Some(error.to_string());
                return (report, None);
            }
        };
        report.fetched = remote_items.len();
        debug!(
            "Fetched {} remote items since {}",
            remote_items.len(),
            since.map_or_else(|| "the beginning".to_string(), |since| format_timestamp(&since))
        );

        let mut writes = Vec::new();
        for remote in remote_items {
            match self.plan_pull_write(remote, &mut report).await {
                Ok(Some(write)) => writes.push(write),
                Ok(None) => {}
                Err(error) => {
                    warn!("Pull phase aborted, local lookup failed: {error}");
                    report.error = Some(error.to_string());
                    return (report, None);
                }
            }
        }

        match self.store.apply(writes).await {
            Ok(outcome) => {
                report.skipped = outcome.skipped;
                if outcome.skipped > 0 {
                    debug!("{} pulled items were edited locally mid-pull", outcome.skipped);
                }
                (report, Some(started_at))
            }
            Err(error) => {
                warn!("Pull phase aborted, batch was not applied: {error}");
                report.error = Some(error.to_string());
                (report, None)
            }
        }
    }

    async fn plan_pull_write(
        &self,
        remote: RemoteItem,
        report: &mut PullReport,
    ) -> crate::Result<Option<StoreWrite>> {
        let Some(local) = self.store.get(&remote.id).await? else {
            report.inserted += 1;
            return Ok(Some(StoreWrite::Insert(Item::from_remote(remote))));
        };

        match resolve(&local, &remote) {
            Resolution::KeepLocal => {
                debug!("Keeping newer local edit of {}", local.id);
                report.kept_local += 1;
                Ok(None)
            }
            Resolution::TakeRemote if local.matches_remote(&remote) => {
                report.unchanged += 1;
                Ok(None)
            }
            Resolution::TakeRemote => {
                report.updated += 1;
                Ok(Some(StoreWrite::Overwrite {
                    item: Item::from_remote(remote),
                    seen_updated_at: local.updated_at,
                    seen_state: local.state,
                }))
            }
        }
    }

    /// Phase 3: drop remote-known items that no longer exist on the remote.
    pub async fn reconcile<G>(&self, gateway: &G) -> ReconcileReport
    where
        G: RemoteGateway + ?Sized,
    {
        let mut report = ReconcileReport::default();

        let live: HashSet<_> = match gateway.list_ids().await {
            Ok(ids) => ids.into_iter().collect(),
            Err(error) => {
                warn!("Reconcile phase aborted, id listing failed: {error}");
                report.error = Some(error.to_string());
                return report;
            }
        };

        let known = match self.store.list_from_remote().await {
            Ok(items) => items,
            Err(error) => {
                warn!("Reconcile phase aborted, local listing failed: {error}");
                report.error = Some(error.to_string());
                return report;
            }
        };

        let writes: Vec<StoreWrite> = known
            .into_iter()
            .filter(|item| item.state.from_remote() && !live.contains(&item.id))
            .map(|item| {
                debug!("Item {} no longer exists remotely", item.id);
                StoreWrite::Delete(item.id)
            })
            .collect();

        match self.store.apply(writes).await {
            Ok(outcome) => report.removed = outcome.applied,
            Err(error) => {
                warn!("Reconcile phase aborted, deletions were not applied: {error}");
                report.error = Some(error.to_string());
            }
        }
        report
    }

    /// The watermark moved back by the pull skew, or `None` (a full listing)
    /// when the skew reaches past the earliest representable time.
    fn pull_since(&self, watermark: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let since = chrono::Duration::from_std(self.settings.pull_skew)
            .ok()
            .and_then(|skew| watermark.checked_sub_signed(skew));
        if since.is_none() {
            warn!(
                "Pull skew {:?} reaches past the earliest timestamp, listing everything",
                self.settings.pull_skew
            );
        }
        since
    }
}
