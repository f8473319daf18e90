//! In-memory doubles for exercising sync without a network or database.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;

use super::local::LocalStore;
use crate::db::{BatchOutcome, StoreWrite};
use crate::models::{Item, ItemId, RemoteItem};
use crate::remote::{Connect, Rejection, RemoteError, RemoteGateway, RemoteResult};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    ListSince,
    ListIds,
    Fetch,
    Create,
    Replace,
    Delete,
}

#[derive(Default)]
struct RemoteState {
    items: BTreeMap<ItemId, RemoteItem>,
    calls: Vec<(Call, Option<ItemId>)>,
    unreachable: HashSet<Call>,
    rejections: HashMap<ItemId, Rejection>,
    watermarks: Vec<Option<DateTime<Utc>>>,
    gate: Option<Arc<Semaphore>>,
}

/// Authoritative store that refuses replacements older than what it holds.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, item: RemoteItem) {
        self.state.lock().unwrap().items.insert(item.id, item);
    }

    /// Delete directly, as another device would.
    pub fn remove(&self, id: &ItemId) {
        self.state.lock().unwrap().items.remove(id);
    }

    pub fn get(&self, id: &ItemId) -> Option<RemoteItem> {
        self.state.lock().unwrap().items.get(id).cloned()
    }

    /// Make every request of this kind fail with a transport error.
    pub fn set_unreachable(&self, call: Call, unreachable: bool) {
        let mut state = self.state.lock().unwrap();
        if unreachable {
            state.unreachable.insert(call);
        } else {
            state.unreachable.remove(&call);
        }
    }

    /// Refuse any write touching `id`.
    pub fn reject(&self, id: ItemId, rejection: Rejection) {
        self.state.lock().unwrap().rejections.insert(id, rejection);
    }

    /// Hold every listing until the returned semaphore hands out a permit.
    pub fn gate(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.state.lock().unwrap().gate = Some(Arc::clone(&gate));
        gate
    }

    /// The `since` argument of every listing, in call order.
    pub fn watermarks(&self) -> Vec<Option<DateTime<Utc>>> {
        self.state.lock().unwrap().watermarks.clone()
    }

    pub fn calls(&self) -> Vec<(Call, Option<ItemId>)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().iter().filter(|(made, _)| *made == call).count()
    }

    fn begin(&self, call: Call, id: Option<ItemId>) -> RemoteResult<std::sync::MutexGuard<'_, RemoteState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((call, id));
        if state.unreachable.contains(&call) {
            return Err(RemoteError::Transport("connection refused".into()));
        }
        if let Some(rejection) = id.and_then(|id| state.rejections.get(&id).copied()) {
            return Err(RemoteError::Rejected(rejection));
        }
        Ok(state)
    }
}

#[async_trait]
impl RemoteGateway for MemoryRemote {
    async fn list_since(&self, since: Option<DateTime<Utc>>) -> RemoteResult<Vec<RemoteItem>> {
        let gate = self.state.lock().unwrap().gate.clone();
        if let Some(gate) = gate {
            gate.acquire().await.unwrap().forget();
        }
        let mut state = self.begin(Call::ListSince, None)?;
        state.watermarks.push(since);
        Ok(state
            .items
            .values()
            .filter(|item| since.is_none_or(|since| item.updated_at >= since))
            .cloned()
            .collect())
    }

    async fn list_ids(&self) -> RemoteResult<Vec<ItemId>> {
        let state = self.begin(Call::ListIds, None)?;
        Ok(state.items.keys().copied().collect())
    }

    async fn fetch(&self, id: &ItemId) -> RemoteResult<Option<RemoteItem>> {
        let state = self.begin(Call::Fetch, Some(*id))?;
        Ok(state.items.get(id).cloned())
    }

    async fn create(&self, item: &RemoteItem) -> RemoteResult<RemoteItem> {
        let mut state = self.begin(Call::Create, Some(item.id))?;
        if state.items.contains_key(&item.id) {
            return Err(RemoteError::Rejected(Rejection::Conflict));
        }
        state.items.insert(item.id, item.clone());
        Ok(item.clone())
    }

    async fn replace(&self, id: &ItemId, item: &RemoteItem) -> RemoteResult<RemoteItem> {
        let mut state = self.begin(Call::Replace, Some(*id))?;
        let Some(current) = state.items.get(id) else {
            return Err(RemoteError::Rejected(Rejection::NotFound));
        };
        if item.updated_at < current.updated_at {
            return Err(RemoteError::Rejected(Rejection::Conflict));
        }
        state.items.insert(*id, item.clone());
        Ok(item.clone())
    }

    async fn delete(&self, id: &ItemId) -> RemoteResult<()> {
        let mut state = self.begin(Call::Delete, Some(*id))?;
        state
            .items
            .remove(id)
            .map(|_| ())
            .ok_or(RemoteError::Rejected(Rejection::NotFound))
    }
}

/// Hands out the same [`MemoryRemote`] for every endpoint but `bad`.
#[derive(Clone, Default)]
pub struct StaticConnector {
    remote: MemoryRemote,
    endpoints: Arc<Mutex<Vec<String>>>,
}

impl StaticConnector {
    pub fn new(remote: MemoryRemote) -> Self {
        Self {
            remote,
            endpoints: Arc::default(),
        }
    }

    pub fn endpoints(&self) -> Vec<String> {
        self.endpoints.lock().unwrap().clone()
    }
}

impl Connect for StaticConnector {
    type Gateway = MemoryRemote;

    fn connect(&self, endpoint: &str) -> RemoteResult<MemoryRemote> {
        if endpoint == "bad" {
            return Err(RemoteError::InvalidEndpoint(endpoint.to_string()));
        }
        self.endpoints.lock().unwrap().push(endpoint.to_string());
        Ok(self.remote.clone())
    }
}

/// Local replica kept in a map, with the same guards as the SQLite store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    items: Arc<Mutex<BTreeMap<ItemId, Item>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, item: Item) {
        self.items.lock().unwrap().insert(item.id, item);
    }

    pub fn item(&self, id: &ItemId) -> Option<Item> {
        self.items.lock().unwrap().get(id).cloned()
    }

    pub fn snapshot(&self) -> Vec<Item> {
        self.items.lock().unwrap().values().cloned().collect()
    }

    /// Apply a host edit to a stored item.
    pub fn edit(&self, id: &ItemId, change: impl FnOnce(&mut Item)) {
        if let Some(item) = self.items.lock().unwrap().get_mut(id) {
            change(item);
        }
    }
}

fn write(items: &mut BTreeMap<ItemId, Item>, write: StoreWrite) -> bool {
    match write {
        StoreWrite::Insert(item) => {
            if items.contains_key(&item.id) {
                return false;
            }
            items.insert(item.id, item);
            true
        }
        StoreWrite::Overwrite {
            item,
            seen_updated_at,
            seen_state,
        } => match items.get_mut(&item.id) {
            Some(current)
                if current.updated_at == seen_updated_at && current.state == seen_state =>
            {
                *current = item;
                true
            }
            _ => false,
        },
        StoreWrite::Delete(id) => items.remove(&id).is_some(),
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn list_dirty(&self) -> Result<Vec<Item>> {
        Ok(self.snapshot().into_iter().filter(Item::is_dirty).collect())
    }

    async fn list_from_remote(&self) -> Result<Vec<Item>> {
        Ok(self
            .snapshot()
            .into_iter()
            .filter(|item| item.state.from_remote())
            .collect())
    }

    async fn get(&self, id: &ItemId) -> Result<Option<Item>> {
        Ok(self.item(id))
    }

    async fn insert(&self, item: &Item) -> Result<()> {
        write(&mut self.items.lock().unwrap(), StoreWrite::Insert(item.clone()));
        Ok(())
    }

    async fn mark_synced(&self, id: &ItemId, seen_updated_at: &DateTime<Utc>) -> Result<bool> {
        let mut items = self.items.lock().unwrap();
        match items.get_mut(id) {
            Some(item) if item.updated_at == *seen_updated_at && item.state.is_active() => {
                item.state = crate::models::SyncState::Synced;
                Ok(true)
            }
            Some(item) => {
                item.state = item.state.confirmed();
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, id: &ItemId) -> Result<bool> {
        Ok(write(&mut self.items.lock().unwrap(), StoreWrite::Delete(*id)))
    }

    async fn apply(&self, writes: Vec<StoreWrite>) -> Result<BatchOutcome> {
        let mut items = self.items.lock().unwrap();
        let mut outcome = BatchOutcome::default();
        for change in writes {
            if write(&mut items, change) {
                outcome.applied += 1;
            } else {
                outcome.skipped += 1;
            }
        }
        Ok(outcome)
    }
}
