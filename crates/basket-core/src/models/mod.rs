//! Data models for Basket

mod item;
mod remote_item;
mod sync_state;
pub(crate) mod timestamp;

pub use item::{Item, ItemId};
pub use remote_item::RemoteItem;
pub use sync_state::SyncState;
