//! Shared services used by hosts and the sync engine.

mod store;

pub use store::ItemStore;
