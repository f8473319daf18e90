//! basket-core - Core library for Basket
//!
//! This crate contains the item model, the local libSQL store, the remote
//! gateway, and the bidirectional sync engine used by Basket hosts.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod remote;
pub mod services;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{Item, ItemId, SyncState};
