//! Database layer for Basket

mod connection;
mod meta_repository;
mod migrations;
mod repository;
mod rows;

pub use connection::Database;
pub use meta_repository::{LibSqlMetaRepository, MetaRepository};
pub use repository::{BatchOutcome, ItemRepository, LibSqlItemRepository, StoreWrite};
