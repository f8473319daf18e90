//! Sync metadata repository implementation

use chrono::{DateTime, Utc};
use libsql::Connection;

use super::rows::{parse_stored_timestamp, text, timestamp};
use crate::error::Result;

const LAST_SYNC_KEY: &str = "last_sync";
const ENDPOINT_KEY: &str = "endpoint";

/// Trait for host-persisted sync metadata (async)
#[allow(async_fn_in_trait)]
pub trait MetaRepository {
    /// Load the watermark of the last successful pull
    async fn last_sync(&self) -> Result<Option<DateTime<Utc>>>;

    /// Persist the watermark of the last successful pull
    async fn set_last_sync(&self, last_sync: &DateTime<Utc>) -> Result<()>;

    /// Load the endpoint used by the last sync
    async fn endpoint(&self) -> Result<Option<String>>;

    /// Remember the endpoint for later syncs
    async fn set_endpoint(&self, endpoint: &str) -> Result<()>;
}

/// libSQL implementation of `MetaRepository`
pub struct LibSqlMetaRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlMetaRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl MetaRepository for LibSqlMetaRepository<'_> {
    async fn last_sync(&self) -> Result<Option<DateTime<Utc>>> {
        match self.get_value(LAST_SYNC_KEY).await? {
            Some(raw) => Ok(Some(parse_stored_timestamp(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set_last_sync(&self, last_sync: &DateTime<Utc>) -> Result<()> {
        self.set_value(LAST_SYNC_KEY, timestamp(last_sync)).await
    }

    async fn endpoint(&self) -> Result<Option<String>> {
        self.get_value(ENDPOINT_KEY).await
    }

    async fn set_endpoint(&self, endpoint: &str) -> Result<()> {
        self.set_value(ENDPOINT_KEY, text(endpoint)).await
    }
}

impl LibSqlMetaRepository<'_> {
    async fn get_value(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM sync_meta WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    async fn set_value(&self, key: &str, value: libsql::Value) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO sync_meta (key, value) VALUES (?, ?)",
                vec![text(key), value],
            )
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::util::parse_timestamp;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_defaults_are_empty() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlMetaRepository::new(db.connection());

        assert_eq!(repo.last_sync().await.unwrap(), None);
        assert_eq!(repo.endpoint().await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_and_load() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlMetaRepository::new(db.connection());
        let first = parse_timestamp("2024-01-01T00:00:00Z").unwrap();
        let second = parse_timestamp("2024-01-02T00:00:00Z").unwrap();

        repo.set_last_sync(&first).await.unwrap();
        repo.set_last_sync(&second).await.unwrap();
        repo.set_endpoint("https://api.example.com").await.unwrap();

        assert_eq!(repo.last_sync().await.unwrap(), Some(second));
        assert_eq!(
            repo.endpoint().await.unwrap().as_deref(),
            Some("https://api.example.com")
        );
    }
}
