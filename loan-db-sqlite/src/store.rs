use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use loan_core::{KeyValueStore, StorageError};
use sqlx::Row;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use tracing::debug;

/// [`KeyValueStore`] over a single SQLite table, `kv_slots`.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Opens (creating if missing) the database file at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Ok(Self { pool })
    }

    /// Opens a private in-memory database.
    ///
    /// The pool is capped at one connection because every SQLite
    /// in-memory connection is a separate database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("Failed to create in-memory database")?;
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// When the slot under `key` was last written.
    pub async fn updated_at(
        &self,
        key: &str,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        let row = sqlx::query("SELECT updated_at FROM kv_slots WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        row.map(|row| {
            row.try_get::<DateTime<Utc>, _>("updated_at")
                .map_err(|e| StorageError::Database(format!("Failed to get updated_at: {}", e)))
        })
        .transpose()
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn read(
        &self,
        key: &str,
    ) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT value FROM kv_slots WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        row.map(|row| {
            row.try_get::<String, _>("value")
                .map_err(|e| StorageError::Database(format!("Failed to get value: {}", e)))
        })
        .transpose()
    }

    async fn write(
        &self,
        key: &str,
        value: &str,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO kv_slots (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Database(e.to_string()))?;

        debug!(key, bytes = value.len(), "wrote sqlite slot");
        Ok(())
    }

    async fn remove(
        &self,
        key: &str,
    ) -> Result<(), StorageError> {
        let result = sqlx::query("DELETE FROM kv_slots WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Database(e.to_string()))?;

        debug!(key, removed = result.rows_affected(), "removed sqlite slot");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    async fn setup_test_db() -> SqliteStore {
        let store = SqliteStore::in_memory()
            .await
            .expect("Failed to create in-memory database");
        store.run_migrations().await.expect("Failed to run migrations");
        store
    }

    #[tokio::test]
    async fn test_read_missing_key() {
        let store = setup_test_db().await;

        assert_eq!(store.read("missing").await, Ok(None));
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let store = setup_test_db().await;

        store.write("history", "{\"entries\":[]}").await.expect("Should write");

        assert_eq!(
            store.read("history").await,
            Ok(Some("{\"entries\":[]}".to_string()))
        );
    }

    #[tokio::test]
    async fn test_write_replaces_value() {
        let store = setup_test_db().await;

        store.write("history", "one").await.expect("Should write");
        store.write("history", "two").await.expect("Should overwrite");

        assert_eq!(store.read("history").await, Ok(Some("two".to_string())));
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM kv_slots")
            .fetch_one(store.pool())
            .await
            .expect("Should count rows");
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let store = setup_test_db().await;
        store.write("history", "value").await.expect("Should write");

        store.remove("history").await.expect("Should remove");
        store.remove("history").await.expect("Should remove again");

        assert_eq!(store.read("history").await, Ok(None));
    }

    #[tokio::test]
    async fn test_updated_at_tracks_writes() {
        let store = setup_test_db().await;
        let before = Utc::now() - chrono::Duration::seconds(1);

        assert_eq!(store.updated_at("history").await, Ok(None));
        store.write("history", "value").await.expect("Should write");

        let updated = store
            .updated_at("history")
            .await
            .expect("Should read timestamp")
            .expect("Timestamp should be set");
        assert!(updated >= before);
    }

    #[tokio::test]
    async fn test_read_without_migrations_is_database_error() {
        let store = SqliteStore::in_memory().await.expect("Should open");

        assert!(matches!(
            store.read("history").await,
            Err(StorageError::Database(_))
        ));
    }
}
