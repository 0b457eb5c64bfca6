use std::path::Path;

use async_trait::async_trait;
use loan_core::storage::{StorageConfig, StorageFactory};
use loan_core::{KeyValueStore, StorageError};
use tracing::debug;

use crate::store::SqliteStore;

/// In-memory location, also accepted in its URL form `sqlite::memory:`.
const MEMORY_LOCATION: &str = ":memory:";

/// [`StorageFactory`] for SQLite.
///
/// Register this with a [`loan_core::storage::StorageRegistry`] to make the
/// `"sqlite"` backend available:
///
/// ```rust,no_run
/// use loan_core::storage::StorageRegistry;
/// use loan_db_sqlite::SqliteStoreFactory;
///
/// let mut registry = StorageRegistry::new();
/// registry.register(Box::new(SqliteStoreFactory));
/// ```
pub struct SqliteStoreFactory;

#[async_trait]
impl StorageFactory for SqliteStoreFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Accepted values:
    /// * A file path, e.g. `"history.db"`. The file is created on open if
    ///   it does not exist, but the path must not name a directory.
    /// * `":memory:"`, an ephemeral in-memory database.
    ///
    /// A leading `sqlite://` or `sqlite:` URL scheme is stripped.
    fn normalize_location(
        &self,
        location: &str,
    ) -> Result<String, StorageError> {
        let trimmed = location.trim();
        let bare = trimmed
            .strip_prefix("sqlite://")
            .or_else(|| trimmed.strip_prefix("sqlite:"))
            .unwrap_or(trimmed);

        if bare.is_empty() {
            return Err(StorageError::Configuration(
                "sqlite backend needs a database path or ':memory:'".to_string(),
            ));
        }
        if bare != MEMORY_LOCATION && Path::new(bare).is_dir() {
            return Err(StorageError::Configuration(format!(
                "sqlite location '{bare}' is a directory"
            )));
        }
        Ok(bare.to_string())
    }

    /// Opens the database at `config.location`. Migrations run on every
    /// open; they are idempotent.
    async fn create(
        &self,
        config: &StorageConfig,
    ) -> Result<Box<dyn KeyValueStore>, StorageError> {
        let location = self.normalize_location(&config.location)?;
        let location = location.as_str();

        let store = if location == MEMORY_LOCATION {
            SqliteStore::in_memory().await
        } else {
            SqliteStore::open(Path::new(location)).await
        }
        .map_err(|e| StorageError::Connection(format!("{e:#}")))?;

        store
            .run_migrations()
            .await
            .map_err(|e| StorageError::Database(format!("{e:#}")))?;

        debug!(location, "sqlite storage ready");
        Ok(Box::new(store))
    }
}
