use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::factory::{StorageConfig, StorageFactory};
use super::key_value::{KeyValueStore, StorageError};

/// Process-local [`KeyValueStore`]. Contents are lost when the store is
/// dropped.
///
/// An optional byte quota makes writes fail with
/// [`StorageError::QuotaExceeded`] once the stored values would grow past
/// it, the way browser local storage behaves.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the total size of all stored values to `bytes`.
    pub fn with_quota(bytes: usize) -> Self {
        Self {
            slots: Mutex::default(),
            quota: Some(bytes),
        }
    }

    /// Puts `value` under `key` without any quota check.
    pub fn insert_raw(
        &self,
        key: &str,
        value: &str,
    ) {
        self.lock().insert(key.to_string(), value.to_string());
    }

    /// Current value under `key`, bypassing the async interface.
    pub fn get_raw(
        &self,
        key: &str,
    ) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a consistent map.
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn read(
        &self,
        key: &str,
    ) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn write(
        &self,
        key: &str,
        value: &str,
    ) -> Result<(), StorageError> {
        let mut slots = self.lock();

        if let Some(quota) = self.quota {
            let others: usize = slots
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            let needed = others + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }

        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(
        &self,
        key: &str,
    ) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }
}

/// [`StorageFactory`] for the `"memory"` backend. Every store it creates
/// is fresh, so `location` carries no meaning and normalizes to empty.
pub struct MemoryStoreFactory;

#[async_trait]
impl StorageFactory for MemoryStoreFactory {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    fn normalize_location(
        &self,
        location: &str,
    ) -> Result<String, StorageError> {
        if !location.trim().is_empty() {
            debug!(location, "memory backend ignores its location");
        }
        Ok(String::new())
    }

    async fn create(
        &self,
        _config: &StorageConfig,
    ) -> Result<Box<dyn KeyValueStore>, StorageError> {
        Ok(Box::new(MemoryStore::new()))
    }
}
