use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid storage key '{0}'")]
    InvalidKey(String),

    #[error("Storage quota exceeded: {needed} bytes needed, {quota} allowed")]
    QuotaExceeded { needed: usize, quota: usize },
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// A durable string slot per key.
///
/// Reads of an absent key return `Ok(None)`; removing an absent key succeeds.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn read(
        &self,
        key: &str,
    ) -> Result<Option<String>, StorageError>;

    /// Replaces whatever is stored under `key`.
    async fn write(
        &self,
        key: &str,
        value: &str,
    ) -> Result<(), StorageError>;

    async fn remove(
        &self,
        key: &str,
    ) -> Result<(), StorageError>;
}
