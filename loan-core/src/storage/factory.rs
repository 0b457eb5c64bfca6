use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use super::key_value::{KeyValueStore, StorageError};

/// Where the history slot lives: a backend name plus a backend-specific
/// location.
///
/// | backend    | location                                   |
/// |------------|--------------------------------------------|
/// | `memory`   | none; any value is dropped                 |
/// | `file`     | directory, e.g. `.loan-calculator`         |
/// | `sqlite`   | database path or `:memory:`                |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub backend: String,
    pub location: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            location: String::new(),
        }
    }
}

/// Opens one kind of [`KeyValueStore`].
#[async_trait]
pub trait StorageFactory: Send + Sync {
    /// Lowercase name `StorageConfig::backend` selects this factory by.
    fn backend_name(&self) -> &'static str;

    /// Checks a raw location against this backend's rules and returns the
    /// form [`StorageFactory::create`] expects.
    fn normalize_location(
        &self,
        location: &str,
    ) -> Result<String, StorageError>;

    /// Opens the store. `config.location` has already been through
    /// [`StorageFactory::normalize_location`].
    async fn create(
        &self,
        config: &StorageConfig,
    ) -> Result<Box<dyn KeyValueStore>, StorageError>;
}

/// Backends known to the application, keyed by name.
pub struct StorageRegistry {
    factories: HashMap<&'static str, Box<dyn StorageFactory>>,
}

impl StorageRegistry {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Adds `factory`, replacing any factory with the same name.
    pub fn register(
        &mut self,
        factory: Box<dyn StorageFactory>,
    ) {
        self.factories.insert(factory.backend_name(), factory);
    }

    /// Names of every registered backend, sorted alphabetically.
    pub fn available_backends(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.factories.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Validates `config` against its backend and returns it with the
    /// location normalized. Backend names match case-insensitively.
    pub fn resolve(
        &self,
        config: &StorageConfig,
    ) -> Result<StorageConfig, StorageError> {
        let factory = self.factory(&config.backend)?;
        Ok(StorageConfig {
            backend: factory.backend_name().to_string(),
            location: factory.normalize_location(&config.location)?,
        })
    }

    /// Resolves `config` and opens the store it names.
    ///
    /// # Errors
    /// * [`StorageError::Configuration`] for an unknown backend or a location
    ///   the backend rejects.
    /// * Any error the backend itself returns while opening.
    pub async fn create(
        &self,
        config: &StorageConfig,
    ) -> Result<Box<dyn KeyValueStore>, StorageError> {
        let resolved = self.resolve(config)?;
        debug!(backend = %resolved.backend, location = %resolved.location, "opening storage");
        self.factory(&resolved.backend)?.create(&resolved).await
    }

    fn factory(
        &self,
        backend: &str,
    ) -> Result<&dyn StorageFactory, StorageError> {
        let name = backend.trim().to_ascii_lowercase();
        self.factories
            .get(name.as_str())
            .map(|factory| factory.as_ref())
            .ok_or_else(|| {
                StorageError::Configuration(format!(
                    "unknown backend '{}'; available: {:?}",
                    backend,
                    self.available_backends()
                ))
            })
    }
}

impl Default for StorageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
