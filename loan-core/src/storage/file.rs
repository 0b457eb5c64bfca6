use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::factory::{StorageConfig, StorageFactory};
use super::key_value::{KeyValueStore, StorageError};

/// [`KeyValueStore`] keeping one file per key inside a directory.
///
/// The value for `key` lives in `<dir>/<key>.json`. Writes go to a
/// sibling temporary file that is then renamed over the target, so a
/// reader never sees a half-written value.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `key`.
    ///
    /// Keys are limited to ASCII letters, digits, `.`, `_` and `-` and may
    /// not start with a dot, so they cannot escape the directory.
    pub fn path_for(
        &self,
        key: &str,
    ) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn read(
        &self,
        key: &str,
    ) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(format!(
                "Failed to read '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    async fn write(
        &self,
        key: &str,
        value: &str,
    ) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");

        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            StorageError::Io(format!(
                "Failed to create directory '{}': {}",
                self.dir.display(),
                e
            ))
        })?;
        tokio::fs::write(&tmp, value).await.map_err(|e| {
            StorageError::Io(format!("Failed to write '{}': {}", tmp.display(), e))
        })?;
        tokio::fs::rename(&tmp, &path).await.map_err(|e| {
            StorageError::Io(format!(
                "Failed to replace '{}': {}",
                path.display(),
                e
            ))
        })?;

        debug!(path = %path.display(), bytes = value.len(), "wrote storage slot");
        Ok(())
    }

    async fn remove(
        &self,
        key: &str,
    ) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(format!(
                "Failed to remove '{}': {}",
                path.display(),
                e
            ))),
        }
    }
}

/// [`StorageFactory`] for the `"file"` backend.
///
/// `location` is the directory that holds the slot files. Surrounding
/// whitespace is trimmed; an empty location is rejected.
pub struct FileStoreFactory;

#[async_trait]
impl StorageFactory for FileStoreFactory {
    fn backend_name(&self) -> &'static str {
        "file"
    }

    fn normalize_location(
        &self,
        location: &str,
    ) -> Result<String, StorageError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(StorageError::Configuration(
                "file backend needs a directory location".to_string(),
            ));
        }
        Ok(location.to_string())
    }

    async fn create(
        &self,
        config: &StorageConfig,
    ) -> Result<Box<dyn KeyValueStore>, StorageError> {
        let dir = self.normalize_location(&config.location)?;
        Ok(Box::new(FileStore::new(dir)))
    }
}
