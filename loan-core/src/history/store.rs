use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::snapshot::{self, HISTORY_KEY};
use crate::models::{CalculationInput, CalculationResult, HistoryEntry};
use crate::storage::{KeyValueStore, StorageError};

/// Upper bound on the number of entries kept.
pub const MAX_ENTRIES: usize = 50;

/// Which store operation failed to reach durable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceOp {
    Load,
    Save,
    Clear,
}

impl fmt::Display for PersistenceOp {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(match self {
            Self::Load => "load",
            Self::Save => "save",
            Self::Clear => "clear",
        })
    }
}

/// Non-fatal warning: the in-memory log is fine but storage is behind it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("history {operation} did not persist: {source}")]
pub struct PersistenceFailed {
    pub operation: PersistenceOp,
    #[source]
    pub source: StorageError,
}

/// A value together with any persistence warning raised while producing it.
#[derive(Debug, Clone, PartialEq)]
pub struct Persisted<T> {
    pub value: T,
    pub warning: Option<PersistenceFailed>,
}

impl<T> Persisted<T> {
    pub fn is_durable(&self) -> bool {
        self.warning.is_none()
    }

    pub fn into_value(self) -> T {
        self.value
    }
}

/// Source of creation timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// [`Clock`] reading the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Bounded, newest-first log of past calculations backed by one storage
/// slot.
///
/// The in-memory log is authoritative for the lifetime of the store. Every
/// mutation rewrites the whole slot; storage failures come back as
/// [`PersistenceFailed`] warnings and never undo the in-memory change.
///
/// Typical lifetime:
/// 1. Create with [`HistoryStore::new`].
/// 2. Call [`HistoryStore::initialize`] once to load the persisted log.
/// 3. Call `add` / `list` / `get` / `clear` as needed.
pub struct HistoryStore {
    storage: Box<dyn KeyValueStore>,
    clock: Box<dyn Clock>,
    entries: VecDeque<HistoryEntry>,
}

impl HistoryStore {
    /// Creates an empty store over `storage`. Nothing is read until
    /// [`HistoryStore::initialize`].
    pub fn new(storage: Box<dyn KeyValueStore>) -> Self {
        Self::with_clock(storage, Box::new(SystemClock))
    }

    pub fn with_clock(
        storage: Box<dyn KeyValueStore>,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            storage,
            clock,
            entries: VecDeque::with_capacity(MAX_ENTRIES),
        }
    }

    /// Loads the persisted log into memory.
    ///
    /// A missing slot, or a payload that is not a well-formed log, leaves
    /// the store empty and reports nothing. A read failure keeps the current
    /// in-memory log and is returned as a warning.
    pub async fn initialize(&mut self) -> Option<PersistenceFailed> {
        let payload = match self.storage.read(HISTORY_KEY).await {
            Ok(payload) => payload,
            Err(source) => {
                warn!(error = %source, "could not read persisted history");
                return Some(PersistenceFailed {
                    operation: PersistenceOp::Load,
                    source,
                });
            }
        };

        self.entries.clear();

        let Some(payload) = payload else {
            debug!("no persisted history found");
            return None;
        };

        match snapshot::decode(&payload) {
            Ok(mut entries) => {
                if entries.len() > MAX_ENTRIES {
                    warn!(
                        stored = entries.len(),
                        max = MAX_ENTRIES,
                        "persisted history exceeds bound; dropping oldest entries"
                    );
                    entries.truncate(MAX_ENTRIES);
                }
                debug!(count = entries.len(), "loaded persisted history");
                self.entries.extend(entries);
            }
            Err(error) => {
                warn!(%error, "persisted history is unreadable; starting empty");
            }
        }

        None
    }

    /// Records a calculation as the newest entry and persists the log.
    ///
    /// Entries beyond [`MAX_ENTRIES`] are evicted from the old end. The
    /// returned entry is in the log even when the returned warning says the
    /// write did not reach storage. An entry with a non-finite result cannot
    /// be encoded, so saves fail with [`StorageError::Serialization`] and
    /// storage keeps the last good log until that entry is evicted or cleared.
    pub async fn add(
        &mut self,
        input: CalculationInput,
        result: CalculationResult,
    ) -> Persisted<HistoryEntry> {
        let entry = HistoryEntry {
            id: self.fresh_id(),
            created_at: self.timestamp(),
            input,
            result,
        };

        self.entries.push_front(entry.clone());
        if self.entries.len() > MAX_ENTRIES {
            let evicted = self.entries.len() - MAX_ENTRIES;
            self.entries.truncate(MAX_ENTRIES);
            debug!(evicted, "evicted oldest history entries");
        }

        let warning = self.persist().await.err().map(|source| {
            warn!(error = %source, id = %entry.id, "history entry was not persisted");
            PersistenceFailed {
                operation: PersistenceOp::Save,
                source,
            }
        });

        Persisted {
            value: entry,
            warning,
        }
    }

    /// Snapshot of the log, newest first.
    pub fn list(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Looks up an entry by id. Unknown ids are not an error.
    pub fn get(
        &self,
        id: &str,
    ) -> Option<&HistoryEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Empties the log and deletes the persisted slot. Safe to repeat.
    pub async fn clear(&mut self) -> Option<PersistenceFailed> {
        let cleared = self.entries.len();
        self.entries.clear();

        match self.storage.remove(HISTORY_KEY).await {
            Ok(()) => {
                info!(cleared, "history cleared");
                None
            }
            Err(source) => {
                warn!(error = %source, "persisted history could not be removed");
                Some(PersistenceFailed {
                    operation: PersistenceOp::Clear,
                    source,
                })
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn persist(&self) -> Result<(), StorageError> {
        let payload = snapshot::encode(&self.entries)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        self.storage.write(HISTORY_KEY, &payload).await?;
        debug!(count = self.entries.len(), bytes = payload.len(), "persisted history");
        Ok(())
    }

    fn fresh_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }

    /// Current time cut to whole milliseconds, the precision the slot keeps.
    fn timestamp(&self) -> DateTime<Utc> {
        let now = self.clock.now();
        DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
    }
}
