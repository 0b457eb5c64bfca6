//! Persisted log of past calculations.

pub mod snapshot;
pub mod store;

pub use snapshot::{HISTORY_KEY, SnapshotError};
pub use store::{
    Clock, HistoryStore, MAX_ENTRIES, PersistenceFailed, PersistenceOp, Persisted, SystemClock,
};
