pub mod calculations;
pub mod history;
pub mod models;
pub mod storage;

pub use calculations::{CalculationError, InputField, PaymentCalculator};
pub use history::{HistoryStore, MAX_ENTRIES, PersistenceFailed, PersistenceOp, Persisted};
pub use models::*;
pub use storage::{KeyValueStore, StorageError};
