pub mod factory;
pub mod file;
pub mod key_value;
pub mod memory;

pub use factory::{StorageConfig, StorageFactory, StorageRegistry};
pub use file::{FileStore, FileStoreFactory};
pub use key_value::{KeyValueStore, StorageError};
pub use memory::{MemoryStore, MemoryStoreFactory};
