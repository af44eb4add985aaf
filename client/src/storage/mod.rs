//! Durable key-value storage for the pending operation queue.
//!
//! The queue is persisted as a single text blob under one fixed key, so the
//! storage seam only needs whole-value load, save and remove.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),
}

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Whole-value key-value storage.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn load(&self, key: &str) -> StorageResult<Option<String>>;

    /// Replace the value stored under `key`.
    fn save(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete the value stored under `key`. Missing keys are not an error.
    fn remove(&self, key: &str) -> StorageResult<()>;
}
