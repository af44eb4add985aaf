//! Offline queueing and replay.

mod engine;
mod queue;
mod service;

pub use engine::{FailedOperation, RetryPolicy, SkipReason, SyncEngine, SyncOutcome, SyncReport};
pub use queue::{MutationQueue, QUEUE_STORAGE_KEY};
pub use service::{OfflineSync, SyncOptions, SyncStatus};
