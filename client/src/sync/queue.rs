//! The persisted queue of pending operations.
//!
//! Wraps the engine's [`OperationLog`] and writes the whole list to a
//! [`KeyValueStore`] after every change. The in-memory list is authoritative:
//! storage failures are logged and never block the caller.

use std::collections::HashSet;
use std::sync::Arc;

use crewsync_engine::{
    error::Result as EngineResult, NodeId, OpIdGenerator, OperationId, OperationKind,
    OperationLog, PendingOperation, QueueSnapshot, Schema, Timestamp,
};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinError;

use crate::storage::KeyValueStore;

/// Storage key holding the serialized queue.
pub const QUEUE_STORAGE_KEY: &str = "pending_operations";

/// Ordered, persisted list of operations waiting for the remote store.
pub struct MutationQueue {
    log: OperationLog,
    ids: OpIdGenerator,
    schema: Arc<Schema>,
    store: Arc<dyn KeyValueStore>,
}

impl MutationQueue {
    /// Open the queue, restoring whatever was persisted in `store`.
    pub fn open(schema: Arc<Schema>, store: Arc<dyn KeyValueStore>, node_id: impl Into<NodeId>) -> Self {
        let mut queue = Self {
            log: OperationLog::new(),
            ids: OpIdGenerator::new(node_id),
            schema,
            store,
        };
        queue.load_from_storage();
        queue
    }

    /// Replace the in-memory list with the persisted one.
    ///
    /// Unreadable or missing data yields an empty queue. Returns the number
    /// of restored operations.
    pub fn load_from_storage(&mut self) -> usize {
        self.log = match self.store.load(QUEUE_STORAGE_KEY) {
            Ok(Some(blob)) => match QueueSnapshot::from_json(&blob) {
                Ok(snapshot) => snapshot.into_log(),
                Err(e) => {
                    tracing::warn!(error = %e, "ignoring unreadable persisted queue");
                    OperationLog::new()
                }
            },
            Ok(None) => OperationLog::new(),
            Err(e) => {
                tracing::error!(error = %e, "failed to read persisted queue");
                OperationLog::new()
            }
        };

        for op in self.log.operations() {
            self.ids.observe(&op.id);
        }

        if !self.log.is_empty() {
            tracing::info!(
                pending = self.log.len(),
                oldest = ?self.log.oldest_timestamp(),
                "restored pending operations"
            );
        }
        self.log.len()
    }

    /// Validate a mutation and append it to the queue.
    ///
    /// Returns the new operation's id. Invalid payloads are rejected and
    /// nothing is queued.
    pub fn enqueue(
        &mut self,
        resource: &str,
        kind: OperationKind,
        payload: Value,
    ) -> EngineResult<OperationId> {
        let id = self
            .log
            .record(&self.schema, &mut self.ids, resource, kind, payload, now_millis())?
            .id
            .clone();

        tracing::debug!(op_id = %id, resource, %kind, pending = self.log.len(), "queued operation");
        self.persist();
        Ok(id)
    }

    /// Drop the given operations, keeping the order of the rest.
    pub fn remove(&mut self, ids: &HashSet<OperationId>) -> usize {
        let removed = self.log.remove(ids);
        if removed > 0 {
            self.persist();
        }
        removed
    }

    /// Drop every pending operation and the persisted copy.
    pub fn clear(&mut self) {
        let discarded = self.log.len();
        self.log.clear();
        if let Err(e) = self.store.remove(QUEUE_STORAGE_KEY) {
            tracing::error!(error = %e, "failed to remove persisted queue");
        }
        tracing::info!(discarded, "cleared pending operations");
    }

    /// Pending operations in replay order.
    pub fn pending(&self) -> &[PendingOperation] {
        self.log.operations()
    }

    /// Owned copy of the pending operations.
    pub fn snapshot(&self) -> Vec<PendingOperation> {
        self.log.operations().to_vec()
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn oldest_pending(&self) -> Option<Timestamp> {
        self.log.oldest_timestamp()
    }

    pub fn node_id(&self) -> &str {
        &self.ids.node_id
    }

    fn persist(&self) {
        let json = match QueueSnapshot::from_log(&self.log).to_json() {
            Ok(json) => json,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize pending operations");
                return;
            }
        };

        if let Err(e) = self.store.save(QUEUE_STORAGE_KEY, &json) {
            tracing::error!(
                error = %e,
                pending = self.log.len(),
                "failed to persist pending operations"
            );
        }
    }
}

/// Run `f` against the locked queue on the blocking thread pool.
///
/// Every mutation writes through the store synchronously, so mutating calls
/// made from async code go through here. A panic in `f` resumes in the
/// caller; an error means the task was cancelled by runtime shutdown.
pub(crate) async fn with_queue_blocking<T, F>(
    queue: &Arc<Mutex<MutationQueue>>,
    f: F,
) -> Result<T, JoinError>
where
    F: FnOnce(&mut MutationQueue) -> T + Send + 'static,
    T: Send + 'static,
{
    let mut guard = queue.clone().lock_owned().await;
    match tokio::task::spawn_blocking(move || f(&mut guard)).await {
        Ok(value) => Ok(value),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(e) => Err(e),
    }
}

/// Milliseconds since the Unix epoch.
fn now_millis() -> Timestamp {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::default_schema;
    use crate::storage::{MemoryStore, StorageError, StorageResult};
    use proptest::prelude::*;
    use serde_json::json;

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn load(&self, _: &str) -> StorageResult<Option<String>> {
            Err(StorageError::Io(std::io::Error::other("disk unavailable")))
        }

        fn save(&self, _: &str, _: &str) -> StorageResult<()> {
            Err(StorageError::Io(std::io::Error::other("disk full")))
        }

        fn remove(&self, _: &str) -> StorageResult<()> {
            Err(StorageError::Io(std::io::Error::other("read-only")))
        }
    }

    fn open(store: Arc<dyn KeyValueStore>) -> MutationQueue {
        MutationQueue::open(Arc::new(default_schema()), store, "tablet-1")
    }

    #[test]
    fn enqueue_persists_every_change() {
        let store = Arc::new(MemoryStore::new());
        let mut queue = open(store.clone());

        let id = queue
            .enqueue(
                "time_entries",
                OperationKind::Insert,
                json!({"worker_id": "w-1", "hours": 8}),
            )
            .unwrap();
        assert!(id.starts_with("tablet-1-"));

        let blob = store.load(QUEUE_STORAGE_KEY).unwrap().unwrap();
        let snapshot = QueueSnapshot::from_json(&blob).unwrap();
        assert_eq!(snapshot.operations.len(), 1);
        assert_eq!(snapshot.operations[0].id, id);
    }

    #[test]
    fn invalid_payload_is_not_queued() {
        let store = Arc::new(MemoryStore::new());
        let mut queue = open(store.clone());

        let result = queue.enqueue("time_entries", OperationKind::Update, json!({"hours": 2}));
        assert!(result.is_err());
        assert!(queue.is_empty());
        assert_eq!(store.load(QUEUE_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn remove_persists_remaining_entries() {
        let store = Arc::new(MemoryStore::new());
        let mut queue = open(store.clone());
        let first = queue
            .enqueue("workers", OperationKind::Delete, json!({"id": "w-1"}))
            .unwrap();
        let second = queue
            .enqueue("workers", OperationKind::Delete, json!({"id": "w-2"}))
            .unwrap();

        assert_eq!(queue.remove(&HashSet::from([first])), 1);

        let reopened = open(store);
        let ids: Vec<_> = reopened.pending().iter().map(|op| op.id.clone()).collect();
        assert_eq!(ids, vec![second]);
    }

    #[test]
    fn reopened_queue_never_reuses_ids() {
        let store = Arc::new(MemoryStore::new());
        let mut queue = open(store.clone());
        let before: HashSet<_> = (0..5)
            .map(|i| {
                queue
                    .enqueue("workers", OperationKind::Delete, json!({"id": i}))
                    .unwrap()
            })
            .collect();

        let mut reopened = open(store.clone());
        let after = reopened
            .enqueue("workers", OperationKind::Delete, json!({"id": 99}))
            .unwrap();
        assert!(!before.contains(&after));

        // The persisted queue stays loadable.
        assert_eq!(open(store).len(), 6);
    }

    #[test]
    fn corrupt_storage_yields_empty_queue() {
        let store = Arc::new(MemoryStore::new());
        store.save(QUEUE_STORAGE_KEY, "{\"formatVersion\": 1, \"operat").unwrap();

        let queue = open(store);
        assert!(queue.is_empty());
    }

    #[test]
    fn storage_failures_keep_memory_authoritative() {
        let mut queue = open(Arc::new(BrokenStore));

        queue
            .enqueue("workers", OperationKind::Delete, json!({"id": "w-1"}))
            .unwrap();
        assert_eq!(queue.len(), 1);

        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn clear_removes_persisted_blob() {
        let store = Arc::new(MemoryStore::new());
        let mut queue = open(store.clone());
        queue
            .enqueue("workers", OperationKind::Delete, json!({"id": "w-1"}))
            .unwrap();

        queue.clear();
        assert!(queue.is_empty());
        assert!(store.is_empty());
    }

    proptest! {
        #[test]
        fn prop_reload_returns_same_entries_in_order(
            keys in proptest::collection::vec("[a-z0-9]{1,8}", 0..25),
        ) {
            let store = Arc::new(MemoryStore::new());
            let mut queue = open(store.clone());

            for (i, key) in keys.iter().enumerate() {
                let kind = if i % 2 == 0 { OperationKind::Update } else { OperationKind::Delete };
                queue.enqueue("work_assignments", kind, json!({"id": key, "status": "done"})).unwrap();
            }

            prop_assert_eq!(queue.len(), keys.len());

            let reopened = open(store);
            prop_assert_eq!(reopened.pending(), queue.pending());
        }
    }
}
