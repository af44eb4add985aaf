//! The offline sync service: queue, engine and connectivity wired together.

use std::sync::Arc;

use crewsync_engine::{NodeId, OperationId, OperationKind, PendingOperation, Schema, Timestamp};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use super::queue::with_queue_blocking;
use super::{MutationQueue, RetryPolicy, SyncEngine, SyncOutcome};
use crate::connectivity::{ConnectivityMonitor, ConnectivitySource, Subscription};
use crate::error::Result;
use crate::remote::RemoteStore;
use crate::storage::KeyValueStore;

/// Construction options for [`OfflineSync`].
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    node_id: Option<NodeId>,
    retry: RetryPolicy,
}

impl SyncOptions {
    /// Use a fixed node id instead of a fresh one per session.
    pub fn node_id(mut self, node_id: impl Into<NodeId>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Point-in-time view for status indicators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub online: bool,
    pub syncing: bool,
    pub pending: usize,
    pub oldest_pending: Option<Timestamp>,
}

struct Worker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Offline-first write path for the app.
///
/// Mutations are queued locally with [`enqueue`](Self::enqueue) and replayed
/// against the remote store whenever connectivity returns, once
/// [`start`](Self::start) has been called. A pass can also be triggered by
/// hand with [`sync_pending_operations`](Self::sync_pending_operations).
pub struct OfflineSync {
    queue: Arc<Mutex<MutationQueue>>,
    engine: Arc<SyncEngine>,
    monitor: ConnectivityMonitor,
    node_id: NodeId,
    worker: Option<Worker>,
}

impl OfflineSync {
    pub fn new(
        schema: Schema,
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteStore>,
        connectivity: &dyn ConnectivitySource,
    ) -> Self {
        Self::with_options(schema, store, remote, connectivity, SyncOptions::default())
    }

    /// Open the persisted queue and wire the engine to `connectivity`.
    pub fn with_options(
        schema: Schema,
        store: Arc<dyn KeyValueStore>,
        remote: Arc<dyn RemoteStore>,
        connectivity: &dyn ConnectivitySource,
        options: SyncOptions,
    ) -> Self {
        let node_id = options
            .node_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());

        let queue = Arc::new(Mutex::new(MutationQueue::open(
            Arc::new(schema),
            store,
            node_id.clone(),
        )));
        let monitor = ConnectivityMonitor::new(connectivity);
        let engine = Arc::new(
            SyncEngine::new(remote, queue.clone(), monitor.receiver())
                .with_retry_policy(options.retry),
        );

        Self {
            queue,
            engine,
            monitor,
            node_id,
            worker: None,
        }
    }

    /// Start syncing automatically whenever the device comes online.
    ///
    /// A service started while already online with pending work syncs once
    /// straight away. Calling this again while running does nothing.
    pub fn start(&mut self) {
        if self.worker.is_some() {
            tracing::debug!("sync worker already running");
            return;
        }

        let (transitions_tx, transitions_rx) = mpsc::unbounded_channel();
        let subscription = self.monitor.subscribe(move |online| {
            let _ = transitions_tx.send(online);
        });

        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run_worker(
            self.engine.clone(),
            self.queue.clone(),
            transitions_rx,
            stop_rx,
            subscription,
        ));

        self.worker = Some(Worker {
            stop: stop_tx,
            handle,
        });
        tracing::info!(node_id = %self.node_id, "sync worker started");
    }

    /// Stop automatic syncing and wait for the worker to exit.
    ///
    /// A pass already in flight runs to completion first.
    pub async fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        let _ = worker.stop.send(());
        if let Err(e) = worker.handle.await {
            tracing::error!(error = %e, "sync worker ended abnormally");
        }
        tracing::info!("sync worker stopped");
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Queue a mutation for the remote store.
    pub async fn enqueue(
        &self,
        resource: &str,
        kind: OperationKind,
        payload: Value,
    ) -> Result<OperationId> {
        let resource = resource.to_string();
        let id = with_queue_blocking(&self.queue, move |queue| {
            queue.enqueue(&resource, kind, payload)
        })
        .await??;
        Ok(id)
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Copy of the pending operations, oldest first.
    pub async fn pending_operations(&self) -> Vec<PendingOperation> {
        self.queue.lock().await.snapshot()
    }

    pub fn is_online(&self) -> bool {
        self.monitor.is_online()
    }

    pub fn is_syncing(&self) -> bool {
        self.engine.is_syncing()
    }

    /// Run a sync pass now.
    pub async fn sync_pending_operations(&self) -> SyncOutcome {
        self.engine.sync().await
    }

    /// Discard every pending operation without syncing it.
    pub async fn clear(&self) {
        if let Err(e) = with_queue_blocking(&self.queue, MutationQueue::clear).await {
            tracing::error!(error = %e, "failed to clear pending operations");
        }
    }

    pub async fn status(&self) -> SyncStatus {
        let queue = self.queue.lock().await;
        SyncStatus {
            online: self.is_online(),
            syncing: self.is_syncing(),
            pending: queue.len(),
            oldest_pending: queue.oldest_pending(),
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

impl Drop for OfflineSync {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop.send(());
        }
    }
}

async fn run_worker(
    engine: Arc<SyncEngine>,
    queue: Arc<Mutex<MutationQueue>>,
    mut transitions: mpsc::UnboundedReceiver<bool>,
    mut stop: oneshot::Receiver<()>,
    _subscription: Subscription,
) {
    // The first reported state counts as a change from offline.
    let mut was_online = false;

    loop {
        tokio::select! {
            _ = &mut stop => break,
            transition = transitions.recv() => {
                let Some(online) = transition else { break };
                let came_online = online && !was_online;
                was_online = online;

                if came_online && !queue.lock().await.is_empty() {
                    tracing::debug!("back online with pending operations");
                    engine.sync().await;
                }
            }
        }
    }
}
