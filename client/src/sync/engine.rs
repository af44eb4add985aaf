//! Replays pending operations against the remote store.
//!
//! A sync pass snapshots the queue, applies each operation in order, then
//! removes everything that succeeded in a single persisted write. Failed
//! operations stay queued and are retried on a later pass.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crewsync_engine::{
    Mutation, OperationId, OperationKind, PendingOperation, RecordKey, ResourceName,
};
use futures::FutureExt;
use serde::Serialize;
use tokio::sync::{watch, Mutex};
use tokio::time::Instant;

use super::queue::with_queue_blocking;
use super::MutationQueue;
use crate::connectivity::ConnectivityState;
use crate::error::ApplyError;
use crate::remote::RemoteStore;

/// When a failed operation may be attempted again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Retry on every pass.
    #[default]
    Immediate,
    /// Wait `initial * 2^(failures - 1)`, capped at `max`, before the next
    /// attempt. Operations are never dropped, however often they fail.
    Backoff { initial: Duration, max: Duration },
}

impl RetryPolicy {
    fn delay_after(&self, failures: u32) -> Option<Duration> {
        match *self {
            RetryPolicy::Immediate => None,
            RetryPolicy::Backoff { initial, max } => {
                let factor = 1u32 << failures.saturating_sub(1).min(20);
                Some(initial.saturating_mul(factor).min(max))
            }
        }
    }
}

#[derive(Debug)]
struct RetryState {
    failures: u32,
    not_before: Option<Instant>,
}

/// An operation that failed during a pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedOperation {
    pub id: OperationId,
    pub resource: ResourceName,
    pub kind: OperationKind,
    pub error: String,
}

/// Result of one completed sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Applied and removed from the queue
    pub succeeded: Vec<OperationId>,
    /// Attempted and failed; still queued
    pub failed: Vec<FailedOperation>,
    /// Not attempted this pass; still queued
    pub deferred: Vec<OperationId>,
    /// Queue length after the pass
    pub remaining: usize,
}

impl SyncReport {
    /// Operations left unsynced by this pass.
    pub fn unsynced_count(&self) -> usize {
        self.failed.len() + self.deferred.len()
    }

    pub fn is_clean(&self) -> bool {
        self.unsynced_count() == 0
    }

    /// One-line message suitable for showing to the user.
    pub fn summary(&self) -> String {
        match (self.unsynced_count(), self.succeeded.len()) {
            (0, 1) => "1 change synced".to_string(),
            (0, n) => format!("{n} changes synced"),
            (1, _) => "1 change could not be synced".to_string(),
            (n, _) => format!("{n} changes could not be synced"),
        }
    }
}

/// Why a sync request did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Offline,
    AlreadySyncing,
}

/// Outcome of [`SyncEngine::sync`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Completed(SyncReport),
    Skipped(SkipReason),
}

impl SyncOutcome {
    pub fn report(&self) -> Option<&SyncReport> {
        match self {
            SyncOutcome::Completed(report) => Some(report),
            SyncOutcome::Skipped(_) => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, SyncOutcome::Skipped(_))
    }
}

/// Clears the syncing flag however the pass ends.
struct SyncingGuard<'a>(&'a AtomicBool);

impl Drop for SyncingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives sync passes. At most one pass runs at a time.
pub struct SyncEngine {
    remote: Arc<dyn RemoteStore>,
    queue: Arc<Mutex<MutationQueue>>,
    online: watch::Receiver<ConnectivityState>,
    retry: RetryPolicy,
    syncing: AtomicBool,
    retries: Mutex<HashMap<OperationId, RetryState>>,
}

impl SyncEngine {
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        queue: Arc<Mutex<MutationQueue>>,
        online: watch::Receiver<ConnectivityState>,
    ) -> Self {
        Self {
            remote,
            queue,
            online,
            retry: RetryPolicy::default(),
            syncing: AtomicBool::new(false),
            retries: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing.load(Ordering::Acquire)
    }

    pub fn is_online(&self) -> bool {
        self.online.borrow().online
    }

    /// Run one sync pass.
    ///
    /// Skips when offline or when another pass is in flight. Operations
    /// enqueued while the pass runs wait for the next one.
    pub async fn sync(&self) -> SyncOutcome {
        if !self.is_online() {
            tracing::debug!("sync skipped: offline");
            return SyncOutcome::Skipped(SkipReason::Offline);
        }
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("sync skipped: pass already running");
            return SyncOutcome::Skipped(SkipReason::AlreadySyncing);
        }
        let _guard = SyncingGuard(&self.syncing);

        let mut batch = self.queue.lock().await.snapshot();
        if batch.is_empty() {
            return SyncOutcome::Completed(SyncReport::default());
        }
        tracing::info!(pending = batch.len(), "sync pass started");

        let mut report = self.replay(&mut batch).await;

        let synced: HashSet<OperationId> = batch
            .iter()
            .filter(|op| op.synced)
            .map(|op| op.id.clone())
            .collect();
        report.remaining = match with_queue_blocking(&self.queue, move |queue| {
            queue.remove(&synced);
            queue.len()
        })
        .await
        {
            Ok(remaining) => remaining,
            Err(e) => {
                tracing::error!(error = %e, "failed to remove synced operations");
                self.queue.lock().await.len()
            }
        };

        if report.is_clean() {
            tracing::info!(synced = report.succeeded.len(), "sync pass finished");
        } else {
            tracing::warn!(
                synced = report.succeeded.len(),
                failed = report.failed.len(),
                deferred = report.deferred.len(),
                remaining = report.remaining,
                "{}",
                report.summary()
            );
        }

        SyncOutcome::Completed(report)
    }

    async fn replay(&self, batch: &mut [PendingOperation]) -> SyncReport {
        let mut report = SyncReport::default();
        let mut retries = self.retries.lock().await;
        {
            let queued: HashSet<&str> = batch.iter().map(|op| op.id.as_str()).collect();
            retries.retain(|id, _| queued.contains(id.as_str()));
        }

        // Records with an earlier unsynced operation in this pass.
        let mut blocked: HashSet<(ResourceName, RecordKey)> = HashSet::new();
        let started = Instant::now();

        for op in batch.iter_mut() {
            let record = op.key().map(|key| (op.resource.clone(), key.clone()));
            let is_blocked = record.as_ref().is_some_and(|r| blocked.contains(r));
            let backing_off = retries
                .get(&op.id)
                .and_then(|state| state.not_before)
                .is_some_and(|at| at > started);

            if is_blocked || backing_off {
                tracing::debug!(
                    op_id = %op.id,
                    resource = %op.resource,
                    blocked = is_blocked,
                    "deferring operation"
                );
                blocked.extend(record);
                report.deferred.push(op.id.clone());
                continue;
            }

            match self.apply(op).await {
                Ok(()) => {
                    op.synced = true;
                    retries.remove(&op.id);
                    report.succeeded.push(op.id.clone());
                }
                Err(error) => {
                    let state = retries.entry(op.id.clone()).or_insert(RetryState {
                        failures: 0,
                        not_before: None,
                    });
                    state.failures = state.failures.saturating_add(1);
                    state.not_before = self
                        .retry
                        .delay_after(state.failures)
                        .map(|delay| Instant::now() + delay);

                    tracing::warn!(
                        op_id = %op.id,
                        resource = %op.resource,
                        kind = %op.kind(),
                        attempts = state.failures,
                        error = %error,
                        "failed to sync operation"
                    );

                    blocked.extend(record);
                    report.failed.push(FailedOperation {
                        id: op.id.clone(),
                        resource: op.resource.clone(),
                        kind: op.kind(),
                        error: error.to_string(),
                    });
                }
            }
        }

        report
    }

    async fn apply(&self, op: &PendingOperation) -> Result<(), ApplyError> {
        let call = async {
            match &op.mutation {
                Mutation::Insert { payload, .. } => self.remote.create(&op.resource, payload).await,
                Mutation::Update { key, payload } => {
                    self.remote.update(&op.resource, key, payload).await
                }
                Mutation::Delete { key } => self.remote.delete(&op.resource, key).await,
            }
        };

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(result) => result.map_err(ApplyError::from),
            Err(panic) => Err(ApplyError::Panicked(panic_message(panic.as_ref()))),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
