// Shared across test binaries; not every file uses every helper.
#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crewsync_client::remote::{RemoteError, RemoteResult, RemoteStore};
use crewsync_client::resources::default_schema;
use crewsync_client::{ManualConnectivity, MemoryStore, OfflineSync, SyncOptions};
use crewsync_engine::RecordKey;
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::{Notify, Semaphore};

/// One call received by [`ScriptedRemote`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { resource: String, payload: Value },
    Update { resource: String, key: String, payload: Value },
    Delete { resource: String, key: String },
}

impl Call {
    pub fn key(&self) -> Option<&str> {
        match self {
            Call::Create { payload, .. } => payload.get("id").and_then(Value::as_str),
            Call::Update { key, .. } | Call::Delete { key, .. } => Some(key),
        }
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            Call::Create { payload, .. } | Call::Update { payload, .. } => Some(payload),
            Call::Delete { .. } => None,
        }
    }
}

/// In-process remote store with scriptable failures.
#[derive(Default)]
pub struct ScriptedRemote {
    calls: Mutex<Vec<Call>>,
    failing_calls: Mutex<HashSet<usize>>,
    failing_keys: Mutex<HashSet<String>>,
    panicking_keys: Mutex<HashSet<String>>,
    gate: Option<Semaphore>,
    started: Notify,
}

impl ScriptedRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Every call blocks until [`open_gate`](Self::open_gate).
    pub fn gated() -> Arc<Self> {
        Arc::new(Self {
            gate: Some(Semaphore::new(0)),
            ..Self::default()
        })
    }

    pub fn open_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1000);
        }
    }

    /// Fail the n-th call (1-based) ever received.
    pub fn fail_call(&self, number: usize) {
        self.failing_calls.lock().unwrap().insert(number);
    }

    /// Fail every call touching `key`.
    pub fn fail_key(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    /// Panic inside every call touching `key`.
    pub fn panic_on_key(&self, key: &str) {
        self.panicking_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn heal(&self) {
        self.failing_calls.lock().unwrap().clear();
        self.failing_keys.lock().unwrap().clear();
        self.panicking_keys.lock().unwrap().clear();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Resolves once a call has been received.
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    async fn handle(&self, call: Call) -> RemoteResult<()> {
        let key = call.key().unwrap_or_default().to_string();
        let number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(call);
            calls.len()
        };
        self.started.notify_one();

        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }

        let explode = self.panicking_keys.lock().unwrap().contains(&key);
        if explode {
            panic!("remote exploded on {key}");
        }

        let fail = self.failing_calls.lock().unwrap().contains(&number)
            || self.failing_keys.lock().unwrap().contains(&key);
        if fail {
            return Err(RemoteError::Status {
                status: 500,
                message: format!("rejected call {number} for {key}"),
            });
        }
        Ok(())
    }
}

impl RemoteStore for ScriptedRemote {
    fn create<'a>(&'a self, resource: &'a str, payload: &'a Value) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(self.handle(Call::Create {
            resource: resource.to_string(),
            payload: payload.clone(),
        }))
    }

    fn update<'a>(
        &'a self,
        resource: &'a str,
        key: &'a RecordKey,
        payload: &'a Value,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(self.handle(Call::Update {
            resource: resource.to_string(),
            key: key.to_string(),
            payload: payload.clone(),
        }))
    }

    fn delete<'a>(&'a self, resource: &'a str, key: &'a RecordKey) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(self.handle(Call::Delete {
            resource: resource.to_string(),
            key: key.to_string(),
        }))
    }
}

/// Service over the default workforce schema with a fixed node id.
pub fn service(
    remote: &Arc<ScriptedRemote>,
    store: &Arc<MemoryStore>,
    connectivity: &ManualConnectivity,
) -> OfflineSync {
    service_with(remote, store, connectivity, SyncOptions::default())
}

pub fn service_with(
    remote: &Arc<ScriptedRemote>,
    store: &Arc<MemoryStore>,
    connectivity: &ManualConnectivity,
    options: SyncOptions,
) -> OfflineSync {
    OfflineSync::with_options(
        default_schema(),
        store.clone(),
        remote.clone(),
        connectivity,
        options.node_id("tablet-1"),
    )
}

/// Wait until the service's queue holds exactly `expected` entries.
pub async fn wait_for_pending(sync: &OfflineSync, expected: usize) {
    for _ in 0..200 {
        if sync.pending_count().await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "expected {expected} pending operations, still have {}",
        sync.pending_count().await
    );
}

/// Give background tasks a chance to run.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
