//! # CrewSync Client
//!
//! Offline-first write path for the CrewSync workforce app.
//!
//! Crews on a construction site often work without signal. Writes go into a
//! durable local queue first and are replayed against the remote data store,
//! in order, once the device is back online.
//!
//! ## Pieces
//!
//! - [`storage`] - where the queue is persisted ([`MemoryStore`], [`FileStore`])
//! - [`remote`] - the data store operations are replayed against
//! - [`connectivity`] - online/offline tracking and change notifications
//! - [`sync`] - the [`MutationQueue`], the [`SyncEngine`], and the
//!   [`OfflineSync`] service tying them together
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use crewsync_client::{
//!     resources::default_schema, HttpRemoteStore, ManualConnectivity, MemoryStore, OfflineSync,
//! };
//! use crewsync_engine::OperationKind;
//! use serde_json::json;
//!
//! # async fn run() -> crewsync_client::Result<()> {
//! let connectivity = ManualConnectivity::new(false);
//! let remote = HttpRemoteStore::new(
//!     "https://api.example.com/rest/v1",
//!     None,
//!     std::time::Duration::from_secs(15),
//! )?;
//! let mut sync = OfflineSync::new(
//!     default_schema(),
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(remote),
//!     &connectivity,
//! );
//! sync.start();
//!
//! sync.enqueue(
//!     "time_entries",
//!     OperationKind::Insert,
//!     json!({"worker_id": "w-1", "hours": 8}),
//! )
//! .await?;
//!
//! // Replays the queued entry.
//! connectivity.set_online(true);
//! # sync.stop().await;
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod remote;
pub mod resources;
pub mod storage;
pub mod sync;

pub use config::{Config, ConfigError};
pub use connectivity::{
    ConnectivityMonitor, ConnectivitySource, ConnectivityState, ManualConnectivity,
    ProbeConnectivity, Subscription,
};
pub use error::{ClientError, Result};
pub use remote::{HttpRemoteStore, RemoteError, RemoteStore};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use sync::{
    MutationQueue, OfflineSync, RetryPolicy, SkipReason, SyncEngine, SyncOptions, SyncOutcome,
    SyncReport, SyncStatus,
};
