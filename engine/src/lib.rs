//! # CrewSync Engine
//!
//! The deterministic core of the CrewSync offline mutation queue.
//!
//! Field crews keep working when a construction site has no signal. Every
//! write they make is captured as a pending operation, kept in order, and
//! replayed against the remote data store once connectivity returns. This
//! crate holds the pieces of that pipeline that need no IO.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine knows nothing about files, network, or clocks;
//!   timestamps are passed in
//! - **Validated at the edge**: payloads are checked against a resource
//!   schema before they are queued
//! - **Ordered**: insertion order is replay order, and entries are never merged
//!
//! ## Core Concepts
//!
//! ### Operations
//!
//! A [`PendingOperation`] wraps a typed [`Mutation`]:
//! - [`Mutation::Insert`] - create a record
//! - [`Mutation::Update`] - patch a record identified by its [`RecordKey`]
//! - [`Mutation::Delete`] - delete a record identified by its [`RecordKey`]
//!
//! ### Schema
//!
//! A [`Schema`] declares the resources that may be written offline, their
//! key field, and field types. [`Schema::build_mutation`] turns a raw JSON
//! payload into a [`Mutation`] or rejects it.
//!
//! ### Operation Log
//!
//! The [`OperationLog`] is the ordered list of pending operations, and
//! [`QueueSnapshot`] is its persisted form.
//!
//! ## Quick Start
//!
//! ```rust
//! use crewsync_engine::{
//!     FieldDef, FieldType, OpIdGenerator, OperationKind, OperationLog, QueueSnapshot,
//!     ResourceSchema, Schema,
//! };
//! use serde_json::json;
//!
//! // 1. Declare the resources that may be written offline
//! let schema = Schema::new().with_resource(ResourceSchema::new(
//!     "time_entries",
//!     vec![
//!         FieldDef::required("worker_id", FieldType::String),
//!         FieldDef::required("hours", FieldType::Float),
//!     ],
//! ));
//!
//! // 2. Record mutations
//! let mut ids = OpIdGenerator::new("device-1");
//! let mut log = OperationLog::new();
//! log.record(
//!     &schema,
//!     &mut ids,
//!     "time_entries",
//!     OperationKind::Insert,
//!     json!({"worker_id": "w-1", "hours": 7.5}),
//!     1706745600000,
//! )
//! .unwrap();
//!
//! // 3. Persist and restore
//! let json = QueueSnapshot::from_log(&log).to_json().unwrap();
//! let restored = QueueSnapshot::from_json(&json).unwrap().into_log();
//! assert_eq!(restored.len(), 1);
//! ```

pub mod error;
pub mod id;
pub mod log;
pub mod operation;
pub mod schema;
pub mod snapshot;

// Re-export main types at crate root
pub use error::Error;
pub use id::OpIdGenerator;
pub use log::OperationLog;
pub use operation::{Mutation, OperationId, OperationKind, PendingOperation, RecordKey};
pub use schema::{FieldDef, FieldType, ResourceSchema, Schema, DEFAULT_KEY_FIELD};
pub use snapshot::{QueueSnapshot, SnapshotMetadata, SNAPSHOT_FORMAT_VERSION};

/// Type aliases for clarity
pub type ResourceName = String;
pub type NodeId = String;
pub type Timestamp = u64;
