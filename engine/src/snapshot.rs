//! Snapshot types for persisting and restoring the operation log.
//!
//! A snapshot is the bridge between the in-memory [`OperationLog`] and durable
//! storage. The whole ordered list is written as one blob on every change.

use crate::{error::Result, Error, OperationLog, PendingOperation, Timestamp};
use serde::{Deserialize, Serialize};

/// Version of the snapshot format for future compatibility.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// A point-in-time copy of the pending operations, in replay order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    /// Snapshot format version
    pub format_version: u32,
    /// Pending operations, oldest first
    pub operations: Vec<PendingOperation>,
}

impl QueueSnapshot {
    /// Create a new empty snapshot.
    pub fn new() -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            operations: Vec::new(),
        }
    }

    /// Capture the current state of a log.
    pub fn from_log(log: &OperationLog) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            operations: log.operations().to_vec(),
        }
    }

    /// Turn the snapshot back into a log.
    pub fn into_log(self) -> OperationLog {
        OperationLog::from_operations(self.operations)
    }

    /// Serialize to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidSnapshot(e.to_string()))
    }

    /// Deserialize from JSON.
    ///
    /// Rejects newer format versions and snapshots holding duplicate IDs.
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self =
            serde_json::from_str(json).map_err(|e| Error::InvalidSnapshot(e.to_string()))?;

        if snapshot.format_version > SNAPSHOT_FORMAT_VERSION {
            return Err(Error::InvalidSnapshot(format!(
                "unsupported snapshot format version: {} (max supported: {})",
                snapshot.format_version, SNAPSHOT_FORMAT_VERSION
            )));
        }

        let mut seen = std::collections::HashSet::new();
        for op in &snapshot.operations {
            if !seen.insert(op.id.as_str()) {
                return Err(Error::InvalidSnapshot(format!(
                    "duplicate operation id: {}",
                    op.id
                )));
            }
        }

        Ok(snapshot)
    }
}

impl Default for QueueSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of a snapshot (without the operations).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    /// Snapshot format version
    pub format_version: u32,
    /// Pending operation count
    pub pending_count: usize,
    /// Creation time of the oldest pending operation
    pub oldest_pending: Option<Timestamp>,
}

impl From<&QueueSnapshot> for SnapshotMetadata {
    fn from(snapshot: &QueueSnapshot) -> Self {
        Self {
            format_version: snapshot.format_version,
            pending_count: snapshot.operations.len(),
            oldest_pending: snapshot.operations.first().map(|op| op.created_at),
        }
    }
}
