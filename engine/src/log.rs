//! Operation log - the ordered in-memory list of pending operations.
//!
//! The log holds operations in insertion order, which is also the order
//! they are replayed in. It performs no IO; persistence is layered on top
//! through [`QueueSnapshot`](crate::QueueSnapshot).

use crate::{
    error::Result, OpIdGenerator, OperationId, OperationKind, PendingOperation, Schema, Timestamp,
};
use std::collections::HashSet;

/// Ordered log of operations waiting to be synced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationLog {
    operations: Vec<PendingOperation>,
}

impl OperationLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self {
            operations: Vec::new(),
        }
    }

    /// Create a log from operations already in replay order.
    pub fn from_operations(operations: Vec<PendingOperation>) -> Self {
        Self { operations }
    }

    /// Validate a mutation request and append it as a new operation.
    ///
    /// Every call appends a fresh entry, even when an earlier entry targets
    /// the same record; entries are never merged.
    pub fn record(
        &mut self,
        schema: &Schema,
        ids: &mut OpIdGenerator,
        resource: &str,
        kind: OperationKind,
        payload: serde_json::Value,
        timestamp: Timestamp,
    ) -> Result<&PendingOperation> {
        let mutation = schema.build_mutation(resource, kind, payload)?;
        let id = ids.next_id(timestamp);
        Ok(self.push(PendingOperation::new(id, resource, mutation, timestamp)))
    }

    fn push(&mut self, operation: PendingOperation) -> &PendingOperation {
        self.operations.push(operation);
        &self.operations[self.operations.len() - 1]
    }

    /// Get all pending operations in replay order.
    pub fn operations(&self) -> &[PendingOperation] {
        &self.operations
    }

    /// Get an operation by ID.
    pub fn get(&self, id: &str) -> Option<&PendingOperation> {
        self.operations.iter().find(|op| op.id == id)
    }

    /// Count of pending operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Remove acknowledged operations, keeping the order of the rest.
    ///
    /// Returns how many operations were removed.
    pub fn remove(&mut self, ids: &HashSet<OperationId>) -> usize {
        let before = self.operations.len();
        self.operations.retain(|op| !ids.contains(&op.id));
        before - self.operations.len()
    }

    /// Clear all pending operations.
    pub fn clear(&mut self) {
        self.operations.clear();
    }

    /// Oldest pending operation timestamp, for staleness display.
    pub fn oldest_timestamp(&self) -> Option<Timestamp> {
        self.operations.first().map(|op| op.created_at)
    }
}
