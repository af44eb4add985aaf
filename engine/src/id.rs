//! Operation ID generation.
//!
//! IDs combine a node identifier, the creation timestamp and a per-generator
//! counter. The timestamp alone is not unique under rapid sequential
//! creation; the counter is. The node ID keeps generators from different
//! sessions apart.

use crate::{NodeId, OperationId, Timestamp};
use serde::{Deserialize, Serialize};

/// Generates unique operation IDs of the form `<node>-<timestamp>-<counter>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpIdGenerator {
    /// Unique identifier for the generating node (usually one per session)
    pub node_id: NodeId,
    /// Monotonically increasing counter
    pub counter: u64,
}

impl OpIdGenerator {
    /// Create a generator for a node, starting at counter 0.
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
            counter: 0,
        }
    }

    /// Create a generator with a specific counter value.
    pub fn with_counter(node_id: impl Into<NodeId>, counter: u64) -> Self {
        Self {
            node_id: node_id.into(),
            counter,
        }
    }

    /// Produce the next ID.
    pub fn next_id(&mut self, timestamp: Timestamp) -> OperationId {
        self.counter += 1;
        format!("{}-{}-{}", self.node_id, timestamp, self.counter)
    }

    /// Account for an existing ID so later IDs from this node never repeat it.
    ///
    /// IDs from other nodes, or not in this generator's format, are ignored.
    pub fn observe(&mut self, id: &str) {
        let counter = id
            .strip_prefix(self.node_id.as_str())
            .and_then(|rest| rest.strip_prefix('-'))
            .and_then(|rest| rest.split_once('-'))
            .filter(|(timestamp, _)| timestamp.parse::<Timestamp>().is_ok())
            .and_then(|(_, counter)| counter.parse::<u64>().ok());

        if let Some(counter) = counter {
            self.counter = self.counter.max(counter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn new_generator_starts_at_zero() {
        let ids = OpIdGenerator::new("node-1");
        assert_eq!(ids.counter, 0);
        assert_eq!(ids.node_id, "node-1");
    }

    #[test]
    fn id_format() {
        let mut ids = OpIdGenerator::new("node-1");
        assert_eq!(ids.next_id(1000), "node-1-1000-1");
        assert_eq!(ids.next_id(1000), "node-1-1000-2");
    }

    #[test]
    fn unique_within_same_millisecond() {
        let mut ids = OpIdGenerator::new("node-1");
        let generated: HashSet<_> = (0..1000).map(|_| ids.next_id(1706745600000)).collect();
        assert_eq!(generated.len(), 1000);
    }

    #[test]
    fn different_nodes_never_collide() {
        let mut a = OpIdGenerator::new("node-a");
        let mut b = OpIdGenerator::new("node-b");
        assert_ne!(a.next_id(1000), b.next_id(1000));
    }

    #[test]
    fn observe_skips_past_restored_ids() {
        let mut ids = OpIdGenerator::new("tablet-1");
        ids.observe("tablet-1-1000-7");
        ids.observe("tablet-1-1000-3");
        ids.observe("tablet-12-1000-99");
        ids.observe("other-1000-50");
        ids.observe("tablet-1-garbage");
        assert_eq!(ids.counter, 7);
        assert_eq!(ids.next_id(1000), "tablet-1-1000-8");
    }

    #[test]
    fn resumes_from_counter() {
        let mut ids = OpIdGenerator::with_counter("node-1", 41);
        assert_eq!(ids.next_id(5), "node-1-5-42");
    }
}
