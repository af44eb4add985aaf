//! Operation types for queued mutations.
//!
//! A local write is captured as a [`PendingOperation`] and replayed against the
//! remote data store later. The mutation itself is a tagged sum type so that
//! dispatch never depends on loosely-typed strings.

use crate::{ResourceName, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a queued operation.
pub type OperationId = String;

/// The kind of write an operation performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Insert => write!(f, "insert"),
            OperationKind::Update => write!(f, "update"),
            OperationKind::Delete => write!(f, "delete"),
        }
    }
}

/// Key identifying a single record within a resource.
///
/// Integer keys are normalized to their decimal string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for RecordKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// A validated mutation against a single resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Mutation {
    /// Create a record. The key is only known when the caller assigned one.
    Insert {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        key: Option<RecordKey>,
        payload: serde_json::Value,
    },
    /// Patch an existing record.
    Update {
        key: RecordKey,
        payload: serde_json::Value,
    },
    /// Delete an existing record.
    Delete { key: RecordKey },
}

impl Mutation {
    /// The kind of this mutation.
    pub fn kind(&self) -> OperationKind {
        match self {
            Mutation::Insert { .. } => OperationKind::Insert,
            Mutation::Update { .. } => OperationKind::Update,
            Mutation::Delete { .. } => OperationKind::Delete,
        }
    }

    /// The record key, if known.
    pub fn key(&self) -> Option<&RecordKey> {
        match self {
            Mutation::Insert { key, .. } => key.as_ref(),
            Mutation::Update { key, .. } | Mutation::Delete { key } => Some(key),
        }
    }

    /// The field values carried by this mutation. Deletes carry none.
    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            Mutation::Insert { payload, .. } | Mutation::Update { payload, .. } => Some(payload),
            Mutation::Delete { .. } => None,
        }
    }
}

/// A mutation waiting to be applied remotely.
///
/// Operations are immutable once queued; they are only ever removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    /// Operation ID
    pub id: OperationId,
    /// Target resource (collection/table)
    pub resource: ResourceName,
    /// The validated mutation
    pub mutation: Mutation,
    /// Creation time in milliseconds since the Unix epoch
    pub created_at: Timestamp,
    /// Set on in-flight copies once the remote store confirmed the write.
    #[serde(skip)]
    pub synced: bool,
}

impl PendingOperation {
    /// Create a new pending operation.
    pub fn new(
        id: impl Into<OperationId>,
        resource: impl Into<ResourceName>,
        mutation: Mutation,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            resource: resource.into(),
            mutation,
            created_at,
            synced: false,
        }
    }

    /// The kind of write this operation performs.
    pub fn kind(&self) -> OperationKind {
        self.mutation.kind()
    }

    /// The record key this operation targets, if known.
    pub fn key(&self) -> Option<&RecordKey> {
        self.mutation.key()
    }

    /// Whether both operations target the same known record.
    pub fn same_record(&self, other: &PendingOperation) -> bool {
        match (self.key(), other.key()) {
            (Some(a), Some(b)) => self.resource == other.resource && a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(id: &str, key: &str) -> PendingOperation {
        PendingOperation::new(
            id,
            "time_entries",
            Mutation::Update {
                key: key.into(),
                payload: json!({"id": key, "hours": 8}),
            },
            1000,
        )
    }

    #[test]
    fn mutation_accessors() {
        let insert = Mutation::Insert {
            key: None,
            payload: json!({"name": "Dana"}),
        };
        assert_eq!(insert.kind(), OperationKind::Insert);
        assert!(insert.key().is_none());
        assert_eq!(insert.payload(), Some(&json!({"name": "Dana"})));

        let delete = Mutation::Delete { key: "w-1".into() };
        assert_eq!(delete.kind(), OperationKind::Delete);
        assert_eq!(delete.key().map(RecordKey::as_str), Some("w-1"));
        assert!(delete.payload().is_none());
    }

    #[test]
    fn same_record_requires_resource_and_key() {
        let a = update("op-1", "te-1");
        let b = update("op-2", "te-1");
        let c = update("op-3", "te-2");
        assert!(a.same_record(&b));
        assert!(!a.same_record(&c));

        let mut other_resource = update("op-4", "te-1");
        other_resource.resource = "daily_reports".into();
        assert!(!a.same_record(&other_resource));
    }

    #[test]
    fn unkeyed_insert_matches_nothing() {
        let insert = PendingOperation::new(
            "op-1",
            "workers",
            Mutation::Insert {
                key: None,
                payload: json!({"name": "Dana"}),
            },
            1000,
        );
        assert!(!insert.same_record(&insert.clone()));
    }

    #[test]
    fn kind_display() {
        assert_eq!(OperationKind::Insert.to_string(), "insert");
        assert_eq!(OperationKind::Update.to_string(), "update");
        assert_eq!(OperationKind::Delete.to_string(), "delete");
    }

    #[test]
    fn serialization_format() {
        let op = update("op-1", "te-1");
        let json = serde_json::to_value(&op).unwrap();

        assert_eq!(json["mutation"]["kind"], "update");
        assert_eq!(json["mutation"]["key"], "te-1");
        assert_eq!(json["createdAt"], 1000);
        assert!(json.get("synced").is_none());
    }

    #[test]
    fn synced_marker_is_not_persisted() {
        let mut op = update("op-1", "te-1");
        op.synced = true;

        let json = serde_json::to_string(&op).unwrap();
        let parsed: PendingOperation = serde_json::from_str(&json).unwrap();
        assert!(!parsed.synced);
        assert_eq!(parsed.id, "op-1");
    }

    #[test]
    fn insert_without_key_omits_field() {
        let op = PendingOperation::new(
            "op-1",
            "workers",
            Mutation::Insert {
                key: None,
                payload: json!({"name": "Dana"}),
            },
            1000,
        );
        let json = serde_json::to_value(&op).unwrap();
        assert!(json["mutation"].get("key").is_none());
    }
}
