//! Newline-delimited JSON commands understood by `crewsync-agent`.
//!
//! A bare mutation line is queued:
//!
//! ```json
//! {"resource": "time_entries", "kind": "insert", "payload": {"worker_id": "w-1", "hours": 8}}
//! ```
//!
//! Other lines carry a `command` tag: `sync`, `status`, `pending` or `clear`.
//! Every line gets one JSON response line.

use crewsync_engine::OperationKind;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::sync::{OfflineSync, SyncOutcome};

/// A command read from the agent's input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum AgentCommand {
    Enqueue {
        resource: String,
        kind: OperationKind,
        payload: Value,
    },
    Sync,
    Status,
    Pending,
    Clear,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Line {
    Command(AgentCommand),
    Mutation {
        resource: String,
        kind: OperationKind,
        payload: Value,
    },
}

impl AgentCommand {
    /// Parse one input line.
    pub fn parse(line: &str) -> Result<Self> {
        Ok(match serde_json::from_str(line)? {
            Line::Command(command) => command,
            Line::Mutation {
                resource,
                kind,
                payload,
            } => AgentCommand::Enqueue {
                resource,
                kind,
                payload,
            },
        })
    }

    /// Run the command against `sync`, producing the response line.
    pub async fn execute(self, sync: &OfflineSync) -> Result<Value> {
        match self {
            AgentCommand::Enqueue {
                resource,
                kind,
                payload,
            } => {
                let id = sync.enqueue(&resource, kind, payload).await?;
                Ok(json!({ "queued": id }))
            }
            AgentCommand::Sync => Ok(outcome_json(&sync.sync_pending_operations().await)),
            AgentCommand::Status => Ok(serde_json::to_value(sync.status().await)?),
            AgentCommand::Pending => Ok(serde_json::to_value(sync.pending_operations().await)?),
            AgentCommand::Clear => {
                let discarded = sync.pending_count().await;
                sync.clear().await;
                Ok(json!({ "cleared": discarded }))
            }
        }
    }
}

fn outcome_json(outcome: &SyncOutcome) -> Value {
    match outcome {
        SyncOutcome::Completed(report) => json!({
            "outcome": "completed",
            "message": report.summary(),
            "report": report,
        }),
        SyncOutcome::Skipped(reason) => json!({
            "outcome": "skipped",
            "reason": reason,
        }),
    }
}
