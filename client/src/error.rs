//! Unified error handling for the client.

use crate::config::ConfigError;
use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Engine error: {0}")]
    Engine(#[from] crewsync_engine::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Queue task cancelled: {0}")]
    Cancelled(#[from] tokio::task::JoinError),
}

/// Why a single pending operation could not be applied remotely.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error("remote call panicked: {0}")]
    Panicked(String),
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
