//! The remote data store that pending operations are replayed against.

mod http;

pub use http::HttpRemoteStore;

use crewsync_engine::RecordKey;
use futures::future::BoxFuture;
use serde_json::Value;

/// Errors reported by a remote store.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("Remote rejected request with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    #[error("Remote unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for remote calls.
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Row-level create, update and delete against named resources.
///
/// Methods return boxed futures so the store can be shared as
/// `Arc<dyn RemoteStore>`.
pub trait RemoteStore: Send + Sync {
    /// Create a record from `payload`.
    fn create<'a>(&'a self, resource: &'a str, payload: &'a Value)
        -> BoxFuture<'a, RemoteResult<()>>;

    /// Patch the record identified by `key` with `payload`.
    fn update<'a>(
        &'a self,
        resource: &'a str,
        key: &'a RecordKey,
        payload: &'a Value,
    ) -> BoxFuture<'a, RemoteResult<()>>;

    /// Delete the record identified by `key`.
    fn delete<'a>(&'a self, resource: &'a str, key: &'a RecordKey)
        -> BoxFuture<'a, RemoteResult<()>>;

    /// Check that the store is reachable.
    fn ping(&self) -> BoxFuture<'_, RemoteResult<()>> {
        Box::pin(async { Ok(()) })
    }
}
