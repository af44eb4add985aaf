//! REST client for the remote data store.

use std::time::Duration;

use crewsync_engine::RecordKey;
use futures::future::BoxFuture;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;

use super::{RemoteError, RemoteResult, RemoteStore};

/// [`RemoteStore`] speaking plain REST.
///
/// | operation | request                         |
/// |-----------|---------------------------------|
/// | create    | `POST {base}/{resource}`        |
/// | update    | `PATCH {base}/{resource}/{key}` |
/// | delete    | `DELETE {base}/{resource}/{key}`|
/// | ping      | `GET {base}/health`             |
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpRemoteStore {
    /// Create a client for `base_url`. Every request is bounded by `timeout`.
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> RemoteResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| RemoteError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Append `segments` to the base URL, percent-encoding each one.
    ///
    /// `.` and `..` are refused: the URL parser would drop them and the
    /// request would land on a different resource.
    fn url(&self, segments: &[&str]) -> RemoteResult<Url> {
        if let Some(segment) = segments.iter().find(|s| matches!(**s, "." | "..")) {
            return Err(RemoteError::InvalidUrl(format!(
                "path segment '{segment}' is not allowed"
            )));
        }

        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> RemoteResult<()> {
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

impl RemoteStore for HttpRemoteStore {
    fn create<'a>(
        &'a self,
        resource: &'a str,
        payload: &'a Value,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let request = self.client.post(self.url(&[resource])?).json(payload);
            self.send(request).await
        })
    }

    fn update<'a>(
        &'a self,
        resource: &'a str,
        key: &'a RecordKey,
        payload: &'a Value,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let request = self
                .client
                .patch(self.url(&[resource, key.as_str()])?)
                .json(payload);
            self.send(request).await
        })
    }

    fn delete<'a>(
        &'a self,
        resource: &'a str,
        key: &'a RecordKey,
    ) -> BoxFuture<'a, RemoteResult<()>> {
        Box::pin(async move {
            let request = self.client.delete(self.url(&[resource, key.as_str()])?);
            match self.send(request).await {
                Ok(()) => Ok(()),
                // Already gone: a replayed delete has nothing left to do.
                Err(RemoteError::Status { status: 404, .. }) => {
                    tracing::debug!(resource, key = %key, "record already deleted remotely");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
    }

    fn ping(&self) -> BoxFuture<'_, RemoteResult<()>> {
        Box::pin(async move {
            let request = self.client.get(self.url(&["health"])?);
            self.send(request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base: &str) -> HttpRemoteStore {
        HttpRemoteStore::new(base, None, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn builds_resource_urls() {
        let remote = store("https://api.example.com/rest/v1/");
        assert_eq!(
            remote.url(&["time_entries"]).unwrap().as_str(),
            "https://api.example.com/rest/v1/time_entries"
        );
        assert_eq!(
            remote.url(&["workers", "w 1/2"]).unwrap().as_str(),
            "https://api.example.com/rest/v1/workers/w%201%2F2"
        );
    }

    #[test]
    fn base_without_path() {
        let remote = store("http://localhost:8080");
        assert_eq!(
            remote.url(&["health"]).unwrap().as_str(),
            "http://localhost:8080/health"
        );
    }

    #[test]
    fn refuses_dot_segments() {
        let remote = store("https://api.example.com/rest/v1/");
        for key in [".", ".."] {
            assert!(matches!(
                remote.url(&["workers", key]),
                Err(RemoteError::InvalidUrl(_))
            ));
        }
        assert_eq!(
            remote.url(&["workers", "..."]).unwrap().as_str(),
            "https://api.example.com/rest/v1/workers/..."
        );
    }

    #[test]
    fn rejects_invalid_base() {
        for base in ["not a url", "mailto:crew@example.com"] {
            assert!(matches!(
                HttpRemoteStore::new(base, None, Duration::from_secs(1)),
                Err(RemoteError::InvalidUrl(_))
            ));
        }
    }
}
