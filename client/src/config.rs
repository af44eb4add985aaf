//! Configuration management for the sync agent.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::sync::{RetryPolicy, SyncOptions};

/// Agent configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote data store
    pub remote_url: String,
    /// Bearer token sent with every remote request
    pub api_key: Option<String>,
    /// Directory holding the persisted queue
    pub data_dir: PathBuf,
    /// Upper bound for a single remote request
    pub request_timeout: Duration,
    /// How often reachability is probed
    pub probe_interval: Duration,
    /// Retry behaviour for failed operations
    pub retry: RetryPolicy,
    /// Fixed node identifier; a fresh one is generated per session when unset
    pub node_id: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let remote_url = lookup("REMOTE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::MissingRemoteUrl)?;

        let api_key = lookup("API_KEY").filter(|key| !key.is_empty());

        let data_dir = lookup("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".crewsync"));

        let request_timeout = parse_seconds(&lookup, "REQUEST_TIMEOUT_SECS", 15)?;
        let probe_interval = parse_seconds(&lookup, "PROBE_INTERVAL_SECS", 10)?;

        let retry = match parse_number(&lookup, "RETRY_INITIAL_DELAY_MS")? {
            None | Some(0) => RetryPolicy::Immediate,
            Some(initial) => RetryPolicy::Backoff {
                initial: Duration::from_millis(initial),
                max: Duration::from_secs(
                    parse_number(&lookup, "RETRY_MAX_DELAY_SECS")?.unwrap_or(300),
                ),
            },
        };

        let node_id = lookup("NODE_ID").filter(|id| !id.is_empty());

        Ok(Self {
            remote_url,
            api_key,
            data_dir,
            request_timeout,
            probe_interval,
            retry,
            node_id,
        })
    }

    /// Options for the sync service derived from this configuration.
    pub fn sync_options(&self) -> SyncOptions {
        let options = SyncOptions::default().retry_policy(self.retry);
        match &self.node_id {
            Some(node_id) => options.node_id(node_id.clone()),
            None => options,
        }
    }
}

fn parse_number<F>(lookup: &F, name: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { name, value }),
    }
}

/// A positive number of seconds; zero is rejected.
fn parse_seconds<F>(lookup: &F, name: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_number(lookup, name)?.unwrap_or(default) {
        0 => Err(ConfigError::InvalidNumber {
            name,
            value: "0".to_string(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("REMOTE_URL environment variable is required")]
    MissingRemoteUrl,

    #[error("Invalid {name} value: {value:?}")]
    InvalidNumber { name: &'static str, value: String },
}
