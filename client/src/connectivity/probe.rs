//! Reachability by periodically pinging the remote store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::{publish, ConnectivitySource, ConnectivityState};
use crate::remote::RemoteStore;

/// Connectivity derived from [`RemoteStore::ping`].
///
/// Starts offline and pings once per interval; the background task stops
/// when this value is dropped.
#[derive(Debug)]
pub struct ProbeConnectivity {
    tx: Arc<watch::Sender<ConnectivityState>>,
    task: JoinHandle<()>,
}

impl ProbeConnectivity {
    /// Start probing `remote` every `interval`. The first probe runs at once.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(remote: Arc<dyn RemoteStore>, interval: Duration) -> Self {
        let (tx, _) = watch::channel(ConnectivityState::new(false));
        let tx = Arc::new(tx);
        let task = tokio::spawn(probe_loop(remote, interval, tx.clone()));
        Self { tx, task }
    }

    pub fn is_online(&self) -> bool {
        self.tx.borrow().online
    }
}

impl ConnectivitySource for ProbeConnectivity {
    fn watch(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }
}

impl Drop for ProbeConnectivity {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn probe_loop(
    remote: Arc<dyn RemoteStore>,
    interval: Duration,
    tx: Arc<watch::Sender<ConnectivityState>>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let online = match remote.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "connectivity probe failed");
                false
            }
        };

        if publish(&tx, online) {
            tracing::info!(online, "connectivity changed");
        }
    }
}
