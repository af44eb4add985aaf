//! Network reachability tracking.
//!
//! A [`ConnectivitySource`] publishes the latest [`ConnectivityState`] on a
//! `watch` channel. The [`ConnectivityMonitor`] turns that state into change
//! notifications for subscribers.

mod monitor;
mod probe;

pub use monitor::{ConnectivityMonitor, Subscription};
pub use probe::ProbeConnectivity;

use std::sync::Arc;

use tokio::sync::watch;

/// Reachability as published by a source.
///
/// `generation` counts every transition since the source was created, so a
/// receiver that wakes late can tell how many edges it slept through even
/// when `online` looks unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityState {
    pub online: bool,
    pub generation: u64,
}

impl ConnectivityState {
    pub fn new(online: bool) -> Self {
        Self {
            online,
            generation: 0,
        }
    }
}

/// Anything that knows whether the device can currently reach the network.
pub trait ConnectivitySource: Send + Sync {
    /// A receiver carrying the current state.
    fn watch(&self) -> watch::Receiver<ConnectivityState>;
}

/// Store `online` in the channel, notifying receivers only on a real change.
pub(crate) fn publish(tx: &watch::Sender<ConnectivityState>, online: bool) -> bool {
    tx.send_if_modified(|current| {
        if current.online == online {
            false
        } else {
            current.online = online;
            current.generation = current.generation.wrapping_add(1);
            true
        }
    })
}

/// Connectivity state set by hand.
///
/// Used by platform bridges that receive reachability events from the OS,
/// and by tests. Clones share the same state.
#[derive(Debug, Clone)]
pub struct ManualConnectivity {
    tx: Arc<watch::Sender<ConnectivityState>>,
}

impl ManualConnectivity {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(ConnectivityState::new(online));
        Self { tx: Arc::new(tx) }
    }

    /// Update the state. Returns `true` if it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let changed = publish(&self.tx, online);
        if changed {
            tracing::info!(online, "connectivity changed");
        }
        changed
    }

    pub fn is_online(&self) -> bool {
        self.tx.borrow().online
    }
}

impl ConnectivitySource for ManualConnectivity {
    fn watch(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }
}
