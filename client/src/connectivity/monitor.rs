//! Change notifications on top of a connectivity source.

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{ConnectivitySource, ConnectivityState};

/// Observes a [`ConnectivitySource`] and reports state transitions.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    rx: watch::Receiver<ConnectivityState>,
}

impl ConnectivityMonitor {
    pub fn new(source: &dyn ConnectivitySource) -> Self {
        Self { rx: source.watch() }
    }

    /// Current state.
    pub fn is_online(&self) -> bool {
        self.rx.borrow().online
    }

    /// Receiver for the raw state channel.
    pub fn receiver(&self) -> watch::Receiver<ConnectivityState> {
        self.rx.clone()
    }

    /// Register a callback for connectivity changes.
    ///
    /// The callback runs once with the current state before this returns,
    /// then once for every change. The same state is never reported twice in
    /// a row. A flap that completes before the callback task wakes is still
    /// delivered as a round trip, so every return to online is seen.
    /// Delivery stops when the returned [`Subscription`] is dropped or the
    /// source goes away.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<F>(&self, mut callback: F) -> Subscription
    where
        F: FnMut(bool) + Send + 'static,
    {
        let mut rx = self.rx.clone();
        let mut last = *rx.borrow_and_update();
        callback(last.online);

        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let current = *rx.borrow_and_update();
                for online in missed_transitions(last, current) {
                    callback(online);
                }
                last = current;
            }
        });

        Subscription { task }
    }
}

/// Transitions to report when moving from `last` to `current`.
///
/// Only parity of the generation gap matters: an even gap with the same
/// state is a round trip, an odd gap is a single edge. Longer runs collapse
/// to the shortest sequence ending in the same state.
fn missed_transitions(last: ConnectivityState, current: ConnectivityState) -> Vec<bool> {
    let gap = current.generation.wrapping_sub(last.generation);
    if gap == 0 {
        Vec::new()
    } else if current.online != last.online {
        vec![current.online]
    } else {
        vec![!current.online, current.online]
    }
}

/// Handle for an active [`ConnectivityMonitor::subscribe`] registration.
#[derive(Debug)]
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop delivery. Equivalent to dropping the handle.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ManualConnectivity;
    use std::time::Duration;
    use tokio::sync::mpsc;

    async fn next(rx: &mut mpsc::UnboundedReceiver<bool>) -> Option<bool> {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .ok()
            .flatten()
    }

    #[tokio::test]
    async fn reports_current_state_immediately() {
        let connectivity = ManualConnectivity::new(true);
        let monitor = ConnectivityMonitor::new(&connectivity);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = monitor.subscribe(move |online| {
            let _ = tx.send(online);
        });

        assert_eq!(rx.try_recv().ok(), Some(true));
    }

    #[tokio::test]
    async fn reports_each_transition_once() {
        let connectivity = ManualConnectivity::new(false);
        let monitor = ConnectivityMonitor::new(&connectivity);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = monitor.subscribe(move |online| {
            let _ = tx.send(online);
        });
        assert_eq!(next(&mut rx).await, Some(false));

        connectivity.set_online(true);
        assert_eq!(next(&mut rx).await, Some(true));

        connectivity.set_online(true);
        connectivity.set_online(false);
        assert_eq!(next(&mut rx).await, Some(false));
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn flap_before_wakeup_is_reported_as_round_trip() {
        let connectivity = ManualConnectivity::new(true);
        let monitor = ConnectivityMonitor::new(&connectivity);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let _subscription = monitor.subscribe(move |online| {
            let _ = tx.send(online);
        });
        assert_eq!(next(&mut rx).await, Some(true));

        // No await between the flips, so the task sees only the final value.
        connectivity.set_online(false);
        connectivity.set_online(true);

        assert_eq!(next(&mut rx).await, Some(false));
        assert_eq!(next(&mut rx).await, Some(true));
    }

    #[test]
    fn missed_transitions_follow_generation_gap() {
        let state = |online, generation| ConnectivityState { online, generation };

        assert!(missed_transitions(state(true, 4), state(true, 4)).is_empty());
        assert_eq!(missed_transitions(state(false, 0), state(true, 1)), vec![true]);
        assert_eq!(
            missed_transitions(state(true, 0), state(true, 2)),
            vec![false, true]
        );
        assert_eq!(missed_transitions(state(false, 1), state(true, 4)), vec![true]);
        assert_eq!(
            missed_transitions(state(false, 2), state(false, 6)),
            vec![true, false]
        );
    }

    #[tokio::test]
    async fn cancelled_subscription_stops_delivery() {
        let connectivity = ManualConnectivity::new(false);
        let monitor = ConnectivityMonitor::new(&connectivity);

        let (tx, mut rx) = mpsc::unbounded_channel();
        let subscription = monitor.subscribe(move |online| {
            let _ = tx.send(online);
        });
        assert_eq!(next(&mut rx).await, Some(false));

        subscription.cancel();
        connectivity.set_online(true);

        // The aborted task drops the callback, closing the channel.
        assert_eq!(next(&mut rx).await, None);
    }
}
