use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

/// Tracks whether the network is believed reachable.
///
/// This is advisory: a failing request is still the authoritative signal
/// for that request. Losing the event feed resets the flag to reachable.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    state: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_reachable: bool) -> Self {
        let (state, _) = watch::channel(initially_reachable);
        Self { state }
    }

    pub fn is_reachable(&self) -> bool {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    pub fn set_reachable(&self, reachable: bool) {
        let changed = self.state.send_if_modified(|current| {
            if *current == reachable {
                false
            } else {
                *current = reachable;
                true
            }
        });
        if changed {
            info!(reachable = reachable, "Connectivity changed");
        }
    }

    /// Follows `events` on a background task until the sender goes away.
    pub fn attach(&self, mut events: mpsc::Receiver<ConnectivityEvent>) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                monitor.set_reachable(event == ConnectivityEvent::Online);
            }
            warn!("Connectivity event feed closed, assuming reachable");
            monitor.set_reachable(true);
        })
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
