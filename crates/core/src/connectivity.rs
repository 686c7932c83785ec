//! Process-wide connectivity state.
//!
//! A single online/offline boolean derived from the runtime's
//! network-status signal. It gates a UI affordance only — nothing in the
//! cache or interception path consults it, since the agent's fallback
//! behavior covers the offline case on its own.

use tokio::sync::watch;

/// Observable online/offline flag.
///
/// Cloning shares the underlying channel; any clone may publish.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    /// Create a monitor with the given initial state.
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    /// Publish a state change from the runtime's network-status signal.
    /// Repeated publishes of the same value do not wake watchers.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|state| {
            if *state == online {
                return false;
            }
            *state = online;
            tracing::debug!(online, "connectivity changed");
            true
        });
    }

    /// Current state.
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribe to state changes.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}
