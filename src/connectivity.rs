//! Connectivity monitoring.
//!
//! Normalizes platform online/offline signals into coarse
//! restored/lost events. The platform integration (browser events, NetworkManager,
//! a reachability probe) feeds `set_online`; the engine only consumes the
//! transitions.

use tokio::sync::watch;

/// A coarse connectivity transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Restored,
    Lost,
}

/// Owner side of the connectivity signal.
pub struct ConnectivityMonitor {
    tx: watch::Sender<bool>,
}

impl ConnectivityMonitor {
    pub fn new(initially_online: bool) -> Self {
        let (tx, _rx) = watch::channel(initially_online);
        Self { tx }
    }

    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Feeds a platform connectivity signal. Repeated reports of the same
    /// state do not produce events.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            if *current != online {
                *current = online;
                true
            } else {
                false
            }
        });
    }

    /// Creates a consumer handle for the current and future connectivity
    /// state.
    pub fn watch(&self) -> ConnectivityWatch {
        ConnectivityWatch {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Consumer handle: current state plus a stream of transitions.
#[derive(Clone)]
pub struct ConnectivityWatch {
    rx: watch::Receiver<bool>,
}

impl ConnectivityWatch {
    pub fn is_online(&self) -> bool {
        *self.rx.borrow()
    }

    /// Waits for the next connectivity transition.
    ///
    /// Returns `None` once the monitor has been dropped.
    pub async fn next_event(&mut self) -> Option<ConnectivityEvent> {
        if self.rx.changed().await.is_err() {
            return None;
        }
        if *self.rx.borrow_and_update() {
            Some(ConnectivityEvent::Restored)
        } else {
            Some(ConnectivityEvent::Lost)
        }
    }
}
