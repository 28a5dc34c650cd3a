//! Online/offline tracking with edge-triggered reconciliation

use tokio::sync::{mpsc, watch};

use super::worker::SyncHandle;
use crate::state::Connectivity;
use crate::Result;

/// Something that can be asked to reconcile the offline queue
pub trait SyncTrigger {
    fn request_sync(&self) -> Result<()>;
}

impl SyncTrigger for SyncHandle {
    fn request_sync(&self) -> Result<()> {
        self.check_sync()
    }
}

/// Effect of one observed connectivity signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    WentOnline,
    WentOffline,
    Unchanged,
}

/// Two-state machine driven by environment signals.
///
/// Only `Offline -> Online` requests a sync. Repeated `Online` signals are
/// steady state and do nothing.
pub struct ConnectivityMonitor<T: SyncTrigger = SyncHandle> {
    state: watch::Sender<Connectivity>,
    trigger: T,
}

impl<T: SyncTrigger> ConnectivityMonitor<T> {
    pub fn new(initial: Connectivity, trigger: T) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state, trigger }
    }

    /// Publish on an existing channel, e.g. one a transport already watches
    pub const fn with_channel(state: watch::Sender<Connectivity>, trigger: T) -> Self {
        Self { state, trigger }
    }

    pub fn current(&self) -> Connectivity {
        *self.state.borrow()
    }

    /// Watch connectivity, e.g. to disable network-only features while offline
    pub fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.state.subscribe()
    }

    pub fn trigger(&self) -> &T {
        &self.trigger
    }

    /// Record a signal and fire reconciliation on the online edge
    pub fn observe(&self, next: Connectivity) -> Result<Transition> {
        let previous = self.state.send_replace(next);
        let transition = match (previous, next) {
            (Connectivity::Offline, Connectivity::Online) => Transition::WentOnline,
            (Connectivity::Online, Connectivity::Offline) => Transition::WentOffline,
            _ => Transition::Unchanged,
        };

        match transition {
            Transition::WentOnline => {
                tracing::info!("Connectivity restored, requesting sync");
                self.trigger.request_sync()?;
            }
            Transition::WentOffline => tracing::info!("Connectivity lost"),
            Transition::Unchanged => {}
        }

        Ok(transition)
    }

    /// Consume signals until the sender side closes
    pub async fn run(&self, mut signals: mpsc::Receiver<Connectivity>) {
        while let Some(next) = signals.recv().await {
            if let Err(error) = self.observe(next) {
                tracing::warn!("Failed to request sync after reconnect: {error}");
            }
        }
        tracing::debug!("Connectivity signal stream closed");
    }
}
