//! Delivery of synced orders to every attached foreground

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use super::message::SyncMessage;

/// Receiving end held by one foreground
pub type SyncedOrdersReceiver = mpsc::UnboundedReceiver<SyncMessage>;

/// Registry of attached foregrounds.
///
/// Each foreground has its own unbounded channel. A foreground that reads
/// slowly finds every broadcast waiting for it; nothing is overwritten.
/// Dropping the receiver detaches it.
#[derive(Clone, Default)]
pub struct Fanout {
    listeners: Arc<Mutex<Vec<mpsc::UnboundedSender<SyncMessage>>>>,
}

impl Fanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a foreground. It receives every message sent from now on.
    pub fn subscribe(&self) -> SyncedOrdersReceiver {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.lock().push(sender);
        receiver
    }

    /// Foregrounds still attached
    pub fn listener_count(&self) -> usize {
        let mut listeners = self.lock();
        listeners.retain(|listener| !listener.is_closed());
        listeners.len()
    }

    /// Queue `message` for every attached foreground and return how many
    /// accepted it. Detached foregrounds are dropped from the registry.
    pub fn send(&self, message: &SyncMessage) -> usize {
        let mut listeners = self.lock();
        listeners.retain(|listener| listener.send(message.clone()).is_ok());
        listeners.len()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<mpsc::UnboundedSender<SyncMessage>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
