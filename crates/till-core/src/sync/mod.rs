//! Offline-resilient order submission and synchronization.
//!
//! Data flow: register → [`SyncHandle::submit`] → [`Interceptor`] (live send)
//! → delivered, or buffered in the [`QueueStore`]. Later the
//! [`ConnectivityMonitor`] sees the network come back and asks the worker to
//! reconcile; the [`Reconciler`] drains the queue, sends
//! [`SyncMessage::SyncedOrders`] to every attached [`Foreground`] through the
//! [`Fanout`], and purges.
//! Foregrounds merge broadcasts into their [`OrderLedger`] idempotently.
//!
//! The queue store is the only state shared between the worker and the
//! foregrounds; everything else travels over typed channels.

mod connectivity;
mod fanout;
mod intercept;
mod merge;
mod message;
mod queue;
mod reconcile;
mod transport;
mod worker;

#[cfg(test)]
mod tests;

pub use connectivity::{ConnectivityMonitor, SyncTrigger, Transition};
pub use fanout::{Fanout, SyncedOrdersReceiver};
pub use intercept::{Interceptor, SubmitOutcome};
pub use merge::{Foreground, OrderLedger, SyncNotice};
pub use message::SyncMessage;
pub use queue::QueueStore;
pub use reconcile::{replay_order, PurgePolicy, ReconcileReport, ReconcileState, Reconciler};
pub use transport::{Delivery, HttpOrderTransport, OrderTransport};
pub use worker::{SyncHandle, SyncWorker};
