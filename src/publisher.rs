//! The publish-side handle.
//!
//! A `Publisher<T>` is intentionally thin: it carries a cached `TypeId`, a
//! back-reference to the bus, and a shared "is my client closed" flag. It
//! owns no channel and no background task — stateless beyond identity.

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::bus::BusInner;
use crate::envelope::{BusValue, Envelope};

/// A publish-only handle for values of type `T`.
pub struct Publisher<T: BusValue> {
    bus: Arc<BusInner>,
    client_closed: Arc<AtomicBool>,
    type_id: TypeId,
    _marker: PhantomData<T>,
}

impl<T: BusValue> std::fmt::Debug for Publisher<T> {
    /// Reports the dispatch key and client state only, never payloads.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Publisher")
            .field("type_id", &self.type_id)
            .field("client_closed", &self.client_closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T: BusValue> Publisher<T> {
    pub(crate) fn new(bus: Arc<BusInner>, client_closed: Arc<AtomicBool>) -> Self {
        Self {
            bus,
            client_closed,
            type_id: TypeId::of::<T>(),
            _marker: PhantomData,
        }
    }

    /// Hands `value` to the bus for dispatch to any current subscribers of
    /// `T`.
    ///
    /// Never blocks on a slow subscriber: the pump, not `publish`, owns
    /// backpressure against individual destinations. `publish` only blocks
    /// (briefly) on the bus's own bounded ingress queue filling up, and even
    /// then returns promptly once the bus or this publisher's client is
    /// closing — silently, since a publisher has no caller-visible way to
    /// observe "nobody was listening" and shouldn't need one.
    pub async fn publish(&self, value: T) {
        if self.client_closed.load(Ordering::Relaxed) {
            tracing::trace!("publish dropped: client is closed");
            return;
        }
        if !self.bus.registry.should_publish(self.type_id) {
            return;
        }

        let envelope = Envelope::new(value);
        tokio::select! {
            biased;
            _ = self.bus.shutdown.stopping() => {
                tracing::trace!("publish dropped: bus is closing");
            }
            res = self.bus.ingress.send(envelope) => {
                if res.is_err() {
                    tracing::trace!("publish dropped: bus is closed");
                }
            }
        }
    }
}
