//! The named owner of a set of publishers and subscribers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::BusInner;
use crate::envelope::BusValue;
use crate::publisher::Publisher;
use crate::subscriber::{self, Subscriber, SubscriberCloseHandle};

pub(crate) struct ClientInner {
    name: String,
    bus: Arc<BusInner>,
    closed: Arc<AtomicBool>,
    subscribers: Mutex<Vec<SubscriberCloseHandle>>,
}

/// A debug-named handle that owns a set of publishers and subscribers.
///
/// Every publisher and subscriber obtained from a `Client` carries that
/// client's closed-state flag; once the client is closed, its publishers'
/// `publish` calls become no-ops and its subscribers stop receiving new
/// values.
pub struct Client(Arc<ClientInner>);

impl std::fmt::Debug for Client {
    /// Reports the client's name and subscriber count only, never the
    /// values flowing through them.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("name", &self.0.name)
            .field("subscribers", &self.0.subscribers.lock().len())
            .field("closed", &self.0.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Client {
    pub(crate) fn new_pair(name: String, bus: Arc<BusInner>) -> (Client, Arc<ClientInner>) {
        let inner = Arc::new(ClientInner {
            name,
            bus,
            closed: Arc::new(AtomicBool::new(false)),
            subscribers: Mutex::new(Vec::new()),
        });
        (Client(inner.clone()), inner)
    }

    pub(crate) fn from_inner(inner: Arc<ClientInner>) -> Client {
        Client(inner)
    }

    /// The debug name this client was created with.
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Returns a publisher for values of type `T`, owned by this client.
    pub fn publisher<T: BusValue>(&self) -> Publisher<T> {
        Publisher::new(self.0.bus.clone(), self.0.closed.clone())
    }

    /// Subscribes to values of type `T`, owned by this client.
    pub fn subscribe<T: BusValue>(&self) -> Subscriber<T> {
        let (sub, close_handle) = subscriber::new_subscription::<T>(&self.0.bus.registry);
        self.0.subscribers.lock().push(close_handle);
        sub
    }

    /// Closes every publisher and subscriber owned by this client, then
    /// removes the client from the bus. Idempotent: a second call observes
    /// the client already closed and returns immediately.
    pub async fn close(&self) {
        if self.0.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let handles: Vec<SubscriberCloseHandle> = std::mem::take(&mut *self.0.subscribers.lock());
        for handle in handles {
            handle.close().await;
        }
        self.0.bus.remove_client(&self.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::Bus;
    use crate::config::BusConfig;

    #[tokio::test]
    async fn debug_reports_counts_not_contents() {
        let bus = Bus::new(BusConfig::default());
        let client = bus.client("telemetry-ingest");
        let _sub = client.subscribe::<i32>();

        let debug = format!("{client:?}");
        assert!(debug.contains("telemetry-ingest"));
        assert!(debug.contains("subscribers"));
    }

    #[tokio::test]
    async fn close_stops_owned_subscribers() {
        let bus = Bus::new(BusConfig::default());
        let client = bus.client("test");
        let mut sub = client.subscribe::<i32>();
        let publisher = client.publisher::<i32>();

        publisher.publish(1).await;
        assert_eq!(sub.events().recv().await, Some(1));

        client.close().await;
        assert_eq!(sub.events().recv().await, None);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let bus = Bus::new(BusConfig::default());
        let client = bus.client("test");
        client.close().await;
        client.close().await;
    }

    #[tokio::test]
    async fn name_is_preserved() {
        let bus = Bus::new(BusConfig::default());
        let client = bus.client("kernel-route-monitor");
        assert_eq!(client.name(), "kernel-route-monitor");
    }
}
