//! The bus handle and its single-task pump.
//!
//! The pump is the only place that ever touches the internal bounded queue:
//! everything else communicates with it over channels. It alternates
//! between a drain phase (while the queue has values, fan each out to its
//! destinations) and an idle phase (wait for the next value), built on
//! `tokio::select!`.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use crate::client::{Client, ClientInner};
use crate::config::BusConfig;
use crate::envelope::Envelope;
use crate::queue::BoundedQueue;
use crate::registry::Registry;
use crate::shutdown::{shutdown_pair, ShutdownController, ShutdownWorker};

pub(crate) struct BusInner {
    pub(crate) registry: Arc<Registry>,
    pub(crate) ingress: mpsc::Sender<Envelope>,
    pub(crate) shutdown: ShutdownController,
    snapshot: mpsc::Sender<oneshot::Sender<Vec<Envelope>>>,
    clients: Mutex<Vec<Arc<ClientInner>>>,
}

impl BusInner {
    pub(crate) fn remove_client(&self, target: &Arc<ClientInner>) {
        let mut clients = self.clients.lock();
        if let Some(idx) = clients.iter().position(|c| Arc::ptr_eq(c, target)) {
            clients.remove(idx);
        }
    }
}

/// A typed, in-process publish/subscribe bus.
///
/// Cheap to clone (an `Arc` around the shared dispatcher state); every clone
/// refers to the same pump task and topic registry.
#[derive(Clone)]
pub struct Bus(Arc<BusInner>);

impl std::fmt::Debug for Bus {
    /// Reports counts only, never in-flight payloads — the debug view must
    /// not become a second delivery mechanism.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus")
            .field("clients", &self.0.clients.lock().len())
            .field("stopping", &self.0.shutdown.is_stopping())
            .finish()
    }
}

impl Bus {
    /// Creates a bus and starts its pump task.
    pub fn new(config: BusConfig) -> Bus {
        let registry = Registry::new();
        let (ingress_tx, ingress_rx) = mpsc::channel(1);
        let (snapshot_tx, snapshot_rx) = mpsc::channel(1);
        let (controller, worker) = shutdown_pair();

        let inner = Arc::new(BusInner {
            registry: registry.clone(),
            ingress: ingress_tx,
            shutdown: controller,
            snapshot: snapshot_tx,
            clients: Mutex::new(Vec::new()),
        });

        tokio::spawn(run_pump(
            ingress_rx,
            snapshot_rx,
            registry,
            worker,
            config.queue_capacity,
        ));

        Bus(inner)
    }

    /// Returns a new client with no subscriptions. `name` is used only for
    /// debugging — aim for something short but unique, e.g.
    /// `"kernel-route-monitor"`, not `"watcher"`.
    pub fn client(&self, name: impl Into<String>) -> Client {
        let (client, inner) = Client::new_pair(name.into(), self.0.clone());
        self.0.clients.lock().push(inner);
        client
    }

    /// Closes the bus: stops the pump, waits for it to finish, then closes
    /// every client still attached. Idempotent; the bus is permanently
    /// unusable afterward.
    pub async fn close(&self) {
        self.0.shutdown.stop_and_wait().await;

        let clients = std::mem::take(&mut *self.0.clients.lock());
        for inner in clients {
            Client::from_inner(inner).close().await;
        }
    }

    /// A debug snapshot of values currently sitting in the pump's internal
    /// queue, for introspection only. Never part of the delivery path.
    pub async fn snapshot(&self) -> Vec<Arc<dyn Any + Send + Sync>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.0.snapshot.send(reply_tx).await.is_err() {
            return Vec::new();
        }
        match reply_rx.await {
            Ok(envelopes) => envelopes.iter().map(Envelope::payload).collect(),
            Err(_) => Vec::new(),
        }
    }
}

/// The pump loop: repeatedly drains the internal queue to every registered
/// destination, opportunistically accepting new published values while it
/// does, then waits for the next value once the queue runs dry.
async fn run_pump(
    mut ingress_rx: mpsc::Receiver<Envelope>,
    mut snapshot_rx: mpsc::Receiver<oneshot::Sender<Vec<Envelope>>>,
    registry: Arc<Registry>,
    worker: ShutdownWorker,
    capacity: usize,
) {
    let mut queue = BoundedQueue::<Envelope>::new(capacity);

    'pump: loop {
        if queue.is_empty() {
            tokio::select! {
                biased;
                _ = worker.stopping() => break 'pump,
                maybe = ingress_rx.recv() => {
                    match maybe {
                        Some(envelope) => queue.add(envelope),
                        None => break 'pump,
                    }
                }
                Some(reply) = snapshot_rx.recv() => {
                    let _ = reply.send(Vec::new());
                }
            }
            continue 'pump;
        }

        let envelope = queue.peek().clone();
        let destinations = registry.destinations(envelope.type_id());

        for dest in destinations.iter() {
            loop {
                let absorbed_other_work = tokio::select! {
                    biased;
                    _ = worker.stopping() => break 'pump,
                    _delivered = dest.deliver(envelope.clone()) => false,
                    maybe = ingress_rx.recv(), if !queue.is_full() => {
                        if let Some(next) = maybe {
                            queue.add(next);
                        }
                        true
                    }
                    Some(reply) = snapshot_rx.recv() => {
                        let _ = reply.send(queue.snapshot());
                        true
                    }
                };
                if !absorbed_other_work {
                    break;
                }
            }
        }

        queue.drop_front();
    }

    worker.done();
}
