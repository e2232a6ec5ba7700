//! Per-subscriber delivery state and the public `Subscriber<T>` handle.
//!
//! Each subscription gets a depth-1 delivery channel (the pump's per-
//! destination backpressure point) plus a small consumer task that drains
//! that channel into an unbounded outbound queue, so a slow `events().recv()`
//! caller never stalls the pump — only the depth-1 handoff can, and only
//! until the consumer task picks it up.

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::envelope::{BusValue, Envelope};
use crate::registry::{AnySubscriberSlot, Cancel, DeliverOutcome};
use crate::shutdown::{shutdown_pair, ShutdownController, ShutdownWorker};

/// The pump-facing half of a subscription: a depth-1 mailbox plus the stop
/// signal the pump races a delivery attempt against.
pub(crate) struct SubscriberSlot<T: BusValue> {
    type_id: TypeId,
    mailbox: mpsc::Sender<T>,
    controller: ShutdownController,
    dropped: Arc<AtomicU64>,
}

#[async_trait]
impl<T: BusValue> AnySubscriberSlot for SubscriberSlot<T> {
    fn type_id(&self) -> TypeId {
        self.type_id
    }

    async fn deliver(&self, envelope: Envelope) -> DeliverOutcome {
        let value = envelope.downcast::<T>();
        tokio::select! {
            biased;
            _ = self.controller.stopping() => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                DeliverOutcome::Stopped
            }
            res = self.mailbox.send(value) => {
                match res {
                    Ok(()) => DeliverOutcome::Delivered,
                    Err(_) => {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        DeliverOutcome::Stopped
                    }
                }
            }
        }
    }
}

/// A stream of values for one subscription. Returned by
/// [`Subscriber::events`]; a thin wrapper so the public surface never leaks
/// the underlying `tokio::sync::mpsc` type.
pub struct EventStream<T: BusValue> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T: BusValue> EventStream<T> {
    /// Awaits the next delivered value. Returns `None` once the subscriber
    /// is closed and every value already queued for it has been consumed.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

/// A live subscription to values of type `T`.
///
/// Closing is always explicit — via [`Subscriber::close`] or by the owning
/// [`crate::Client`] closing — never implied by `Drop`, so a caller who
/// forgets to hold the handle doesn't silently lose delivery mid-stream.
pub struct Subscriber<T: BusValue> {
    events: EventStream<T>,
    controller: ShutdownController,
    cancel: Cancel,
    dropped: Arc<AtomicU64>,
    _marker: PhantomData<T>,
}

impl<T: BusValue> std::fmt::Debug for Subscriber<T> {
    /// Reports the drop count only, never buffered values.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("stopping", &self.controller.is_stopping())
            .field("dropped", &self.dropped.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T: BusValue> Subscriber<T> {
    /// The stream of values delivered to this subscription.
    pub fn events(&mut self) -> &mut EventStream<T> {
        &mut self.events
    }

    /// Resolves once this subscriber has been closed and its consumer task
    /// has exited.
    pub fn closed(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        self.controller.wait_owned()
    }

    /// Stops delivery and removes this subscription from the bus. Safe to
    /// call more than once or concurrently with the owning client's close.
    pub fn close(&self) {
        self.controller.stop();
        self.cancel.unsubscribe();
    }

    /// Count of values dropped because this subscriber's mailbox or
    /// consumer task could not keep up, or had already stopped. Exposed for
    /// diagnostics and tests, not part of delivery semantics.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Shared by a [`Subscriber`] and its owning [`crate::Client`] so either
/// side can close the subscription and both observe the same state.
#[derive(Clone)]
pub(crate) struct SubscriberCloseHandle {
    controller: ShutdownController,
    cancel: Cancel,
}

impl SubscriberCloseHandle {
    /// Stops delivery, unsubscribes, then waits for the consumer task to
    /// exit. Idempotent: repeated calls observe the same already-stopped
    /// state.
    pub async fn close(&self) {
        self.cancel.unsubscribe();
        self.controller.stop_and_wait().await;
    }
}

/// Builds the slot/consumer-task/handle triple for a new subscription and
/// registers the slot with `registry`. The returned `Subscriber<T>` and
/// `SubscriberCloseHandle` share the same controller and cancel, so closing
/// either one closes both views of the subscription.
pub(crate) fn new_subscription<T: BusValue>(
    registry: &Arc<crate::registry::Registry>,
) -> (Subscriber<T>, SubscriberCloseHandle) {
    let (controller, worker) = shutdown_pair();
    let (mailbox_tx, mailbox_rx) = mpsc::channel::<T>(1);
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<T>();
    let dropped = Arc::new(AtomicU64::new(0));

    let slot: Arc<dyn AnySubscriberSlot> = Arc::new(SubscriberSlot::<T> {
        type_id: TypeId::of::<T>(),
        mailbox: mailbox_tx,
        controller: controller.clone(),
        dropped: dropped.clone(),
    });
    let cancel = registry.subscribe(slot);

    tokio::spawn(drain_mailbox(mailbox_rx, outbound_tx, worker));

    let subscriber = Subscriber {
        events: EventStream { rx: outbound_rx },
        controller: controller.clone(),
        cancel: cancel.clone(),
        dropped,
        _marker: PhantomData,
    };
    let close_handle = SubscriberCloseHandle { controller, cancel };

    (subscriber, close_handle)
}

/// Drains the depth-1 mailbox into the unbounded outbound queue until the
/// subscriber is stopped or every publisher-facing sender has gone away.
async fn drain_mailbox<T>(
    mut mailbox_rx: mpsc::Receiver<T>,
    outbound_tx: mpsc::UnboundedSender<T>,
    worker: ShutdownWorker,
) {
    loop {
        tokio::select! {
            biased;
            _ = worker.stopping() => break,
            maybe = mailbox_rx.recv() => {
                match maybe {
                    Some(value) => {
                        if outbound_tx.send(value).is_err() {
                            // Subscriber handle was dropped without closing;
                            // nothing left to deliver to.
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }
    worker.done();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    #[tokio::test]
    async fn debug_reports_counts_not_payloads() {
        let registry = Registry::new();
        let (sub, _close) = new_subscription::<i32>(&registry);
        let dest = registry.destinations(TypeId::of::<i32>());
        dest[0].deliver(Envelope::new(123456789)).await;

        let debug = format!("{sub:?}");
        assert!(!debug.contains("123456789"));
        assert!(debug.contains("dropped"));
    }

    #[tokio::test]
    async fn delivered_values_arrive_in_order() {
        let registry = Registry::new();
        let (mut sub, _close) = new_subscription::<i32>(&registry);
        let dest = registry.destinations(TypeId::of::<i32>());
        assert_eq!(dest.len(), 1);

        dest[0].deliver(Envelope::new(1)).await;
        dest[0].deliver(Envelope::new(2)).await;

        assert_eq!(sub.events().recv().await, Some(1));
        assert_eq!(sub.events().recv().await, Some(2));
    }

    #[tokio::test]
    async fn close_stops_delivery_and_unsubscribes() {
        let registry = Registry::new();
        let (sub, _close) = new_subscription::<i32>(&registry);
        assert!(registry.should_publish(TypeId::of::<i32>()));

        sub.close();
        sub.closed().await;

        assert!(!registry.should_publish(TypeId::of::<i32>()));
    }

    #[tokio::test]
    async fn close_is_idempotent_from_either_handle() {
        let registry = Registry::new();
        let (sub, close_handle) = new_subscription::<i32>(&registry);

        sub.close();
        close_handle.close().await;
        sub.close();

        assert!(!registry.should_publish(TypeId::of::<i32>()));
    }

    #[tokio::test]
    async fn deliver_after_close_reports_stopped_and_counts_drop() {
        let registry = Registry::new();
        let (sub, _close) = new_subscription::<i32>(&registry);
        let dest = registry.destinations(TypeId::of::<i32>());

        sub.close();
        sub.closed().await;

        match dest[0].deliver(Envelope::new(7)).await {
            DeliverOutcome::Stopped => {}
            DeliverOutcome::Delivered => panic!("expected delivery to a closed subscriber to stop"),
        }
        assert_eq!(sub.dropped_count(), 1);
    }
}
