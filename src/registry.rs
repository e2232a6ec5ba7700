//! Type → subscriber-list index.
//!
//! Topic slices are read by the pump without holding the lock, so
//! `subscribe`/`unsubscribe` clone the vector and swap in a fresh `Arc`
//! rather than mutating a shared one in place, the same "topic slices are
//! accessed by pump without holding a lock" discipline the original Go
//! `Bus.unsubscribe` documents.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::envelope::Envelope;

/// Outcome of one delivery attempt to a single subscriber.
pub enum DeliverOutcome {
    Delivered,
    /// The subscriber's delivery channel is gone (closed or its consumer
    /// task has exited); the pump should skip it and move on.
    Stopped,
}

/// Type-erased, per-subscriber dispatch target. Implemented once per
/// concrete `T` by [`crate::subscriber::SubscriberSlot`] so the pump can
/// hold a homogeneous `Vec` of heterogeneous subscriber types.
#[async_trait]
pub(crate) trait AnySubscriberSlot: Send + Sync {
    fn type_id(&self) -> TypeId;

    /// Attempts to hand `envelope` to this subscriber, racing against the
    /// subscriber's own stop signal so a closed subscriber never blocks the
    /// pump.
    async fn deliver(&self, envelope: Envelope) -> DeliverOutcome;
}

/// A live subscription, returned by [`Registry::subscribe`]. Dropping it
/// does nothing on its own — unsubscription is explicit via `unsubscribe`,
/// matching the rest of this crate's close-is-always-explicit discipline.
#[derive(Clone)]
pub(crate) struct Cancel {
    registry: Arc<Registry>,
    type_id: TypeId,
    slot: Arc<dyn AnySubscriberSlot>,
}

impl Cancel {
    pub fn unsubscribe(&self) {
        self.registry.unsubscribe(self.type_id, &self.slot);
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    topics: Mutex<HashMap<TypeId, Arc<Vec<Arc<dyn AnySubscriberSlot>>>>>,
}

impl Registry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(self: &Arc<Self>, slot: Arc<dyn AnySubscriberSlot>) -> Cancel {
        let type_id = slot.type_id();
        let mut topics = self.topics.lock();
        let current = topics
            .entry(type_id)
            .or_insert_with(|| Arc::new(Vec::new()));
        let mut next = (**current).clone();
        next.push(slot.clone());
        *current = Arc::new(next);

        Cancel {
            registry: self.clone(),
            type_id,
            slot,
        }
    }

    pub fn unsubscribe(&self, type_id: TypeId, slot: &Arc<dyn AnySubscriberSlot>) {
        let mut topics = self.topics.lock();
        let Some(current) = topics.get(&type_id) else {
            return;
        };
        let Some(idx) = current.iter().position(|s| Arc::ptr_eq(s, slot)) else {
            tracing::debug!("unsubscribe: slot not found in topic registry");
            return;
        };
        let mut next = (**current).clone();
        next.remove(idx);
        topics.insert(type_id, Arc::new(next));
    }

    /// A lock-free-to-hold snapshot of the destination list for `type_id`.
    /// Taken under the mutex but immediately released; the returned `Arc`
    /// is safe to iterate and await against without blocking concurrent
    /// subscribe/unsubscribe calls.
    pub fn destinations(&self, type_id: TypeId) -> Arc<Vec<Arc<dyn AnySubscriberSlot>>> {
        self.topics
            .lock()
            .get(&type_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn should_publish(&self, type_id: TypeId) -> bool {
        self.topics
            .lock()
            .get(&type_id)
            .is_some_and(|dests| !dests.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSlot {
        type_id: TypeId,
        hits: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AnySubscriberSlot for CountingSlot {
        fn type_id(&self) -> TypeId {
            self.type_id
        }

        async fn deliver(&self, _envelope: Envelope) -> DeliverOutcome {
            self.hits.fetch_add(1, Ordering::SeqCst);
            DeliverOutcome::Delivered
        }
    }

    #[test]
    fn should_publish_false_until_subscribed() {
        let registry = Registry::new();
        let type_id = TypeId::of::<i32>();
        assert!(!registry.should_publish(type_id));

        let hits = Arc::new(AtomicUsize::new(0));
        let slot: Arc<dyn AnySubscriberSlot> = Arc::new(CountingSlot { type_id, hits });
        let _cancel = registry.subscribe(slot);

        assert!(registry.should_publish(type_id));
    }

    #[test]
    fn unsubscribe_removes_only_the_matching_slot() {
        let registry = Registry::new();
        let type_id = TypeId::of::<i32>();
        let hits = Arc::new(AtomicUsize::new(0));

        let slot_a: Arc<dyn AnySubscriberSlot> = Arc::new(CountingSlot {
            type_id,
            hits: hits.clone(),
        });
        let slot_b: Arc<dyn AnySubscriberSlot> = Arc::new(CountingSlot {
            type_id,
            hits: hits.clone(),
        });
        let cancel_a = registry.subscribe(slot_a);
        let _cancel_b = registry.subscribe(slot_b);
        assert_eq!(registry.destinations(type_id).len(), 2);

        cancel_a.unsubscribe();
        assert_eq!(registry.destinations(type_id).len(), 1);

        // Idempotent: unsubscribing twice is a no-op, not an error.
        cancel_a.unsubscribe();
        assert_eq!(registry.destinations(type_id).len(), 1);
    }

    #[test]
    fn destinations_for_unknown_type_is_empty() {
        let registry = Registry::new();
        assert!(registry.destinations(TypeId::of::<String>()).is_empty());
    }
}
