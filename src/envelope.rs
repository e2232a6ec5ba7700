//! The type-erased "value in flight" carried through the pump.

use std::any::{Any, TypeId};
use std::sync::Arc;

/// Bound satisfied by any type that can travel through the bus.
///
/// `Clone` is part of the public contract (a subscriber receives an owned
/// `T`), not of the internal fan-out mechanics: one published value is
/// reference-counted (`Arc<T>`) and handed to every destination, so N
/// subscribers never force N physical copies of a large payload up front —
/// only the one `Arc::clone`, with the real `T::clone()` only happening at
/// the edge where a subscriber's `events()` hands back an owned value.
pub trait BusValue: Clone + Send + Sync + 'static {}

impl<T: Clone + Send + Sync + 'static> BusValue for T {}

/// A published value together with its dispatch key, erased to `dyn Any` so
/// the pump can route it without being generic over every topic type it
/// has ever seen.
#[derive(Clone)]
pub struct Envelope {
    type_id: TypeId,
    payload: Arc<dyn Any + Send + Sync>,
}

impl Envelope {
    pub fn new<T: BusValue>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            payload: Arc::new(value),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The type-erased payload, for debug introspection only (see
    /// [`crate::Bus::snapshot`]).
    pub fn payload(&self) -> Arc<dyn Any + Send + Sync> {
        self.payload.clone()
    }

    /// Downcasts the payload back to `T`. Panics if `T` does not match the
    /// envelope's type key; callers only ever reach this through a
    /// subscriber slot whose type key was checked at registration time, so
    /// a mismatch here would indicate a registry bug, not caller misuse.
    pub fn downcast<T: BusValue>(&self) -> T {
        self.payload
            .downcast_ref::<T>()
            .expect("envelope type_id did not match payload type")
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_type_erasure() {
        let env = Envelope::new(42i32);
        assert_eq!(env.type_id(), TypeId::of::<i32>());
        assert_eq!(env.downcast::<i32>(), 42);
    }

    #[test]
    #[should_panic(expected = "did not match")]
    fn downcast_to_wrong_type_panics() {
        let env = Envelope::new(42i32);
        env.downcast::<String>();
    }
}
