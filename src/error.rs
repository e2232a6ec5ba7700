//! Error types for the event bus.

use thiserror::Error;

/// Errors surfaced by the public API.
///
/// Most of the bus's runtime behavior is deliberately error-free: a slow
/// subscriber is backpressure, not a failure, and publishing after shutdown
/// is a silent no-op. This enum only covers the handful of conditions a
/// caller can act on.
#[derive(Error, Debug)]
pub enum BusError {
    /// A subscriber handle was used after it was closed.
    #[error("subscriber is closed")]
    SubscriberClosed,

    /// A client handle was used after it was closed.
    #[error("client '{0}' is closed")]
    ClientClosed(String),
}
