//! Bus tuning knobs.

/// Environment variable overriding [`BusConfig::queue_capacity`].
pub const ENV_QUEUE_CAPACITY: &str = "EVENTBUS_QUEUE_CAPACITY";

/// Default capacity of the pump's internal bounded queue (`Qmax`).
pub const DEFAULT_QUEUE_CAPACITY: usize = 16;

/// Configuration for a [`crate::Bus`].
///
/// Constructed via [`BusConfig::default`], which reads
/// [`ENV_QUEUE_CAPACITY`] if set, falling back to [`DEFAULT_QUEUE_CAPACITY`].
#[derive(Debug, Clone, Copy)]
pub struct BusConfig {
    /// Capacity of the pump's internal bounded queue (`Qmax`). Must be at
    /// least 1; a bus constructed with 0 would never be able to drain.
    pub queue_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        let queue_capacity = std::env::var(ENV_QUEUE_CAPACITY)
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(DEFAULT_QUEUE_CAPACITY);

        Self { queue_capacity }
    }
}
