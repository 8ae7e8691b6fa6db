//! Time-based expiry for idle instances

use crate::collector::{GarbageCollector, PoolState};
use std::time::Duration;

/// Destroys inactive instances that have been idle longer than a timeout
///
/// Usage ratio is ignored; only idle time and the pool minimum matter.
///
/// # Examples
///
/// ```
/// use esox_spawnpool::{GarbageCollectorProvider, PoolLimits, Registry, RegistrySettings};
/// use std::time::Duration;
///
/// let settings = RegistrySettings::new()
///     .with_garbage_collector(GarbageCollectorProvider::IdleExpiry {
///         timeout: Duration::from_secs(30),
///     });
/// let registry = Registry::<u32>::with_clone_factory(settings);
/// assert!(registry.is_empty());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct IdleExpiryCollector {
    timeout: Duration,
}

impl IdleExpiryCollector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl GarbageCollector for IdleExpiryCollector {
    fn collect(&mut self, state: &PoolState<'_>) -> usize {
        // Idle times are ordered longest first, so the expired ones form a prefix.
        let expired = state
            .idle_times()
            .take_while(|idle| *idle > self.timeout)
            .count();
        expired.min(state.reclaimable())
    }
}
