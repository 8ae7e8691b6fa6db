//! Reclamation strategies
//!
//! A collector looks at a pool's state after a despawn or on a maintenance
//! tick and answers how many inactive instances should be destroyed. The pool
//! destroys the longest-idle instances first and clamps the answer so that it
//! never removes more than are inactive nor drops the pool below its minimum.

use crate::eviction::IdleExpiryCollector;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Relative slack when comparing against an `f32` usage ratio. `0.6f32` is
/// slightly above 0.6 once widened, which would otherwise make 30 of 50
/// count as under target.
const RATIO_TOLERANCE: f64 = 1e-6;

/// Whether `active / total` is at or above `usage_ratio`, within tolerance
pub(crate) fn meets_usage_ratio(active: usize, total: usize, usage_ratio: f32) -> bool {
    active as f64 * (1.0 + RATIO_TOLERANCE) >= f64::from(usage_ratio) * total as f64
}

/// Read-only view of a pool handed to a [`GarbageCollector`]
#[derive(Debug)]
pub struct PoolState<'a> {
    pub active: usize,
    pub inactive: usize,
    pub min: usize,
    /// 0 means unbounded
    pub max: usize,
    /// Target fraction of the total that should be active
    pub usage_ratio: f32,
    pub(crate) released: &'a VecDeque<(usize, Instant)>,
}

impl PoolState<'_> {
    pub fn total(&self) -> usize {
        self.active + self.inactive
    }

    /// Current `active / total`, or `None` for an empty pool
    pub fn current_ratio(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(self.active as f64 / total as f64),
        }
    }

    /// How long each inactive instance has been idle, longest first
    pub fn idle_times(&self) -> impl Iterator<Item = Duration> + '_ {
        self.released.iter().map(|(_, since)| since.elapsed())
    }

    /// Number of instances that may be destroyed without going below `min`
    pub fn reclaimable(&self) -> usize {
        self.inactive.min(self.total().saturating_sub(self.min))
    }
}

/// Decides how many inactive instances a pool should destroy
pub trait GarbageCollector: Send {
    fn collect(&mut self, state: &PoolState<'_>) -> usize;
}

/// Default policy: shrink until `active / total` is back at the target ratio
///
/// # Examples
///
/// ```
/// use esox_spawnpool::{Pool, PoolLimits, Prototype};
///
/// let limits = PoolLimits::new().with_usage_ratio(0.5);
/// let mut pool = Pool::with_clone_factory(Prototype::new(0u32), limits).unwrap();
///
/// let handles: Vec<_> = (0..4).map(|_| pool.spawn().unwrap()).collect();
/// pool.despawn(handles[0]).unwrap();
/// pool.despawn(handles[1]).unwrap();
/// assert_eq!(pool.count(), 4); // 2/4 meets the target
///
/// pool.despawn(handles[2]).unwrap();
/// assert_eq!(pool.count(), 2); // 1/4 was below target, shrunk to 1/2
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct UsageRatioCollector;

impl GarbageCollector for UsageRatioCollector {
    fn collect(&mut self, state: &PoolState<'_>) -> usize {
        if state.inactive == 0 || meets_usage_ratio(state.active, state.total(), state.usage_ratio)
        {
            return 0;
        }

        // Largest total that still keeps active/total at or above the target.
        let target_total = (state.active as f64 / f64::from(state.usage_ratio)
            * (1.0 + RATIO_TOLERANCE))
            .floor() as usize;
        let keep = target_total.max(state.active).max(state.min);

        state.total().saturating_sub(keep).min(state.reclaimable())
    }
}

/// Policy that never destroys anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCollect;

impl GarbageCollector for NeverCollect {
    fn collect(&mut self, _state: &PoolState<'_>) -> usize {
        0
    }
}

/// Selects the collector each pool gets, so settings can name it
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum GarbageCollectorProvider {
    #[default]
    UsageRatio,
    Never,
    IdleExpiry {
        #[cfg_attr(feature = "serde", serde(with = "duration_secs"))]
        timeout: Duration,
    },
}

impl GarbageCollectorProvider {
    /// Build a fresh collector for one pool
    pub fn build(&self) -> Box<dyn GarbageCollector> {
        match self {
            Self::UsageRatio => Box::new(UsageRatioCollector),
            Self::Never => Box::new(NeverCollect),
            Self::IdleExpiry { timeout } => Box::new(IdleExpiryCollector::new(*timeout)),
        }
    }
}

#[cfg(feature = "serde")]
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
