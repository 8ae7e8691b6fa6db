//! Pool and registry configuration

use crate::collector::GarbageCollectorProvider;
use crate::errors::{PoolError, PoolResult};
use crate::prototype::Prototype;

/// Smallest accepted target usage ratio
pub const MIN_USAGE_RATIO: f32 = 0.1;

/// Largest accepted target usage ratio
pub const MAX_USAGE_RATIO: f32 = 1.0;

/// Capacity bounds and reclamation target for one pool
///
/// # Examples
///
/// ```
/// use esox_spawnpool::PoolLimits;
///
/// let limits = PoolLimits::new()
///     .with_min(4)
///     .with_max(32)
///     .with_usage_ratio(0.75);
///
/// assert_eq!(limits.min, 4);
/// assert_eq!(limits.max, 32);
/// assert!(limits.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolLimits {
    /// Number of instances to keep allocated at all times
    pub min: usize,

    /// Upper bound on allocated instances (0 = no limit)
    pub max: usize,

    /// Target fraction of allocated instances that should be active
    pub usage_ratio: f32,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            min: 0,
            max: 0,
            usage_ratio: 1.0,
        }
    }
}

impl PoolLimits {
    /// Create limits with default values: unbounded, no minimum, ratio 1.0
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_min(mut self, min: usize) -> Self {
        self.min = min;
        self
    }

    /// Set the maximum (0 = no limit)
    pub fn with_max(mut self, max: usize) -> Self {
        self.max = max;
        self
    }

    pub fn with_usage_ratio(mut self, ratio: f32) -> Self {
        self.usage_ratio = ratio;
        self
    }

    pub fn is_bounded(&self) -> bool {
        self.max > 0
    }

    /// Check the limits are internally consistent
    ///
    /// ```
    /// use esox_spawnpool::PoolLimits;
    ///
    /// assert!(PoolLimits::new().with_min(5).with_max(2).validate().is_err());
    /// assert!(PoolLimits::new().with_usage_ratio(0.05).validate().is_err());
    /// assert!(PoolLimits::new().with_min(5).validate().is_ok());
    /// ```
    pub fn validate(&self) -> PoolResult<()> {
        if !(MIN_USAGE_RATIO..=MAX_USAGE_RATIO).contains(&self.usage_ratio) {
            return Err(PoolError::InvalidConfiguration(format!(
                "usage ratio {} outside [{MIN_USAGE_RATIO}, {MAX_USAGE_RATIO}]",
                self.usage_ratio
            )));
        }
        if self.is_bounded() && self.min > self.max {
            return Err(PoolError::InvalidConfiguration(format!(
                "min {} exceeds max {}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// A pool declared up front and built when the registry starts
#[derive(Debug, Clone)]
pub struct PredefinedPool<T> {
    pub prototype: Prototype<T>,
    pub limits: PoolLimits,
}

impl<T> PredefinedPool<T> {
    pub fn new(prototype: Prototype<T>, limits: PoolLimits) -> Self {
        Self { prototype, limits }
    }
}

/// Registry-wide settings
///
/// # Examples
///
/// ```
/// use esox_spawnpool::{GarbageCollectorProvider, PoolLimits, RegistrySettings};
///
/// let settings = RegistrySettings::new()
///     .with_default_limits(PoolLimits::new().with_usage_ratio(0.5))
///     .with_garbage_collector(GarbageCollectorProvider::Never)
///     .with_lazy_registration(false);
///
/// assert!(!settings.lazy_registration);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RegistrySettings {
    /// Limits for pools created lazily on first access
    pub default_limits: PoolLimits,

    /// Whether `get` may create pools for unknown prototypes
    pub lazy_registration: bool,

    /// Collector every new pool is built with
    pub garbage_collector: GarbageCollectorProvider,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            default_limits: PoolLimits::default(),
            lazy_registration: true,
            garbage_collector: GarbageCollectorProvider::default(),
        }
    }
}

impl RegistrySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_limits(mut self, limits: PoolLimits) -> Self {
        self.default_limits = limits;
        self
    }

    pub fn with_lazy_registration(mut self, enabled: bool) -> Self {
        self.lazy_registration = enabled;
        self
    }

    pub fn with_garbage_collector(mut self, provider: GarbageCollectorProvider) -> Self {
        self.garbage_collector = provider;
        self
    }
}
