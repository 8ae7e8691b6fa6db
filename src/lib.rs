//! # EsoxSolutions.SpawnPool
//!
//! Prototype-keyed spawn pools: acquire and release instances of a template
//! without paying allocation and destruction cost on every use.
//!
//! ## Features
//!
//! - One pool per prototype identity, created eagerly from predefined
//!   configuration or lazily on first use
//! - Min/max bounds with pre-fill to the minimum
//! - Usage-ratio driven reclamation of idle instances
//! - Pluggable factories and garbage collectors
//! - Generational instance handles that reject double and foreign despawns
//! - Thread-safe registry with periodic maintenance on tokio
//! - Metrics, Prometheus export and health reporting
//!
//! ## Quick Start
//!
//! ```rust
//! use esox_spawnpool::{Prototype, Registry, RegistrySettings};
//!
//! let mut registry = Registry::<String>::with_clone_factory(RegistrySettings::default());
//! let enemy = Prototype::named("enemy", String::from("goblin"));
//!
//! let handle = registry.spawn(&enemy).unwrap();
//! assert_eq!(registry.instance(handle).map(String::as_str), Some("goblin"));
//!
//! registry.despawn(handle).unwrap();
//! assert!(registry.despawn(handle).is_err());
//! ```

mod collector;
mod config;
mod errors;
mod eviction;
mod factory;
mod health;
mod metrics;
mod pool;
mod prototype;
mod registry;
mod shared;

pub use collector::{
    GarbageCollector, GarbageCollectorProvider, NeverCollect, PoolState, UsageRatioCollector,
};
pub use config::{MAX_USAGE_RATIO, MIN_USAGE_RATIO, PoolLimits, PredefinedPool, RegistrySettings};
pub use errors::{PoolError, PoolResult};
pub use eviction::IdleExpiryCollector;
pub use factory::{CloneFactory, Factory, FnFactory};
pub use health::HealthStatus;
#[cfg(feature = "metrics")]
pub use metrics::MetricsExporter;
pub use metrics::PoolMetrics;
pub use pool::Pool;
pub use prototype::{InstanceHandle, PoolId, Prototype, PrototypeId};
pub use registry::Registry;
pub use shared::{SharedPool, SharedRegistry};
