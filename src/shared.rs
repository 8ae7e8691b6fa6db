//! Thread-safe registry for multi-threaded hosts
//!
//! Every pool sits behind its own mutex, so spawn, despawn and reclamation
//! on one pool never block another. The prototype map is a `DashMap`; lazy
//! registration goes through its entry API so concurrent first lookups of the
//! same prototype always agree on a single pool.

use crate::config::{PredefinedPool, RegistrySettings};
use crate::errors::{PoolError, PoolResult};
use crate::factory::{CloneFactory, Factory};
use crate::metrics::PoolMetrics;
use crate::pool::Pool;
use crate::prototype::{InstanceHandle, Prototype, PrototypeId};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// A pool shared between threads
pub type SharedPool<T> = Arc<Mutex<Pool<T>>>;

/// Registry safe to use from several threads at once
///
/// # Examples
///
/// ```
/// use esox_spawnpool::{Prototype, RegistrySettings, SharedRegistry};
/// use std::sync::Arc;
/// use std::thread;
///
/// let registry = Arc::new(SharedRegistry::<u64>::with_clone_factory(RegistrySettings::default()));
/// let prototype = Prototype::new(0u64);
///
/// thread::scope(|scope| {
///     for _ in 0..4 {
///         scope.spawn(|| {
///             let handle = registry.spawn(&prototype).unwrap();
///             registry.despawn(handle).unwrap();
///         });
///     }
/// });
///
/// assert_eq!(registry.len(), 1);
/// ```
pub struct SharedRegistry<T> {
    pools: DashMap<PrototypeId, SharedPool<T>>,
    factory: Arc<dyn Factory<T>>,
    settings: RegistrySettings,
}

impl<T: Send + Sync + 'static> SharedRegistry<T> {
    pub fn new(factory: Arc<dyn Factory<T>>, settings: RegistrySettings) -> Self {
        Self {
            pools: DashMap::new(),
            factory,
            settings,
        }
    }

    /// Create a registry and build every predefined pool
    pub fn initialize(
        factory: Arc<dyn Factory<T>>,
        settings: RegistrySettings,
        predefined: impl IntoIterator<Item = PredefinedPool<T>>,
    ) -> PoolResult<Self> {
        let registry = Self::new(factory, settings);
        registry.load_predefined(predefined)?;
        info!(pools = registry.len(), "Shared pool registry initialized");
        Ok(registry)
    }

    /// Build and register pools from configuration entries
    ///
    /// Intended for start-up. Entries are validated before any pool is
    /// inserted; a pool created concurrently for the same prototype still
    /// surfaces as [`PoolError::DuplicatePrototype`].
    pub fn load_predefined(
        &self,
        configs: impl IntoIterator<Item = PredefinedPool<T>>,
    ) -> PoolResult<()> {
        let configs: Vec<_> = configs.into_iter().collect();

        let mut seen = HashSet::with_capacity(configs.len());
        for config in &configs {
            let id = config.prototype.id();
            if self.pools.contains_key(&id) || !seen.insert(id) {
                return Err(PoolError::DuplicatePrototype(id));
            }
            config.limits.validate()?;
        }

        let mut built = Vec::with_capacity(configs.len());
        for config in configs {
            built.push(Pool::from_predefined(
                config,
                Arc::clone(&self.factory),
                self.settings.garbage_collector.build(),
            )?);
        }
        for pool in built {
            match self.pools.entry(pool.id()) {
                Entry::Vacant(entry) => {
                    entry.insert(Arc::new(Mutex::new(pool)));
                }
                Entry::Occupied(entry) => {
                    return Err(PoolError::DuplicatePrototype(*entry.key()));
                }
            }
        }
        Ok(())
    }

    /// The pool for `prototype`, created with the default limits if missing
    pub fn get(&self, prototype: &Prototype<T>) -> PoolResult<SharedPool<T>> {
        let id = prototype.id();
        if let Some(pool) = self.pools.get(&id) {
            return Ok(Arc::clone(pool.value()));
        }
        if !self.settings.lazy_registration {
            return Err(PoolError::UnknownPrototype(id));
        }

        // Built before touching the entry: the factory runs while filling to
        // min and must not execute under a map shard lock.
        let mut pool = Pool::new(
            prototype.clone(),
            self.settings.default_limits,
            Arc::clone(&self.factory),
            self.settings.garbage_collector.build(),
        )?;

        match self.pools.entry(id) {
            Entry::Occupied(entry) => {
                let existing = Arc::clone(entry.get());
                drop(entry);
                let disposed = pool.drain();
                debug!(prototype = %prototype.label(), disposed, "Lost lazy registration race");
                Ok(existing)
            }
            Entry::Vacant(entry) => {
                let pool = Arc::new(Mutex::new(pool));
                entry.insert(Arc::clone(&pool));
                info!(prototype = %prototype.label(), "Registered shared pool on first use");
                Ok(pool)
            }
        }
    }

    /// Look up an existing pool without creating one
    pub fn pool(&self, id: PrototypeId) -> Option<SharedPool<T>> {
        self.pools.get(&id).map(|pool| Arc::clone(pool.value()))
    }

    pub fn spawn(&self, prototype: &Prototype<T>) -> PoolResult<InstanceHandle> {
        self.get(prototype)?.lock().spawn()
    }

    pub fn despawn(&self, handle: InstanceHandle) -> PoolResult<()> {
        self.pool(handle.prototype())
            .ok_or(PoolError::UnknownPrototype(handle.prototype()))?
            .lock()
            .despawn(handle)
    }

    /// Run `f` on an active instance while its pool is locked
    pub fn with_instance<R>(&self, handle: InstanceHandle, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let pool = self.pool(handle.prototype())?;
        let mut guard = pool.lock();
        guard.get_mut(handle).map(f)
    }

    /// Run a reclamation pass on every pool; returns instances destroyed
    pub fn maintain(&self) -> usize {
        self.snapshot().iter().map(|pool| pool.lock().maintain()).sum()
    }

    /// Run [`maintain`](Self::maintain) every `period` on the tokio runtime
    ///
    /// The task holds only a weak reference and ends once the registry is
    /// dropped. Must be called from within a tokio runtime.
    pub fn spawn_maintenance(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);
        let period = period.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;
                let Some(strong) = registry.upgrade() else {
                    break;
                };
                let destroyed = strong.maintain();
                if destroyed > 0 {
                    debug!(destroyed, "Periodic maintenance reclaimed instances");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Metrics of every pool, labelled by prototype
    pub fn metrics(&self) -> Vec<(String, PoolMetrics)> {
        self.snapshot()
            .iter()
            .map(|pool| {
                let pool = pool.lock();
                (pool.prototype().label(), pool.metrics())
            })
            .collect()
    }

    /// Export metrics of every pool in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        tags: Option<&std::collections::HashMap<String, String>>,
    ) -> PoolResult<String> {
        crate::metrics::MetricsExporter::export_prometheus(&self.metrics(), tags)
    }

    /// Remove every pool and dispose all their instances
    ///
    /// Returns how many instances were disposed. Handles obtained before the
    /// call no longer resolve, even if a later lookup re-creates a pool for
    /// the same prototype. Exactly the pools taken out of the map are
    /// drained; a pool registered concurrently either stays registered or is
    /// removed and drained here.
    pub fn shutdown(&self) -> usize {
        let mut removed = Vec::with_capacity(self.pools.len());
        self.pools.retain(|_, pool| {
            removed.push(Arc::clone(pool));
            false
        });
        let disposed: usize = removed.iter().map(|pool| pool.lock().drain()).sum();
        info!(pools = removed.len(), disposed, "Shared pool registry shut down");
        disposed
    }

    /// Clone out the pool handles so no map shard stays locked while a pool
    /// mutex is held
    fn snapshot(&self) -> Vec<SharedPool<T>> {
        self.pools.iter().map(|entry| Arc::clone(entry.value())).collect()
    }
}

impl<T: Clone + Send + Sync + 'static> SharedRegistry<T> {
    /// Registry whose pools clone their templates
    pub fn with_clone_factory(settings: RegistrySettings) -> Self {
        Self::new(Arc::new(CloneFactory), settings)
    }
}

impl<T> fmt::Debug for SharedRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRegistry")
            .field("pools", &self.pools.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
