//! Prototype-to-pool registry

use crate::config::{PredefinedPool, RegistrySettings};
use crate::errors::{PoolError, PoolResult};
use crate::factory::{CloneFactory, Factory};
use crate::metrics::PoolMetrics;
use crate::pool::Pool;
use crate::prototype::{InstanceHandle, Prototype, PrototypeId};

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Owns exactly one pool per prototype
///
/// The registry is a plain value: create it with [`Registry::initialize`]
/// when the host starts, pass it by reference to whatever spawns, and tear
/// it down with [`Registry::shutdown`].
///
/// # Examples
///
/// ```
/// use esox_spawnpool::{PoolLimits, PredefinedPool, Prototype, Registry, RegistrySettings};
/// use std::sync::Arc;
///
/// let bullet = Prototype::named("bullet", [0u8; 32]);
/// let spark = Prototype::named("spark", [0u8; 32]);
///
/// let mut registry = Registry::<[u8; 32]>::initialize(
///     Arc::new(esox_spawnpool::CloneFactory),
///     RegistrySettings::default(),
///     [PredefinedPool::new(bullet.clone(), PoolLimits::new().with_min(8).with_max(64))],
/// )
/// .unwrap();
///
/// let shot = registry.spawn(&bullet).unwrap();
/// assert_eq!(registry.get(&bullet).unwrap().count(), 8);
///
/// // Unknown prototypes get a default pool on first use
/// registry.spawn(&spark).unwrap();
/// assert_eq!(registry.len(), 2);
///
/// registry.despawn(shot).unwrap();
/// registry.shutdown();
/// ```
pub struct Registry<T> {
    pools: HashMap<PrototypeId, Pool<T>>,
    factory: Arc<dyn Factory<T>>,
    settings: RegistrySettings,
}

impl<T> Registry<T> {
    /// Create an empty registry
    pub fn new(factory: Arc<dyn Factory<T>>, settings: RegistrySettings) -> Self {
        Self {
            pools: HashMap::new(),
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
        let mut registry = Self::new(factory, settings);
        registry.load_predefined(predefined)?;
        info!(pools = registry.len(), "Pool registry initialized");
        Ok(registry)
    }

    /// Build and register pools from configuration entries
    ///
    /// Fails with [`PoolError::DuplicatePrototype`] if a prototype appears twice
    /// or already has a pool. Nothing is registered unless every entry is valid.
    pub fn load_predefined(
        &mut self,
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
            self.pools.insert(pool.id(), pool);
        }
        Ok(())
    }

    /// The pool for `prototype`, created with the default limits if missing
    ///
    /// Fails with [`PoolError::UnknownPrototype`] only when lazy registration
    /// is turned off.
    pub fn get(&mut self, prototype: &Prototype<T>) -> PoolResult<&mut Pool<T>> {
        match self.pools.entry(prototype.id()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                if !self.settings.lazy_registration {
                    return Err(PoolError::UnknownPrototype(prototype.id()));
                }
                let pool = Pool::new(
                    prototype.clone(),
                    self.settings.default_limits,
                    Arc::clone(&self.factory),
                    self.settings.garbage_collector.build(),
                )?;
                info!(prototype = %prototype.label(), "Registered pool on first use");
                Ok(entry.insert(pool))
            }
        }
    }

    /// Look up an existing pool without creating one
    pub fn pool(&self, id: PrototypeId) -> Option<&Pool<T>> {
        self.pools.get(&id)
    }

    pub fn pool_mut(&mut self, id: PrototypeId) -> Option<&mut Pool<T>> {
        self.pools.get_mut(&id)
    }

    pub fn contains(&self, prototype: &Prototype<T>) -> bool {
        self.pools.contains_key(&prototype.id())
    }

    /// Spawn from the pool of `prototype`
    pub fn spawn(&mut self, prototype: &Prototype<T>) -> PoolResult<InstanceHandle> {
        self.get(prototype)?.spawn()
    }

    /// Despawn an instance through the pool that produced it
    pub fn despawn(&mut self, handle: InstanceHandle) -> PoolResult<()> {
        self.pools
            .get_mut(&handle.prototype())
            .ok_or(PoolError::UnknownPrototype(handle.prototype()))?
            .despawn(handle)
    }

    pub fn instance(&self, handle: InstanceHandle) -> Option<&T> {
        self.pools.get(&handle.prototype())?.get(handle)
    }

    pub fn instance_mut(&mut self, handle: InstanceHandle) -> Option<&mut T> {
        self.pools.get_mut(&handle.prototype())?.get_mut(handle)
    }

    /// Run a reclamation pass on every pool; returns instances destroyed
    pub fn maintain(&mut self) -> usize {
        self.pools.values_mut().map(Pool::maintain).sum()
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    pub fn settings(&self) -> &RegistrySettings {
        &self.settings
    }

    /// Metrics of every pool, labelled by prototype
    pub fn metrics(&self) -> Vec<(String, PoolMetrics)> {
        self.pools
            .values()
            .map(|pool| (pool.prototype().label(), pool.metrics()))
            .collect()
    }

    /// Export metrics of every pool in Prometheus format
    #[cfg(feature = "metrics")]
    pub fn export_metrics_prometheus(
        &self,
        tags: Option<&HashMap<String, String>>,
    ) -> PoolResult<String> {
        crate::metrics::MetricsExporter::export_prometheus(&self.metrics(), tags)
    }

    /// Tear the registry down, disposing every instance
    ///
    /// Returns how many instances were disposed.
    pub fn shutdown(mut self) -> usize {
        let pools = self.pools.len();
        let disposed: usize = self.pools.values_mut().map(Pool::drain).sum();
        info!(pools, disposed, "Pool registry shut down");
        disposed
    }
}

impl<T: Clone + 'static> Registry<T> {
    /// Registry whose pools clone their templates
    pub fn with_clone_factory(settings: RegistrySettings) -> Self {
        Self::new(Arc::new(CloneFactory), settings)
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("pools", &self.pools.len())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::GarbageCollectorProvider;
    use crate::config::PoolLimits;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry() -> Registry<String> {
        Registry::with_clone_factory(RegistrySettings::default())
    }

    #[test]
    fn test_get_returns_same_pool() {
        let mut registry = registry();
        let prototype = Prototype::new(String::from("tree"));

        let first = registry.get(&prototype).unwrap() as *const Pool<String>;
        let handle = registry.get(&prototype).unwrap().spawn().unwrap();
        let second = registry.get(&prototype).unwrap() as *const Pool<String>;

        assert_eq!(first, second);
        assert_eq!(registry.len(), 1);
        assert!(registry.pool(prototype.id()).unwrap().is_active(handle));
    }

    #[test]
    fn test_identity_keys_not_values() {
        let mut registry = registry();
        let a = Prototype::new(String::from("rock"));
        let b = Prototype::new(String::from("rock"));

        registry.spawn(&a).unwrap();
        registry.spawn(&b).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_lazy_pool_uses_default_limits() {
        let limits = PoolLimits::new().with_min(2).with_max(4).with_usage_ratio(0.5);
        let mut registry: Registry<String> =
            Registry::with_clone_factory(RegistrySettings::new().with_default_limits(limits));
        let prototype = Prototype::new(String::new());

        let pool = registry.get(&prototype).unwrap();
        assert_eq!(pool.limits(), &limits);
        assert_eq!(pool.count(), 2);
    }

    #[test]
    fn test_lazy_registration_disabled() {
        let mut registry: Registry<String> =
            Registry::with_clone_factory(RegistrySettings::new().with_lazy_registration(false));
        let prototype = Prototype::new(String::new());

        assert_eq!(
            registry.get(&prototype).map(|_| ()),
            Err(PoolError::UnknownPrototype(prototype.id()))
        );
        assert!(registry.is_empty());
    }

    #[test]
    fn test_initialize_builds_predefined_pools() {
        let a = Prototype::new(String::from("a"));
        let b = Prototype::new(String::from("b"));
        let registry = Registry::<String>::initialize(
            Arc::new(CloneFactory),
            RegistrySettings::default(),
            [
                PredefinedPool::new(a.clone(), PoolLimits::new().with_min(3)),
                PredefinedPool::new(b.clone(), PoolLimits::new().with_min(1).with_max(2)),
            ],
        )
        .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.pool(a.id()).unwrap().count(), 3);
        assert_eq!(registry.pool(b.id()).unwrap().limits().max, 2);
    }

    #[test]
    fn test_duplicate_predefined_rejected() {
        let a = Prototype::new(String::from("a"));
        let b = Prototype::new(String::from("b"));
        let mut registry = registry();

        let result = registry.load_predefined([
            PredefinedPool::new(b.clone(), PoolLimits::new()),
            PredefinedPool::new(a.clone(), PoolLimits::new().with_min(1)),
            PredefinedPool::new(a.clone(), PoolLimits::new().with_min(2)),
        ]);

        assert_eq!(result, Err(PoolError::DuplicatePrototype(a.id())));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_predefined_conflicting_with_existing_pool() {
        let a = Prototype::new(String::from("a"));
        let mut registry = registry();
        registry.get(&a).unwrap();

        let result = registry.load_predefined([PredefinedPool::new(a.clone(), PoolLimits::new())]);
        assert_eq!(result, Err(PoolError::DuplicatePrototype(a.id())));
    }

    #[test]
    fn test_invalid_predefined_leaves_registry_untouched() {
        let mut registry = registry();
        let result = registry.load_predefined([
            PredefinedPool::new(Prototype::new(String::new()), PoolLimits::new()),
            PredefinedPool::new(Prototype::new(String::new()), PoolLimits::new().with_usage_ratio(0.0)),
        ]);

        assert!(matches!(result, Err(PoolError::InvalidConfiguration(_))));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_despawn_routes_to_owning_pool() {
        let mut registry = registry();
        let a = Prototype::new(String::from("a"));
        let b = Prototype::new(String::from("b"));

        let ha = registry.spawn(&a).unwrap();
        let hb = registry.spawn(&b).unwrap();
        registry.despawn(ha).unwrap();

        assert_eq!(registry.pool(a.id()).unwrap().active_count(), 0);
        assert_eq!(registry.pool(b.id()).unwrap().active_count(), 1);
        assert_eq!(registry.instance(hb).map(String::as_str), Some("b"));
    }

    #[test]
    fn test_failure_in_one_pool_leaves_others_intact() {
        let mut registry = registry();
        let small = Prototype::new(String::from("small"));
        let other = Prototype::new(String::from("other"));
        registry
            .load_predefined([PredefinedPool::new(small.clone(), PoolLimits::new().with_max(1))])
            .unwrap();

        let held = registry.spawn(&other).unwrap();
        registry.spawn(&small).unwrap();
        assert!(matches!(registry.spawn(&small), Err(PoolError::PoolExhausted(_))));

        let foreign = registry.pool_mut(small.id()).unwrap().despawn(held);
        assert!(matches!(foreign, Err(PoolError::NotOwned { .. })));

        assert_eq!(registry.len(), 2);
        assert!(registry.pool(other.id()).unwrap().is_active(held));
    }

    #[test]
    fn test_maintain_and_shutdown() {
        struct Counting(Arc<AtomicUsize>);
        impl Factory<String> for Counting {
            fn create(&self, prototype: &String) -> String {
                prototype.clone()
            }
            fn dispose(&self, _instance: String) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let disposed = Arc::new(AtomicUsize::new(0));
        let settings = RegistrySettings::new().with_garbage_collector(GarbageCollectorProvider::Never);
        let mut registry: Registry<String> =
            Registry::new(Arc::new(Counting(Arc::clone(&disposed))), settings);
        let prototype = Prototype::new(String::from("x"));

        let handles: Vec<_> = (0..3).map(|_| registry.spawn(&prototype).unwrap()).collect();
        registry.despawn(handles[0]).unwrap();
        assert_eq!(registry.maintain(), 0);

        assert_eq!(registry.shutdown(), 3);
        assert_eq!(disposed.load(Ordering::Relaxed), 3);
    }
}
