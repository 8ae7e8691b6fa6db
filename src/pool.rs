//! Core spawn pool implementation

use crate::collector::{GarbageCollector, PoolState, UsageRatioCollector};
use crate::config::{PoolLimits, PredefinedPool};
use crate::errors::{PoolError, PoolResult};
use crate::factory::{CloneFactory, Factory};
use crate::health::HealthStatus;
use crate::metrics::{MetricsTracker, PoolMetrics};
use crate::prototype::{InstanceHandle, PoolId, Prototype, PrototypeId};

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    /// `position` is the index into `Pool::active`
    Active { position: usize },
    Inactive,
}

struct Entry<T> {
    value: T,
    state: SlotState,
}

struct Slot<T> {
    generation: u32,
    entry: Option<Entry<T>>,
}

/// Instances of one prototype, split into active and inactive sets
///
/// Spawning reuses the most recently released inactive instance, or asks the
/// factory for a new one while the pool is below its maximum. Despawning
/// returns an instance to the inactive set and runs the garbage collector,
/// which may destroy surplus inactive instances. Spawning never reclaims.
///
/// # Examples
///
/// ```
/// use esox_spawnpool::{Pool, PoolError, PoolLimits, Prototype};
///
/// let limits = PoolLimits::new().with_max(2);
/// let mut pool = Pool::with_clone_factory(Prototype::new(String::from("orc")), limits).unwrap();
///
/// let a = pool.spawn().unwrap();
/// let _b = pool.spawn().unwrap();
/// assert!(matches!(pool.spawn(), Err(PoolError::PoolExhausted(_))));
///
/// pool.despawn(a).unwrap();
/// assert_eq!(pool.active_count(), 1);
/// ```
pub struct Pool<T> {
    pool_id: PoolId,
    prototype: Prototype<T>,
    limits: PoolLimits,
    factory: Arc<dyn Factory<T>>,
    collector: Box<dyn GarbageCollector>,
    slots: Vec<Slot<T>>,
    vacant: Vec<usize>,
    /// Slot indices in activation order
    active: Vec<usize>,
    /// Slot indices with release time, oldest at the front
    inactive: VecDeque<(usize, Instant)>,
    metrics: MetricsTracker,
}

impl<T> Pool<T> {
    /// Create a pool and fill it up to `limits.min`
    pub fn new(
        prototype: Prototype<T>,
        limits: PoolLimits,
        factory: Arc<dyn Factory<T>>,
        collector: Box<dyn GarbageCollector>,
    ) -> PoolResult<Self> {
        limits.validate()?;

        let mut pool = Self {
            pool_id: PoolId::next(),
            prototype,
            limits,
            factory,
            collector,
            slots: Vec::with_capacity(limits.min),
            vacant: Vec::new(),
            active: Vec::new(),
            inactive: VecDeque::with_capacity(limits.min),
            metrics: MetricsTracker::new(),
        };
        pool.fill_to_min();

        debug!(
            prototype = %pool.prototype.label(),
            min = limits.min,
            max = limits.max,
            usage_ratio = limits.usage_ratio,
            "Created pool"
        );
        Ok(pool)
    }

    /// Build a pool from a predefined configuration entry
    pub fn from_predefined(
        config: PredefinedPool<T>,
        factory: Arc<dyn Factory<T>>,
        collector: Box<dyn GarbageCollector>,
    ) -> PoolResult<Self> {
        Self::new(config.prototype, config.limits, factory, collector)
    }

    /// Id of the prototype this pool serves
    pub fn id(&self) -> PrototypeId {
        self.prototype.id()
    }

    /// Identity of this pool. Handles are only accepted by the pool that issued them.
    pub fn pool_id(&self) -> PoolId {
        self.pool_id
    }

    pub fn prototype(&self) -> &Prototype<T> {
        &self.prototype
    }

    pub fn limits(&self) -> &PoolLimits {
        &self.limits
    }

    /// Total allocated instances, active plus inactive
    pub fn count(&self) -> usize {
        self.active.len() + self.inactive.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn inactive_count(&self) -> usize {
        self.inactive.len()
    }

    /// Take an instance out of the pool
    ///
    /// Fails with [`PoolError::PoolExhausted`] when the pool is at its maximum
    /// and nothing is inactive.
    pub fn spawn(&mut self) -> PoolResult<InstanceHandle> {
        let index = match self.inactive.pop_back() {
            Some((index, _)) => index,
            None if !self.limits.is_bounded() || self.count() < self.limits.max => {
                let index = self.create_instance();
                debug!(
                    prototype = %self.prototype.label(),
                    total = self.count() + 1,
                    "Pool grew"
                );
                index
            }
            None => {
                self.metrics.exhausted += 1;
                debug!(
                    prototype = %self.prototype.label(),
                    max = self.limits.max,
                    "Pool exhausted"
                );
                return Err(PoolError::PoolExhausted(self.id()));
            }
        };

        self.activate(index);
        self.metrics.spawned += 1;

        let handle = self.handle(index);
        trace!(prototype = %self.prototype.label(), slot = index, "Spawned instance");
        Ok(handle)
    }

    /// Spawn, then let `place` position the instance before it is handed out
    pub fn spawn_with<F>(&mut self, place: F) -> PoolResult<InstanceHandle>
    where
        F: FnOnce(&mut T),
    {
        let handle = self.spawn()?;
        if let Some(instance) = self.get_mut(handle) {
            place(instance);
        }
        Ok(handle)
    }

    /// Return an active instance to the pool and run a reclamation pass
    pub fn despawn(&mut self, handle: InstanceHandle) -> PoolResult<()> {
        if handle.owner != self.pool_id {
            warn!(
                prototype = %self.prototype.label(),
                pool = %self.pool_id,
                instance_pool = %handle.owner,
                "Rejected despawn of foreign instance"
            );
            return Err(PoolError::NotOwned {
                pool: self.pool_id,
                instance_pool: handle.owner,
            });
        }

        let position = match self.entry(handle).map(|entry| entry.state) {
            Some(SlotState::Active { position }) => position,
            _ => {
                warn!(
                    prototype = %self.prototype.label(),
                    slot = handle.index,
                    "Rejected despawn of inactive instance"
                );
                return Err(PoolError::NotActive(self.id()));
            }
        };

        self.deactivate(position);
        self.collect_garbage();
        Ok(())
    }

    /// Despawn the most recently activated instance
    ///
    /// Callers should not rely on which instance is picked.
    pub fn despawn_any(&mut self) -> PoolResult<InstanceHandle> {
        let Some(position) = self.active.len().checked_sub(1) else {
            return Err(PoolError::PoolEmpty(self.id()));
        };

        let handle = self.handle(self.active[position]);
        self.deactivate(position);
        self.collect_garbage();
        Ok(handle)
    }

    /// Run a reclamation pass outside of despawn; returns instances destroyed
    pub fn maintain(&mut self) -> usize {
        self.collect_garbage()
    }

    pub fn is_active(&self, handle: InstanceHandle) -> bool {
        self.get(handle).is_some()
    }

    /// Borrow an active instance
    pub fn get(&self, handle: InstanceHandle) -> Option<&T> {
        self.entry(handle)
            .filter(|entry| matches!(entry.state, SlotState::Active { .. }))
            .map(|entry| &entry.value)
    }

    /// Mutably borrow an active instance
    pub fn get_mut(&mut self, handle: InstanceHandle) -> Option<&mut T> {
        if handle.owner != self.pool_id {
            return None;
        }
        self.slots
            .get_mut(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_mut())
            .filter(|entry| matches!(entry.state, SlotState::Active { .. }))
            .map(|entry| &mut entry.value)
    }

    pub fn metrics(&self) -> PoolMetrics {
        self.metrics.snapshot(
            self.active.len(),
            self.inactive.len(),
            self.limits.usage_ratio,
            self.limits.max,
        )
    }

    pub fn health_status(&self) -> HealthStatus {
        HealthStatus::new(self.active.len(), self.inactive.len(), &self.limits)
    }

    /// Dispose every instance, active or not; returns how many were disposed
    pub(crate) fn drain(&mut self) -> usize {
        let mut disposed = 0;
        for slot in &mut self.slots {
            if let Some(entry) = slot.entry.take() {
                slot.generation = slot.generation.wrapping_add(1);
                self.factory.dispose(entry.value);
                disposed += 1;
            }
        }
        self.slots.clear();
        self.vacant.clear();
        self.active.clear();
        self.inactive.clear();
        disposed
    }

    fn fill_to_min(&mut self) {
        let now = Instant::now();
        while self.count() < self.limits.min {
            let index = self.create_instance();
            self.inactive.push_back((index, now));
        }
    }

    /// New instance from the factory, stored as inactive but not yet queued
    fn create_instance(&mut self) -> usize {
        let value = self.factory.create(self.prototype.template());
        self.metrics.created += 1;

        let entry = Entry {
            value,
            state: SlotState::Inactive,
        };
        match self.vacant.pop() {
            Some(index) => {
                self.slots[index].entry = Some(entry);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    entry: Some(entry),
                });
                self.slots.len() - 1
            }
        }
    }

    fn activate(&mut self, index: usize) {
        let position = self.active.len();
        self.active.push(index);
        self.set_state(index, SlotState::Active { position });
    }

    fn deactivate(&mut self, position: usize) {
        let index = self.active.swap_remove(position);
        if let Some(&moved) = self.active.get(position) {
            self.set_state(moved, SlotState::Active { position });
        }
        self.set_state(index, SlotState::Inactive);
        self.inactive.push_back((index, Instant::now()));
        self.metrics.despawned += 1;
        trace!(prototype = %self.prototype.label(), slot = index, "Despawned instance");
    }

    fn collect_garbage(&mut self) -> usize {
        let state = PoolState {
            active: self.active.len(),
            inactive: self.inactive.len(),
            min: self.limits.min,
            max: self.limits.max,
            usage_ratio: self.limits.usage_ratio,
            released: &self.inactive,
        };
        let doomed = self.collector.collect(&state).min(state.reclaimable());

        for _ in 0..doomed {
            if let Some((index, _)) = self.inactive.pop_front() {
                self.destroy(index);
            }
        }

        if doomed > 0 {
            debug!(
                prototype = %self.prototype.label(),
                destroyed = doomed,
                remaining = self.count(),
                "Reclaimed inactive instances"
            );
        }
        doomed
    }

    fn destroy(&mut self, index: usize) {
        let slot = &mut self.slots[index];
        if let Some(entry) = slot.entry.take() {
            slot.generation = slot.generation.wrapping_add(1);
            self.vacant.push(index);
            self.metrics.destroyed += 1;
            self.factory.dispose(entry.value);
        }
    }

    fn set_state(&mut self, index: usize, state: SlotState) {
        if let Some(entry) = self.slots[index].entry.as_mut() {
            entry.state = state;
        }
    }

    fn entry(&self, handle: InstanceHandle) -> Option<&Entry<T>> {
        if handle.owner != self.pool_id {
            return None;
        }
        self.slots
            .get(handle.index)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.entry.as_ref())
    }

    fn handle(&self, index: usize) -> InstanceHandle {
        InstanceHandle {
            prototype: self.id(),
            owner: self.pool_id,
            index,
            generation: self.slots[index].generation,
        }
    }
}

impl<T: Clone + 'static> Pool<T> {
    /// Pool that clones its template and reclaims by usage ratio
    pub fn with_clone_factory(prototype: Prototype<T>, limits: PoolLimits) -> PoolResult<Self> {
        Self::new(
            prototype,
            limits,
            Arc::new(CloneFactory),
            Box::new(UsageRatioCollector),
        )
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("prototype", &self.prototype.label())
            .field("limits", &self.limits)
            .field("active", &self.active.len())
            .field("inactive", &self.inactive.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::NeverCollect;
    use crate::eviction::IdleExpiryCollector;
    use crate::factory::FnFactory;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn pool(limits: PoolLimits) -> Pool<u32> {
        Pool::with_clone_factory(Prototype::new(7), limits).unwrap()
    }

    fn assert_partition<T>(pool: &Pool<T>) {
        let active: HashSet<usize> = pool.active.iter().copied().collect();
        let inactive: HashSet<usize> = pool.inactive.iter().map(|(index, _)| *index).collect();

        assert_eq!(active.len(), pool.active.len());
        assert_eq!(inactive.len(), pool.inactive.len());
        assert!(active.is_disjoint(&inactive));

        let occupied = pool.slots.iter().filter(|slot| slot.entry.is_some()).count();
        assert_eq!(occupied, pool.count());

        for (position, index) in pool.active.iter().enumerate() {
            let state = pool.slots[*index].entry.as_ref().map(|entry| entry.state);
            assert_eq!(state, Some(SlotState::Active { position }));
        }
        for index in &inactive {
            let state = pool.slots[*index].entry.as_ref().map(|entry| entry.state);
            assert_eq!(state, Some(SlotState::Inactive));
        }
    }

    #[test]
    fn test_fills_to_min_on_creation() {
        let pool = pool(PoolLimits::new().with_min(5).with_max(10));
        assert_eq!(pool.count(), 5);
        assert_eq!(pool.inactive_count(), 5);
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.metrics().total_created, 5);
        assert_partition(&pool);
    }

    #[test]
    fn test_from_predefined() {
        let config = PredefinedPool::new(
            Prototype::new(String::from("crate")),
            PoolLimits::new().with_min(3).with_max(6).with_usage_ratio(0.5),
        );
        let pool = Pool::from_predefined(config, Arc::new(CloneFactory), Box::new(NeverCollect)).unwrap();
        assert_eq!(pool.count(), 3);
        assert_eq!(pool.limits().max, 6);
        assert_eq!(pool.limits().usage_ratio, 0.5);
    }

    #[test]
    fn test_invalid_limits_rejected() {
        let result = Pool::with_clone_factory(
            Prototype::new(0u32),
            PoolLimits::new().with_min(4).with_max(2),
        );
        assert!(matches!(result, Err(PoolError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_spawn_reuses_inactive_before_creating() {
        let mut pool = pool(PoolLimits::new().with_min(1));
        let handle = pool.spawn().unwrap();
        assert_eq!(pool.count(), 1);
        assert_eq!(pool.metrics().total_created, 1);
        assert!(pool.is_active(handle));
        assert_eq!(pool.get(handle), Some(&7));
    }

    #[test]
    fn test_spawn_prefers_most_recently_released() {
        let limits = PoolLimits::new().with_usage_ratio(0.1);
        let mut pool = Pool::new(
            Prototype::new(0u32),
            limits,
            Arc::new(CloneFactory),
            Box::new(NeverCollect),
        )
        .unwrap();

        let a = pool.spawn().unwrap();
        let b = pool.spawn().unwrap();
        pool.despawn(a).unwrap();
        pool.despawn(b).unwrap();

        let again = pool.spawn().unwrap();
        assert_eq!(again, b);
    }

    #[test]
    fn test_exhaustion() {
        let mut pool = pool(PoolLimits::new().with_max(3));
        for _ in 0..3 {
            pool.spawn().unwrap();
        }
        let id = pool.id();
        assert_eq!(pool.spawn(), Err(PoolError::PoolExhausted(id)));
        assert_eq!(pool.count(), 3);
        assert_eq!(pool.metrics().exhausted_events, 1);
        assert_partition(&pool);
    }

    #[test]
    fn test_spawn_despawn_round_trip() {
        let mut pool = pool(PoolLimits::new().with_min(2).with_usage_ratio(0.1));
        let before = pool.count();
        let active_before = pool.active_count();

        let handle = pool.spawn().unwrap();
        pool.despawn(handle).unwrap();

        assert_eq!(pool.count(), before);
        assert_eq!(pool.active_count(), active_before);
        assert_partition(&pool);
    }

    #[test]
    fn test_reclamation_follows_usage_ratio() {
        let mut pool = pool(PoolLimits::new().with_usage_ratio(0.5));
        let handles: Vec<_> = (0..4).map(|_| pool.spawn().unwrap()).collect();

        pool.despawn(handles[0]).unwrap();
        pool.despawn(handles[1]).unwrap();
        assert_eq!(pool.count(), 4);
        assert_eq!(pool.inactive_count(), 2);

        pool.despawn(handles[2]).unwrap();
        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.count(), 2);
        assert_eq!(pool.metrics().total_destroyed, 2);
        assert_partition(&pool);
    }

    #[test]
    fn test_reclamation_holds_when_ratio_exactly_met() {
        let mut pool = pool(PoolLimits::new().with_usage_ratio(0.6));
        let handles: Vec<_> = (0..50).map(|_| pool.spawn().unwrap()).collect();

        for handle in &handles[..20] {
            pool.despawn(*handle).unwrap();
        }
        // 30 of 50 is exactly 0.6
        assert_eq!(pool.active_count(), 30);
        assert_eq!(pool.count(), 50);
        assert_eq!(pool.metrics().total_destroyed, 0);

        pool.despawn(handles[20]).unwrap();
        assert_eq!(pool.count(), 48);
        assert_partition(&pool);
    }

    #[test]
    fn test_reclamation_never_drops_below_min() {
        let mut pool = pool(PoolLimits::new().with_min(3).with_usage_ratio(1.0));
        let handles: Vec<_> = (0..5).map(|_| pool.spawn().unwrap()).collect();
        for handle in handles {
            pool.despawn(handle).unwrap();
            assert!(pool.count() >= 3);
        }
        assert_eq!(pool.count(), 3);
        assert_eq!(pool.active_count(), 0);
    }

    #[test]
    fn test_double_despawn_rejected() {
        let mut pool = pool(PoolLimits::new().with_min(1));
        let handle = pool.spawn().unwrap();

        pool.despawn(handle).unwrap();
        let count = pool.count();

        assert_eq!(pool.despawn(handle), Err(PoolError::NotActive(pool.id())));
        assert_eq!(pool.count(), count);
        assert_partition(&pool);
    }

    #[test]
    fn test_despawn_of_destroyed_instance_rejected() {
        let mut pool = pool(PoolLimits::new());
        let handle = pool.spawn().unwrap();
        pool.despawn(handle).unwrap();
        // Default ratio 1.0 reclaims every idle instance above min.
        assert_eq!(pool.count(), 0);

        let reused = pool.spawn().unwrap();
        assert_eq!(reused.index, handle.index);
        assert!(!pool.is_active(handle));
        assert!(matches!(pool.despawn(handle), Err(PoolError::NotActive(_))));
        assert!(pool.is_active(reused));
    }

    #[test]
    fn test_despawn_foreign_instance_rejected() {
        let mut first = pool(PoolLimits::new());
        let mut second = pool(PoolLimits::new());
        let handle = first.spawn().unwrap();

        let result = second.despawn(handle);
        assert_eq!(
            result,
            Err(PoolError::NotOwned {
                pool: second.pool_id(),
                instance_pool: first.pool_id(),
            })
        );
        assert!(first.is_active(handle));
        assert!(second.get(handle).is_none());
    }

    #[test]
    fn test_pools_sharing_a_prototype_reject_each_others_handles() {
        let prototype = Prototype::new(7u32);
        let mut a = Pool::with_clone_factory(prototype.clone(), PoolLimits::new()).unwrap();
        let mut b = Pool::with_clone_factory(prototype, PoolLimits::new()).unwrap();
        assert_eq!(a.id(), b.id());
        assert_ne!(a.pool_id(), b.pool_id());

        let from_a = a.spawn().unwrap();
        let from_b = b.spawn().unwrap();
        // Same slot and generation in both pools.
        assert_eq!((from_a.index, from_a.generation), (from_b.index, from_b.generation));

        assert_eq!(
            b.despawn(from_a),
            Err(PoolError::NotOwned {
                pool: b.pool_id(),
                instance_pool: a.pool_id(),
            })
        );
        assert!(b.is_active(from_b));
        assert_eq!(b.active_count(), 1);
        assert!(b.get(from_a).is_none());
        assert!(b.get_mut(from_a).is_none());
        assert!(a.is_active(from_a));
    }

    #[test]
    fn test_despawn_any_is_lifo() {
        let mut pool = pool(PoolLimits::new().with_usage_ratio(0.1));
        let _a = pool.spawn().unwrap();
        let b = pool.spawn().unwrap();

        assert_eq!(pool.despawn_any().unwrap(), b);
        assert_eq!(pool.active_count(), 1);
        assert_partition(&pool);
    }

    #[test]
    fn test_despawn_any_on_idle_pool() {
        let mut pool = pool(PoolLimits::new().with_min(2));
        assert_eq!(pool.despawn_any(), Err(PoolError::PoolEmpty(pool.id())));
        assert_eq!(pool.count(), 2);
    }

    #[test]
    fn test_targeted_despawn_keeps_positions_consistent() {
        let mut pool = pool(PoolLimits::new().with_usage_ratio(0.1));
        let handles: Vec<_> = (0..5).map(|_| pool.spawn().unwrap()).collect();

        pool.despawn(handles[1]).unwrap();
        assert_partition(&pool);
        pool.despawn(handles[0]).unwrap();
        assert_partition(&pool);

        for handle in &handles[2..] {
            assert!(pool.is_active(*handle));
        }
    }

    #[test]
    fn test_spawn_with_applies_placement() {
        let mut pool = Pool::with_clone_factory(Prototype::new((0.0f32, 0.0f32)), PoolLimits::new()).unwrap();
        let handle = pool.spawn_with(|position| *position = (3.0, 4.0)).unwrap();
        assert_eq!(pool.get(handle), Some(&(3.0, 4.0)));
    }

    #[test]
    fn test_spawn_with_at_capacity_places_nothing() {
        let mut pool = pool(PoolLimits::new().with_max(1));
        pool.spawn().unwrap();

        let mut placed = false;
        let result = pool.spawn_with(|_| placed = true);
        assert!(matches!(result, Err(PoolError::PoolExhausted(_))));
        assert!(!placed);
    }

    #[test]
    fn test_get_mut_only_for_active() {
        let mut pool = pool(PoolLimits::new().with_usage_ratio(0.1));
        let handle = pool.spawn().unwrap();
        *pool.get_mut(handle).unwrap() = 99;
        assert_eq!(pool.get(handle), Some(&99));

        pool.despawn(handle).unwrap();
        assert!(pool.get_mut(handle).is_none());
    }

    #[test]
    fn test_destroyed_instances_are_disposed() {
        let disposed = Arc::new(AtomicUsize::new(0));

        struct Tracking(Arc<AtomicUsize>);
        impl Factory<u32> for Tracking {
            fn create(&self, prototype: &u32) -> u32 {
                *prototype
            }
            fn dispose(&self, _instance: u32) {
                self.0.fetch_add(1, Ordering::Relaxed);
            }
        }

        let mut pool = Pool::new(
            Prototype::new(1u32),
            PoolLimits::new().with_usage_ratio(0.5),
            Arc::new(Tracking(Arc::clone(&disposed))),
            Box::new(UsageRatioCollector),
        )
        .unwrap();

        let handles: Vec<_> = (0..4).map(|_| pool.spawn().unwrap()).collect();
        for handle in &handles[..3] {
            pool.despawn(*handle).unwrap();
        }
        assert_eq!(disposed.load(Ordering::Relaxed), 2);

        assert_eq!(pool.drain(), 2);
        assert_eq!(disposed.load(Ordering::Relaxed), 4);
        assert_eq!(pool.count(), 0);
    }

    #[test]
    fn test_maintain_expires_idle_instances() {
        let mut pool = Pool::new(
            Prototype::new(0u32),
            PoolLimits::new().with_min(1),
            Arc::new(FnFactory::new(|n: &u32| n + 1)),
            Box::new(IdleExpiryCollector::new(Duration::from_millis(20))),
        )
        .unwrap();

        let handles: Vec<_> = (0..3).map(|_| pool.spawn().unwrap()).collect();
        for handle in handles {
            pool.despawn(handle).unwrap();
        }
        assert_eq!(pool.count(), 3);
        assert_eq!(pool.maintain(), 0);

        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(pool.maintain(), 2);
        assert_eq!(pool.count(), 1);
    }

    #[test]
    fn test_spawn_never_collects() {
        let mut pool = Pool::new(
            Prototype::new(0u32),
            PoolLimits::new(),
            Arc::new(CloneFactory),
            Box::new(IdleExpiryCollector::new(Duration::from_millis(20))),
        )
        .unwrap();

        let handles: Vec<_> = (0..4).map(|_| pool.spawn().unwrap()).collect();
        for handle in handles {
            pool.despawn(handle).unwrap();
        }
        std::thread::sleep(Duration::from_millis(40));

        // Every idle instance is past its timeout, yet spawn only reuses one.
        let handle = pool.spawn().unwrap();
        assert_eq!(pool.count(), 4);
        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.metrics().total_destroyed, 0);
        assert_eq!(pool.metrics().total_created, 4);

        assert_eq!(pool.maintain(), 3);
        assert_eq!(pool.count(), 1);
        assert!(pool.is_active(handle));
        assert_partition(&pool);
    }

    #[test]
    fn test_bounds_hold_under_mixed_workload() {
        let limits = PoolLimits::new().with_min(2).with_max(6).with_usage_ratio(0.6);
        let mut pool = pool(limits);
        let mut held = Vec::new();

        for step in 0..200usize {
            if step % 3 == 2 {
                if let Some(handle) = held.pop() {
                    pool.despawn(handle).unwrap();
                }
            } else if let Ok(handle) = pool.spawn() {
                held.push(handle);
            }
            assert!(pool.count() <= 6);
            assert!(pool.count() >= 2);
            assert_eq!(pool.active_count(), held.len());
            assert_partition(&pool);
        }
    }
}
