//! Basic usage of the spawn pool registry

use esox_spawnpool::{
    CloneFactory, FnFactory, GarbageCollectorProvider, Pool, PoolError, PoolLimits, PredefinedPool,
    Prototype, Registry, RegistrySettings,
};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct Particle {
    position: (f32, f32),
    lifetime: u32,
}

fn main() -> Result<(), PoolError> {
    println!("=== EsoxSolutions.SpawnPool - Basic Examples ===\n");

    // Example 1: Lazily created pool
    lazy_pool()?;

    // Example 2: Predefined pools with bounds
    predefined_pools()?;

    // Example 3: Rejected despawns
    rejected_despawns()?;

    // Example 4: Custom factory and collector
    custom_strategies()?;

    Ok(())
}

fn lazy_pool() -> Result<(), PoolError> {
    println!("1. Lazy Pool:");
    let mut registry = Registry::<Particle>::with_clone_factory(RegistrySettings::default());
    let spark = Prototype::named("spark", Particle::default());

    let handle = registry.spawn(&spark)?;
    println!("   Pools after first spawn: {}", registry.len());

    registry.despawn(handle)?;
    let pool = registry.get(&spark)?;
    println!("   Total after despawn: {} (default ratio 1.0 reclaims idle instances)\n", pool.count());
    Ok(())
}

fn predefined_pools() -> Result<(), PoolError> {
    println!("2. Predefined Pools:");
    let smoke = Prototype::named("smoke", Particle { lifetime: 60, ..Particle::default() });
    let mut registry = Registry::<Particle>::initialize(
        Arc::new(CloneFactory),
        RegistrySettings::default(),
        [PredefinedPool::new(
            smoke.clone(),
            PoolLimits::new().with_min(4).with_max(8).with_usage_ratio(0.5),
        )],
    )?;

    println!("   Pre-filled: {}", registry.get(&smoke)?.inactive_count());

    let mut puffs = Vec::new();
    for i in 0..8 {
        let pool = registry.get(&smoke)?;
        puffs.push(pool.spawn_with(|p| p.position = (i as f32, 1.0))?);
    }
    match registry.spawn(&smoke) {
        Err(PoolError::PoolExhausted(_)) => println!("   Ninth spawn: exhausted"),
        other => println!("   Ninth spawn: {:?}", other),
    }

    for puff in puffs.drain(..6) {
        registry.despawn(puff)?;
    }
    let pool = registry.get(&smoke)?;
    println!("   After despawning 6: {} active / {} total", pool.active_count(), pool.count());

    let disposed = registry.shutdown();
    println!("   Disposed on shutdown: {}\n", disposed);
    Ok(())
}

fn rejected_despawns() -> Result<(), PoolError> {
    println!("3. Rejected Despawns:");
    let settings = RegistrySettings::new().with_garbage_collector(GarbageCollectorProvider::Never);
    let mut registry = Registry::<Particle>::with_clone_factory(settings);
    let ember = Prototype::new(Particle::default());

    let handle = registry.spawn(&ember)?;
    registry.despawn(handle)?;
    if let Err(e) = registry.despawn(handle) {
        println!("   Second despawn: {}", e);
    }

    let pool = registry.get(&ember)?;
    if let Err(e) = pool.despawn_any() {
        println!("   Despawn on idle pool: {}\n", e);
    }
    Ok(())
}

fn custom_strategies() -> Result<(), PoolError> {
    println!("4. Custom Factory and Collector:");
    let mut pool = Pool::new(
        Prototype::named("buffer", vec![0u8; 64]),
        PoolLimits::new().with_max(16),
        Arc::new(FnFactory::new(|template: &Vec<u8>| Vec::with_capacity(template.len()))),
        GarbageCollectorProvider::Never.build(),
    )?;

    let handles: Vec<_> = (0..4).map(|_| pool.spawn()).collect::<Result<_, _>>()?;
    for handle in handles {
        pool.despawn(handle)?;
    }

    let metrics = pool.metrics();
    println!("   Created: {}, destroyed: {}", metrics.total_created, metrics.total_destroyed);
    let health = pool.health_status();
    println!("   Healthy: {}, warnings: {:?}", health.is_healthy(), health.warnings);
    Ok(())
}
