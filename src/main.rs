// EsoxSolutions.SpawnPool
// Small demo of the registry lifecycle. Set RUST_LOG=debug to see pool events.
// More in demos/: `cargo run --example basic`, `cargo run --example async_usage`.

use esox_spawnpool::{
    CloneFactory, PoolLimits, PredefinedPool, Prototype, Registry, RegistrySettings,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default)]
struct Projectile {
    position: (f32, f32),
    velocity: (f32, f32),
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== EsoxSolutions.SpawnPool ===");

    let bullet = Prototype::named("bullet", Projectile::default());
    let rocket = Prototype::named(
        "rocket",
        Projectile {
            velocity: (0.0, 2.5),
            ..Projectile::default()
        },
    );

    let mut registry = Registry::<Projectile>::initialize(
        Arc::new(CloneFactory),
        RegistrySettings::default(),
        [PredefinedPool::new(
            bullet.clone(),
            PoolLimits::new().with_min(8).with_max(32).with_usage_ratio(0.5),
        )],
    )?;

    let mut shots = Vec::new();
    for i in 0..12 {
        let pool = registry.get(&bullet)?;
        shots.push(pool.spawn_with(|p| p.position = (i as f32, 0.0))?);
    }
    let pool = registry.get(&bullet)?;
    println!("  bullets: {} active / {} total", pool.active_count(), pool.count());

    for shot in shots.drain(..9) {
        registry.despawn(shot)?;
    }
    let pool = registry.get(&bullet)?;
    println!("  after despawn: {} active / {} total", pool.active_count(), pool.count());
    if let Some(p) = shots.first().and_then(|shot| registry.instance(*shot)) {
        println!("  oldest live bullet at {:?}", p.position);
    }

    let launched = registry.spawn(&rocket)?;
    if let Some(r) = registry.instance(launched) {
        println!("  rocket velocity: {:?}", r.velocity);
    }

    println!("  health: {:?}", registry.get(&bullet)?.health_status().warnings);

    let disposed = registry.shutdown();
    println!("  disposed {disposed} instances on shutdown");
    Ok(())
}
