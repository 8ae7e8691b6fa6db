//! Shared registry with periodic maintenance on tokio

use esox_spawnpool::{GarbageCollectorProvider, Prototype, RegistrySettings, SharedRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== EsoxSolutions.SpawnPool - Async Examples ===\n");

    // Example 1: Idle expiry on a maintenance tick
    idle_expiry().await;

    // Example 2: Concurrent spawners
    concurrent_spawners().await;
}

async fn idle_expiry() {
    println!("1. Idle Expiry:");
    let settings = RegistrySettings::new().with_garbage_collector(GarbageCollectorProvider::IdleExpiry {
        timeout: Duration::from_millis(50),
    });
    let registry = Arc::new(SharedRegistry::<String>::with_clone_factory(settings));
    let session = Prototype::named("session", String::from("guest"));

    let handles: Vec<_> = (0..5).filter_map(|_| registry.spawn(&session).ok()).collect();
    for handle in handles {
        let _ = registry.despawn(handle);
    }
    if let Some(pool) = registry.pool(session.id()) {
        println!("   Idle instances: {}", pool.lock().inactive_count());
    }

    let task = registry.spawn_maintenance(Duration::from_millis(10));
    sleep(Duration::from_millis(150)).await;

    if let Some(pool) = registry.pool(session.id()) {
        println!("   After maintenance: {}", pool.lock().count());
    }
    task.abort();
    println!();
}

async fn concurrent_spawners() {
    println!("2. Concurrent Spawners:");
    let registry = Arc::new(SharedRegistry::<Vec<u8>>::with_clone_factory(RegistrySettings::default()));
    let packet = Prototype::named("packet", vec![0u8; 1500]);

    let mut tasks = Vec::new();
    for worker in 0..4 {
        let registry = Arc::clone(&registry);
        let packet = packet.clone();
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                if let Ok(handle) = registry.spawn(&packet) {
                    registry.with_instance(handle, |buffer| buffer[0] = worker);
                    sleep(Duration::from_millis(1)).await;
                    let _ = registry.despawn(handle);
                }
            }
        }));
    }
    for task in tasks {
        let _ = task.await;
    }

    for (label, metrics) in registry.metrics() {
        println!(
            "   {}: spawned {}, created {}, destroyed {}",
            label, metrics.total_spawned, metrics.total_created, metrics.total_destroyed
        );
    }
    println!("   Disposed on shutdown: {}", registry.shutdown());
}
