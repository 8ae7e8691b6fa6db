//! Health monitoring for spawn pools

use crate::collector::meets_usage_ratio;
use crate::config::PoolLimits;

/// Health status of a spawn pool
///
/// # Examples
///
/// ```
/// use esox_spawnpool::{Pool, PoolLimits, Prototype};
///
/// let pool = Pool::with_clone_factory(Prototype::new(0u8), PoolLimits::new().with_min(3)).unwrap();
///
/// let health = pool.health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.inactive_instances, 3);
/// ```
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Current active / total (0.0 for an empty pool)
    pub utilization: f64,

    /// Configured target ratio
    pub target_usage_ratio: f32,

    pub active_instances: usize,

    pub inactive_instances: usize,

    /// Configured maximum (0 = no limit)
    pub max_capacity: usize,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    pub fn new(active: usize, inactive: usize, limits: &PoolLimits) -> Self {
        let total = active + inactive;
        let utilization = if total > 0 {
            active as f64 / total as f64
        } else {
            0.0
        };

        let mut warnings = Vec::new();
        let mut is_healthy = true;

        // Next spawn would fail
        if limits.is_bounded() && total >= limits.max && inactive == 0 {
            warnings.push(format!("At capacity: {}/{} active", active, limits.max));
            is_healthy = false;
        }

        if total < limits.min {
            warnings.push(format!("Below minimum: {} of {} allocated", total, limits.min));
            is_healthy = false;
        }

        // Reclamation is pending; informational only
        if total > 0 && !meets_usage_ratio(active, total, limits.usage_ratio) && total > limits.min
        {
            warnings.push(format!(
                "Usage {:.1}% below target {:.1}%",
                utilization * 100.0,
                limits.usage_ratio * 100.0
            ));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            utilization,
            target_usage_ratio: limits.usage_ratio,
            active_instances: active,
            inactive_instances: inactive,
            max_capacity: limits.max,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
