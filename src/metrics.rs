//! Metrics collection and export for spawn pools

use std::collections::HashMap;

/// Metrics snapshot for one pool
///
/// # Examples
///
/// ```
/// use esox_spawnpool::{Pool, PoolLimits, Prototype};
///
/// let mut pool = Pool::with_clone_factory(Prototype::new(0u8), PoolLimits::new()).unwrap();
/// let _handle = pool.spawn().unwrap();
///
/// let metrics = pool.metrics();
/// assert_eq!(metrics.total_spawned, 1);
/// assert_eq!(metrics.total_created, 1);
/// assert_eq!(metrics.active_instances, 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Successful spawns
    pub total_spawned: u64,

    /// Successful despawns, targeted or forced
    pub total_despawned: u64,

    /// Instances produced by the factory
    pub total_created: u64,

    /// Instances destroyed by reclamation
    pub total_destroyed: u64,

    /// Spawns rejected because the pool was at capacity
    pub exhausted_events: u64,

    pub active_instances: usize,

    pub inactive_instances: usize,

    /// Current active / total (0.0 for an empty pool)
    pub usage_ratio: f64,

    /// Configured target ratio
    pub target_usage_ratio: f32,

    /// Configured maximum (0 = no limit)
    pub max_capacity: usize,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_spawned".to_string(), self.total_spawned.to_string());
        metrics.insert("total_despawned".to_string(), self.total_despawned.to_string());
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("total_destroyed".to_string(), self.total_destroyed.to_string());
        metrics.insert("exhausted_events".to_string(), self.exhausted_events.to_string());
        metrics.insert("active_instances".to_string(), self.active_instances.to_string());
        metrics.insert("inactive_instances".to_string(), self.inactive_instances.to_string());
        metrics.insert("usage_ratio".to_string(), format!("{:.2}", self.usage_ratio));
        metrics.insert("target_usage_ratio".to_string(), format!("{:.2}", self.target_usage_ratio));
        metrics.insert("max_capacity".to_string(), self.max_capacity.to_string());
        metrics
    }
}

/// Running counters kept by each pool
#[derive(Debug, Default, Clone)]
pub(crate) struct MetricsTracker {
    pub spawned: u64,
    pub despawned: u64,
    pub created: u64,
    pub destroyed: u64,
    pub exhausted: u64,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(
        &self,
        active: usize,
        inactive: usize,
        target_usage_ratio: f32,
        max_capacity: usize,
    ) -> PoolMetrics {
        let total = active + inactive;
        let usage_ratio = if total > 0 {
            active as f64 / total as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_spawned: self.spawned,
            total_despawned: self.despawned,
            total_created: self.created,
            total_destroyed: self.destroyed,
            exhausted_events: self.exhausted,
            active_instances: active,
            inactive_instances: inactive,
            usage_ratio,
            target_usage_ratio,
            max_capacity,
        }
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "metrics")]
pub struct MetricsExporter;

#[cfg(feature = "metrics")]
impl MetricsExporter {
    /// Export metrics of several pools in Prometheus exposition format
    ///
    /// Each entry is `(pool label, metrics)`; `tags` become constant labels on
    /// every series.
    ///
    /// # Examples
    ///
    /// ```
    /// use esox_spawnpool::{MetricsExporter, Pool, PoolLimits, Prototype};
    /// use std::collections::HashMap;
    ///
    /// let mut pool = Pool::with_clone_factory(Prototype::named("bullet", 0u8), PoolLimits::new()).unwrap();
    /// pool.spawn().unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("scene".to_string(), "arena".to_string());
    ///
    /// let output = MetricsExporter::export_prometheus(&[("bullet".to_string(), pool.metrics())], Some(&tags)).unwrap();
    /// assert!(output.contains("spawnpool_instances_active"));
    /// assert!(output.contains("pool=\"bullet\""));
    /// assert!(output.contains("scene=\"arena\""));
    /// ```
    pub fn export_prometheus(
        pools: &[(String, PoolMetrics)],
        tags: Option<&HashMap<String, String>>,
    ) -> crate::PoolResult<String> {
        use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

        let registry = Registry::new();
        let const_labels = tags.cloned().unwrap_or_default();
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(const_labels.clone());

        let active = IntGaugeVec::new(opts("spawnpool_instances_active", "Current active instances"), &["pool"])
            .map_err(export_error)?;
        let inactive = IntGaugeVec::new(opts("spawnpool_instances_inactive", "Current inactive instances"), &["pool"])
            .map_err(export_error)?;
        let usage = GaugeVec::new(opts("spawnpool_usage_ratio", "Current active/total ratio"), &["pool"])
            .map_err(export_error)?;
        let spawned = IntCounterVec::new(opts("spawnpool_spawned_total", "Total spawns"), &["pool"])
            .map_err(export_error)?;
        let despawned = IntCounterVec::new(opts("spawnpool_despawned_total", "Total despawns"), &["pool"])
            .map_err(export_error)?;
        let created = IntCounterVec::new(opts("spawnpool_created_total", "Instances created by the factory"), &["pool"])
            .map_err(export_error)?;
        let destroyed = IntCounterVec::new(opts("spawnpool_destroyed_total", "Instances destroyed by reclamation"), &["pool"])
            .map_err(export_error)?;
        let exhausted = IntCounterVec::new(opts("spawnpool_exhausted_total", "Spawns rejected at capacity"), &["pool"])
            .map_err(export_error)?;

        registry.register(Box::new(active.clone())).map_err(export_error)?;
        registry.register(Box::new(inactive.clone())).map_err(export_error)?;
        registry.register(Box::new(usage.clone())).map_err(export_error)?;
        registry.register(Box::new(spawned.clone())).map_err(export_error)?;
        registry.register(Box::new(despawned.clone())).map_err(export_error)?;
        registry.register(Box::new(created.clone())).map_err(export_error)?;
        registry.register(Box::new(destroyed.clone())).map_err(export_error)?;
        registry.register(Box::new(exhausted.clone())).map_err(export_error)?;

        for (label, metrics) in pools {
            let labels = [label.as_str()];
            active.with_label_values(&labels).set(metrics.active_instances as i64);
            inactive.with_label_values(&labels).set(metrics.inactive_instances as i64);
            usage.with_label_values(&labels).set(metrics.usage_ratio);
            spawned.with_label_values(&labels).inc_by(metrics.total_spawned);
            despawned.with_label_values(&labels).inc_by(metrics.total_despawned);
            created.with_label_values(&labels).inc_by(metrics.total_created);
            destroyed.with_label_values(&labels).inc_by(metrics.total_destroyed);
            exhausted.with_label_values(&labels).inc_by(metrics.exhausted_events);
        }

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(export_error)?;
        String::from_utf8(buffer).map_err(export_error)
    }
}

#[cfg(feature = "metrics")]
fn export_error(err: impl std::fmt::Display) -> crate::PoolError {
    crate::PoolError::MetricsExport(err.to_string())
}
