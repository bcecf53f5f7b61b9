//! Metrics collection and export for object pools

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Point-in-time view of a pool's gauges and counters.
///
/// Values are read one after another without a common lock, so a snapshot
/// taken while other threads take and restore is only eventually consistent.
///
/// # Examples
///
/// ```
/// use concurrent_objectpool::{FnFactory, ObjectPool, PoolConfiguration};
///
/// let config = PoolConfiguration::new().with_initial_size(2).with_max_size(4);
/// let pool = ObjectPool::new(FnFactory::new(|| Ok(0u32)), config).unwrap();
///
/// let obj = pool.try_take_now().unwrap().unwrap();
/// let metrics = pool.metrics();
/// assert_eq!(metrics.created_total, 2);
/// assert_eq!(metrics.taken, 1);
/// assert_eq!(metrics.taken_count, 1);
/// pool.restore(obj).unwrap();
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Objects created eagerly at construction
    pub initial_size: usize,

    /// Maximum number of objects that may exist
    pub max_size: usize,

    /// Objects currently allocated, idle or on loan
    pub created_total: usize,

    /// Idle objects waiting in the store
    pub remaining_created: usize,

    /// Takes that could still be granted before reaching max_size
    pub remaining_capacity: usize,

    /// Objects currently on loan
    pub taken: usize,

    /// Successful takes since the pool was built
    pub taken_count: u64,

    /// Factory create calls that failed
    pub creation_failures: usize,

    /// Objects handed to the factory for destruction
    pub destroyed_total: usize,

    /// Objects that failed a readiness check
    pub validation_failures: usize,

    /// Restores rejected because nothing matching was on loan
    pub invalid_restores: usize,

    /// On-loan ratio of max_size (0.0 to 1.0)
    pub utilization: f64,
}

impl PoolMetrics {
    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("initial_size".to_string(), self.initial_size.to_string());
        metrics.insert("max_size".to_string(), self.max_size.to_string());
        metrics.insert("created_total".to_string(), self.created_total.to_string());
        metrics.insert("remaining_created".to_string(), self.remaining_created.to_string());
        metrics.insert("remaining_capacity".to_string(), self.remaining_capacity.to_string());
        metrics.insert("taken".to_string(), self.taken.to_string());
        metrics.insert("taken_count".to_string(), self.taken_count.to_string());
        metrics.insert("creation_failures".to_string(), self.creation_failures.to_string());
        metrics.insert("destroyed_total".to_string(), self.destroyed_total.to_string());
        metrics.insert("validation_failures".to_string(), self.validation_failures.to_string());
        metrics.insert("invalid_restores".to_string(), self.invalid_restores.to_string());
        metrics.insert("utilization".to_string(), format!("{:.2}", self.utilization));
        metrics
    }
}

/// Metrics exporter for Prometheus format
#[cfg(feature = "prometheus")]
pub struct MetricsExporter;

#[cfg(feature = "prometheus")]
impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// # Examples
    ///
    /// ```
    /// use concurrent_objectpool::{FnFactory, MetricsExporter, ObjectPool, PoolConfiguration};
    /// use std::collections::HashMap;
    ///
    /// let pool = ObjectPool::new(FnFactory::new(|| Ok(1)), PoolConfiguration::default()).unwrap();
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = MetricsExporter::export_prometheus(&pool.metrics(), "my_pool", Some(&tags)).unwrap();
    /// assert!(output.contains("objectpool_objects_created"));
    /// assert!(output.contains("service=\"api\""));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> prometheus::Result<String> {
        use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Opts, Registry, TextEncoder};

        let registry = Registry::new();
        let labels = Self::labels(pool_name, tags);
        let opts = |name: &str, help: &str| Opts::new(name, help).const_labels(labels.clone());

        let gauges = [
            ("objectpool_objects_created", "Objects currently allocated", metrics.created_total),
            ("objectpool_objects_idle", "Idle objects in the store", metrics.remaining_created),
            ("objectpool_objects_taken", "Objects currently on loan", metrics.taken),
            ("objectpool_capacity_remaining", "Takes still grantable", metrics.remaining_capacity),
            ("objectpool_max_size", "Maximum number of objects", metrics.max_size),
        ];
        for (name, help, value) in gauges {
            let gauge = IntGauge::with_opts(opts(name, help))?;
            gauge.set(value as i64);
            registry.register(Box::new(gauge))?;
        }

        let counters = [
            ("objectpool_takes_total", "Successful takes", metrics.taken_count),
            ("objectpool_creation_failures_total", "Failed creations", metrics.creation_failures as u64),
            ("objectpool_destroyed_total", "Destroyed objects", metrics.destroyed_total as u64),
            ("objectpool_validation_failures_total", "Failed readiness checks", metrics.validation_failures as u64),
            ("objectpool_invalid_restores_total", "Rejected restores", metrics.invalid_restores as u64),
        ];
        for (name, help, value) in counters {
            let counter = IntCounter::with_opts(opts(name, help))?;
            counter.inc_by(value);
            registry.register(Box::new(counter))?;
        }

        let utilization = Gauge::with_opts(opts("objectpool_utilization", "Pool utilization ratio"))?;
        utilization.set(metrics.utilization);
        registry.register(Box::new(utilization))?;

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    fn labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> HashMap<String, String> {
        let mut labels = HashMap::new();
        labels.insert("pool".to_string(), pool_name.to_string());

        if let Some(tags) = tags {
            for (key, value) in tags {
                labels.insert(key.clone(), value.clone());
            }
        }

        labels
    }
}

/// Internal event counters
pub(crate) struct MetricsTracker {
    pub creation_failures: AtomicUsize,
    pub destroyed_total: AtomicUsize,
    pub validation_failures: AtomicUsize,
    pub invalid_restores: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            creation_failures: AtomicUsize::new(0),
            destroyed_total: AtomicUsize::new(0),
            validation_failures: AtomicUsize::new(0),
            invalid_restores: AtomicUsize::new(0),
        }
    }

    pub fn record(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn load(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Relaxed)
    }
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PoolMetrics {
        PoolMetrics {
            initial_size: 1,
            max_size: 10,
            created_total: 4,
            remaining_created: 1,
            remaining_capacity: 7,
            taken: 3,
            taken_count: 12,
            creation_failures: 0,
            destroyed_total: 2,
            validation_failures: 1,
            invalid_restores: 0,
            utilization: 0.3,
        }
    }

    #[test]
    fn test_export_map() {
        let exported = sample().export();
        assert_eq!(exported["created_total"], "4");
        assert_eq!(exported["taken_count"], "12");
        assert_eq!(exported["utilization"], "0.30");
        assert_eq!(exported.len(), 12);
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_export_prometheus() {
        let output = MetricsExporter::export_prometheus(&sample(), "db", None).unwrap();
        assert!(output.contains("# TYPE objectpool_objects_created gauge"));
        assert!(output.contains("objectpool_objects_created{pool=\"db\"} 4"));
        assert!(output.contains("objectpool_takes_total{pool=\"db\"} 12"));
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_export_prometheus_rejects_bad_label() {
        let mut tags = HashMap::new();
        tags.insert("bad-label".to_string(), "x".to_string());
        assert!(MetricsExporter::export_prometheus(&sample(), "db", Some(&tags)).is_err());
    }

    #[test]
    fn test_tracker_counts() {
        let tracker = MetricsTracker::new();
        MetricsTracker::record(&tracker.destroyed_total);
        MetricsTracker::record(&tracker.destroyed_total);
        assert_eq!(MetricsTracker::load(&tracker.destroyed_total), 2);
        assert_eq!(MetricsTracker::load(&tracker.invalid_restores), 0);
    }
}
