//! Manager Metrics
//!
//! Gateway resolution (cache hits, link hits, builds, failures) and the bulk
//! entity operations the manager delegates to gateways.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct ManagerMetrics;

impl ManagerMetrics {
    /// A gateway was built and committed
    pub fn record_resolution(duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "manager", "gateway_builds")).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "manager", "gateway_build_duration_seconds"))
            .record(duration_secs);
    }

    pub fn record_cache_hit() {
        ::metrics::counter!(phase_metric!(counter, "manager", "gateway_cache_hits")).increment(1);
    }

    /// Resolved through the link of a gateway still under construction
    pub fn record_link_hit() {
        ::metrics::counter!(phase_metric!(counter, "manager", "gateway_link_hits")).increment(1);
    }

    pub fn record_resolution_failure() {
        ::metrics::counter!(phase_metric!(counter, "manager", "gateway_resolution_failures"))
            .increment(1);
    }

    pub fn record_realized(count: usize) {
        ::metrics::gauge!(phase_metric!(gauge, "manager", "realized_gateways")).set(count as f64);
    }

    pub fn record_saved() {
        ::metrics::counter!(phase_metric!(counter, "manager", "entities_saved")).increment(1);
    }

    pub fn record_removed() {
        ::metrics::counter!(phase_metric!(counter, "manager", "entities_removed")).increment(1);
    }

    pub fn record_refreshed() {
        ::metrics::counter!(phase_metric!(counter, "manager", "gateways_refreshed")).increment(1);
    }
}

const DOCS: &[(&str, MetricType, &str)] = &[
    (
        phase_metric!(counter, "manager", "gateway_builds"),
        MetricType::Counter,
        "Total number of gateways built and committed",
    ),
    (
        phase_metric!(counter, "manager", "gateway_cache_hits"),
        MetricType::Counter,
        "Total number of resolutions served by an already committed gateway",
    ),
    (
        phase_metric!(counter, "manager", "gateway_link_hits"),
        MetricType::Counter,
        "Total number of resolutions served by a construction link",
    ),
    (
        phase_metric!(counter, "manager", "gateway_resolution_failures"),
        MetricType::Counter,
        "Total number of failed gateway resolutions",
    ),
    (
        phase_metric!(counter, "manager", "entities_saved"),
        MetricType::Counter,
        "Total number of entities saved through the manager",
    ),
    (
        phase_metric!(counter, "manager", "entities_removed"),
        MetricType::Counter,
        "Total number of entities removed through the manager",
    ),
    (
        phase_metric!(counter, "manager", "gateways_refreshed"),
        MetricType::Counter,
        "Total number of gateway refreshes",
    ),
    (
        phase_metric!(histogram, "manager", "gateway_build_duration_seconds"),
        MetricType::Histogram,
        "Time from first request to commit of a gateway in seconds",
    ),
    (
        phase_metric!(gauge, "manager", "realized_gateways"),
        MetricType::Gauge,
        "Number of gateways committed by the manager",
    ),
];

impl PhaseMetrics for ManagerMetrics {
    fn register_metrics() {
        use metrics::{describe_counter, describe_gauge, describe_histogram};

        for (name, metric_type, help) in DOCS {
            match metric_type {
                MetricType::Counter => describe_counter!(*name, *help),
                MetricType::Histogram => describe_histogram!(*name, *help),
                MetricType::Gauge => describe_gauge!(*name, *help),
            }
        }
    }

    fn phase_name() -> &'static str {
        "manager"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        DOCS.iter()
            .map(|(name, metric_type, help)| MetricDoc {
                name: *name,
                metric_type: metric_type.clone(),
                help: *help,
            })
            .collect()
    }
}
