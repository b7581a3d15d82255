//! Analyzer Metrics
//!
//! Hit rate of the analyzer cache, i.e. how often entity metadata had to be
//! inspected again.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct AnalyzerMetrics;

impl AnalyzerMetrics {
    pub fn record_cache_hit() {
        ::metrics::counter!(phase_metric!(counter, "analyzer", "cache_hits")).increment(1);
    }

    /// Metadata was inspected and written back to the cache
    pub fn record_cache_miss() {
        ::metrics::counter!(phase_metric!(counter, "analyzer", "cache_misses")).increment(1);
    }
}

impl PhaseMetrics for AnalyzerMetrics {
    fn register_metrics() {
        use metrics::describe_counter;

        describe_counter!(
            phase_metric!(counter, "analyzer", "cache_hits"),
            "Total number of entity analyses served from the cache"
        );
        describe_counter!(
            phase_metric!(counter, "analyzer", "cache_misses"),
            "Total number of entity analyses that inspected metadata"
        );
    }

    fn phase_name() -> &'static str {
        "analyzer"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "analyzer", "cache_hits"),
                metric_type: MetricType::Counter,
                help: "Total number of entity analyses served from the cache",
            },
            MetricDoc {
                name: phase_metric!(counter, "analyzer", "cache_misses"),
                metric_type: MetricType::Counter,
                help: "Total number of entity analyses that inspected metadata",
            },
        ]
    }
}
