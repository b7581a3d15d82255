//! Registration of all phase metrics
//!
//! Describes every metric with the installed recorder and detects naming
//! conflicts between phases early.

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Register all metrics from all phases
pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::manager::ManagerMetrics>(&mut all_metrics);
    register_phase_metrics::<super::analyzer::AnalyzerMetrics>(&mut all_metrics);

    info!(
        "Registered {} total metrics across all phases",
        all_metrics.len()
    );
}

/// Register metrics for a specific phase and detect conflicts
fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<&'static str, MetricDoc>) {
    T::register_metrics();
    let phase_name = T::phase_name();

    for doc in T::metrics_documentation() {
        if extract_phase_from_metric_name(doc.name) != phase_name {
            warn!(
                "Metric '{}' does not carry the prefix of phase '{}'",
                doc.name, phase_name
            );
        }
        if all_metrics.contains_key(doc.name) {
            warn!(
                "Metric name conflict detected: '{}' registered again by phase '{}'",
                doc.name, phase_name
            );
        } else {
            debug!("  - {} ({:?}): {}", doc.name, doc.metric_type, doc.help);
            all_metrics.insert(doc.name, doc);
        }
    }
}

/// Phase segment of an `orm_<phase>_<name>` metric, e.g.
/// `orm_analyzer_cache_misses_total` -> `analyzer`. Names outside the `orm_`
/// namespace map to `unknown`.
fn extract_phase_from_metric_name(metric_name: &str) -> &str {
    metric_name
        .strip_prefix("orm_")
        .and_then(|rest| rest.split_once('_'))
        .map_or("unknown", |(phase, _)| phase)
}
