//! Metrics for gateway resolution and entity operations
//!
//! Each component defines its metrics in a dedicated submodule through the
//! [`PhaseMetrics`] trait. Recording goes through the `metrics` facade; this
//! crate installs no recorder or exporter, so the host application decides
//! where (and whether) the numbers go.

pub mod analyzer;
pub mod manager;
pub mod registry;

pub use analyzer::AnalyzerMetrics;
pub use manager::ManagerMetrics;

use std::sync::Once;

static INIT: Once = Once::new();

/// Describe every metric with the installed recorder. Idempotent.
pub fn init_metrics() {
    INIT.call_once(registry::register_all_metrics);
}

/// Trait for phase-specific metrics collections
pub trait PhaseMetrics {
    /// Register (describe) all metrics for this phase
    fn register_metrics();

    /// Get the phase name for prefixing metrics
    fn phase_name() -> &'static str;

    /// Get documentation for all metrics in this phase
    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
    Gauge,
}

/// Builds metric names following the convention `orm_{phase}_{metric_name}[_total]`
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("orm_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("orm_", $phase, "_", $name)
    };
    (gauge, $phase:literal, $name:literal) => {
        concat!("orm_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
