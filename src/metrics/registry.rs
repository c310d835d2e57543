//! Metrics registry for coordinating phase-specific metrics
//!
//! Registers every phase's metrics at startup and detects name conflicts early.

use crate::metrics::stages::{DataMetrics, StageMetrics};
use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Register all metrics from all phases, returning the number of distinct names
pub fn register_all_metrics() -> usize {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<StageMetrics>(&mut all_metrics);
    register_phase_metrics::<DataMetrics>(&mut all_metrics);

    info!(
        "Registered {} total metrics across all phases",
        all_metrics.len()
    );

    for doc in all_metrics.values() {
        debug!(
            "  - {} ({:?}) [phase {}]: {}",
            doc.name,
            doc.metric_type,
            extract_phase_from_metric_name(doc.name),
            doc.help
        );
    }

    all_metrics.len()
}

fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<&'static str, MetricDoc>) {
    T::register_metrics();
    let phase_name = T::phase_name();

    for doc in T::metrics_documentation() {
        if all_metrics.contains_key(doc.name) {
            warn!(
                "Metric name conflict detected: '{}' redefined by phase '{}'",
                doc.name, phase_name
            );
        } else {
            all_metrics.insert(doc.name, doc);
        }
    }
}

/// Extract phase name from metric name (e.g., "pageviews_stage_failed_total" -> "stage")
fn extract_phase_from_metric_name(metric_name: &str) -> &str {
    if let Some(stripped) = metric_name.strip_prefix("pageviews_") {
        if let Some(next_underscore) = stripped.find('_') {
            return &stripped[..next_underscore];
        }
    }
    "unknown"
}
