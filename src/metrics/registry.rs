//! Registration of every phase's metrics, with conflict detection.

use crate::metrics::{MetricDoc, PhaseMetrics};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub fn register_all_metrics() {
    let mut all_metrics = HashMap::new();

    register_phase_metrics::<super::pipeline::PipelineMetrics>(&mut all_metrics);
    register_phase_metrics::<super::enrich::EnrichMetrics>(&mut all_metrics);

    info!(
        "Registered {} total metrics across all phases",
        all_metrics.len()
    );
    for doc in all_metrics.values() {
        debug!("  - {} ({:?}): {}", doc.name, doc.metric_type, doc.help);
    }
}

fn register_phase_metrics<T: PhaseMetrics>(all_metrics: &mut HashMap<&'static str, MetricDoc>) {
    T::register_metrics();
    let phase_name = T::phase_name();
    for doc in T::metrics_documentation() {
        if extract_phase_from_metric_name(doc.name) != phase_name {
            warn!("Metric '{}' does not carry its phase prefix '{}'", doc.name, phase_name);
        }
        if all_metrics.contains_key(doc.name) {
            warn!("Metric name conflict detected: '{}' (phase '{}')", doc.name, phase_name);
        } else {
            all_metrics.insert(doc.name, doc);
        }
    }
}

/// Extract the phase from a metric name (`statcast_enrich_lookup_misses_total` -> `enrich`).
fn extract_phase_from_metric_name(metric_name: &str) -> &str {
    metric_name
        .strip_prefix("statcast_")
        .and_then(|rest| rest.split('_').next())
        .filter(|phase| !phase.is_empty())
        .unwrap_or("unknown")
}
