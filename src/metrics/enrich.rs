//! Enrichment data-quality metrics.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct EnrichMetrics;

impl EnrichMetrics {
    /// `kind` names the lookup: `name`, `league`, `division`, `ballpark`,
    /// `position`, `batting_order` or `speed`.
    pub fn record_lookup_misses(kind: &'static str, count: usize) {
        if count == 0 {
            return;
        }
        ::metrics::counter!(phase_metric!(counter, "enrich", "lookup_misses"), "kind" => kind)
            .increment(count as u64);
    }

    pub fn record_negative_rbi(count: usize) {
        if count == 0 {
            return;
        }
        ::metrics::counter!(phase_metric!(counter, "enrich", "negative_rbi")).increment(count as u64);
    }
}

impl PhaseMetrics for EnrichMetrics {
    fn register_metrics() {
        use metrics::counter;

        let _ = counter!(phase_metric!(counter, "enrich", "lookup_misses"));
        let _ = counter!(phase_metric!(counter, "enrich", "negative_rbi"));
    }

    fn phase_name() -> &'static str {
        "enrich"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "enrich", "lookup_misses"),
                metric_type: MetricType::Counter,
                help: "Registry lookups that fell back to their default",
                labels: vec!["kind"],
            },
            MetricDoc {
                name: phase_metric!(counter, "enrich", "negative_rbi"),
                metric_type: MetricType::Counter,
                help: "Rows whose derived RBI came out negative",
                labels: vec![],
            },
        ]
    }
}
