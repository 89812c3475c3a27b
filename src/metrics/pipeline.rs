//! Orchestrator metrics: unit outcomes, row volumes, stage timings.

use crate::metrics::{phase_metric, MetricDoc, MetricType, PhaseMetrics};

pub struct PipelineMetrics;

impl PipelineMetrics {
    /// Count a finished unit by its status label (`PASS`, `NO-DATA`, `FAIL`, `PARTIAL`).
    pub fn record_unit(status: &'static str, duration_secs: f64) {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "units"), "status" => status).increment(1);
        ::metrics::histogram!(phase_metric!(histogram, "pipeline", "unit_duration_seconds"))
            .record(duration_secs);
    }

    pub fn record_rows_fetched(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "rows_fetched")).increment(rows as u64);
    }

    pub fn record_rows_enriched(rows: usize) {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "rows_enriched")).increment(rows as u64);
    }

    pub fn record_stage_duration(stage: &'static str, duration_secs: f64) {
        ::metrics::histogram!(
            phase_metric!(histogram, "pipeline", "stage_duration_seconds"),
            "stage" => stage
        )
        .record(duration_secs);
    }

    /// `table_kind` is `raw` or `wrk`.
    pub fn record_sink_failure(table_kind: &'static str) {
        ::metrics::counter!(
            phase_metric!(counter, "pipeline", "sink_write_failures"),
            "table" => table_kind
        )
        .increment(1);
    }

    pub fn record_duplicate_rows(count: usize) {
        ::metrics::counter!(phase_metric!(counter, "pipeline", "duplicate_row_keys")).increment(count as u64);
    }
}

impl PhaseMetrics for PipelineMetrics {
    fn register_metrics() {
        use metrics::{counter, histogram};

        let _ = counter!(phase_metric!(counter, "pipeline", "units"));
        let _ = counter!(phase_metric!(counter, "pipeline", "rows_fetched"));
        let _ = counter!(phase_metric!(counter, "pipeline", "rows_enriched"));
        let _ = counter!(phase_metric!(counter, "pipeline", "sink_write_failures"));
        let _ = counter!(phase_metric!(counter, "pipeline", "duplicate_row_keys"));
        let _ = histogram!(phase_metric!(histogram, "pipeline", "unit_duration_seconds"));
        let _ = histogram!(phase_metric!(histogram, "pipeline", "stage_duration_seconds"));
    }

    fn phase_name() -> &'static str {
        "pipeline"
    }

    fn metrics_documentation() -> Vec<MetricDoc> {
        vec![
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "units"),
                metric_type: MetricType::Counter,
                help: "Processed date units by outcome",
                labels: vec!["status"],
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "rows_fetched"),
                metric_type: MetricType::Counter,
                help: "Pitch rows returned by the source",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "rows_enriched"),
                metric_type: MetricType::Counter,
                help: "Pitch rows that completed transformation",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "sink_write_failures"),
                metric_type: MetricType::Counter,
                help: "Failed appends to the raw or working tables",
                labels: vec!["table"],
            },
            MetricDoc {
                name: phase_metric!(counter, "pipeline", "duplicate_row_keys"),
                metric_type: MetricType::Counter,
                help: "Rows sharing a (game, plate appearance, pitch) key with an earlier row",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "pipeline", "unit_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of one date unit",
                labels: vec![],
            },
            MetricDoc {
                name: phase_metric!(histogram, "pipeline", "stage_duration_seconds"),
                metric_type: MetricType::Histogram,
                help: "Wall time of each transformation stage",
                labels: vec!["stage"],
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        PipelineMetrics::register_metrics();
        PipelineMetrics::record_unit("PASS", 0.5);
        PipelineMetrics::record_sink_failure("raw");
    }

    #[test]
    fn test_metrics_documentation() {
        let docs = PipelineMetrics::metrics_documentation();
        assert_eq!(docs.len(), 7);
        for doc in docs {
            assert!(doc.name.starts_with("statcast_pipeline_"));
        }
    }
}
