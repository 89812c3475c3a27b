//! Metrics for the Statcast ETL
//!
//! Each pipeline phase defines its own metrics in a dedicated submodule. Names
//! follow `statcast_{phase}_{name}` with a `_total` suffix for counters.
//! Recording is a no-op until [`init_metrics`] installs the Prometheus recorder.

pub mod enrich;
pub mod pipeline;
pub mod registry;

pub use enrich::EnrichMetrics;
pub use pipeline::PipelineMetrics;

use crate::error::Result;
use std::path::Path;
use std::sync::{Once, OnceLock};
use tracing::{info, warn};

static INIT: Once = Once::new();
static HANDLE: OnceLock<metrics_exporter_prometheus::PrometheusHandle> = OnceLock::new();

/// Install the in-process Prometheus recorder and register every phase's
/// metrics. Idempotent.
pub fn init_metrics() {
    INIT.call_once(|| {
        match metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder() {
            Ok(handle) => {
                if HANDLE.set(handle).is_err() {
                    warn!("Prometheus handle was already stored");
                }
                registry::register_all_metrics();
                info!("Prometheus recorder installed");
            }
            Err(e) => {
                warn!("Failed to install Prometheus recorder: {}", e);
            }
        }
    });
}

/// Render the current snapshot in Prometheus text format to `path`.
///
/// Returns `false` without writing when no recorder is installed.
pub fn write_textfile(path: &Path) -> Result<bool> {
    let Some(handle) = HANDLE.get() else {
        warn!("Metrics recorder not installed, skipping textfile {}", path.display());
        return Ok(false);
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, handle.render())?;
    info!("Wrote metrics snapshot to {}", path.display());
    Ok(true)
}

/// Trait for phase-specific metrics collections
pub trait PhaseMetrics {
    /// Pre-register all metrics for this phase so they appear in snapshots
    /// before first use.
    fn register_metrics();

    fn phase_name() -> &'static str;

    fn metrics_documentation() -> Vec<MetricDoc>;
}

/// Documentation for a single metric
#[derive(Debug, Clone)]
pub struct MetricDoc {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub help: &'static str,
    #[allow(dead_code)]
    pub labels: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub enum MetricType {
    Counter,
    Histogram,
}

/// Build a metric name following `statcast_{phase}_{name}[_total]`.
macro_rules! phase_metric {
    (counter, $phase:literal, $name:literal) => {
        concat!("statcast_", $phase, "_", $name, "_total")
    };
    (histogram, $phase:literal, $name:literal) => {
        concat!("statcast_", $phase, "_", $name)
    };
}

pub(crate) use phase_metric;
