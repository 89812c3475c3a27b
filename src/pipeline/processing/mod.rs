// Pipeline processing: renormalization, enrichment, aggregation, role labels

pub mod aggregate;
pub mod enrich;
pub mod renormalize;
pub mod roles;

pub use aggregate::EventAggregator;
pub use enrich::ContextEnricher;
pub use renormalize::{ColumnSpec, Renormalizer};
pub use roles::RoleClassifier;

use crate::constants::col;
use crate::error::{EtlError, Result};
use crate::metrics::PipelineMetrics;
use crate::registry::Registry;
use crate::types::Frame;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{info, warn};

/// One whole-batch transformation stage.
pub trait FrameStep {
    fn name(&self) -> &'static str;

    fn apply(&self, frame: &mut Frame) -> Result<()>;
}

/// Count rows whose (game, plate appearance, pitch) key repeats an earlier row.
pub fn duplicate_row_keys(frame: &Frame) -> Result<usize> {
    let game = frame.require_column(col::GAME_ID)?;
    let pa = frame.require_column(col::PA_NUMBER)?;
    let pitch = frame.require_column(col::PITCH_NUMBER)?;
    let mut seen = HashSet::with_capacity(frame.len());
    Ok(frame
        .rows()
        .iter()
        .filter(|row| !seen.insert((row[game].to_string(), row[pa].to_string(), row[pitch].to_string())))
        .count())
}

/// Run every stage in order: renormalize, enrich, aggregate, roles.
///
/// All-or-nothing: the first failing stage aborts the batch and is named in
/// the returned [`EtlError::Transform`].
pub fn transform(mut frame: Frame, columns: &ColumnSpec, registry: &Registry) -> Result<Frame> {
    let renormalizer = Renormalizer::new(columns);
    let enricher = ContextEnricher::new(registry);
    let steps: [&dyn FrameStep; 4] = [&renormalizer, &enricher, &EventAggregator, &RoleClassifier];

    for step in steps {
        let started = Instant::now();
        step.apply(&mut frame).map_err(|e| EtlError::Transform {
            stage: step.name(),
            source: Box::new(e),
        })?;
        let elapsed = started.elapsed().as_secs_f64();
        PipelineMetrics::record_stage_duration(step.name(), elapsed);
        info!(
            "✅ {} complete: {} rows x {} columns in {:.3}s",
            step.name(),
            frame.len(),
            frame.columns().len(),
            elapsed
        );

        if step.name() == renormalizer.name() {
            let duplicates = duplicate_row_keys(&frame).map_err(|e| EtlError::Transform {
                stage: renormalizer.name(),
                source: Box::new(e),
            })?;
            if duplicates > 0 {
                warn!("{} rows repeat a (game, plate appearance, pitch) key", duplicates);
                PipelineMetrics::record_duplicate_rows(duplicates);
            }
        }
    }
    Ok(frame)
}
