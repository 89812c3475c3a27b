// Data processing pipeline: per-date orchestration and batch transformation

pub mod orchestrator;
pub mod processing;

pub use orchestrator::{Orchestrator, RunSummary, Stage, UnitReport, UnitState, UnitStatus};
pub use processing::transform;
