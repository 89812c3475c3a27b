//! Per-date unit orchestration.
//!
//! A unit moves `Idle -> Fetching -> RawPersisted -> Transforming ->
//! EnrichedPersisted -> Done`, or into `Failed(stage)`. Unit failures are
//! reported and never stop the run; only registry loading errors do.

use crate::config::LedgerConfig;
use crate::constants::{table_name, RAW_TABLE_PREFIX, REDUNDANT_RAW_COLUMNS, WORKING_TABLE_PREFIX};
use crate::db::RunLog;
use crate::error::{EtlError, Result};
use crate::metrics::PipelineMetrics;
use crate::pipeline::processing::{transform, ColumnSpec};
use crate::registry::{LedgerFeed, ReferenceTables, Registry, SeasonLedgers};
use crate::storage::Sink;
use crate::types::EventSource;
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn};

/// Stage at which a unit can fail. The raw write has no variant: its failure
/// is logged and the unit carries on to `Transforming`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Fetching,
    Transforming,
    EnrichedPersisted,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Fetching => "fetching",
            Stage::Transforming => "transforming",
            Stage::EnrichedPersisted => "enriched_persisted",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    Idle,
    Fetching,
    RawPersisted,
    Transforming,
    EnrichedPersisted,
    Done,
    Failed(Stage),
}

/// Outcome label written to the console, the run log and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnitStatus {
    Pass,
    NoData,
    Fail,
    /// Enrichment succeeded but the working-table write did not.
    Partial,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Pass => "PASS",
            UnitStatus::NoData => "NO-DATA",
            UnitStatus::Fail => "FAIL",
            UnitStatus::Partial => "PARTIAL",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnitReport {
    pub date: NaiveDate,
    pub status: UnitStatus,
    pub failed_stage: Option<Stage>,
    pub raw_rows: usize,
    pub enriched_rows: usize,
    pub raw_persisted: bool,
    pub elapsed: Duration,
    pub cumulative: Duration,
    pub error: Option<String>,
}

/// Result of a multi-date run
#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    pub units: Vec<UnitReport>,
}

impl RunSummary {
    pub fn count(&self, status: UnitStatus) -> usize {
        self.units.iter().filter(|u| u.status == status).count()
    }

    pub fn enriched_rows(&self) -> usize {
        self.units.iter().map(|u| u.enriched_rows).sum()
    }
}

/// What a unit produced before the report is stamped with timings.
struct UnitOutcome {
    status: UnitStatus,
    failed_stage: Option<Stage>,
    raw_rows: usize,
    enriched_rows: usize,
    raw_persisted: bool,
    error: Option<String>,
}

fn advance(state: &mut UnitState, next: UnitState) {
    debug!("state {:?} -> {:?}", state, next);
    *state = next;
}

/// Fetch, persist raw, transform, persist enriched for one date.
fn process_unit(
    source: &dyn EventSource,
    sink: &mut dyn Sink,
    columns: &ColumnSpec,
    registry: &Registry,
    date: NaiveDate,
) -> UnitOutcome {
    let mut state = UnitState::Idle;
    let mut outcome = UnitOutcome {
        status: UnitStatus::Fail,
        failed_stage: None,
        raw_rows: 0,
        enriched_rows: 0,
        raw_persisted: false,
        error: None,
    };

    advance(&mut state, UnitState::Fetching);
    let mut raw = match source.fetch_events(date, date) {
        Ok(frame) => frame,
        Err(e) => {
            error!("❌ Fetch from {} failed: {}", source.source_name(), e);
            advance(&mut state, UnitState::Failed(Stage::Fetching));
            outcome.failed_stage = Some(Stage::Fetching);
            outcome.error = Some(e.to_string());
            return outcome;
        }
    };
    if raw.is_empty() {
        info!("No data for {}", date);
        advance(&mut state, UnitState::Done);
        outcome.status = UnitStatus::NoData;
        return outcome;
    }
    outcome.raw_rows = raw.len();
    PipelineMetrics::record_rows_fetched(raw.len());
    info!("📥 Fetched {} pitches from {}", raw.len(), source.source_name());

    // Season comes from the requested date, never from the rows
    let season = date.year();
    let dropped = raw.drop_columns(REDUNDANT_RAW_COLUMNS);
    debug!("Dropped {} redundant columns", dropped);

    let raw_table = table_name(RAW_TABLE_PREFIX, season);
    match sink.append_rows(&raw_table, &raw) {
        Ok(written) => {
            outcome.raw_persisted = true;
            advance(&mut state, UnitState::RawPersisted);
            info!("💾 Wrote {} rows to {}", written, raw_table);
        }
        Err(e) => {
            // Raw persistence is best-effort; enrichment continues
            error!("Raw write to {} failed: {}", raw_table, e);
            PipelineMetrics::record_sink_failure(RAW_TABLE_PREFIX);
            outcome.error = Some(e.to_string());
        }
    }

    advance(&mut state, UnitState::Transforming);
    let enriched = match transform(raw, columns, registry) {
        Ok(frame) => frame,
        Err(e) => {
            error!("❌ Transformation failed: {}", e);
            advance(&mut state, UnitState::Failed(Stage::Transforming));
            outcome.failed_stage = Some(Stage::Transforming);
            outcome.error = Some(e.to_string());
            return outcome;
        }
    };
    outcome.enriched_rows = enriched.len();
    PipelineMetrics::record_rows_enriched(enriched.len());

    let working_table = table_name(WORKING_TABLE_PREFIX, season);
    match sink.append_rows(&working_table, &enriched) {
        Ok(written) => {
            advance(&mut state, UnitState::EnrichedPersisted);
            info!("💾 Wrote {} rows to {}", written, working_table);
            advance(&mut state, UnitState::Done);
            outcome.status = UnitStatus::Pass;
        }
        Err(e) => {
            error!("Enriched write to {} failed: {}", working_table, e);
            PipelineMetrics::record_sink_failure(WORKING_TABLE_PREFIX);
            advance(&mut state, UnitState::Failed(Stage::EnrichedPersisted));
            outcome.status = UnitStatus::Partial;
            outcome.failed_stage = Some(Stage::EnrichedPersisted);
            outcome.error = Some(e.to_string());
        }
    }
    outcome
}

/// Drives date units through the pipeline against one source and one sink.
pub struct Orchestrator {
    source: Box<dyn EventSource>,
    sink: Box<dyn Sink>,
    reference: Arc<ReferenceTables>,
    columns: ColumnSpec,
    ledgers: LedgerConfig,
    feed: Option<Box<dyn LedgerFeed>>,
    run_log: Option<RunLog>,
    registry: Option<Registry>,
    save_ledgers: bool,
    run_started: Instant,
}

impl Orchestrator {
    pub fn new(
        source: Box<dyn EventSource>,
        sink: Box<dyn Sink>,
        reference: Arc<ReferenceTables>,
        columns: ColumnSpec,
        ledgers: LedgerConfig,
    ) -> Self {
        Self {
            source,
            sink,
            reference,
            columns,
            ledgers,
            feed: None,
            run_log: None,
            registry: None,
            save_ledgers: true,
            run_started: Instant::now(),
        }
    }

    pub fn with_run_log(mut self, run_log: RunLog) -> Self {
        self.run_log = Some(run_log);
        self
    }

    pub fn with_ledger_feed(mut self, feed: Box<dyn LedgerFeed>) -> Self {
        self.feed = Some(feed);
        self
    }

    /// Merge feed updates in memory only; ledger files are left untouched.
    pub fn without_ledger_save(mut self) -> Self {
        self.save_ledgers = false;
        self
    }

    pub fn registry(&self) -> Option<&Registry> {
        self.registry.as_ref()
    }

    /// Load the season's ledgers unless they are already current.
    fn ensure_registry(&mut self, season: i32) -> Result<()> {
        if self.registry.as_ref().is_some_and(|r| r.season() == season) {
            return Ok(());
        }
        info!("📚 Loading ledgers for season {}", season);
        let ledgers = SeasonLedgers::load(&self.ledgers.files_for(season))?;
        self.registry = Some(Registry::new(self.reference.clone(), season, ledgers));
        Ok(())
    }

    /// Process one date. Only a registry load failure is returned as an error.
    pub fn run_unit(&mut self, date: NaiveDate) -> Result<UnitReport> {
        let span = info_span!("unit", date = %date);
        let _enter = span.enter();
        let started = Instant::now();
        info!("▶️  Starting unit {}", date);

        self.ensure_registry(date.year())?;
        let registry = self
            .registry
            .as_ref()
            .ok_or_else(|| EtlError::Config(format!("no registry loaded for {}", date.year())))?;

        let outcome = process_unit(self.source.as_ref(), self.sink.as_mut(), &self.columns, registry, date);
        let report = UnitReport {
            date,
            status: outcome.status,
            failed_stage: outcome.failed_stage,
            raw_rows: outcome.raw_rows,
            enriched_rows: outcome.enriched_rows,
            raw_persisted: outcome.raw_persisted,
            elapsed: started.elapsed(),
            cumulative: self.run_started.elapsed(),
            error: outcome.error,
        };
        self.finish(&report);
        Ok(report)
    }

    /// Process dates sequentially; a failed unit does not stop later ones.
    pub fn run_dates<I>(&mut self, dates: I) -> Result<RunSummary>
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        let mut summary = RunSummary::default();
        for date in dates {
            summary.units.push(self.run_unit(date)?);
        }
        info!(
            "Run finished: {} units ({} pass, {} no-data, {} partial, {} fail), {} enriched rows",
            summary.units.len(),
            summary.count(UnitStatus::Pass),
            summary.count(UnitStatus::NoData),
            summary.count(UnitStatus::Partial),
            summary.count(UnitStatus::Fail),
            summary.enriched_rows()
        );
        Ok(summary)
    }

    /// Streaming mode: merge the day's ledger update, process the date, then
    /// write the merged ledgers back for the next run.
    pub fn stream_date(&mut self, date: NaiveDate) -> Result<UnitReport> {
        let season = date.year();
        self.ensure_registry(season)?;

        let Some(feed) = self.feed.as_ref() else {
            warn!("No ledger feed configured; ledgers stay as loaded");
            return self.run_unit(date);
        };
        let update = feed.update_for(date)?;
        if let Some(registry) = self.registry.as_mut() {
            registry.apply_update(update);
        }

        let report = self.run_unit(date)?;
        if !self.save_ledgers {
            info!("Ledger save disabled; merged ledgers kept in memory only");
            return Ok(report);
        }
        if let Some(registry) = self.registry.as_ref() {
            registry.ledgers().save_date_ledgers(&self.ledgers.files_for(season))?;
            info!("📝 Saved merged ledgers for season {}", season);
        }
        Ok(report)
    }

    fn finish(&self, report: &UnitReport) {
        let line = format!(
            "{} {} raw={} enriched={} unit={:.2}s total={:.2}s",
            report.status.as_str(),
            report.date,
            report.raw_rows,
            report.enriched_rows,
            report.elapsed.as_secs_f64(),
            report.cumulative.as_secs_f64()
        );
        match report.status {
            UnitStatus::Pass | UnitStatus::NoData => info!("{}", line),
            UnitStatus::Partial => warn!("{}", line),
            UnitStatus::Fail => error!(
                "{} stage={}",
                line,
                report.failed_stage.map(|s| s.as_str()).unwrap_or("unknown")
            ),
        }
        PipelineMetrics::record_unit(report.status.as_str(), report.elapsed.as_secs_f64());

        if let Some(log) = &self.run_log {
            if let Err(e) = log.record(report) {
                warn!("Failed to record unit {} in run log: {}", report.date, e);
            }
        }
    }
}
