use anyhow::Context;
use chrono::{Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};
use statcast_etl::apis::{CsvDirSource, SavantClient};
use statcast_etl::config::{Config, SourceConfig};
use statcast_etl::db::{RunLog, SqliteSink};
use statcast_etl::logging;
use statcast_etl::metrics;
use statcast_etl::pipeline::{Orchestrator, RunSummary, UnitReport, UnitStatus};
use statcast_etl::registry::{JsonLedgerFeed, ReferenceTables};
use statcast_etl::storage::{InMemorySink, Sink};
use statcast_etl::types::EventSource;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "statcast_etl")]
#[command(about = "Pitch-level Statcast ETL: fetch, enrich, and persist per-date batches")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $STATCAST_CONFIG, then statcast.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every date in the configured schedule
    Build {
        /// Skip dates already completed according to the run log
        #[arg(long)]
        resume: bool,
        /// Keep rows in memory instead of writing SQLite; no run log entries
        #[arg(long)]
        dry_run: bool,
    },
    /// Merge one day's ledger update, process that date, and save the ledgers
    Stream {
        /// Date to process (YYYY-MM-DD); defaults to yesterday
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Keep rows and merged ledgers in memory; nothing is written
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the most recent unit runs
    Status {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

fn create_source(config: &SourceConfig) -> anyhow::Result<Box<dyn EventSource>> {
    match config {
        SourceConfig::Savant {
            base_url,
            timeout_seconds,
        } => Ok(Box::new(SavantClient::new(base_url.clone(), *timeout_seconds)?)),
        SourceConfig::CsvDir { dir } => Ok(Box::new(CsvDirSource::new(dir.clone()))),
    }
}

fn build_orchestrator(config: &Config, dry_run: bool) -> anyhow::Result<Orchestrator> {
    let source = create_source(&config.source)?;
    let sink: Box<dyn Sink> = if dry_run {
        println!("🧪 Dry run: rows stay in memory");
        Box::new(InMemorySink::new())
    } else {
        Box::new(
            SqliteSink::open(&config.sink.database_path)
                .with_context(|| format!("opening {}", config.sink.database_path.display()))?,
        )
    };
    let reference = ReferenceTables::load(&config.reference.player_map, &config.reference.team_attributes)?;
    info!("📚 Loaded {} player identities", reference.player_count());

    let mut orchestrator = Orchestrator::new(
        source,
        sink,
        Arc::new(reference),
        config.column_spec()?,
        config.ledgers.clone(),
    );
    if dry_run {
        orchestrator = orchestrator.without_ledger_save();
    } else {
        orchestrator = orchestrator.with_run_log(RunLog::open(&config.sink.database_path)?);
    }
    if let Some(dir) = &config.ledgers.feed_dir {
        orchestrator = orchestrator.with_ledger_feed(Box::new(JsonLedgerFeed::new(dir.clone())));
    }
    Ok(orchestrator)
}

fn print_unit(report: &UnitReport) {
    let icon = match report.status {
        UnitStatus::Pass => "✅",
        UnitStatus::NoData => "➖",
        UnitStatus::Partial => "⚠️ ",
        UnitStatus::Fail => "❌",
    };
    println!(
        "{} {} {:<8} raw={:<6} enriched={:<6} {:.1}s",
        icon,
        report.date,
        report.status.as_str(),
        report.raw_rows,
        report.enriched_rows,
        report.elapsed.as_secs_f64()
    );
    if let Some(err) = &report.error {
        println!("      {}", err);
    }
}

fn print_summary(summary: &RunSummary) {
    println!("\n📊 Run Results:");
    println!("   Units: {}", summary.units.len());
    println!("   Pass: {}", summary.count(UnitStatus::Pass));
    println!("   No data: {}", summary.count(UnitStatus::NoData));
    println!("   Partial: {}", summary.count(UnitStatus::Partial));
    println!("   Failed: {}", summary.count(UnitStatus::Fail));
    println!("   Enriched rows: {}", summary.enriched_rows());
}

fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config_path = Config::resolve_path(cli.config);
    let config = Config::load(&config_path)?;
    let _guard = logging::init_logging(&config.logging.dir);
    metrics::init_metrics();
    info!("Using config {}", config_path.display());

    match cli.command {
        Commands::Build { resume, dry_run } => {
            let mut dates = config.schedule.dates();
            if resume {
                let run_log = RunLog::open(&config.sink.database_path)?;
                let completed = run_log.completed_dates()?;
                let before = dates.len();
                dates.retain(|d| !completed.contains(d));
                println!("⏩ Resuming: skipping {} completed dates", before - dates.len());
            }
            println!("🔄 Processing {} dates...", dates.len());

            let mut orchestrator = build_orchestrator(&config, dry_run)?;
            let summary = orchestrator.run_dates(dates)?;
            for report in &summary.units {
                print_unit(report);
            }
            print_summary(&summary);
        }
        Commands::Stream { date, dry_run } => {
            let date = date.unwrap_or_else(|| Local::now().date_naive() - Duration::days(1));
            if config.ledgers.feed_dir.is_none() {
                warn!("ledgers.feed_dir is not set; streaming without ledger updates");
            }
            println!("🔄 Streaming {}...", date);

            let mut orchestrator = build_orchestrator(&config, dry_run)?;
            let report = orchestrator.stream_date(date)?;
            print_unit(&report);
        }
        Commands::Status { limit } => {
            let run_log = RunLog::open(&config.sink.database_path)?;
            let entries = run_log.recent(limit)?;
            if entries.is_empty() {
                println!("No unit runs recorded yet");
            }
            for entry in entries {
                println!(
                    "{} {:<8} raw={:<6} enriched={:<6} {}ms stage={} at {}",
                    entry.unit_date,
                    entry.status,
                    entry.raw_rows,
                    entry.enriched_rows,
                    entry.elapsed_ms,
                    entry.failed_stage.as_deref().unwrap_or("-"),
                    entry.completed_at
                );
            }
            match run_log.last_completed()? {
                Some(last) => println!("\n📅 Last completed date: {}", last),
                None => println!("\n📅 No completed dates"),
            }
        }
    }

    if let Some(path) = &config.metrics.textfile {
        metrics::write_textfile(path)?;
    }
    Ok(())
}
