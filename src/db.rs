//! SQLite persistence: the season-partitioned pitch tables and the unit run log.

use crate::error::{EtlError, Result};
use crate::pipeline::orchestrator::UnitReport;
use crate::storage::Sink;
use crate::types::{Cell, Frame};
use chrono::{NaiveDate, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

fn parse_unit_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|e| EtlError::Config(format!("corrupt unit date '{date}' in run log: {e}")))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn to_sql_value(cell: &Cell) -> SqlValue {
    match cell {
        Cell::Null => SqlValue::Null,
        Cell::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Cell::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => n.as_f64().map(SqlValue::Real).unwrap_or(SqlValue::Null),
        },
        Cell::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// Append-only sink backed by a local SQLite database.
///
/// A table is created from the columns of the first batch written to it. Later
/// batches must carry exactly the same columns in the same order.
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_connection(path)?;
        info!("Opened SQLite sink at {}", path.display());
        Ok(Self { conn })
    }

    pub fn table_columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    pub fn row_count(&self, table: &str) -> Result<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn ensure_table(&self, table: &str, frame: &Frame) -> Result<()> {
        let existing = self.table_columns(table)?;
        if existing.is_empty() {
            let columns = frame
                .columns()
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", ");
            self.conn
                .execute_batch(&format!("CREATE TABLE {} ({columns});", quote_ident(table)))?;
            info!("Created table {} with {} columns", table, frame.columns().len());
        } else if existing != frame.columns() {
            return Err(EtlError::sink(
                table,
                format!(
                    "batch has {} columns, table has {}; column lists differ",
                    frame.columns().len(),
                    existing.len()
                ),
            ));
        }
        Ok(())
    }
}

impl Sink for SqliteSink {
    fn append_rows(&mut self, table: &str, frame: &Frame) -> Result<usize> {
        if frame.is_empty() {
            return Ok(0);
        }
        self.ensure_table(table, frame)?;

        let placeholders = (1..=frame.columns().len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("INSERT INTO {} VALUES ({placeholders})", quote_ident(table));

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in frame.rows() {
                stmt.execute(params_from_iter(row.iter().map(to_sql_value)))
                    .map_err(|e| EtlError::sink(table, e))?;
            }
        }
        tx.commit()?;
        debug!("Appended {} rows to {}", frame.len(), table);
        Ok(frame.len())
    }
}

/// One persisted unit outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct RunLogEntry {
    pub run_id: String,
    pub unit_date: NaiveDate,
    pub status: String,
    pub failed_stage: Option<String>,
    pub raw_rows: i64,
    pub enriched_rows: i64,
    pub elapsed_ms: i64,
    pub completed_at: String,
}

/// Record of processed units, used to resume a batch build.
pub struct RunLog {
    conn: Connection,
    run_id: Uuid,
}

impl RunLog {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_connection(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS etl_unit_runs (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                run_id         TEXT NOT NULL,
                unit_date      TEXT NOT NULL,
                status         TEXT NOT NULL,
                failed_stage   TEXT,
                raw_rows       INTEGER NOT NULL,
                enriched_rows  INTEGER NOT NULL,
                elapsed_ms     INTEGER NOT NULL,
                completed_at   TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_etl_unit_runs_date ON etl_unit_runs (unit_date);
            "#,
        )?;
        Ok(Self {
            conn,
            run_id: Uuid::new_v4(),
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn record(&self, report: &UnitReport) -> Result<()> {
        self.conn.execute(
            "INSERT INTO etl_unit_runs
                (run_id, unit_date, status, failed_stage, raw_rows, enriched_rows, elapsed_ms, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                self.run_id.to_string(),
                report.date.format("%Y-%m-%d").to_string(),
                report.status.as_str(),
                report.failed_stage.map(|s| s.as_str()),
                report.raw_rows as i64,
                report.enriched_rows as i64,
                report.elapsed.as_millis() as i64,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Latest unit date that finished with `PASS` or `NO-DATA`. A `PARTIAL`
    /// unit never reached the working table, so it does not count.
    pub fn last_completed(&self) -> Result<Option<NaiveDate>> {
        let date: Option<String> = self
            .conn
            .query_row(
                "SELECT unit_date FROM etl_unit_runs
                 WHERE status IN ('PASS', 'NO-DATA')
                 ORDER BY unit_date DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        date.as_deref().map(parse_unit_date).transpose()
    }

    /// Dates whose most recent run ended `PASS` or `NO-DATA`. A date that
    /// passed once and later failed or went `PARTIAL` is not included.
    pub fn completed_dates(&self) -> Result<BTreeSet<NaiveDate>> {
        let mut stmt = self
            .conn
            .prepare("SELECT unit_date, status FROM etl_unit_runs ORDER BY id ASC")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        let mut latest: HashMap<String, String> = HashMap::new();
        for row in rows {
            let (date, status) = row?;
            latest.insert(date, status);
        }
        latest
            .into_iter()
            .filter(|(_, status)| status == "PASS" || status == "NO-DATA")
            .map(|(date, _)| parse_unit_date(&date))
            .collect()
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<RunLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT run_id, unit_date, status, failed_stage, raw_rows, enriched_rows, elapsed_ms, completed_at
             FROM etl_unit_runs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, String>(7)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (run_id, date, status, failed_stage, raw_rows, enriched_rows, elapsed_ms, completed_at) = row?;
            let unit_date = parse_unit_date(&date)?;
            entries.push(RunLogEntry {
                run_id,
                unit_date,
                status,
                failed_stage,
                raw_rows,
                enriched_rows,
                elapsed_ms,
                completed_at,
            });
        }
        Ok(entries)
    }
}
