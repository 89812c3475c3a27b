use chrono::NaiveDate;
use serde_json::{json, Value};
use statcast_etl::config::LedgerConfig;
use statcast_etl::constants::CANONICAL_COLUMNS;
use statcast_etl::db::{RunLog, SqliteSink};
use statcast_etl::error::{EtlError, Result};
use statcast_etl::pipeline::processing::ColumnSpec;
use statcast_etl::pipeline::{Orchestrator, Stage, UnitStatus};
use statcast_etl::registry::{JsonLedgerFeed, ReferenceTables};
use statcast_etl::storage::{InMemorySink, Sink};
use statcast_etl::types::{EventSource, Frame};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const PLAYERS: &str = "IDPLAYER,PLAYERNAME,MLBID,MLBNAME,BREFID,POS,ACTIVE\n\
    troutmi01,Mike Trout,545361,Mike Trout,troutmi01,CF,Y\n\
    ohtansh01,Shohei Ohtani,660271,Shohei Ohtani,ohtansh01,DH,Y\n";

const TEAMS: &str = "Team,League,Division,Ball_Park_2019\n\
    LAA,AL,West,Angel Stadium\n\
    SEA,AL,West,T-Mobile Park\n";

/// Source serving a fixed frame per date; dates without an entry are empty.
struct ScriptedSource {
    frames: HashMap<NaiveDate, Frame>,
    failing: Vec<NaiveDate>,
}

impl EventSource for ScriptedSource {
    fn source_name(&self) -> &'static str {
        "scripted"
    }

    fn fetch_events(&self, start: NaiveDate, _end: NaiveDate) -> Result<Frame> {
        if self.failing.contains(&start) {
            return Err(EtlError::SourceFetch(format!("HTTP 503 for {start}")));
        }
        Ok(self.frames.get(&start).cloned().unwrap_or_default())
    }
}

/// Sink that refuses writes to working tables.
struct RawOnlySink(InMemorySink);

impl Sink for RawOnlySink {
    fn append_rows(&mut self, table: &str, frame: &Frame) -> Result<usize> {
        if table.starts_with("wrk_") {
            return Err(EtlError::sink(table, "disk full"));
        }
        self.0.append_rows(table, frame)
    }
}

/// Sink that refuses writes to raw tables.
struct WorkingOnlySink(InMemorySink);

impl Sink for WorkingOnlySink {
    fn append_rows(&mut self, table: &str, frame: &Frame) -> Result<usize> {
        if table.starts_with("raw_") {
            return Err(EtlError::sink(table, "read-only replica"));
        }
        self.0.append_rows(table, frame)
    }
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2019, 5, day).unwrap()
}

/// Raw rows as the provider returns them, including a redundant column.
fn raw_frame(game_date: &str, rows: &[&[(&str, Value)]]) -> Frame {
    let mut columns: Vec<String> = vec!["index".to_string()];
    columns.extend(CANONICAL_COLUMNS.iter().map(|(raw, _)| raw.to_string()));
    let mut frame = Frame::new(columns.clone());
    for (i, overrides) in rows.iter().enumerate() {
        let mut row: Vec<Value> = columns
            .iter()
            .map(|c| match c.as_str() {
                "index" => json!(i),
                "game_pk" => json!(565000),
                "game_date" => json!(game_date),
                "home_team" => json!("LAA"),
                "away_team" => json!("SEA"),
                "inning" => json!(1),
                "inning_topbot" => json!("Bot"),
                "batter" => json!(545361),
                "p_throws" => json!("R"),
                _ => Value::Null,
            })
            .collect();
        for (name, value) in overrides.iter() {
            let idx = columns.iter().position(|c| c == name).unwrap();
            row[idx] = value.clone();
        }
        frame.push_row(row).unwrap();
    }
    frame
}

fn two_pitch_game(game_date: &str) -> Frame {
    raw_frame(
        game_date,
        &[
            &[
                ("at_bat_number", json!(1)),
                ("pitch_number", json!(1)),
                ("pitcher", json!(600001)),
                ("bat_score", json!(2)),
                ("events", json!("home_run")),
                ("description", json!("hit_into_play")),
                ("des", json!("Mike Trout homers (12) on a fly ball to left field.")),
            ],
            &[
                ("at_bat_number", json!(2)),
                ("pitch_number", json!(1)),
                ("pitcher", json!(600002)),
                ("bat_score", json!(3)),
                ("events", json!("strikeout")),
                ("description", json!("swinging_strike")),
                ("des", json!("Mike Trout strikes out swinging.")),
            ],
        ],
    )
}

struct Fixture {
    dir: TempDir,
    reference: Arc<ReferenceTables>,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let players = dir.path().join("players.csv");
        let teams = dir.path().join("teams.csv");
        fs::write(&players, PLAYERS).unwrap();
        fs::write(&teams, TEAMS).unwrap();
        fs::write(
            dir.path().join("pos_2019.json"),
            r#"{"Mike Trout": {"2019-05-01": "CF"}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("bop_2019.json"),
            r#"{"Mike Trout": {"2019-05-01T00:00:00": 2}}"#,
        )
        .unwrap();
        fs::write(dir.path().join("ss_2019.json"), r#"{"Mike Trout": 30.1}"#).unwrap();
        let reference = Arc::new(ReferenceTables::load(&players, &teams).unwrap());
        Self { dir, reference }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn ledgers(&self) -> LedgerConfig {
        let template = |name: &str| self.path().join(format!("{name}_{{season}}.json")).display().to_string();
        LedgerConfig {
            positions: template("pos"),
            batting_order: template("bop"),
            sprint_speed: template("ss"),
            feed_dir: Some(self.path().join("feed")),
        }
    }

    fn orchestrator(&self, source: ScriptedSource, sink: Box<dyn Sink>) -> Orchestrator {
        Orchestrator::new(
            Box::new(source),
            sink,
            self.reference.clone(),
            ColumnSpec::builtin(),
            self.ledgers(),
        )
    }
}

fn value<'a>(frame: &'a Frame, row: usize, column: &str) -> &'a Value {
    let idx = frame
        .column_index(column)
        .unwrap_or_else(|| panic!("missing column {column}"));
    frame.cell(row, idx)
}

#[test]
fn test_unit_enriches_and_persists_both_tables() {
    let fixture = Fixture::new();
    let sink = InMemorySink::new();
    let source = ScriptedSource {
        frames: HashMap::from([(date(1), two_pitch_game("2019-05-01"))]),
        failing: vec![],
    };
    let mut orchestrator = fixture.orchestrator(source, Box::new(sink.clone()));

    let report = orchestrator.run_unit(date(1)).unwrap();
    assert_eq!(report.status, UnitStatus::Pass);
    assert_eq!(report.raw_rows, 2);
    assert_eq!(report.enriched_rows, 2);

    let raw = sink.table("raw_statcast_2019").unwrap();
    assert_eq!(raw.len(), 2);
    assert!(raw.column_index("index").is_none());
    assert!(raw.column_index("game_pk").is_some());

    let wrk = sink.table("wrk_statcast_2019").unwrap();
    assert_eq!(wrk.len(), 2);
    assert_eq!(value(&wrk, 0, "game_id"), &json!(565000));
    assert_eq!(value(&wrk, 0, "batting_team"), &json!("LAA"));
    assert_eq!(value(&wrk, 0, "fielding_team"), &json!("SEA"));
    assert_eq!(value(&wrk, 0, "batting_team_division"), &json!("West"));
    assert_eq!(value(&wrk, 0, "ballpark"), &json!("Angel Stadium"));
    assert_eq!(value(&wrk, 0, "batter_full_name"), &json!("Mike Trout"));
    assert_eq!(value(&wrk, 0, "batter_position"), &json!("CF"));
    assert_eq!(value(&wrk, 0, "batter_batting_order_slot"), &json!(2));
    assert_eq!(value(&wrk, 0, "batter_sprint_speed"), &json!(30.1));

    assert_eq!(value(&wrk, 0, "post_play_batting_score"), &json!(3));
    assert_eq!(value(&wrk, 0, "home_run_flag"), &json!(1));
    assert_eq!(value(&wrk, 0, "rbi"), &json!(1));
    let points = value(&wrk, 0, "fantasy_points").as_f64().unwrap();
    assert!((points - 12.3).abs() < 1e-9);

    assert_eq!(value(&wrk, 1, "swinging_strikeout_flag"), &json!(1));
    assert_eq!(value(&wrk, 1, "rbi"), &json!(0));

    assert_eq!(value(&wrk, 0, "pitcher_role"), &json!("SP"));
    assert_eq!(value(&wrk, 1, "pitcher_role"), &json!("SP"));

    let columns = wrk.columns();
    let position = |name: &str| columns.iter().position(|c| c == name).unwrap();
    assert_eq!(position("ballpark") + 1, position("inning"));
    assert_eq!(position("batter_id") + 1, position("batter_full_name"));
    assert_eq!(position("batter_sprint_speed") + 1, position("pitcher_id"));
    assert_eq!(position("pitcher_role") + 1, position("pitcher_hand"));
    assert_eq!(columns.last().map(String::as_str), Some("fantasy_points"));
}

#[test]
fn test_failures_are_isolated_per_date() {
    let fixture = Fixture::new();
    let sink = InMemorySink::new();
    let source = ScriptedSource {
        frames: HashMap::from([
            (date(1), two_pitch_game("2019-05-01")),
            (date(3), two_pitch_game("2019-05-03")),
        ]),
        failing: vec![date(2)],
    };
    let mut orchestrator = fixture.orchestrator(source, Box::new(sink.clone()));

    let summary = orchestrator.run_dates([date(1), date(2), date(3), date(4)]).unwrap();
    let statuses: Vec<UnitStatus> = summary.units.iter().map(|u| u.status).collect();
    assert_eq!(
        statuses,
        vec![UnitStatus::Pass, UnitStatus::Fail, UnitStatus::Pass, UnitStatus::NoData]
    );
    assert_eq!(summary.units[1].failed_stage, Some(Stage::Fetching));
    assert_eq!(summary.enriched_rows(), 4);
    assert_eq!(sink.table("wrk_statcast_2019").unwrap().len(), 4);

    // Ledger lookups miss on 05-03: defaults apply
    let wrk = sink.table("wrk_statcast_2019").unwrap();
    assert_eq!(value(&wrk, 2, "batter_position"), &json!("P"));
    assert_eq!(value(&wrk, 2, "batter_batting_order_slot"), &json!(9));
}

#[test]
fn test_working_write_failure_is_partial() {
    let fixture = Fixture::new();
    let inner = InMemorySink::new();
    let source = ScriptedSource {
        frames: HashMap::from([(date(1), two_pitch_game("2019-05-01"))]),
        failing: vec![],
    };
    let mut orchestrator = fixture.orchestrator(source, Box::new(RawOnlySink(inner.clone())));

    let report = orchestrator.run_unit(date(1)).unwrap();
    assert_eq!(report.status, UnitStatus::Partial);
    assert_eq!(report.failed_stage, Some(Stage::EnrichedPersisted));
    assert!(report.raw_persisted);
    assert_eq!(report.enriched_rows, 2);
    assert!(inner.table("raw_statcast_2019").is_some());
    assert!(inner.table("wrk_statcast_2019").is_none());
}

#[test]
fn test_stream_merges_feed_and_saves_ledgers() {
    let fixture = Fixture::new();
    let feed_dir = fixture.path().join("feed");
    fs::create_dir_all(&feed_dir).unwrap();
    fs::write(
        feed_dir.join("2019-05-02.json"),
        r#"{"positions": {"Mike Trout": {"2019-05-02": "DH"}}, "batting_order": {"Mike Trout": {"2019-05-02": 1}}}"#,
    )
    .unwrap();

    let sink = InMemorySink::new();
    let source = ScriptedSource {
        frames: HashMap::from([(date(2), two_pitch_game("2019-05-02"))]),
        failing: vec![],
    };
    let mut orchestrator = fixture
        .orchestrator(source, Box::new(sink.clone()))
        .with_ledger_feed(Box::new(JsonLedgerFeed::new(feed_dir)));

    let report = orchestrator.stream_date(date(2)).unwrap();
    assert_eq!(report.status, UnitStatus::Pass);

    let wrk = sink.table("wrk_statcast_2019").unwrap();
    assert_eq!(value(&wrk, 0, "batter_position"), &json!("DH"));
    assert_eq!(value(&wrk, 0, "batter_batting_order_slot"), &json!(1));

    let saved: Value = serde_json::from_str(&fs::read_to_string(fixture.path().join("pos_2019.json")).unwrap()).unwrap();
    assert_eq!(saved["Mike Trout"]["2019-05-01"], json!("CF"));
    assert_eq!(saved["Mike Trout"]["2019-05-02"], json!("DH"));
}

#[test]
fn test_sqlite_sink_and_run_log_support_resume() {
    let fixture = Fixture::new();
    let db_path = fixture.path().join("statcast.db");
    let source = ScriptedSource {
        frames: HashMap::from([(date(1), two_pitch_game("2019-05-01"))]),
        failing: vec![date(2)],
    };
    let sink = SqliteSink::open(&db_path).unwrap();
    let mut orchestrator = fixture
        .orchestrator(source, Box::new(sink))
        .with_run_log(RunLog::open(&db_path).unwrap());

    orchestrator.run_dates([date(1), date(2)]).unwrap();

    let check = SqliteSink::open(&db_path).unwrap();
    assert_eq!(check.row_count("raw_statcast_2019").unwrap(), 2);
    assert_eq!(check.row_count("wrk_statcast_2019").unwrap(), 2);

    let log = RunLog::open(&db_path).unwrap();
    assert_eq!(log.last_completed().unwrap(), Some(date(1)));
    let recent = log.recent(10).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].status, "FAIL");
    assert_eq!(recent[0].failed_stage.as_deref(), Some("fetching"));
}

#[test]
fn test_raw_write_failure_does_not_block_enrichment() {
    let fixture = Fixture::new();
    let inner = InMemorySink::new();
    let source = ScriptedSource {
        frames: HashMap::from([(date(1), two_pitch_game("2019-05-01"))]),
        failing: vec![],
    };
    let mut orchestrator = fixture.orchestrator(source, Box::new(WorkingOnlySink(inner.clone())));

    let report = orchestrator.run_unit(date(1)).unwrap();
    assert_eq!(report.status, UnitStatus::Pass);
    assert_eq!(report.failed_stage, None);
    assert!(!report.raw_persisted);
    assert!(report.error.as_deref().is_some_and(|e| e.contains("read-only replica")));
    assert!(inner.table("raw_statcast_2019").is_none());
    assert_eq!(inner.table("wrk_statcast_2019").unwrap().len(), 2);
}

#[test]
fn test_stream_without_ledger_save_leaves_files() {
    let fixture = Fixture::new();
    let feed_dir = fixture.path().join("feed");
    fs::create_dir_all(&feed_dir).unwrap();
    fs::write(
        feed_dir.join("2019-05-02.json"),
        r#"{"positions": {"Mike Trout": {"2019-05-02": "DH"}}}"#,
    )
    .unwrap();
    let before = fs::read_to_string(fixture.path().join("pos_2019.json")).unwrap();

    let sink = InMemorySink::new();
    let source = ScriptedSource {
        frames: HashMap::from([(date(2), two_pitch_game("2019-05-02"))]),
        failing: vec![],
    };
    let mut orchestrator = fixture
        .orchestrator(source, Box::new(sink.clone()))
        .with_ledger_feed(Box::new(JsonLedgerFeed::new(feed_dir)))
        .without_ledger_save();

    let report = orchestrator.stream_date(date(2)).unwrap();
    assert_eq!(report.status, UnitStatus::Pass);
    let wrk = sink.table("wrk_statcast_2019").unwrap();
    assert_eq!(value(&wrk, 0, "batter_position"), &json!("DH"));
    assert_eq!(fs::read_to_string(fixture.path().join("pos_2019.json")).unwrap(), before);
}
