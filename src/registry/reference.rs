//! Run-scoped reference tables: the player-identity map and team attributes.

use crate::error::{EtlError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

static BALLPARK_COLUMN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^Ball_Park_(\d{4})$").expect("valid ballpark column pattern"));

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerIdentity {
    pub mlb_id: i64,
    pub name: String,
    pub bref_id: Option<String>,
    pub position: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeamAttributes {
    pub league: Option<String>,
    pub division: Option<String>,
    pub ballparks: HashMap<i32, String>,
}

/// Immutable player and team tables shared by every season of a run.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    players: HashMap<i64, PlayerIdentity>,
    teams: HashMap<String, TeamAttributes>,
}

impl ReferenceTables {
    pub fn new(players: Vec<PlayerIdentity>, teams: HashMap<String, TeamAttributes>) -> Self {
        Self {
            players: players.into_iter().map(|p| (p.mlb_id, p)).collect(),
            teams,
        }
    }

    /// Load both tables. Either file being unreadable is fatal for the run.
    pub fn load(player_map: &Path, team_attributes: &Path) -> Result<Self> {
        let players = open_reference(player_map).and_then(load_players)?;
        let teams = open_reference(team_attributes).and_then(load_teams)?;
        info!(
            "Loaded reference tables: {} players, {} teams",
            players.len(),
            teams.len()
        );
        Ok(Self::new(players, teams))
    }

    pub fn player(&self, mlb_id: i64) -> Option<&PlayerIdentity> {
        self.players.get(&mlb_id)
    }

    pub fn team(&self, code: &str) -> Option<&TeamAttributes> {
        self.teams.get(code)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

fn open_reference(path: &Path) -> Result<(File, &Path)> {
    File::open(path)
        .map(|f| (f, path))
        .map_err(|e| EtlError::ReferenceTable {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

fn reference_error(path: &Path, message: impl ToString) -> EtlError {
    EtlError::ReferenceTable {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn load_players((file, path): (File, &Path)) -> Result<Vec<PlayerIdentity>> {
    read_players(file).map_err(|e| reference_error(path, e))
}

fn load_teams((file, path): (File, &Path)) -> Result<HashMap<String, TeamAttributes>> {
    read_teams(file).map_err(|e| reference_error(path, e))
}

fn header_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim_start_matches('\u{feff}').trim() == name)
}

fn non_empty(field: Option<&str>) -> Option<String> {
    field.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Read the player-identity map (`MLBID`, `MLBNAME`, `BREFID`, `POS`, `ACTIVE`,
/// `PLAYERNAME`). Rows without a numeric `MLBID` are skipped; `PLAYERNAME`
/// stands in when `MLBNAME` is blank.
pub fn read_players<R: Read>(rdr: R) -> std::result::Result<Vec<PlayerIdentity>, String> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    let id_idx = header_index(&headers, "MLBID").ok_or("missing MLBID column")?;
    let name_idx = header_index(&headers, "MLBNAME").ok_or("missing MLBNAME column")?;
    let bref_idx = header_index(&headers, "BREFID");
    let pos_idx = header_index(&headers, "POS");
    let active_idx = header_index(&headers, "ACTIVE");
    let alt_name_idx = header_index(&headers, "PLAYERNAME");

    let mut players = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                warn!("Skipping unreadable player map row: {}", e);
                skipped += 1;
                continue;
            }
        };
        let Some(mlb_id) = record.get(id_idx).and_then(|s| s.trim().parse::<i64>().ok()) else {
            skipped += 1;
            continue;
        };
        let Some(name) = non_empty(record.get(name_idx))
            .or_else(|| alt_name_idx.and_then(|i| non_empty(record.get(i))))
        else {
            skipped += 1;
            continue;
        };
        players.push(PlayerIdentity {
            mlb_id,
            name,
            bref_id: bref_idx.and_then(|i| non_empty(record.get(i))),
            position: pos_idx.and_then(|i| non_empty(record.get(i))),
            active: active_idx
                .and_then(|i| record.get(i))
                .map(|s| s.trim().eq_ignore_ascii_case("Y"))
                .unwrap_or(true),
        });
    }
    if skipped > 0 {
        warn!("Skipped {} player map rows without a usable MLBID or name", skipped);
    }
    Ok(players)
}

/// Read the team attributes table (`Team`, `League`, `Division` and one
/// `Ball_Park_{YYYY}` column per season).
pub fn read_teams<R: Read>(rdr: R) -> std::result::Result<HashMap<String, TeamAttributes>, String> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(rdr);
    let headers = reader.headers().map_err(|e| e.to_string())?.clone();
    let team_idx = header_index(&headers, "Team").ok_or("missing Team column")?;
    let league_idx = header_index(&headers, "League");
    let division_idx = header_index(&headers, "Division");
    let park_columns: Vec<(usize, i32)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            let caps = BALLPARK_COLUMN.captures(h.trim())?;
            Some((i, caps[1].parse().ok()?))
        })
        .collect();

    let mut teams = HashMap::new();
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        let Some(code) = non_empty(record.get(team_idx)) else {
            continue;
        };
        let ballparks = park_columns
            .iter()
            .filter_map(|&(i, season)| non_empty(record.get(i)).map(|park| (season, park)))
            .collect();
        teams.insert(
            code,
            TeamAttributes {
                league: league_idx.and_then(|i| non_empty(record.get(i))),
                division: division_idx.and_then(|i| non_empty(record.get(i))),
                ballparks,
            },
        );
    }
    Ok(teams)
}
