//! Sparse per-player ledgers.
//!
//! Position and batting-order ledgers are keyed by player full name, then by
//! ISO calendar date. A missing player or date means "unknown" and is reported
//! as `None`. The sprint-speed ledger is keyed by player name only and scoped to
//! one season.

use crate::error::{EtlError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A value that can be read leniently out of a ledger file.
pub trait LedgerValue: Clone + Serialize {
    fn from_json(value: &Value) -> Option<Self>;
}

impl LedgerValue for String {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// Integral float slots (`2.0`, `"3.0"`) are accepted as well as integers.
impl LedgerValue for u8 {
    fn from_json(value: &Value) -> Option<Self> {
        let slot = match value {
            Value::Number(n) => n.as_u64().or_else(|| integral(n.as_f64()?)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<u64>().ok().or_else(|| integral(s.parse().ok()?))
            }
            _ => None,
        }?;
        u8::try_from(slot).ok()
    }
}

fn integral(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f.fract() == 0.0).then_some(f as u64)
}

impl LedgerValue for f64 {
    fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Truncate a game date (`2019-05-01` or `2019-05-01T00:00:00`) to its
/// calendar-day key.
pub fn day_key(date: &str) -> &str {
    date.get(..10).unwrap_or(date)
}

/// Counts reported after merging one ledger into another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub players_added: usize,
    pub entries_added: usize,
    pub entries_replaced: usize,
}

/// Two-level `player -> date -> value` ledger.
#[derive(Debug, Clone)]
pub struct DateLedger<T> {
    entries: HashMap<String, HashMap<String, T>>,
}

impl<T> Default for DateLedger<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T: LedgerValue> DateLedger<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a ledger file. A missing or empty file yields an empty ledger;
    /// malformed JSON is an error. Entries whose values cannot be interpreted
    /// are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let Some(root) = read_ledger_json(path)? else {
            return Ok(Self::new());
        };
        let (ledger, skipped) = Self::from_json_value(&root).map_err(|message| EtlError::Ledger {
            path: path.to_path_buf(),
            message,
        })?;
        if skipped > 0 {
            warn!("Skipped {} uninterpretable entries in {}", skipped, path.display());
        }
        info!(
            "Loaded ledger {} ({} players, {} entries)",
            path.display(),
            ledger.players(),
            ledger.entry_count()
        );
        Ok(ledger)
    }

    /// Build a ledger from `{ player: { date: value } }`, returning the number
    /// of skipped entries.
    pub fn from_json_value(root: &Value) -> std::result::Result<(Self, usize), String> {
        let players = root
            .as_object()
            .ok_or_else(|| "expected an object keyed by player name".to_string())?;
        let mut ledger = Self::new();
        let mut skipped = 0;
        for (player, dates) in players {
            let Some(dates) = dates.as_object() else {
                skipped += 1;
                continue;
            };
            for (date, value) in dates {
                match T::from_json(value) {
                    Some(v) => {
                        ledger.insert(player, day_key(date), v);
                    }
                    None => skipped += 1,
                }
            }
        }
        Ok((ledger, skipped))
    }

    pub fn get(&self, player: &str, date: &str) -> Option<&T> {
        self.entries.get(player)?.get(day_key(date))
    }

    pub fn insert(&mut self, player: &str, date: &str, value: T) -> Option<T> {
        self.entries
            .entry(player.to_string())
            .or_default()
            .insert(date.to_string(), value)
    }

    /// Merge `other` into this ledger. Existing players keep every date not
    /// present in `other`; dates present in both take the value from `other`.
    pub fn merge(&mut self, other: DateLedger<T>) -> MergeStats {
        let mut stats = MergeStats::default();
        for (player, dates) in other.entries {
            let existing = match self.entries.get_mut(&player) {
                Some(existing) => existing,
                None => {
                    stats.players_added += 1;
                    stats.entries_added += dates.len();
                    self.entries.insert(player, dates);
                    continue;
                }
            };
            for (date, value) in dates {
                if existing.insert(date, value).is_some() {
                    stats.entries_replaced += 1;
                } else {
                    stats.entries_added += 1;
                }
            }
        }
        stats
    }

    /// Write the whole ledger, replacing the file atomically.
    pub fn save(&self, path: &Path) -> Result<()> {
        let sorted: BTreeMap<&String, BTreeMap<&String, &T>> = self
            .entries
            .iter()
            .map(|(player, dates)| (player, dates.iter().collect()))
            .collect();
        write_atomically(path, &serde_json::to_vec(&sorted)?)?;
        debug!("Saved ledger {} ({} players)", path.display(), self.players());
        Ok(())
    }

    pub fn players(&self) -> usize {
        self.entries.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Season-scoped `player -> sprint speed` ledger.
#[derive(Debug, Clone, Default)]
pub struct SpeedLedger {
    speeds: HashMap<String, f64>,
}

impl SpeedLedger {
    pub fn load(path: &Path) -> Result<Self> {
        let Some(root) = read_ledger_json(path)? else {
            return Ok(Self::default());
        };
        let players = root.as_object().ok_or_else(|| EtlError::Ledger {
            path: path.to_path_buf(),
            message: "expected an object keyed by player name".to_string(),
        })?;
        let mut speeds = HashMap::with_capacity(players.len());
        let mut skipped = 0;
        for (player, value) in players {
            match f64::from_json(value) {
                Some(speed) => {
                    speeds.insert(player.clone(), speed);
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!("Skipped {} uninterpretable entries in {}", skipped, path.display());
        }
        info!("Loaded speed ledger {} ({} players)", path.display(), speeds.len());
        Ok(Self { speeds })
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            speeds: pairs.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn get(&self, player: &str) -> Option<f64> {
        self.speeds.get(player).copied()
    }

    pub fn len(&self) -> usize {
        self.speeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.speeds.is_empty()
    }
}

/// Resolved ledger file locations for one season.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerFiles {
    pub positions: PathBuf,
    pub batting_order: PathBuf,
    pub sprint_speed: PathBuf,
}

/// All ledgers consulted while enriching one season.
#[derive(Debug, Clone, Default)]
pub struct SeasonLedgers {
    pub positions: DateLedger<String>,
    pub batting_order: DateLedger<u8>,
    pub speed: SpeedLedger,
}

impl SeasonLedgers {
    pub fn load(files: &LedgerFiles) -> Result<Self> {
        Ok(Self {
            positions: DateLedger::load(&files.positions)?,
            batting_order: DateLedger::load(&files.batting_order)?,
            speed: SpeedLedger::load(&files.sprint_speed)?,
        })
    }

    /// Persist the date-keyed ledgers. Speed is never updated incrementally.
    pub fn save_date_ledgers(&self, files: &LedgerFiles) -> Result<()> {
        self.positions.save(&files.positions)?;
        self.batting_order.save(&files.batting_order)
    }
}

/// New position and batting-order entries for one processed date.
#[derive(Debug, Clone, Default)]
pub struct LedgerUpdate {
    pub positions: DateLedger<String>,
    pub batting_order: DateLedger<u8>,
}

impl LedgerUpdate {
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty() && self.batting_order.is_empty()
    }
}

/// Supplier of incremental ledger updates for streaming runs.
pub trait LedgerFeed {
    fn update_for(&self, date: NaiveDate) -> Result<LedgerUpdate>;
}

/// Reads `{dir}/{YYYY-MM-DD}.json` files shaped as
/// `{ "positions": { player: { date: code } }, "batting_order": { ... } }`.
pub struct JsonLedgerFeed {
    dir: PathBuf,
}

impl JsonLedgerFeed {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl LedgerFeed for JsonLedgerFeed {
    fn update_for(&self, date: NaiveDate) -> Result<LedgerUpdate> {
        let path = self.dir.join(format!("{}.json", date.format("%Y-%m-%d")));
        let Some(root) = read_ledger_json(&path)? else {
            return Ok(LedgerUpdate::default());
        };
        let section = |key: &str| root.get(key).cloned().unwrap_or(Value::Object(Map::new()));
        let to_err = |message: String| EtlError::Ledger {
            path: path.clone(),
            message,
        };

        let (positions, skipped_pos) = DateLedger::from_json_value(&section("positions")).map_err(to_err)?;
        let (batting_order, skipped_bop) =
            DateLedger::from_json_value(&section("batting_order")).map_err(to_err)?;
        if skipped_pos + skipped_bop > 0 {
            warn!(
                "Skipped {} uninterpretable entries in feed {}",
                skipped_pos + skipped_bop,
                path.display()
            );
        }
        Ok(LedgerUpdate {
            positions,
            batting_order,
        })
    }
}

/// Read a ledger file as JSON. `Ok(None)` when the file is missing or blank.
fn read_ledger_json(path: &Path) -> Result<Option<Value>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Ledger {} not found, using an empty ledger", path.display());
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    if text.trim().is_empty() {
        warn!("Ledger {} is empty", path.display());
        return Ok(None);
    }
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|e| EtlError::Ledger {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
