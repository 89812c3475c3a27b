//! Context enrichment: team context, ballpark, and batter identity/ledger
//! columns, each inserted at a fixed anchor.

use crate::constants::{col, DEFAULT_BATTER_POSITION, DEFAULT_BATTING_ORDER_SLOT};
use crate::error::Result;
use crate::metrics::EnrichMetrics;
use crate::pipeline::processing::FrameStep;
use crate::registry::Registry;
use crate::types::{cell_i64, cell_str, Anchor, Cell, Frame};
use serde_json::Value;
use tracing::debug;

/// Lookup misses for one batch, reported once per lookup kind.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LookupMisses {
    pub name: usize,
    pub league: usize,
    pub division: usize,
    pub ballpark: usize,
    pub position: usize,
    pub batting_order: usize,
    pub speed: usize,
}

impl LookupMisses {
    fn report(&self) {
        debug!(
            "Lookup misses: name={} league={} division={} ballpark={} position={} batting_order={} speed={}",
            self.name, self.league, self.division, self.ballpark, self.position, self.batting_order, self.speed
        );
        EnrichMetrics::record_lookup_misses("name", self.name);
        EnrichMetrics::record_lookup_misses("league", self.league);
        EnrichMetrics::record_lookup_misses("division", self.division);
        EnrichMetrics::record_lookup_misses("ballpark", self.ballpark);
        EnrichMetrics::record_lookup_misses("position", self.position);
        EnrichMetrics::record_lookup_misses("batting_order", self.batting_order);
        EnrichMetrics::record_lookup_misses("speed", self.speed);
    }
}

fn text_or_null(value: Option<&str>, misses: &mut usize) -> Cell {
    match value {
        Some(v) => Value::from(v),
        None => {
            *misses += 1;
            Value::Null
        }
    }
}

pub struct ContextEnricher<'a> {
    registry: &'a Registry,
}

impl<'a> ContextEnricher<'a> {
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Enrich `frame` and return the lookup misses encountered.
    pub fn enrich(&self, frame: &mut Frame) -> Result<LookupMisses> {
        let mut misses = LookupMisses::default();
        self.add_team_context(frame, &mut misses)?;
        self.add_batter_names(frame, &mut misses)?;
        self.add_batter_ledgers(frame, &mut misses)?;
        Ok(misses)
    }

    /// Batting/fielding team from the half-inning, their league and division,
    /// and the home ballpark for the season.
    fn add_team_context(&self, frame: &mut Frame, misses: &mut LookupMisses) -> Result<()> {
        let half = frame.require_column(col::INNING_HALF)?;
        let home = frame.require_column(col::HOME_TEAM)?;
        let away = frame.require_column(col::AWAY_TEAM)?;

        let (batting, fielding): (Vec<Cell>, Vec<Cell>) = frame
            .rows()
            .iter()
            .map(|row| match cell_str(&row[half]) {
                Some("Top") => (row[away].clone(), row[home].clone()),
                Some("Bot") => (row[home].clone(), row[away].clone()),
                _ => (Value::Null, Value::Null),
            })
            .unzip();

        let registry = self.registry;
        let league_of = |teams: &[Cell], misses: &mut usize| -> Vec<Cell> {
            teams
                .iter()
                .map(|t| text_or_null(cell_str(t).and_then(|t| registry.lookup_league(t)), misses))
                .collect()
        };
        let division_of = |teams: &[Cell], misses: &mut usize| -> Vec<Cell> {
            teams
                .iter()
                .map(|t| text_or_null(cell_str(t).and_then(|t| registry.lookup_division(t)), misses))
                .collect()
        };

        let batting_league = league_of(&batting, &mut misses.league);
        let batting_division = division_of(&batting, &mut misses.division);
        let fielding_league = league_of(&fielding, &mut misses.league);
        let fielding_division = division_of(&fielding, &mut misses.division);

        let season = registry.season();
        let ballparks: Vec<Cell> = frame
            .column_values(home)
            .map(|t| {
                text_or_null(
                    cell_str(t).and_then(|t| registry.lookup_ballpark(t, season)),
                    &mut misses.ballpark,
                )
            })
            .collect();

        let anchor = Anchor::Before(col::INNING);
        frame.insert_column(anchor, col::BATTING_TEAM, batting)?;
        frame.insert_column(anchor, col::FIELDING_TEAM, fielding)?;
        frame.insert_column(anchor, col::BATTING_TEAM_LEAGUE, batting_league)?;
        frame.insert_column(anchor, col::BATTING_TEAM_DIVISION, batting_division)?;
        frame.insert_column(anchor, col::FIELDING_TEAM_LEAGUE, fielding_league)?;
        frame.insert_column(anchor, col::FIELDING_TEAM_DIVISION, fielding_division)?;
        frame.insert_column(anchor, col::BALLPARK, ballparks)?;
        Ok(())
    }

    /// Batter full name after the batter id; fielder and base-runner id
    /// columns are rewritten to names with the same lookup.
    fn add_batter_names(&self, frame: &mut Frame, misses: &mut LookupMisses) -> Result<()> {
        let batter = frame.require_column(col::BATTER_ID)?;
        let registry = self.registry;
        let names: Vec<Cell> = frame
            .column_values(batter)
            .map(|id| text_or_null(cell_i64(id).and_then(|id| registry.lookup_name(id)), &mut misses.name))
            .collect();
        frame.insert_column(Anchor::After(col::BATTER_ID), col::BATTER_FULL_NAME, names)?;

        for column in col::PLAYER_ID_COLUMNS {
            if frame.column_index(column).is_none() {
                debug!("Column {} absent, not rewriting ids", column);
                continue;
            }
            frame.update_column(column, |id| {
                cell_i64(id)
                    .and_then(|id| registry.lookup_name(id))
                    .map(Value::from)
                    .unwrap_or(Value::Null)
            })?;
        }
        Ok(())
    }

    /// Position, batting-order slot and sprint speed for the batter, keyed by
    /// full name (and game day for the date-keyed ledgers).
    fn add_batter_ledgers(&self, frame: &mut Frame, misses: &mut LookupMisses) -> Result<()> {
        let name_idx = frame.require_column(col::BATTER_FULL_NAME)?;
        let date_idx = frame.require_column(col::GAME_DATE)?;
        let registry = self.registry;

        let mut positions = Vec::with_capacity(frame.len());
        let mut slots = Vec::with_capacity(frame.len());
        let mut speeds = Vec::with_capacity(frame.len());
        for row in frame.rows() {
            let name = cell_str(&row[name_idx]);
            let date = cell_str(&row[date_idx]);
            let keyed = name.zip(date);

            let position = keyed.and_then(|(n, d)| registry.lookup_position(n, d));
            if position.is_none() {
                misses.position += 1;
            }
            positions.push(Value::from(position.unwrap_or(DEFAULT_BATTER_POSITION)));

            let slot = keyed.and_then(|(n, d)| registry.lookup_bop(n, d));
            if slot.is_none() {
                misses.batting_order += 1;
            }
            slots.push(Value::from(slot.unwrap_or(DEFAULT_BATTING_ORDER_SLOT)));

            match name.and_then(|n| registry.lookup_speed(n)) {
                Some(speed) => speeds.push(Value::from(speed)),
                None => {
                    misses.speed += 1;
                    speeds.push(Value::Null);
                }
            }
        }

        let anchor = Anchor::Before(col::PITCHER_ID);
        frame.insert_column(anchor, col::BATTER_POSITION, positions)?;
        frame.insert_column(anchor, col::BATTER_BATTING_ORDER_SLOT, slots)?;
        frame.insert_column(anchor, col::BATTER_SPRINT_SPEED, speeds)?;
        Ok(())
    }
}

impl FrameStep for ContextEnricher<'_> {
    fn name(&self) -> &'static str {
        "enrich"
    }

    fn apply(&self, frame: &mut Frame) -> Result<()> {
        let misses = self.enrich(frame)?;
        misses.report();
        Ok(())
    }
}
