//! Identity and reference registry.
//!
//! Every lookup is a pure `O(1)` read returning `Option`; callers choose the
//! default for a miss. The only mutation is [`Registry::apply_update`], used by
//! streaming runs to merge a day's ledger entries.

pub mod ledger;
pub mod reference;

pub use ledger::{
    DateLedger, JsonLedgerFeed, LedgerFeed, LedgerFiles, LedgerUpdate, MergeStats, SeasonLedgers,
    SpeedLedger,
};
pub use reference::{PlayerIdentity, ReferenceTables, TeamAttributes};

use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Registry {
    reference: Arc<ReferenceTables>,
    season: i32,
    ledgers: SeasonLedgers,
}

impl Registry {
    pub fn new(reference: Arc<ReferenceTables>, season: i32, ledgers: SeasonLedgers) -> Self {
        Self {
            reference,
            season,
            ledgers,
        }
    }

    pub fn season(&self) -> i32 {
        self.season
    }

    pub fn ledgers(&self) -> &SeasonLedgers {
        &self.ledgers
    }

    pub fn lookup_name(&self, player_id: i64) -> Option<&str> {
        self.reference.player(player_id).map(|p| p.name.as_str())
    }

    pub fn lookup_league(&self, team: &str) -> Option<&str> {
        self.reference.team(team)?.league.as_deref()
    }

    pub fn lookup_division(&self, team: &str) -> Option<&str> {
        self.reference.team(team)?.division.as_deref()
    }

    pub fn lookup_ballpark(&self, team: &str, season: i32) -> Option<&str> {
        self.reference.team(team)?.ballparks.get(&season).map(String::as_str)
    }

    pub fn lookup_position(&self, name: &str, date: &str) -> Option<&str> {
        self.ledgers.positions.get(name, date).map(String::as_str)
    }

    pub fn lookup_bop(&self, name: &str, date: &str) -> Option<u8> {
        self.ledgers.batting_order.get(name, date).copied()
    }

    pub fn lookup_speed(&self, name: &str) -> Option<f64> {
        self.ledgers.speed.get(name)
    }

    /// Merge a streaming update into the date-keyed ledgers.
    pub fn apply_update(&mut self, update: LedgerUpdate) -> (MergeStats, MergeStats) {
        let positions = self.ledgers.positions.merge(update.positions);
        let batting_order = self.ledgers.batting_order.merge(update.batting_order);
        info!(
            "Merged ledger update: positions +{} ~{} ({} new players), batting order +{} ~{} ({} new players)",
            positions.entries_added,
            positions.entries_replaced,
            positions.players_added,
            batting_order.entries_added,
            batting_order.entries_replaced,
            batting_order.players_added
        );
        (positions, batting_order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn registry() -> Registry {
        let players = vec![PlayerIdentity {
            mlb_id: 545361,
            name: "Mike Trout".into(),
            bref_id: Some("troutmi01".into()),
            position: Some("CF".into()),
            active: true,
        }];
        let mut teams = HashMap::new();
        teams.insert(
            "LAA".to_string(),
            TeamAttributes {
                league: Some("AL".into()),
                division: Some("West".into()),
                ballparks: HashMap::from([(2019, "Angel Stadium".to_string())]),
            },
        );
        let mut ledgers = SeasonLedgers::default();
        ledgers.positions.insert("Mike Trout", "2019-05-01", "CF".into());
        ledgers.batting_order.insert("Mike Trout", "2019-05-01", 2);
        ledgers.speed = SpeedLedger::from_pairs([("Mike Trout", 28.9)]);
        Registry::new(Arc::new(ReferenceTables::new(players, teams)), 2019, ledgers)
    }

    #[test]
    fn test_lookups_hit() {
        let r = registry();
        assert_eq!(r.lookup_name(545361), Some("Mike Trout"));
        assert_eq!(r.lookup_league("LAA"), Some("AL"));
        assert_eq!(r.lookup_division("LAA"), Some("West"));
        assert_eq!(r.lookup_ballpark("LAA", 2019), Some("Angel Stadium"));
        assert_eq!(r.lookup_position("Mike Trout", "2019-05-01"), Some("CF"));
        assert_eq!(r.lookup_bop("Mike Trout", "2019-05-01"), Some(2));
        assert_eq!(r.lookup_speed("Mike Trout"), Some(28.9));
    }

    #[test]
    fn test_lookups_miss_return_none() {
        let r = registry();
        assert_eq!(r.lookup_name(1), None);
        assert_eq!(r.lookup_league("XXX"), None);
        assert_eq!(r.lookup_ballpark("LAA", 2020), None);
        assert_eq!(r.lookup_position("X", "2019-05-01"), None);
        assert_eq!(r.lookup_bop("X", "2019-05-01"), None);
        assert_eq!(r.lookup_speed("X"), None);
    }

    #[test]
    fn test_apply_update_merges() {
        let mut r = registry();
        let mut update = LedgerUpdate::default();
        update.positions.insert("Mike Trout", "2019-05-02", "DH".into());
        r.apply_update(update);
        assert_eq!(r.lookup_position("Mike Trout", "2019-05-01"), Some("CF"));
        assert_eq!(r.lookup_position("Mike Trout", "2019-05-02"), Some("DH"));
    }
}
