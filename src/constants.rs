//! Column names, table naming and sentinel values shared across the pipeline.
//!
//! The canonical schema is expressed as an ordered list of
//! `(raw provider name, canonical name)` pairs. The first element of each pair
//! drives `reorder`, the second drives `rename`.

// Source names
pub const SAVANT_SOURCE: &str = "savant";
pub const CSV_DIR_SOURCE: &str = "csv_dir";

// Sink table prefixes
pub const RAW_TABLE_PREFIX: &str = "raw";
pub const WORKING_TABLE_PREFIX: &str = "wrk";

/// Build the season-partitioned table name, e.g. `raw_statcast_2019`.
pub fn table_name(prefix: &str, season: i32) -> String {
    format!("{prefix}_statcast_{season}")
}

// Sentinels applied when a ledger lookup misses
pub const DEFAULT_BATTER_POSITION: &str = "P";
pub const DEFAULT_BATTING_ORDER_SLOT: u8 = 9;

// Pitcher role codes
pub const STARTER_CODE: &str = "SP";
pub const RELIEVER_CODE: &str = "RP";

/// Raw columns that are duplicates of other columns, post-play score columns the
/// enrichment re-derives, or fields the provider has deprecated.
pub const REDUNDANT_RAW_COLUMNS: &[&str] = &[
    "index",
    "pitcher.1",
    "fielder_2.1",
    "post_away_score",
    "post_home_score",
    "post_bat_score",
    "post_fld_score",
    "spin_dir",
    "spin_rate_deprecated",
    "break_angle_deprecated",
    "break_length_deprecated",
    "tfs_deprecated",
    "tfs_zulu_deprecated",
];

/// Canonical column order: pre-pitch game state, participants, the pitch
/// itself, then the outcome of the pitch.
pub const CANONICAL_COLUMNS: &[(&str, &str)] = &[
    ("game_pk", col::GAME_ID),
    ("game_date", col::GAME_DATE),
    ("game_year", "game_year"),
    ("game_type", "game_type"),
    ("home_team", col::HOME_TEAM),
    ("away_team", col::AWAY_TEAM),
    ("inning", col::INNING),
    ("inning_topbot", col::INNING_HALF),
    ("outs_when_up", "outs"),
    ("balls", "balls"),
    ("strikes", "strikes"),
    ("home_score", "home_score"),
    ("away_score", "away_score"),
    ("bat_score", col::BATTING_SCORE),
    ("fld_score", "fielding_score"),
    ("at_bat_number", col::PA_NUMBER),
    ("pitch_number", col::PITCH_NUMBER),
    ("batter", col::BATTER_ID),
    ("stand", "batter_stance"),
    ("pitcher", col::PITCHER_ID),
    ("player_name", "pitcher_name"),
    ("p_throws", col::PITCHER_HAND),
    ("on_1b", "on_1b"),
    ("on_2b", "on_2b"),
    ("on_3b", "on_3b"),
    ("fielder_2", "fielder_2"),
    ("fielder_3", "fielder_3"),
    ("fielder_4", "fielder_4"),
    ("fielder_5", "fielder_5"),
    ("fielder_6", "fielder_6"),
    ("fielder_7", "fielder_7"),
    ("fielder_8", "fielder_8"),
    ("fielder_9", "fielder_9"),
    ("umpire", "umpire"),
    ("if_fielding_alignment", "infield_alignment"),
    ("of_fielding_alignment", "outfield_alignment"),
    ("sz_top", "strike_zone_top"),
    ("sz_bot", "strike_zone_bottom"),
    ("sv_id", "pitch_sv_id"),
    ("pitch_type", "pitch_type"),
    ("pitch_name", "pitch_name"),
    ("release_speed", "release_speed"),
    ("effective_speed", "effective_speed"),
    ("release_spin_rate", "release_spin_rate"),
    ("spin_axis", "spin_axis"),
    ("release_extension", "release_extension"),
    ("release_pos_x", "release_pos_x"),
    ("release_pos_y", "release_pos_y"),
    ("release_pos_z", "release_pos_z"),
    ("vx0", "velocity_x0"),
    ("vy0", "velocity_y0"),
    ("vz0", "velocity_z0"),
    ("ax", "accel_x"),
    ("ay", "accel_y"),
    ("az", "accel_z"),
    ("pfx_x", "movement_x"),
    ("pfx_z", "movement_z"),
    ("plate_x", "plate_x"),
    ("plate_z", "plate_z"),
    ("zone", "zone"),
    ("type", "pitch_result_code"),
    ("description", col::EVENT_DESCRIPTION),
    ("events", col::RESULT_EVENT),
    ("des", col::PLAY_DESCRIPTION),
    ("bb_type", "batted_ball_type"),
    ("hit_location", "hit_location"),
    ("hc_x", "hit_coord_x"),
    ("hc_y", "hit_coord_y"),
    ("hit_distance_sc", "hit_distance"),
    ("launch_speed", "launch_speed"),
    ("launch_angle", "launch_angle"),
    ("launch_speed_angle", "launch_speed_angle"),
    ("estimated_ba_using_speedangle", "expected_batting_avg"),
    ("estimated_woba_using_speedangle", "expected_woba"),
    ("woba_value", "woba_value"),
    ("woba_denom", "woba_denom"),
    ("babip_value", "babip_value"),
    ("iso_value", "iso_value"),
    ("delta_home_win_exp", "delta_home_win_exp"),
    ("delta_run_exp", "delta_run_exp"),
];

/// Canonical and derived column names referenced by the enrichment steps.
pub mod col {
    pub const GAME_ID: &str = "game_id";
    pub const GAME_DATE: &str = "game_date";
    pub const HOME_TEAM: &str = "home_team";
    pub const AWAY_TEAM: &str = "away_team";
    pub const INNING: &str = "inning";
    pub const INNING_HALF: &str = "inning_half";
    pub const BATTING_SCORE: &str = "batting_score";
    pub const PA_NUMBER: &str = "pa_number";
    pub const PITCH_NUMBER: &str = "pitch_number";
    pub const BATTER_ID: &str = "batter_id";
    pub const PITCHER_ID: &str = "pitcher_id";
    pub const PITCHER_HAND: &str = "pitcher_hand";
    pub const EVENT_DESCRIPTION: &str = "event_description";
    pub const RESULT_EVENT: &str = "result_event";
    pub const PLAY_DESCRIPTION: &str = "play_description";

    /// Id columns rewritten to player names alongside the batter.
    pub const PLAYER_ID_COLUMNS: &[&str] = &[
        "fielder_2", "fielder_3", "fielder_4", "fielder_5", "fielder_6", "fielder_7", "fielder_8",
        "fielder_9", "on_1b", "on_2b", "on_3b",
    ];

    // Context enrichment
    pub const BATTING_TEAM: &str = "batting_team";
    pub const FIELDING_TEAM: &str = "fielding_team";
    pub const BATTING_TEAM_LEAGUE: &str = "batting_team_league";
    pub const BATTING_TEAM_DIVISION: &str = "batting_team_division";
    pub const FIELDING_TEAM_LEAGUE: &str = "fielding_team_league";
    pub const FIELDING_TEAM_DIVISION: &str = "fielding_team_division";
    pub const BALLPARK: &str = "ballpark";
    pub const BATTER_FULL_NAME: &str = "batter_full_name";
    pub const BATTER_POSITION: &str = "batter_position";
    pub const BATTER_BATTING_ORDER_SLOT: &str = "batter_batting_order_slot";
    pub const BATTER_SPRINT_SPEED: &str = "batter_sprint_speed";

    // Event aggregation
    pub const POST_PLAY_BATTING_SCORE: &str = "post_play_batting_score";
    pub const PLATE_APPEARANCE_FLAG: &str = "plate_appearance_flag";
    pub const AT_BAT_FLAG: &str = "at_bat_flag";
    pub const HIT_FLAG: &str = "hit_flag";
    pub const SINGLE_FLAG: &str = "single_flag";
    pub const DOUBLE_FLAG: &str = "double_flag";
    pub const TRIPLE_FLAG: &str = "triple_flag";
    pub const HOME_RUN_FLAG: &str = "home_run_flag";
    pub const CALLED_STRIKEOUT_FLAG: &str = "called_strikeout_flag";
    pub const SWINGING_STRIKEOUT_FLAG: &str = "swinging_strikeout_flag";
    pub const WALK_FLAG: &str = "walk_flag";
    pub const HBP_FLAG: &str = "hbp_flag";
    pub const RBI: &str = "rbi";
    pub const FANTASY_POINTS: &str = "fantasy_points";

    // Role classification
    pub const PITCHER_ROLE: &str = "pitcher_role";
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_table_name() {
        assert_eq!(table_name(RAW_TABLE_PREFIX, 2019), "raw_statcast_2019");
        assert_eq!(table_name(WORKING_TABLE_PREFIX, 2021), "wrk_statcast_2021");
    }

    #[test]
    fn test_canonical_names_are_unique() {
        let raw: HashSet<_> = CANONICAL_COLUMNS.iter().map(|(r, _)| *r).collect();
        let canonical: HashSet<_> = CANONICAL_COLUMNS.iter().map(|(_, c)| *c).collect();
        assert_eq!(raw.len(), CANONICAL_COLUMNS.len());
        assert_eq!(canonical.len(), CANONICAL_COLUMNS.len());
    }

    #[test]
    fn test_redundant_columns_not_in_canonical_schema() {
        for dropped in REDUNDANT_RAW_COLUMNS {
            assert!(!CANONICAL_COLUMNS.iter().any(|(raw, _)| raw == dropped));
        }
    }
}
