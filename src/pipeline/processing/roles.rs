//! Pitcher role classification.
//!
//! Pass one walks each game's rows in (plate appearance, pitch) order and
//! records the first two distinct pitchers. Pass two labels every row: those
//! two pitchers are starters for all of their rows, everyone else in the game
//! is a reliever.

use crate::constants::{col, RELIEVER_CODE, STARTER_CODE};
use crate::error::Result;
use crate::pipeline::processing::FrameStep;
use crate::types::{cell_i64, Anchor, Cell, Frame};
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

const STARTERS_PER_GAME: usize = 2;

/// Group key for a cell. Ids arrive as integers or strings; both compare by
/// their JSON rendering.
fn key(cell: &Cell) -> String {
    cell.to_string()
}

/// First `STARTERS_PER_GAME` distinct pitchers of every game.
pub fn starters_by_game(frame: &Frame) -> Result<HashMap<String, Vec<String>>> {
    let game = frame.require_column(col::GAME_ID)?;
    let pitcher = frame.require_column(col::PITCHER_ID)?;
    let pa = frame.require_column(col::PA_NUMBER)?;
    let pitch = frame.require_column(col::PITCH_NUMBER)?;

    let mut rows_by_game: HashMap<String, Vec<usize>> = HashMap::new();
    for (i, row) in frame.rows().iter().enumerate() {
        rows_by_game.entry(key(&row[game])).or_default().push(i);
    }

    let sequence = |i: usize| {
        let row = &frame.rows()[i];
        (
            cell_i64(&row[pa]).unwrap_or(i64::MAX),
            cell_i64(&row[pitch]).unwrap_or(i64::MAX),
        )
    };

    let mut starters = HashMap::with_capacity(rows_by_game.len());
    for (game_key, mut rows) in rows_by_game {
        rows.sort_by_key(|&i| sequence(i));
        let mut first: Vec<String> = Vec::with_capacity(STARTERS_PER_GAME);
        for i in rows {
            let id = key(&frame.rows()[i][pitcher]);
            if !first.contains(&id) {
                first.push(id);
                if first.len() == STARTERS_PER_GAME {
                    break;
                }
            }
        }
        if first.len() < STARTERS_PER_GAME {
            debug!("Game {} used fewer than two pitchers; all rows are starters", game_key);
        }
        starters.insert(game_key, first);
    }
    Ok(starters)
}

pub struct RoleClassifier;

impl FrameStep for RoleClassifier {
    fn name(&self) -> &'static str {
        "roles"
    }

    fn apply(&self, frame: &mut Frame) -> Result<()> {
        let starters = starters_by_game(frame)?;
        let game = frame.require_column(col::GAME_ID)?;
        let pitcher = frame.require_column(col::PITCHER_ID)?;

        let roles: Vec<Cell> = frame
            .rows()
            .iter()
            .map(|row| {
                let is_starter = starters
                    .get(&key(&row[game]))
                    .is_some_and(|first| first.contains(&key(&row[pitcher])));
                Value::from(if is_starter { STARTER_CODE } else { RELIEVER_CODE })
            })
            .collect();
        frame.insert_column(Anchor::Before(col::PITCHER_HAND), col::PITCHER_ROLE, roles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Rows of (game, pa, pitch, pitcher).
    fn frame(rows: &[(i64, i64, i64, &str)]) -> Frame {
        Frame::from_rows(
            ["game_id", "pa_number", "pitch_number", "pitcher_id", "pitcher_hand"]
                .iter()
                .map(|c| c.to_string())
                .collect(),
            rows.iter()
                .map(|&(g, pa, p, pitcher)| vec![json!(g), json!(pa), json!(p), json!(pitcher), json!("R")])
                .collect(),
        )
        .unwrap()
    }

    fn roles(frame: &Frame) -> Vec<&str> {
        let idx = frame.column_index(col::PITCHER_ROLE).unwrap();
        frame.column_values(idx).map(|c| c.as_str().unwrap()).collect()
    }

    #[test]
    fn test_first_two_pitchers_start_even_when_they_return() {
        let mut f = frame(&[
            (1, 1, 1, "A"),
            (1, 2, 1, "A"),
            (1, 3, 1, "B"),
            (1, 4, 1, "C"),
            (1, 5, 1, "A"),
        ]);
        RoleClassifier.apply(&mut f).unwrap();
        assert_eq!(roles(&f), vec!["SP", "SP", "SP", "RP", "SP"]);
    }

    #[test]
    fn test_appearance_order_uses_sequence_not_row_order() {
        let mut f = frame(&[
            (1, 9, 1, "C"),
            (1, 1, 2, "A"),
            (1, 2, 1, "B"),
            (1, 1, 1, "A"),
        ]);
        RoleClassifier.apply(&mut f).unwrap();
        assert_eq!(roles(&f), vec!["RP", "SP", "SP", "SP"]);
    }

    #[test]
    fn test_games_are_independent() {
        let mut f = frame(&[
            (1, 1, 1, "A"),
            (2, 1, 1, "C"),
            (1, 2, 1, "B"),
            (2, 2, 1, "A"),
            (1, 3, 1, "C"),
            (2, 3, 1, "D"),
        ]);
        RoleClassifier.apply(&mut f).unwrap();
        assert_eq!(roles(&f), vec!["SP", "SP", "SP", "SP", "RP", "RP"]);
    }

    #[test]
    fn test_single_pitcher_game_is_all_starter() {
        let mut f = frame(&[(7, 1, 1, "A"), (7, 2, 1, "A")]);
        RoleClassifier.apply(&mut f).unwrap();
        assert_eq!(roles(&f), vec!["SP", "SP"]);
    }

    #[test]
    fn test_role_column_precedes_pitcher_hand() {
        let mut f = frame(&[(1, 1, 1, "A")]);
        RoleClassifier.apply(&mut f).unwrap();
        assert_eq!(f.columns()[4], col::PITCHER_ROLE);
        assert_eq!(f.columns()[5], "pitcher_hand");
    }
}
