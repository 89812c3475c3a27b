//! Event aggregation: per-row outcome indicator columns, post-play score, RBI
//! and fantasy points.

use crate::constants::col;
use crate::error::Result;
use crate::metrics::EnrichMetrics;
use crate::pipeline::processing::FrameStep;
use crate::types::{cell_i64, cell_str, Anchor, Cell, Frame};
use serde_json::Value;
use tracing::warn;

/// Plate-appearance-ending outcomes recognised by the aggregator. Anything else
/// in the outcome column contributes zero to every indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Strikeout,
    FieldOut,
    GroundedIntoDoublePlay,
    StrikeoutDoublePlay,
    DoublePlay,
    ForceOut,
    FieldersChoiceOut,
    FieldersChoice,
    Single,
    Double,
    Triple,
    HomeRun,
    HitByPitch,
    Walk,
    FieldError,
    SacFly,
    SacBunt,
    InterfDef,
}

impl Outcome {
    pub fn parse(event: &str) -> Option<Self> {
        Some(match event {
            "strikeout" => Outcome::Strikeout,
            "field_out" => Outcome::FieldOut,
            "grounded_into_double_play" => Outcome::GroundedIntoDoublePlay,
            "strikeout_double_play" => Outcome::StrikeoutDoublePlay,
            "double_play" => Outcome::DoublePlay,
            "force_out" => Outcome::ForceOut,
            "fielders_choice_out" => Outcome::FieldersChoiceOut,
            "fielders_choice" => Outcome::FieldersChoice,
            "single" => Outcome::Single,
            "double" => Outcome::Double,
            "triple" => Outcome::Triple,
            "home_run" => Outcome::HomeRun,
            "hit_by_pitch" => Outcome::HitByPitch,
            "walk" => Outcome::Walk,
            "field_error" => Outcome::FieldError,
            "sac_fly" => Outcome::SacFly,
            "sac_bunt" => Outcome::SacBunt,
            "interf_def" => Outcome::InterfDef,
            _ => return None,
        })
    }

    pub fn is_at_bat(self) -> bool {
        use Outcome::*;
        matches!(
            self,
            Strikeout
                | FieldOut
                | GroundedIntoDoublePlay
                | StrikeoutDoublePlay
                | DoublePlay
                | ForceOut
                | FieldersChoiceOut
                | FieldersChoice
                | Single
                | Double
                | Triple
                | HomeRun
        )
    }

    pub fn is_hit(self) -> bool {
        matches!(self, Outcome::Single | Outcome::Double | Outcome::Triple | Outcome::HomeRun)
    }
}

/// Outcomes for which no RBI is credited, whatever the score change.
fn excludes_rbi(outcome: Option<Outcome>) -> bool {
    matches!(
        outcome,
        Some(
            Outcome::FieldError
                | Outcome::GroundedIntoDoublePlay
                | Outcome::Strikeout
                | Outcome::StrikeoutDoublePlay
                | Outcome::DoublePlay
        )
    )
}

/// Runs implied by a play description: one per occurrence of `score` or
/// `homer` (case-sensitive). A known overcount: any description quoting those
/// words for another reason is counted too.
pub fn runs_in_description(description: Option<&str>) -> i64 {
    description
        .map(|d| (d.matches("score").count() + d.matches("homer").count()) as i64)
        .unwrap_or(0)
}

/// Indicator values for one row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeFlags {
    pub plate_appearance: u8,
    pub at_bat: u8,
    pub hit: u8,
    pub single: u8,
    pub double: u8,
    pub triple: u8,
    pub home_run: u8,
    pub called_strikeout: u8,
    pub swinging_strikeout: u8,
    pub walk: u8,
    pub hbp: u8,
}

impl OutcomeFlags {
    pub fn classify(outcome: Option<Outcome>, description: Option<&str>) -> Self {
        let Some(outcome) = outcome else {
            return Self::default();
        };
        let is = |o: Outcome| u8::from(outcome == o);
        let strikeout_with = |d: &str| u8::from(outcome == Outcome::Strikeout && description == Some(d));
        Self {
            plate_appearance: 1,
            at_bat: u8::from(outcome.is_at_bat()),
            hit: u8::from(outcome.is_hit()),
            single: is(Outcome::Single),
            double: is(Outcome::Double),
            triple: is(Outcome::Triple),
            home_run: is(Outcome::HomeRun),
            called_strikeout: strikeout_with("called_strike"),
            swinging_strikeout: strikeout_with("swinging_strike"),
            walk: is(Outcome::Walk),
            hbp: is(Outcome::HitByPitch),
        }
    }

    fn as_cells(&self) -> [Cell; 11] {
        [
            self.plate_appearance,
            self.at_bat,
            self.hit,
            self.single,
            self.double,
            self.triple,
            self.home_run,
            self.called_strikeout,
            self.swinging_strikeout,
            self.walk,
            self.hbp,
        ]
        .map(Value::from)
    }
}

const FLAG_COLUMNS: [&str; 11] = [
    col::PLATE_APPEARANCE_FLAG,
    col::AT_BAT_FLAG,
    col::HIT_FLAG,
    col::SINGLE_FLAG,
    col::DOUBLE_FLAG,
    col::TRIPLE_FLAG,
    col::HOME_RUN_FLAG,
    col::CALLED_STRIKEOUT_FLAG,
    col::SWINGING_STRIKEOUT_FLAG,
    col::WALK_FLAG,
    col::HBP_FLAG,
];

/// Yahoo-style batter points.
pub fn fantasy_points(flags: &OutcomeFlags, rbi: i64) -> f64 {
    f64::from(flags.single) * 2.6
        + f64::from(flags.double) * 5.2
        + f64::from(flags.triple) * 7.8
        + f64::from(flags.home_run) * 10.4
        + rbi as f64 * 1.9
        + f64::from(flags.walk) * 2.6
        + f64::from(flags.hbp) * 2.6
}

pub struct EventAggregator;

impl EventAggregator {
    /// Insert `post_play_batting_score` before the plate-appearance number.
    /// A null pre-play score yields a null post-play score.
    fn add_post_play_score(frame: &mut Frame) -> Result<()> {
        let pre = frame.require_column(col::BATTING_SCORE)?;
        let des = frame.require_column(col::PLAY_DESCRIPTION)?;
        let post: Vec<Cell> = frame
            .rows()
            .iter()
            .map(|row| match cell_i64(&row[pre]) {
                Some(score) => Value::from(score + runs_in_description(cell_str(&row[des]))),
                None => Value::Null,
            })
            .collect();
        frame.insert_column(Anchor::Before(col::PA_NUMBER), col::POST_PLAY_BATTING_SCORE, post)
    }

    /// Append indicator flags, RBI and fantasy points. RBI reads the
    /// post-play score column, which must already exist.
    fn add_outcome_columns(frame: &mut Frame) -> Result<()> {
        let event = frame.require_column(col::RESULT_EVENT)?;
        let description = frame.require_column(col::EVENT_DESCRIPTION)?;
        let pre = frame.require_column(col::BATTING_SCORE)?;
        let post = frame.require_column(col::POST_PLAY_BATTING_SCORE)?;

        let mut flag_columns: [Vec<Cell>; 11] = Default::default();
        let mut rbis = Vec::with_capacity(frame.len());
        let mut points = Vec::with_capacity(frame.len());
        let mut negative = 0usize;

        for row in frame.rows() {
            let outcome = cell_str(&row[event]).and_then(Outcome::parse);
            let flags = OutcomeFlags::classify(outcome, cell_str(&row[description]));

            let rbi = if excludes_rbi(outcome) {
                0
            } else {
                match (cell_i64(&row[post]), cell_i64(&row[pre])) {
                    (Some(post), Some(pre)) => post - pre,
                    _ => 0,
                }
            };
            if rbi < 0 {
                negative += 1;
            }

            for (column, cell) in flag_columns.iter_mut().zip(flags.as_cells()) {
                column.push(cell);
            }
            rbis.push(Value::from(rbi));
            points.push(Value::from(fantasy_points(&flags, rbi)));
        }

        if negative > 0 {
            warn!("{} rows derived a negative RBI", negative);
            EnrichMetrics::record_negative_rbi(negative);
        }

        for (name, values) in FLAG_COLUMNS.into_iter().zip(flag_columns) {
            frame.insert_column(Anchor::End, name, values)?;
        }
        frame.insert_column(Anchor::End, col::RBI, rbis)?;
        frame.insert_column(Anchor::End, col::FANTASY_POINTS, points)
    }
}

impl FrameStep for EventAggregator {
    fn name(&self) -> &'static str {
        "aggregate"
    }

    fn apply(&self, frame: &mut Frame) -> Result<()> {
        Self::add_post_play_score(frame)?;
        Self::add_outcome_columns(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(rows: Vec<(Cell, Cell, Cell, Cell)>) -> Frame {
        let columns = ["batting_score", "pa_number", "event_description", "result_event", "play_description"];
        Frame::from_rows(
            columns.iter().map(|c| c.to_string()).collect(),
            rows.into_iter()
                .enumerate()
                .map(|(i, (score, description, event, des))| vec![score, json!(i + 1), description, event, des])
                .collect(),
        )
        .unwrap()
    }

    fn get<'f>(frame: &'f Frame, row: usize, column: &str) -> &'f Cell {
        frame.cell(row, frame.column_index(column).unwrap())
    }

    fn aggregate(rows: Vec<(Cell, Cell, Cell, Cell)>) -> Frame {
        let mut f = frame(rows);
        EventAggregator.apply(&mut f).unwrap();
        f
    }

    #[test]
    fn test_single_with_run_scoring() {
        let f = aggregate(vec![(
            json!(2),
            json!("hit_into_play"),
            json!("single"),
            json!("Mike Trout singles on a line drive. Justin Upton scores."),
        )]);
        assert_eq!(get(&f, 0, col::POST_PLAY_BATTING_SCORE), &json!(3));
        assert_eq!(get(&f, 0, col::RBI), &json!(1));
        assert_eq!(get(&f, 0, col::SINGLE_FLAG), &json!(1));
        assert_eq!(get(&f, 0, col::HIT_FLAG), &json!(1));
        let points = get(&f, 0, col::FANTASY_POINTS).as_f64().unwrap();
        assert!((points - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_home_run_flags() {
        let f = aggregate(vec![(
            json!(0),
            json!("hit_into_play"),
            json!("home_run"),
            json!("Mike Trout homers (10) on a fly ball to center field."),
        )]);
        assert_eq!(get(&f, 0, col::HOME_RUN_FLAG), &json!(1));
        assert_eq!(get(&f, 0, col::HIT_FLAG), &json!(1));
        assert_eq!(get(&f, 0, col::AT_BAT_FLAG), &json!(1));
        assert_eq!(get(&f, 0, col::PLATE_APPEARANCE_FLAG), &json!(1));
        assert_eq!(get(&f, 0, col::RBI), &json!(1));
        let points = get(&f, 0, col::FANTASY_POINTS).as_f64().unwrap();
        assert!((points - 12.3).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_outcomes_zero_every_flag() {
        let f = aggregate(vec![
            (json!(1), json!("ball"), Value::Null, Value::Null),
            (json!(1), json!("ball"), json!("caught_stealing_2b"), Value::Null),
        ]);
        for row in 0..2 {
            for column in FLAG_COLUMNS {
                assert_eq!(get(&f, row, column), &json!(0), "{column} row {row}");
            }
            assert_eq!(get(&f, row, col::RBI), &json!(0));
        }
    }

    #[test]
    fn test_strikeout_variants_and_rbi_exclusion() {
        let f = aggregate(vec![
            (json!(3), json!("called_strike"), json!("strikeout"), json!("X called out on strikes.")),
            (json!(3), json!("swinging_strike"), json!("strikeout"), json!("Y strikes out swinging. Z scores on a wild pitch.")),
            (json!(3), json!("hit_into_play"), json!("grounded_into_double_play"), json!("Q grounds into a double play. R scores.")),
        ]);
        assert_eq!(get(&f, 0, col::CALLED_STRIKEOUT_FLAG), &json!(1));
        assert_eq!(get(&f, 0, col::SWINGING_STRIKEOUT_FLAG), &json!(0));
        assert_eq!(get(&f, 1, col::SWINGING_STRIKEOUT_FLAG), &json!(1));
        assert_eq!(get(&f, 1, col::POST_PLAY_BATTING_SCORE), &json!(4));
        assert_eq!(get(&f, 1, col::RBI), &json!(0));
        assert_eq!(get(&f, 2, col::RBI), &json!(0));
        assert_eq!(get(&f, 2, col::AT_BAT_FLAG), &json!(1));
    }

    #[test]
    fn test_walk_sac_fly_and_null_score() {
        let f = aggregate(vec![
            (json!(0), json!("ball"), json!("walk"), json!("A walks.")),
            (json!(0), json!("hit_into_play"), json!("sac_fly"), json!("B out on a sacrifice fly. C scores.")),
            (Value::Null, json!("hit_into_play"), json!("single"), json!("D singles. E scores.")),
        ]);
        assert_eq!(get(&f, 0, col::WALK_FLAG), &json!(1));
        assert_eq!(get(&f, 0, col::AT_BAT_FLAG), &json!(0));
        assert_eq!(get(&f, 0, col::PLATE_APPEARANCE_FLAG), &json!(1));
        assert_eq!(get(&f, 1, col::AT_BAT_FLAG), &json!(0));
        assert_eq!(get(&f, 1, col::RBI), &json!(1));
        assert_eq!(get(&f, 2, col::POST_PLAY_BATTING_SCORE), &Value::Null);
        assert_eq!(get(&f, 2, col::RBI), &json!(0));
    }

    #[test]
    fn test_column_layout() {
        let f = aggregate(vec![(json!(0), Value::Null, Value::Null, Value::Null)]);
        let names: Vec<&str> = f.columns().iter().map(String::as_str).collect();
        assert_eq!(names[1], col::POST_PLAY_BATTING_SCORE);
        assert_eq!(names[2], "pa_number");
        assert_eq!(&names[names.len() - 2..], &[col::RBI, col::FANTASY_POINTS]);
        assert_eq!(names[6], col::PLATE_APPEARANCE_FLAG);
    }

    #[test]
    fn test_runs_in_description_counts_substrings() {
        assert_eq!(runs_in_description(None), 0);
        assert_eq!(runs_in_description(Some("A scores. B scores.")), 2);
        // Known overcount: "scoreless" contains "score"
        assert_eq!(runs_in_description(Some("in a scoreless game")), 1);
        assert_eq!(runs_in_description(Some("Scores")), 0);
    }
}
