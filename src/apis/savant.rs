use crate::apis::frame_from_csv;
use crate::constants::SAVANT_SOURCE;
use crate::error::{EtlError, Result};
use crate::types::{EventSource, Frame};
use chrono::NaiveDate;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument};

pub const DEFAULT_BASE_URL: &str = "https://baseballsavant.mlb.com/statcast_search/csv";

/// Blocking client for the Baseball Savant per-pitch CSV export.
pub struct SavantClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl SavantClient {
    pub fn new(base_url: impl Into<String>, timeout_seconds: u64) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .user_agent(concat!("statcast_etl/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn query(start: NaiveDate, end: NaiveDate) -> Vec<(&'static str, String)> {
        vec![
            ("all", "true".to_string()),
            ("type", "details".to_string()),
            ("player_type", "pitcher".to_string()),
            ("hfGT", "R|PO|S|".to_string()),
            ("game_date_gt", start.format("%Y-%m-%d").to_string()),
            ("game_date_lt", end.format("%Y-%m-%d").to_string()),
            ("min_pitches", "0".to_string()),
            ("min_results", "0".to_string()),
            ("group_by", "name".to_string()),
            ("sort_col", "pitches".to_string()),
            ("sort_order", "desc".to_string()),
        ]
    }
}

impl EventSource for SavantClient {
    fn source_name(&self) -> &'static str {
        SAVANT_SOURCE
    }

    #[instrument(skip(self), fields(source = SAVANT_SOURCE))]
    fn fetch_events(&self, start: NaiveDate, end: NaiveDate) -> Result<Frame> {
        let started = Instant::now();
        let response = self
            .client
            .get(&self.base_url)
            .query(&Self::query(start, end))
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(EtlError::SourceFetch(format!(
                "{} returned HTTP {} for {start}..{end}",
                self.base_url,
                status.as_u16()
            )));
        }

        let body = response.bytes()?;
        debug!("Downloaded {} bytes", body.len());
        // The export answers a date with no games with an empty body
        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Frame::default());
        }

        let frame = frame_from_csv(body.as_ref())?;
        info!(
            "Fetched {} pitches from Savant in {:.2}s",
            frame.len(),
            started.elapsed().as_secs_f64()
        );
        Ok(frame)
    }
}
