use crate::apis::frame_from_csv;
use crate::constants::CSV_DIR_SOURCE;
use crate::error::Result;
use crate::types::{EventSource, Frame};
use chrono::NaiveDate;
use std::fs::File;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Offline source reading one `YYYY-MM-DD.csv` export per game date.
pub struct CsvDirSource {
    dir: PathBuf,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.csv", date.format("%Y-%m-%d")))
    }
}

impl EventSource for CsvDirSource {
    fn source_name(&self) -> &'static str {
        CSV_DIR_SOURCE
    }

    fn fetch_events(&self, start: NaiveDate, end: NaiveDate) -> Result<Frame> {
        let mut combined: Option<Frame> = None;
        for date in start.iter_days().take_while(|d| *d <= end) {
            let path = self.path_for(date);
            if !path.exists() {
                debug!("No export at {}", path.display());
                continue;
            }
            let frame = frame_from_csv(File::open(&path)?)?;
            match combined.as_mut() {
                None => combined = Some(frame),
                Some(acc) if acc.columns() == frame.columns() => {
                    for row in frame.rows() {
                        acc.push_row(row.clone())?;
                    }
                }
                Some(_) => {
                    warn!("Skipping {}: header differs from earlier files in range", path.display());
                }
            }
        }
        Ok(combined.unwrap_or_default())
    }
}
