//! Per-pitch data sources.
//!
//! Both sources deliver the provider's CSV export and share one parser that
//! turns it into a [`Frame`] with inferred cell types.

pub mod csv_dir;
pub mod savant;

pub use csv_dir::CsvDirSource;
pub use savant::SavantClient;

use crate::error::Result;
use crate::types::{parse_cell, Frame};
use std::io::Read;
use tracing::debug;

/// Parse a CSV export into a frame. The header row supplies column names; a
/// leading UTF-8 byte-order mark on the first header is stripped.
pub fn frame_from_csv<R: Read>(rdr: R) -> Result<Frame> {
    let mut reader = csv::ReaderBuilder::new().flexible(false).from_reader(rdr);
    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .enumerate()
        .map(|(i, h)| {
            let h = if i == 0 { h.trim_start_matches('\u{feff}') } else { h };
            h.trim().to_string()
        })
        .collect();

    let mut frame = Frame::new(columns);
    for record in reader.records() {
        let record = record?;
        frame.push_row(record.iter().map(parse_cell).collect())?;
    }
    debug!("Parsed {} rows x {} columns from CSV", frame.len(), frame.columns().len());
    Ok(frame)
}
