use crate::error::{EtlError, Result};
use crate::types::Frame;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Append-only destination for pitch batches.
pub trait Sink {
    /// Append every row of `frame` to `table`, returning the number of rows
    /// written. The frame's columns must match the table's existing columns.
    fn append_rows(&mut self, table: &str, frame: &Frame) -> Result<usize>;
}

/// In-memory sink for development/testing.
///
/// Clones share the same tables, so a test can keep a handle while the
/// orchestrator owns another.
#[derive(Clone, Default)]
pub struct InMemorySink {
    tables: Arc<Mutex<HashMap<String, Frame>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one table, if anything was appended to it.
    pub fn table(&self, name: &str) -> Option<Frame> {
        self.tables.lock().ok()?.get(name).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .lock()
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl Sink for InMemorySink {
    fn append_rows(&mut self, table: &str, frame: &Frame) -> Result<usize> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|e| EtlError::sink(table, format!("lock poisoned: {e}")))?;
        let existing = tables
            .entry(table.to_string())
            .or_insert_with(|| Frame::new(frame.columns().to_vec()));
        if existing.columns() != frame.columns() {
            return Err(EtlError::sink(
                table,
                "batch columns do not match the table's columns",
            ));
        }
        for row in frame.rows() {
            existing.push_row(row.clone())?;
        }
        debug!("Appended {} rows to {}", frame.len(), table);
        Ok(frame.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(columns: &[&str], rows: usize) -> Frame {
        Frame::from_rows(
            columns.iter().map(|c| c.to_string()).collect(),
            (0..rows).map(|i| columns.iter().map(|_| json!(i)).collect()).collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_append_accumulates_and_is_shared() {
        let handle = InMemorySink::new();
        let mut sink = handle.clone();
        assert_eq!(sink.append_rows("raw_statcast_2019", &frame(&["a", "b"], 2)).unwrap(), 2);
        assert_eq!(sink.append_rows("raw_statcast_2019", &frame(&["a", "b"], 3)).unwrap(), 3);
        assert_eq!(handle.table("raw_statcast_2019").unwrap().len(), 5);
        assert_eq!(handle.table_names(), vec!["raw_statcast_2019".to_string()]);
    }

    #[test]
    fn test_column_mismatch_rejected() {
        let mut sink = InMemorySink::new();
        sink.append_rows("t", &frame(&["a", "b"], 1)).unwrap();
        let err = sink.append_rows("t", &frame(&["a", "c"], 1)).unwrap_err();
        assert!(matches!(err, EtlError::SinkWrite { .. }));
    }
}
