use crate::error::{EtlError, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

/// A single cell of a pitch row. Provider data is loosely typed, so cells keep
/// the JSON value model: null, integer, float or text.
pub type Cell = Value;

/// Position of a newly inserted column relative to an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Before(&'static str),
    After(&'static str),
    End,
}

/// A batch of pitch rows sharing one ordered column list.
///
/// Rows are stored positionally; every row has exactly `columns.len()` cells.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Frame {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Frame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Self> {
        let mut frame = Self::new(columns);
        for row in rows {
            frame.push_row(row)?;
        }
        Ok(frame)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(EtlError::schema(format!(
                "row has {} cells but frame has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| EtlError::schema(format!("required column '{name}' is missing")))
    }

    pub fn cell(&self, row: usize, column: usize) -> &Cell {
        &self.rows[row][column]
    }

    /// Iterate the values of one column in row order.
    pub fn column_values(&self, column: usize) -> impl Iterator<Item = &Cell> + '_ {
        self.rows.iter().map(move |row| &row[column])
    }

    /// Rewrite every cell of an existing column in place.
    pub fn update_column<F>(&mut self, name: &str, mut f: F) -> Result<()>
    where
        F: FnMut(&Cell) -> Cell,
    {
        let idx = self.require_column(name)?;
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        Ok(())
    }

    /// Insert a new column next to `anchor`. `values` must hold one cell per row.
    pub fn insert_column(&mut self, anchor: Anchor, name: &str, values: Vec<Cell>) -> Result<()> {
        if self.column_index(name).is_some() {
            return Err(EtlError::schema(format!("column '{name}' already exists")));
        }
        if values.len() != self.rows.len() {
            return Err(EtlError::schema(format!(
                "column '{name}' has {} values for {} rows",
                values.len(),
                self.rows.len()
            )));
        }
        let at = match anchor {
            Anchor::Before(anchor) => self.require_column(anchor)?,
            Anchor::After(anchor) => self.require_column(anchor)? + 1,
            Anchor::End => self.columns.len(),
        };
        self.columns.insert(at, name.to_string());
        for (row, value) in self.rows.iter_mut().zip(values) {
            row.insert(at, value);
        }
        Ok(())
    }

    /// Remove the named columns that are present; returns how many were dropped.
    pub fn drop_columns(&mut self, names: &[&str]) -> usize {
        let mut keep = vec![true; self.columns.len()];
        let mut dropped = 0;
        for (i, column) in self.columns.iter().enumerate() {
            if names.contains(&column.as_str()) {
                keep[i] = false;
                dropped += 1;
            }
        }
        if dropped == 0 {
            return 0;
        }
        let retain = |items: Vec<Cell>| {
            items
                .into_iter()
                .zip(keep.iter())
                .filter_map(|(item, k)| k.then_some(item))
                .collect::<Vec<_>>()
        };
        self.rows = std::mem::take(&mut self.rows).into_iter().map(retain).collect();
        self.columns = std::mem::take(&mut self.columns)
            .into_iter()
            .zip(keep.iter())
            .filter_map(|(c, k)| k.then_some(c))
            .collect();
        dropped
    }

    /// Build a new frame holding exactly `order`, in that order.
    pub fn select(&self, order: &[String]) -> Result<Frame> {
        let indices = order
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>>>()?;
        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i].clone()).collect())
            .collect();
        Ok(Frame {
            columns: order.to_vec(),
            rows,
        })
    }

    /// Replace every column name positionally.
    pub fn set_column_names(&mut self, names: Vec<String>) -> Result<()> {
        if names.len() != self.columns.len() {
            return Err(EtlError::schema(format!(
                "{} new names supplied for {} columns",
                names.len(),
                self.columns.len()
            )));
        }
        self.columns = names;
        Ok(())
    }
}

/// Text content of a cell, if it holds a string.
pub fn cell_str(cell: &Cell) -> Option<&str> {
    cell.as_str()
}

/// Integer content of a cell. Accepts integral floats and numeric strings,
/// which is how ids and scores arrive from some exports.
pub fn cell_i64(cell: &Cell) -> Option<i64> {
    match cell {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn cell_f64(cell: &Cell) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Interpret one raw CSV field: empty and literal `null` become null, then
/// integer, then float, otherwise text.
pub fn parse_cell(field: &str) -> Cell {
    let trimmed = field.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if f.is_finite() {
            return Value::from(f);
        }
    }
    Value::String(field.to_string())
}

/// Core trait every per-pitch data source implements.
pub trait EventSource {
    /// Unique identifier for this source
    fn source_name(&self) -> &'static str;

    /// Fetch all pitch rows for the inclusive date range. An empty frame means
    /// the provider has no data for those dates.
    fn fetch_events(&self, start: NaiveDate, end: NaiveDate) -> Result<Frame>;
}
