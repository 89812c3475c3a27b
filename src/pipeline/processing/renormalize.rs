//! Column renormalization: strict reorder into the canonical column list, then
//! positional rename to canonical names.

use crate::constants::CANONICAL_COLUMNS;
use crate::error::{EtlError, Result};
use crate::pipeline::processing::FrameStep;
use crate::types::Frame;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Ordered raw column list and the canonical names assigned to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    order: Vec<String>,
    names: Vec<String>,
}

impl ColumnSpec {
    pub fn new(order: Vec<String>, names: Vec<String>) -> Result<Self> {
        if order.len() != names.len() {
            return Err(EtlError::Config(format!(
                "column order lists {} columns but {} names were supplied",
                order.len(),
                names.len()
            )));
        }
        let unique: HashSet<&String> = order.iter().collect();
        if unique.len() != order.len() {
            return Err(EtlError::Config("column order contains duplicate names".to_string()));
        }
        Ok(Self { order, names })
    }

    /// The built-in provider-to-canonical schema.
    pub fn builtin() -> Self {
        Self {
            order: CANONICAL_COLUMNS.iter().map(|(raw, _)| raw.to_string()).collect(),
            names: CANONICAL_COLUMNS.iter().map(|(_, name)| name.to_string()).collect(),
        }
    }

    /// Load both lists from text files holding one column name per line.
    pub fn from_files(order_path: &Path, names_path: &Path) -> Result<Self> {
        Self::new(read_name_list(order_path)?, read_name_list(names_path)?)
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

fn read_name_list(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .map_err(|e| EtlError::Config(format!("failed to read column list '{}': {e}", path.display())))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Reorder `frame` to exactly `column_order`. Every listed column must be
/// present and no unlisted column may remain.
pub fn reorder(frame: &Frame, column_order: &[String]) -> Result<Frame> {
    let wanted: HashSet<&str> = column_order.iter().map(String::as_str).collect();
    let extra: Vec<&str> = frame
        .columns()
        .iter()
        .map(String::as_str)
        .filter(|c| !wanted.contains(c))
        .collect();
    if !extra.is_empty() {
        return Err(EtlError::schema(format!(
            "{} unexpected column(s): {}",
            extra.len(),
            extra.join(", ")
        )));
    }
    let missing: Vec<&str> = column_order
        .iter()
        .map(String::as_str)
        .filter(|c| frame.column_index(c).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(EtlError::schema(format!(
            "{} missing column(s): {}",
            missing.len(),
            missing.join(", ")
        )));
    }
    frame.select(column_order)
}

/// Assign `new_names` positionally.
pub fn rename(frame: &mut Frame, new_names: &[String]) -> Result<()> {
    frame.set_column_names(new_names.to_vec())
}

pub struct Renormalizer<'a> {
    spec: &'a ColumnSpec,
}

impl<'a> Renormalizer<'a> {
    pub fn new(spec: &'a ColumnSpec) -> Self {
        Self { spec }
    }
}

impl FrameStep for Renormalizer<'_> {
    fn name(&self) -> &'static str {
        "renormalize"
    }

    fn apply(&self, frame: &mut Frame) -> Result<()> {
        let mut reordered = reorder(frame, self.spec.order())?;
        rename(&mut reordered, self.spec.names())?;
        *frame = reordered;
        Ok(())
    }
}
