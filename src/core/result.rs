use comfy_table::{presets::UTF8_FULL, Cell, Table as ComfyTable};
use serde::{Deserialize, Serialize};

use super::error::{HelperError, Result};
use super::row::Row;
use super::value::Value;
use crate::parser::literal::decode_byte_literal;

/// Column header plus rows, in the order the engine produced them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    #[must_use]
    pub const fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    #[must_use]
    pub const fn empty(columns: Vec<String>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(HelperError::Parse(format!(
                "row has {} values but the result has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Appends the rows of another result with the same header.
    pub fn extend(&mut self, other: Self) -> Result<()> {
        if other.columns != self.columns {
            return Err(HelperError::Parse(format!(
                "cannot append result with columns {:?} to {:?}",
                other.columns, self.columns
            )));
        }
        self.rows.extend(other.rows);
        Ok(())
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.eq_ignore_ascii_case(name))
    }

    /// First value of the first row, for single-value queries such as `count(*)`.
    #[must_use]
    pub fn scalar(&self) -> Option<&Value> {
        self.rows.first().and_then(|r| r.get(0))
    }

    /// Values of one column, top to bottom.
    pub fn column_values(&self, index: usize) -> impl Iterator<Item = &Value> + '_ {
        self.rows.iter().filter_map(move |r| r.get(index))
    }

    /// Replaces escaped byte literals (`b'caf\xc3\xa9'`) with their UTF-8 text.
    /// Literals that do not decode to UTF-8 are kept as they are.
    /// Returns how many values were rewritten.
    pub fn decode_byte_literals(&mut self) -> usize {
        let mut decoded = 0;
        for row in &mut self.rows {
            for value in &mut row.values {
                if let Value::Text(text) = value {
                    if let Some(plain) = decode_byte_literal(text) {
                        *value = Value::Text(plain);
                        decoded += 1;
                    }
                }
            }
        }
        decoded
    }

    #[must_use]
    pub fn render(&self) -> String {
        let mut table = ComfyTable::new();
        table.load_preset(UTF8_FULL);
        table.set_header(self.columns.iter().map(Cell::new));
        for row in &self.rows {
            table.add_row(row.values.iter().map(|v| Cell::new(v.to_string())));
        }
        table.to_string()
    }
}
