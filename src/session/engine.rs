//! Seams to the query engine.
//!
//! The engine's wire protocol lives outside this crate. Implementations map
//! their failures onto [`HelperError`](crate::core::HelperError):
//! `Statement` for malformed or invalid SQL, `Connection` when the session
//! itself is gone, `Transient` for everything else worth another attempt.

use crate::core::{Result, Row};

pub trait EngineConnector: Send {
    fn connect(&self, connection_string: &str) -> Result<Box<dyn EngineConnection>>;
}

pub trait EngineConnection: Send {
    fn execute(&mut self, statement: &str) -> Result<Box<dyn Cursor>>;
    fn close(&mut self) -> Result<()>;
}

/// Rows of one executed statement, fetched in pages.
pub trait Cursor: Send {
    fn columns(&self) -> Vec<String>;
    /// Up to `count` further rows; empty once the cursor is exhausted.
    fn fetch_many(&mut self, count: usize) -> Result<Vec<Row>>;
}

/// Cursor over rows already in memory.
#[derive(Debug, Clone, Default)]
pub struct VecCursor {
    columns: Vec<String>,
    rows: std::collections::VecDeque<Row>,
}

impl VecCursor {
    #[must_use]
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self { columns, rows: rows.into() }
    }

    /// Cursor of a statement that returns nothing (`SET`, `DROP`, ...).
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

impl Cursor for VecCursor {
    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn fetch_many(&mut self, count: usize) -> Result<Vec<Row>> {
        let take = count.min(self.rows.len());
        Ok(self.rows.drain(..take).collect())
    }
}
