use tracing::debug;

use crate::core::{QueryResult, Result};
use crate::session::Cursor;

/// Pages a cursor into memory in fixed-size chunks.
#[derive(Debug, Clone, Copy)]
pub struct RowMaterializer {
    fetch_size: usize,
}

impl RowMaterializer {
    #[must_use]
    pub fn new(fetch_size: usize) -> Self {
        Self { fetch_size: fetch_size.max(1) }
    }

    #[must_use]
    pub const fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    /// Reads chunks until the cursor hands back an empty one.
    pub fn materialize(&self, cursor: &mut dyn Cursor) -> Result<QueryResult> {
        let mut result = QueryResult::empty(cursor.columns());
        let mut pages = 0usize;
        loop {
            let chunk = cursor.fetch_many(self.fetch_size)?;
            if chunk.is_empty() {
                break;
            }
            pages += 1;
            for row in chunk {
                result.push(row)?;
            }
        }
        debug!(rows = result.len(), pages, "materialized result");
        Ok(result)
    }
}
