use serde::{Deserialize, Serialize};
use tracing::info;

use super::{DerivedTables, normalize_columns};
use crate::core::{HelperError, Result, Value};
use crate::params;

/// One generated column and the source value it encodes.
///
/// Ordinals follow the order in which the engine enumerated the distinct
/// values, so the same data can map differently across runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedColumn {
    pub name: String,
    pub source_column: String,
    pub value: Value,
}

impl DerivedTables<'_> {
    /// One indicator column `<column>_<ordinal>` per distinct value of each
    /// column, into `<table>_ohe`.
    ///
    /// With `drop_sources` the encoded columns are left out of the new table;
    /// otherwise every original column is kept.
    pub fn one_hot(&mut self, table: &str, columns: &[&str], drop_sources: bool) -> Result<Vec<DerivedColumn>> {
        if columns.is_empty() {
            return Err(HelperError::InvalidArgument("one-hot encoding needs at least one column".into()));
        }
        let columns = normalize_columns(columns)?;
        info!(table, ?columns, "one-hot encoding");

        let described = self.describe(table)?;
        let mut select = if drop_sources {
            described
                .iter()
                .filter(|c| !columns.contains(&c.name.to_lowercase()))
                .map(|c| c.name.clone())
                .collect()
        } else {
            vec!["*".to_string()]
        };

        let mut mapping = Vec::new();
        for column in &columns {
            for (ordinal, value) in self.distinct_values(column, table, &described)?.into_iter().enumerate() {
                let alias = format!("{column}_{ordinal}");
                select.push(self.catalog.render(
                    "one_hot_case",
                    &params! { "column" => column, "value" => value.to_sql_literal(), "alias" => &alias },
                )?);
                mapping.push(DerivedColumn { name: alias, source_column: column.clone(), value });
            }
        }
        if select.is_empty() {
            return Err(HelperError::InvalidArgument(format!(
                "one-hot encoding of {table} would produce a table without columns"
            )));
        }

        self.derive(
            &format!("{table}_ohe"),
            "one_hot",
            &params! { "table" => table, "columns" => select.join(", ") },
        )?;
        for derived in &mapping {
            info!(column = %derived.name, value = %derived.value, "one-hot column");
        }
        Ok(mapping)
    }

    /// Sums `measures[i]` per distinct value of `pivots[i]`, grouped by
    /// `group`, into `<table>_trans`.
    pub fn pivot(
        &mut self,
        table: &str,
        group: &[&str],
        pivots: &[&str],
        measures: &[&str],
    ) -> Result<Vec<DerivedColumn>> {
        if group.is_empty() || pivots.is_empty() {
            return Err(HelperError::InvalidArgument("pivot needs grouping and pivot columns".into()));
        }
        if pivots.len() != measures.len() {
            return Err(HelperError::InvalidArgument(format!(
                "pivot needs one measure per pivot column ({} pivots, {} measures)",
                pivots.len(),
                measures.len()
            )));
        }
        let group = normalize_columns(group)?;
        let pivots = normalize_columns(pivots)?;
        let measures = normalize_columns(measures)?;
        if let Some((_, repeated)) = pivots.iter().enumerate().find(|(i, p)| pivots[..*i].contains(p)) {
            return Err(HelperError::InvalidArgument(format!(
                "pivot column {repeated} is listed more than once"
            )));
        }
        info!(table, ?group, ?pivots, "pivot");

        let described = self.describe(table)?;
        let mut select = group.clone();
        let mut mapping = Vec::new();
        for (pivot, measure) in pivots.iter().zip(&measures) {
            for (ordinal, value) in self.distinct_values(pivot, table, &described)?.into_iter().enumerate() {
                let alias = format!("{pivot}_{ordinal}");
                select.push(self.catalog.render(
                    "pivot_case",
                    &params! {
                        "column" => pivot,
                        "value" => value.to_sql_literal(),
                        "measure" => measure,
                        "alias" => &alias,
                    },
                )?);
                mapping.push(DerivedColumn { name: alias, source_column: pivot.clone(), value });
            }
        }

        self.derive(
            &format!("{table}_trans"),
            "pivot",
            &params! { "table" => table, "columns" => select.join(", "), "group" => group.join(", ") },
        )?;
        Ok(mapping)
    }
}
