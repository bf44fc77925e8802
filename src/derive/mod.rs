//! Derived tables: drop, create from a template, recompute statistics.
//!
//! Every analysis in this module goes through [`DerivedTables::derive`], so
//! each produced table is fresh and has planner statistics when the call
//! returns. The analyses live in their own files as further `impl` blocks.

pub mod sampling;
pub mod pivot;
pub mod stability;
pub mod masking;

pub use pivot::DerivedColumn;
pub use stability::{
    ConfidenceLevel, StabilityReport, VariableSelection, exceeds, mean_stderr, proportion_stderr,
};
pub use masking::MaskSalts;

use tracing::{debug, info, warn};

use crate::core::{ColumnInfo, ColumnType, HelperError, Result, TableDescription, Value};
use crate::executor::QueryExecutor;
use crate::params;
use crate::parser::Params;
use crate::sql::TemplateCatalog;

pub struct DerivedTables<'a> {
    executor: &'a mut QueryExecutor,
    catalog: &'a TemplateCatalog,
}

impl<'a> DerivedTables<'a> {
    pub fn new(executor: &'a mut QueryExecutor, catalog: &'a TemplateCatalog) -> Self {
        Self { executor, catalog }
    }

    /// Drops `target`, creates it with `template`, then computes its stats.
    pub fn derive(&mut self, target: &str, template: &str, params: &Params) -> Result<()> {
        // rendered before the drop: a rejected parameter set keeps the old table
        let statement = self.catalog.render(template, params)?;
        self.drop_if_exists(target)?;
        self.executor.run(&statement)?;
        self.compute_stats(target)?;
        info!(table = target, template, "derived table created");
        Ok(())
    }

    /// Drops a table, treating "does not exist" as success.
    pub fn drop_if_exists(&mut self, table: &str) -> Result<()> {
        let statement = self.catalog.render("drop_table", &params! { "table" => table })?;
        match self.executor.run(&statement) {
            Err(e) if e.is_missing_object() => {
                debug!(table, "table to drop does not exist");
                Ok(())
            }
            other => other,
        }
    }

    pub fn compute_stats(&mut self, table: &str) -> Result<()> {
        let statement = self.catalog.render("compute_stats", &params! { "table" => table })?;
        self.executor.run(&statement)
    }

    pub fn describe(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        let statement = self.catalog.render("describe", &params! { "table" => table })?;
        ColumnInfo::from_describe(&self.executor.query(&statement)?)
    }

    pub fn describe_formatted(&mut self, table: &str) -> Result<TableDescription> {
        let statement = self.catalog.render("describe_formatted", &params! { "table" => table })?;
        TableDescription::from_formatted(&self.executor.query(&statement)?)
    }

    /// Rebuilds `table` as Parquet. The data passes through
    /// `<name>_recreate` in the current database, which is kept when the
    /// restore fails.
    pub fn recreate(&mut self, table: &str) -> Result<()> {
        let name = table.rsplit_once('.').map_or(table, |(_, name)| name);
        let copy = format!("{name}_recreate");
        let names = params! { "table" => table, "copy" => &copy };
        let copy_statement = self.catalog.render("recreate_copy", &names)?;
        let restore_statement = self.catalog.render("recreate_restore", &names)?;

        self.drop_if_exists(&copy)?;
        self.executor.run(&copy_statement)?;
        self.drop_if_exists(table)?;
        if let Err(e) = self.executor.run(&restore_statement) {
            warn!(table, copy = %copy, error = %e, "restore failed, data kept in the copy");
            return Err(e);
        }
        self.drop_if_exists(&copy)?;
        self.compute_stats(table)?;
        info!(table, "table recreated as parquet");
        Ok(())
    }

    /// Distinct values of a column, in the order the engine returns them.
    /// Untyped text is re-read with the column's declared scalar type, so the
    /// values compare against the column without casts.
    fn distinct_values(&mut self, column: &str, table: &str, described: &[ColumnInfo]) -> Result<Vec<Value>> {
        let statement = self
            .catalog
            .render("distinct_values", &params! { "column" => column, "table" => table })?;
        let result = self.executor.query(&statement)?;
        let declared = described
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(column))
            .map(|c| &c.column_type)
            .filter(|t| !t.is_textual() && !matches!(t, ColumnType::Complex(_)));
        result
            .column_values(0)
            .map(|value| match (value, declared) {
                (Value::Text(text), Some(column_type)) => Value::parse_typed(text.trim(), column_type),
                _ => Ok(value.clone()),
            })
            .collect()
    }

    /// Renders `template` once per item and joins the pieces with `separator`.
    fn render_each<I, F>(&self, template: &str, items: I, separator: &str, params_for: F) -> Result<String>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Params,
    {
        let pieces = items
            .into_iter()
            .map(|item| self.catalog.render(template, &params_for(item)))
            .collect::<Result<Vec<_>>>()?;
        Ok(pieces.join(separator))
    }
}

/// Lower-cased, trimmed column names; empty names are rejected.
fn normalize_columns(columns: &[&str]) -> Result<Vec<String>> {
    columns
        .iter()
        .map(|c| {
            let c = c.trim().to_lowercase();
            if c.is_empty() {
                Err(HelperError::InvalidArgument("empty column name".into()))
            } else {
                Ok(c)
            }
        })
        .collect()
}
