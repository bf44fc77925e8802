//! The helper facade: one object holding the configuration, the template
//! catalog, the executor and the file transports, with every operation of
//! the crate as a method.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::core::timing::timed;
use crate::core::{
    Clock, ColumnInfo, HelperConfig, HelperError, QueryResult, Result, SystemClock, TableDescription, Value,
};
use crate::derive::{DerivedColumn, DerivedTables, MaskSalts, StabilityReport, VariableSelection};
use crate::executor::{self, QueryExecutor};
use crate::extract::{BulkExtraction, ExtractOptions, FileUpload, PartReader, TextPartReader};
use crate::params;
use crate::parser::{Params, SizeUnit, StatementTemplate, parse_size};
use crate::session::{ConnectionManager, EngineConnector};
use crate::sql::TemplateCatalog;
use crate::transfer::{DistributedFileClient, SecureTransferClient};

pub struct Helper {
    config: HelperConfig,
    catalog: Arc<TemplateCatalog>,
    executor: QueryExecutor,
    files: Option<Box<dyn DistributedFileClient>>,
    hop: Option<Box<dyn SecureTransferClient>>,
    reader: Box<dyn PartReader>,
}

impl Helper {
    pub fn new(config: HelperConfig, connector: Box<dyn EngineConnector>) -> Result<Self> {
        Self::with_clock(config, connector, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: HelperConfig,
        connector: Box<dyn EngineConnector>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Self::with_parts(config, connector, TemplateCatalog::builtin()?, clock)
    }

    /// Full constructor; `catalog` replaces the built-in statement templates.
    pub fn with_parts(
        config: HelperConfig,
        connector: Box<dyn EngineConnector>,
        catalog: TemplateCatalog,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;
        let catalog = Arc::new(catalog);
        let connections = ConnectionManager::new(connector, &config, Arc::clone(&catalog), Arc::clone(&clock));
        let executor = QueryExecutor::new(connections, &config, clock);
        info!(database = ?config.database, "helper created");
        Ok(Self {
            config,
            catalog,
            executor,
            files: None,
            hop: None,
            reader: Box::new(TextPartReader),
        })
    }

    /// Filesystem client used by bulk extraction.
    #[must_use]
    pub fn with_files(mut self, files: Box<dyn DistributedFileClient>) -> Self {
        self.files = Some(files);
        self
    }

    /// Secure hop between the edge node and this machine.
    #[must_use]
    pub fn with_hop(mut self, hop: Box<dyn SecureTransferClient>) -> Self {
        self.hop = Some(hop);
        self
    }

    #[must_use]
    pub fn with_reader(mut self, reader: Box<dyn PartReader>) -> Self {
        self.reader = reader;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &HelperConfig {
        &self.config
    }

    #[must_use]
    pub fn catalog(&self) -> &TemplateCatalog {
        &self.catalog
    }

    pub fn executor_mut(&mut self) -> &mut QueryExecutor {
        &mut self.executor
    }

    pub fn use_database(&mut self, name: &str) -> Result<()> {
        timed("use_database", || self.executor.connections_mut().set_namespace(name))
    }

    /// Runs a statement for its side effects. With `params`, `{name}`
    /// placeholders are substituted first.
    pub fn execute(&mut self, statement: &str, params: Option<&Params>) -> Result<()> {
        timed("execute", || {
            let statement = prepare(statement, params)?;
            self.executor.run(&statement)
        })
    }

    /// Runs a query and pages the whole result into memory.
    pub fn query(&mut self, statement: &str, params: Option<&Params>) -> Result<QueryResult> {
        timed("query", || {
            let statement = prepare(statement, params)?;
            self.executor.query(&statement)
        })
    }

    /// Runs a query through a staging table and the filesystem instead of
    /// the row-fetch interface.
    pub fn query_bulk(&mut self, statement: &str, params: Option<&Params>) -> Result<QueryResult> {
        timed("query_bulk", || {
            let statement = prepare(statement, params)?;
            let files = self
                .files
                .as_deref()
                .ok_or_else(|| HelperError::Config("bulk extraction needs a filesystem client".into()))?;
            let mut extraction = BulkExtraction::new(
                &mut self.executor,
                &self.catalog,
                files,
                self.reader.as_ref(),
                ExtractOptions::from_config(&self.config),
            );
            if let Some(hop) = self.hop.as_deref() {
                extraction = extraction.with_hop(hop);
            }
            extraction.run(&statement)
        })
    }

    /// Loads a local delimited file with a header line into `table`, every
    /// column as `STRING`. Returns the filesystem directory behind the table.
    pub fn load_file(&mut self, local: &Path, table: &str, delimiter: char) -> Result<String> {
        timed("load_file", || {
            let files = self
                .files
                .as_deref()
                .ok_or_else(|| HelperError::Config("loading a file needs a filesystem client".into()))?;
            let mut upload = FileUpload::new(&mut self.executor, &self.catalog, files, &self.config);
            if let Some(hop) = self.hop.as_deref() {
                upload = upload.with_hop(hop);
            }
            upload.run(local, table, delimiter)
        })
    }

    pub fn execute_file(&mut self, path: &Path, params: Option<&Params>) -> Result<()> {
        timed("execute_file", || executor::execute_file(&mut self.executor, path, params))
    }

    pub fn execute_folder(&mut self, folder: &Path, params: Option<&Params>) -> Result<()> {
        timed("execute_folder", || executor::execute_folder(&mut self.executor, folder, params))
    }

    pub fn describe(&mut self, table: &str) -> Result<Vec<ColumnInfo>> {
        timed("describe", || self.derived().describe(table))
    }

    /// Columns plus table properties (location, owner, formats, parameters).
    pub fn describe_formatted(&mut self, table: &str) -> Result<TableDescription> {
        timed("describe_formatted", || self.derived().describe_formatted(table))
    }

    pub fn count(&mut self, table: &str) -> Result<u64> {
        timed("count", || {
            let statement = self.catalog.render("count", &params! { "table" => table })?;
            let result = self.executor.query(&statement)?;
            result
                .scalar()
                .and_then(Value::as_f64)
                .map(|n| n as u64)
                .ok_or_else(|| HelperError::Parse(format!("count of {table} is not a number")))
        })
    }

    /// Total size of a table's files, in `unit`.
    pub fn table_size(&mut self, table: &str, unit: SizeUnit) -> Result<f64> {
        timed("table_size", || {
            let statement = self.catalog.render("show_files", &params! { "table" => table })?;
            let result = self.executor.query(&statement)?;
            let size_column = result.column_index("size").unwrap_or(1);
            let mut bytes = 0.0;
            for value in result.column_values(size_column) {
                let text = value.to_string();
                bytes += parse_size(&text)?;
            }
            let size = unit.from_bytes(bytes);
            info!(table, size, unit = ?unit, "table size");
            Ok(size)
        })
    }

    pub fn drop_table(&mut self, table: &str) -> Result<()> {
        timed("drop_table", || self.derived().drop_if_exists(table))
    }

    pub fn compute_stats(&mut self, table: &str) -> Result<()> {
        timed("compute_stats", || self.derived().compute_stats(table))
    }

    /// Rebuilds a table as Parquet under the same name.
    pub fn recreate(&mut self, table: &str) -> Result<()> {
        timed("recreate", || self.derived().recreate(table))
    }

    pub fn sample(&mut self, table: &str, fraction: f64) -> Result<String> {
        timed("sample", || self.derived().sample(table, fraction))
    }

    pub fn stratified_sample(&mut self, table: &str, strata: &[&str], fraction: f64) -> Result<String> {
        timed("stratified_sample", || self.derived().stratified_sample(table, strata, fraction))
    }

    pub fn one_hot(&mut self, table: &str, columns: &[&str], drop_sources: bool) -> Result<Vec<DerivedColumn>> {
        timed("one_hot", || self.derived().one_hot(table, columns, drop_sources))
    }

    pub fn pivot(
        &mut self,
        table: &str,
        group: &[&str],
        pivots: &[&str],
        measures: &[&str],
    ) -> Result<Vec<DerivedColumn>> {
        timed("pivot", || self.derived().pivot(table, group, pivots, measures))
    }

    pub fn stability(
        &mut self,
        table: &str,
        group: &[&str],
        selection: &VariableSelection,
    ) -> Result<StabilityReport> {
        timed("stability", || self.derived().stability(table, group, selection))
    }

    /// Masks `variables` into `<table>_mask`; missing salts are generated.
    pub fn mask(
        &mut self,
        table: &str,
        variables: &[&str],
        integer_salt: Option<i64>,
        text_salt: Option<String>,
    ) -> Result<MaskSalts> {
        timed("mask", || {
            self.derived()
                .mask(table, variables, MaskSalts::resolve(integer_salt, text_salt))
        })
    }

    /// Masks `variables` into `<table>_mask` through truth tables whose
    /// replacements never outgrow the original values.
    pub fn mask_keeping_length(
        &mut self,
        table: &str,
        variables: &[&str],
        salts: &MaskSalts,
        reuse_from: Option<&str>,
    ) -> Result<Vec<String>> {
        timed("mask_keeping_length", || {
            self.derived().mask_keeping_length(table, variables, salts, reuse_from)
        })
    }

    /// Closes the engine session and the secure hop.
    pub fn close(&mut self) {
        self.executor.close();
        if let Some(hop) = self.hop.as_mut() {
            if let Err(e) = hop.close() {
                warn!(error = %e, "failed to close secure transfer session");
            }
        }
        info!("helper closed");
    }

    fn derived(&mut self) -> DerivedTables<'_> {
        DerivedTables::new(&mut self.executor, &self.catalog)
    }
}

fn prepare(statement: &str, params: Option<&Params>) -> Result<String> {
    match params {
        Some(params) => StatementTemplate::parse(statement)?.render(params),
        None => Ok(statement.to_string()),
    }
}
