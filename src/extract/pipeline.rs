//! Bulk extraction: materialize a query into a staging table, copy the
//! table's backing files out of the distributed filesystem and read them
//! back as one result.
//!
//! Every run ends by dropping the staging table, whatever happened before.
//! On failure, the files copied so far are deleted from both the landing
//! directory and the work directory before the original error is returned.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::reader::PartReader;
use super::staging::{ExtractStep, StagingTable};
use crate::core::{ColumnInfo, HelperConfig, HelperError, QueryResult, Result};
use crate::executor::QueryExecutor;
use crate::params;
use crate::sql::TemplateCatalog;
use crate::transfer::{DistributedFileClient, SecureTransferClient};

/// Knobs of an extraction, taken from [`HelperConfig`].
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub file_size_gb: u64,
    pub work_dir: PathBuf,
    /// Directory on the edge node files land in before the secure hop.
    pub landing_dir: PathBuf,
    pub decode_byte_literals: bool,
}

impl ExtractOptions {
    #[must_use]
    pub fn from_config(config: &HelperConfig) -> Self {
        Self {
            file_size_gb: config.staging_file_size_gb,
            work_dir: config.work_dir.clone(),
            landing_dir: config
                .remote
                .as_ref()
                .map_or_else(|| PathBuf::from("."), |r| r.landing_dir.clone()),
            decode_byte_literals: config.decode_byte_literals,
        }
    }
}

/// Files a run has produced and not yet cleaned up.
#[derive(Debug, Default)]
struct Produced {
    local: Vec<PathBuf>,
    landing: Vec<String>,
}

pub struct BulkExtraction<'a> {
    executor: &'a mut QueryExecutor,
    catalog: &'a TemplateCatalog,
    files: &'a dyn DistributedFileClient,
    hop: Option<&'a dyn SecureTransferClient>,
    reader: &'a dyn PartReader,
    options: ExtractOptions,
}

impl<'a> BulkExtraction<'a> {
    pub fn new(
        executor: &'a mut QueryExecutor,
        catalog: &'a TemplateCatalog,
        files: &'a dyn DistributedFileClient,
        reader: &'a dyn PartReader,
        options: ExtractOptions,
    ) -> Self {
        Self { executor, catalog, files, hop: None, reader, options }
    }

    /// Routes every file through the edge node and the secure hop.
    #[must_use]
    pub fn with_hop(mut self, hop: &'a dyn SecureTransferClient) -> Self {
        self.hop = Some(hop);
        self
    }

    pub fn run(&mut self, query: &str) -> Result<QueryResult> {
        let started = Instant::now();
        let mut staging = StagingTable::generate();
        info!(table = %staging.name, "bulk extraction staging table");

        let mut produced = Produced::default();
        let outcome = self.materialize(query, &mut staging, &mut produced);
        if outcome.is_err() {
            self.discard(&mut produced);
        }
        self.drop_staging(&staging);

        let mut result = outcome?;
        if self.options.decode_byte_literals && self.reader.encodes_byte_literals() {
            let decoded = result.decode_byte_literals();
            debug!(decoded, step = %ExtractStep::Decode, "decoded byte literals");
        }
        info!(
            table = %staging.name,
            rows = result.len(),
            files = staging.files.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "bulk extraction finished"
        );
        Ok(result)
    }

    fn materialize(
        &mut self,
        query: &str,
        staging: &mut StagingTable,
        produced: &mut Produced,
    ) -> Result<QueryResult> {
        step(ExtractStep::Stage, staging, || {
            let format = self.reader.format();
            let params = if format.honors_file_size() {
                params! { "file_size" => format!("{}g", self.options.file_size_gb) }
            } else {
                params! {}
            };
            let statement = self.catalog.render(format.options_template(), &params)?;
            self.executor.run(&statement)
        })?;

        step(ExtractStep::Populate, staging, || self.populate(query, &staging.name))?;

        step(ExtractStep::Enumerate, staging, || {
            let table = params! { "table" => &staging.name };
            let described = self.executor.query(&self.catalog.render("describe", &table)?)?;
            let columns = ColumnInfo::from_describe(&described)?;
            let listed = self.executor.query(&self.catalog.render("show_files", &table)?)?;
            let files = listed
                .column_values(0)
                .filter_map(|v| v.as_text().map(str::to_string))
                .collect::<Vec<_>>();
            Ok((columns, files))
        })
        .map(|(columns, files)| {
            staging.columns = columns;
            staging.files = files;
        })?;
        debug!(table = %staging.name, files = staging.files.len(), "backing files enumerated");

        let local_files = self.copy_out(staging, produced)?;

        step(ExtractStep::Assemble, staging, || self.assemble(staging, &local_files, produced))
    }

    fn populate(&mut self, query: &str, table: &str) -> Result<()> {
        let create = self.catalog.render(
            "staging_create",
            &params! { "table" => table, "format" => self.reader.format().stored_as(), "query" => query },
        )?;
        let created = self.executor.run(&create);
        let reset = self
            .catalog
            .render(self.reader.format().reset_template(), &params! {})
            .and_then(|statement| self.executor.run(&statement));
        if let Err(e) = reset {
            warn!(error = %e, "failed to reset staging options");
        }
        created
    }

    /// Brings every backing file into the work directory, one at a time.
    fn copy_out(&self, staging: &StagingTable, produced: &mut Produced) -> Result<Vec<PathBuf>> {
        let extension = self.reader.format().extension();
        let mut local_files = Vec::with_capacity(staging.files.len());

        for (index, remote) in staging.files.iter().enumerate() {
            let name = staging.part_name(index, extension);
            let local = self.options.work_dir.join(&name);

            match self.hop {
                None => {
                    produced.local.push(local.clone());
                    step(ExtractStep::Fetch, staging, || self.files.get(remote, &local))?;
                }
                Some(hop) => {
                    let landing = self.options.landing_dir.join(&name).display().to_string();
                    produced.landing.push(landing.clone());
                    step(ExtractStep::Fetch, staging, || self.files.get(remote, Path::new(&landing)))?;

                    produced.local.push(local.clone());
                    step(ExtractStep::Transfer, staging, || {
                        hop.get(&landing, &local)?;
                        hop.remove(&landing)
                    })?;
                    produced.landing.retain(|l| l != &landing);
                }
            }
            debug!(file = %local.display(), index, "backing file copied");
            local_files.push(local);
        }
        Ok(local_files)
    }

    fn assemble(
        &self,
        staging: &StagingTable,
        local_files: &[PathBuf],
        produced: &mut Produced,
    ) -> Result<QueryResult> {
        let mut result = QueryResult::empty(staging.column_names());
        for path in local_files {
            let part = self.reader.read(path, &staging.columns)?;
            result.extend(part)?;
            fs::remove_file(path)?;
            produced.local.retain(|p| p != path);
        }
        Ok(result)
    }

    fn discard(&self, produced: &mut Produced) {
        for path in produced.local.drain(..) {
            if path.exists() {
                if let Err(e) = fs::remove_file(&path) {
                    warn!(file = %path.display(), error = %e, "failed to remove local file");
                }
            }
        }
        for landing in produced.landing.drain(..) {
            let removed = match self.hop {
                Some(hop) => hop.remove(&landing),
                None => fs::remove_file(&landing).map_err(HelperError::from),
            };
            if let Err(e) = removed {
                warn!(file = %landing, error = %e, "failed to remove landing file");
            }
        }
    }

    fn drop_staging(&mut self, staging: &StagingTable) {
        let dropped = self
            .catalog
            .render("drop_table", &params! { "table" => &staging.name })
            .and_then(|statement| self.executor.run(&statement));
        match dropped {
            Ok(()) => debug!(table = %staging.name, step = %ExtractStep::Drop, "staging table dropped"),
            Err(e) => warn!(table = %staging.name, error = %e, "failed to drop staging table"),
        }
    }
}

/// Runs one step, logging which step failed.
fn step<T>(which: ExtractStep, staging: &StagingTable, f: impl FnOnce() -> Result<T>) -> Result<T> {
    f().map_err(|e| {
        error!(table = %staging.name, step = %which, error = %e, "bulk extraction step failed");
        e
    })
}
