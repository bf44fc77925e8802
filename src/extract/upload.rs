//! Loading a local delimited file into a table: the file goes into a fresh
//! filesystem directory, through the edge node when there is a secure hop,
//! and an external text table is declared over that directory.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::core::{HelperConfig, HelperError, Result};
use crate::derive::DerivedTables;
use crate::executor::QueryExecutor;
use crate::params;
use crate::sql::TemplateCatalog;
use crate::transfer::{DistributedFileClient, SecureTransferClient};

pub struct FileUpload<'a> {
    executor: &'a mut QueryExecutor,
    catalog: &'a TemplateCatalog,
    files: &'a dyn DistributedFileClient,
    hop: Option<&'a dyn SecureTransferClient>,
    root: String,
    landing_dir: PathBuf,
}

impl<'a> FileUpload<'a> {
    pub fn new(
        executor: &'a mut QueryExecutor,
        catalog: &'a TemplateCatalog,
        files: &'a dyn DistributedFileClient,
        config: &HelperConfig,
    ) -> Self {
        Self {
            executor,
            catalog,
            files,
            hop: None,
            root: config.upload_root(),
            landing_dir: config
                .remote
                .as_ref()
                .map_or_else(|| PathBuf::from("."), |r| r.landing_dir.clone()),
        }
    }

    #[must_use]
    pub fn with_hop(mut self, hop: &'a dyn SecureTransferClient) -> Self {
        self.hop = Some(hop);
        self
    }

    /// Loads `local` into `table`, replacing both the table and its
    /// directory. Every column is a `STRING` named after the header line.
    /// Returns the directory the table reads from.
    pub fn run(&mut self, local: &Path, table: &str, delimiter: char) -> Result<String> {
        if matches!(delimiter, '\'' | '\\' | '\n' | '\r') {
            return Err(HelperError::InvalidArgument(format!(
                "{delimiter:?} cannot be used as a field delimiter"
            )));
        }
        let columns = read_header(local, delimiter)?;
        let file_name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                HelperError::InvalidArgument(format!("{} is not a file", local.display()))
            })?;
        let location = format!("{}/{}", self.root, table.replace(' ', ""));

        let declared = columns
            .iter()
            .map(|column| self.catalog.render("load_text_column", &params! { "column" => column }))
            .collect::<Result<Vec<_>>>()?;
        let create = params! {
            "table" => table,
            "columns" => declared.join(", "),
            "delimiter" => delimiter,
            "location" => &location,
        };

        let landing = match self.hop {
            Some(hop) => {
                let landing = self.landing_dir.join(&file_name).display().to_string();
                hop.put(local, &landing)?;
                Some(landing)
            }
            None => None,
        };
        let source = landing.as_deref().map_or(local, Path::new);
        let placed = self.place(source, &location, &file_name);
        if let (Some(hop), Some(landing)) = (self.hop, &landing) {
            if let Err(e) = hop.remove(landing) {
                warn!(file = %landing, error = %e, "failed to remove landing file");
            }
        }
        placed?;

        DerivedTables::new(self.executor, self.catalog).derive(table, "load_text", &create)?;
        info!(table, location = %location, columns = columns.len(), "file loaded");
        Ok(location)
    }

    /// Replaces `location` with a directory holding only `source`.
    fn place(&self, source: &Path, location: &str, file_name: &str) -> Result<()> {
        if let Err(e) = self.files.remove(location, true, true) {
            debug!(location, error = %e, "no previous directory to remove");
        }
        self.files.make_directory(location)?;
        let target = format!("{location}/{file_name}");
        self.files.put(source, &target)?;

        let listing = self.files.list_directory(location)?;
        if !listing.files.iter().any(|f| f.ends_with(&target)) {
            return Err(HelperError::transfer(
                "hdfs put",
                format!("{target} is missing after the upload"),
            ));
        }
        debug!(target = %target, "file placed");
        Ok(())
    }
}

/// Column names from the first line: trimmed, unquoted, lower-cased, with
/// spaces turned into underscores.
fn read_header(path: &Path, delimiter: char) -> Result<Vec<String>> {
    let mut line = String::new();
    BufReader::new(File::open(path)?).read_line(&mut line)?;
    let line = line.trim_start_matches('\u{feff}').trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return Err(HelperError::InvalidArgument(format!("{} has no header line", path.display())));
    }

    let mut columns: Vec<String> = Vec::new();
    for raw in line.split(delimiter) {
        let name = raw.trim().trim_matches('"').trim().to_lowercase().replace(' ', "_");
        if name.is_empty() {
            return Err(HelperError::InvalidArgument(format!(
                "{} has an empty column name",
                path.display()
            )));
        }
        if columns.contains(&name) {
            return Err(HelperError::InvalidArgument(format!(
                "column {name} appears twice in the header"
            )));
        }
        columns.push(name);
    }
    Ok(columns)
}
