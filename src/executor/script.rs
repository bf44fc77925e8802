//! Running `.sql` scripts.
//!
//! A script is read line by line with `--` comments stripped, optionally
//! rendered as a template with the caller's parameters, then split on `;`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use super::QueryExecutor;
use crate::core::{HelperError, Result};
use crate::parser::{Params, StatementTemplate, split_statements, strip_comment};

const SCRIPT_EXTENSION: &str = "sql";

/// Statements of a script file, in file order.
pub fn read_statements(path: &Path, params: Option<&Params>) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)?;
    let mut body = String::with_capacity(text.len());
    for line in text.lines() {
        body.push_str(strip_comment(line));
        body.push('\n');
    }
    if let Some(params) = params {
        body = StatementTemplate::parse(&body)?.render(params)?;
    }
    let statements = split_statements(&body);
    debug!(file = %path.display(), statements = statements.len(), "script loaded");
    Ok(statements)
}

/// Executes every statement of one script; the first failure stops it.
pub fn execute_file(executor: &mut QueryExecutor, path: &Path, params: Option<&Params>) -> Result<()> {
    info!(file = %path.display(), "executing script");
    let started = Instant::now();
    let statements = read_statements(path, params)?;
    for (index, statement) in statements.iter().enumerate() {
        debug!(file = %path.display(), statement = index + 1, "executing script statement");
        executor.run(statement).map_err(|e| {
            tracing::error!(file = %path.display(), statement = index + 1, error = %e, "script failed");
            e
        })?;
    }
    info!(file = %path.display(), elapsed_secs = started.elapsed().as_secs(), "script finished");
    Ok(())
}

/// Executes every `.sql` file under `folder`, recursively.
///
/// Within each directory, subdirectories are visited before files; both are
/// taken in name order.
pub fn execute_folder(executor: &mut QueryExecutor, folder: &Path, params: Option<&Params>) -> Result<()> {
    if !folder.is_dir() {
        return Err(HelperError::Config(format!("not a directory: {}", folder.display())));
    }
    info!(folder = %folder.display(), "executing folder");
    let started = Instant::now();
    for file in collect_scripts(folder)? {
        execute_file(executor, &file, params)?;
    }
    info!(
        folder = %folder.display(),
        elapsed_secs = started.elapsed().as_secs(),
        "folder executed"
    );
    Ok(())
}

/// Script files under `folder` in execution order.
pub fn collect_scripts(folder: &Path) -> Result<Vec<PathBuf>> {
    let mut directories = Vec::new();
    let mut files = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if path.is_dir() {
            directories.push(path);
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case(SCRIPT_EXTENSION))
        {
            files.push(path);
        }
    }
    directories.sort();
    files.sort();

    let mut ordered = Vec::new();
    for directory in directories {
        ordered.extend(collect_scripts(&directory)?);
    }
    ordered.extend(files);
    Ok(ordered)
}
