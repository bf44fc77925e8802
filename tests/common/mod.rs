// Shared fakes for the integration tests: a scripted engine, an in-memory
// distributed filesystem, a secure hop between two directories and a clock
// that only moves when told to.
#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use impala_helper::core::Clock;
use impala_helper::parser::Listing;
use impala_helper::session::VecCursor;
use impala_helper::transfer::CommandOutput;
use impala_helper::{
    Cursor, DistributedFileClient, EngineConnection, EngineConnector, HelperError, QueryResult, Result, Row,
    SecureTransferClient, Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Statement,
    Connection,
    Transient,
    /// Statement error about a table that is not there.
    MissingTable,
}

impl Fault {
    fn error(self, statement: &str) -> HelperError {
        match self {
            Self::Statement => HelperError::Statement(format!("AnalysisException: {statement}")),
            Self::Connection => HelperError::Connection("connection reset by peer".into()),
            Self::Transient => HelperError::Transient("query timed out".into()),
            Self::MissingTable => HelperError::Statement("AnalysisException: Table does not exist".into()),
        }
    }
}

#[derive(Default)]
struct EngineState {
    statements: Vec<String>,
    connects: usize,
    closes: usize,
    responses: Vec<(String, QueryResult)>,
    faults: Vec<(String, Fault, usize)>,
}

/// Engine answering statements by prefix. Unknown statements succeed with
/// no rows.
#[derive(Clone, Default)]
pub struct ScriptedEngine {
    state: Arc<Mutex<EngineState>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Box<dyn EngineConnector> {
        Box::new(ScriptedConnector { state: Arc::clone(&self.state) })
    }

    /// Statements starting with `prefix` return `result`.
    pub fn respond(&self, prefix: &str, result: QueryResult) {
        self.state.lock().unwrap().responses.push((prefix.to_string(), result));
    }

    /// The next `times` statements starting with `prefix` fail with `fault`.
    pub fn fail(&self, prefix: &str, fault: Fault, times: usize) {
        self.state.lock().unwrap().faults.push((prefix.to_string(), fault, times));
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }

    pub fn count_starting_with(&self, prefix: &str) -> usize {
        self.statements().iter().filter(|s| s.starts_with(prefix)).count()
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

struct ScriptedConnector {
    state: Arc<Mutex<EngineState>>,
}

impl EngineConnector for ScriptedConnector {
    fn connect(&self, _connection_string: &str) -> Result<Box<dyn EngineConnection>> {
        self.state.lock().unwrap().connects += 1;
        Ok(Box::new(ScriptedConnection { state: Arc::clone(&self.state) }))
    }
}

struct ScriptedConnection {
    state: Arc<Mutex<EngineState>>,
}

impl EngineConnection for ScriptedConnection {
    fn execute(&mut self, statement: &str) -> Result<Box<dyn Cursor>> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(statement.to_string());

        let fault = state
            .faults
            .iter_mut()
            .find(|(prefix, _, remaining)| *remaining > 0 && statement.starts_with(prefix.as_str()));
        if let Some((_, fault, remaining)) = fault {
            *remaining -= 1;
            return Err(fault.error(statement));
        }

        let cursor = state
            .responses
            .iter()
            .find(|(prefix, _)| statement.starts_with(prefix.as_str()))
            .map_or_else(VecCursor::empty, |(_, result)| {
                VecCursor::new(result.columns.clone(), result.rows.clone())
            });
        Ok(Box::new(cursor))
    }

    fn close(&mut self) -> Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

pub fn result(columns: &[&str], rows: Vec<Vec<Value>>) -> QueryResult {
    QueryResult::new(
        columns.iter().map(|c| (*c).to_string()).collect(),
        rows.into_iter().map(Row::new).collect(),
    )
}

/// `DESCRIBE` output for `(name, type)` pairs.
pub fn described(columns: &[(&str, &str)]) -> QueryResult {
    result(
        &["name", "type", "comment"],
        columns
            .iter()
            .map(|(name, kind)| vec![Value::from(*name), Value::from(*kind), Value::from("")])
            .collect(),
    )
}

#[derive(Default)]
struct FilesState {
    files: BTreeMap<String, String>,
    fetched: Vec<String>,
    failing: Vec<String>,
    directories: Vec<String>,
    removed: Vec<String>,
}

/// Distributed filesystem kept in memory; `get` writes the stored content
/// to the local path.
#[derive(Clone, Default)]
pub struct MemoryFiles {
    state: Arc<Mutex<FilesState>>,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, path: &str, content: &str) {
        self.state.lock().unwrap().files.insert(path.to_string(), content.to_string());
    }

    pub fn fail_on(&self, path: &str) {
        self.state.lock().unwrap().failing.push(path.to_string());
    }

    pub fn fetched(&self) -> Vec<String> {
        self.state.lock().unwrap().fetched.clone()
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.state.lock().unwrap().files.get(path).cloned()
    }

    pub fn directories(&self) -> Vec<String> {
        self.state.lock().unwrap().directories.clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.state.lock().unwrap().removed.clone()
    }

    /// `SHOW FILES` output for every stored file.
    pub fn show_files(&self) -> QueryResult {
        let state = self.state.lock().unwrap();
        result(
            &["path", "size", "partition"],
            state
                .files
                .keys()
                .map(|path| vec![Value::from(path.as_str()), Value::from("1.00KB"), Value::from("")])
                .collect(),
        )
    }
}

impl DistributedFileClient for MemoryFiles {
    fn put(&self, local: &Path, remote: &str) -> Result<()> {
        let content = fs::read_to_string(local)?;
        self.insert(remote, &content);
        Ok(())
    }

    fn get(&self, remote: &str, local: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing.iter().any(|f| f == remote) {
            return Err(HelperError::transfer("hdfs get", format!("{remote}: No such file or directory")));
        }
        let content = state
            .files
            .get(remote)
            .cloned()
            .ok_or_else(|| HelperError::transfer("hdfs get", format!("{remote} not found")))?;
        state.fetched.push(remote.to_string());
        fs::write(local, content)?;
        Ok(())
    }

    fn remove(&self, path: &str, recursive: bool, _skip_trash: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.removed.push(path.to_string());
        let below = format!("{path}/");
        state.files.retain(|f, _| f != path && !(recursive && f.starts_with(&below)));
        Ok(())
    }

    fn make_directory(&self, path: &str) -> Result<()> {
        self.state.lock().unwrap().directories.push(path.to_string());
        Ok(())
    }

    fn list_directory(&self, path: &str) -> Result<Listing> {
        let below = format!("{path}/");
        let files = self.state.lock().unwrap().files.keys().filter(|f| f.starts_with(&below)).cloned().collect();
        Ok(Listing { directories: Vec::new(), files })
    }

    fn run(&self, _program: &str, _args: &[String]) -> Result<CommandOutput> {
        Ok(CommandOutput { code: 0, stdout: String::new(), stderr: String::new() })
    }
}

#[derive(Default)]
struct HopState {
    gets: usize,
    removes: usize,
    fail_gets: bool,
    closes: usize,
}

/// Secure hop between two local directories standing in for the edge node
/// and this machine.
#[derive(Clone, Default)]
pub struct DirectoryHop {
    state: Arc<Mutex<HopState>>,
}

impl DirectoryHop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let hop = Self::default();
        hop.state.lock().unwrap().fail_gets = true;
        hop
    }

    pub fn gets(&self) -> usize {
        self.state.lock().unwrap().gets
    }

    pub fn removes(&self) -> usize {
        self.state.lock().unwrap().removes
    }

    pub fn closes(&self) -> usize {
        self.state.lock().unwrap().closes
    }
}

impl SecureTransferClient for DirectoryHop {
    fn put(&self, local: &Path, remote: &str) -> Result<()> {
        fs::copy(local, remote)?;
        Ok(())
    }

    fn get(&self, remote: &str, local: &Path) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.gets += 1;
        if state.fail_gets {
            // leaves a partial copy behind, like an interrupted transfer
            fs::write(local, "partial")?;
            return Err(HelperError::transfer("scp get", "connection closed"));
        }
        fs::copy(remote, local)?;
        Ok(())
    }

    fn remove(&self, remote: &str) -> Result<()> {
        self.state.lock().unwrap().removes += 1;
        if Path::new(remote).exists() {
            fs::remove_file(remote)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.state.lock().unwrap().closes += 1;
        Ok(())
    }
}

/// Clock that advances only through `advance` and `sleep`.
pub struct ManualClock {
    now: Mutex<Instant>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { now: Mutex::new(Instant::now()), sleeps: Mutex::new(Vec::new()) })
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

pub fn entries(dir: &Path) -> usize {
    fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
