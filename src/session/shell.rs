//! Engine adapter that drives `impala-shell` in batch mode.
//!
//! Every statement is a separate shell invocation, so the connection keeps a
//! preamble of the `USE` and `SET` statements issued so far and replays it in
//! front of each statement.

use std::sync::Arc;

use tracing::debug;

use super::engine::{Cursor, EngineConnection, EngineConnector, VecCursor};
use crate::core::{HelperError, Result, Row, Value};
use crate::transfer::{CommandOutput, CommandRunner, LocalRunner};

const SHELL: &str = "impala-shell";
const FIELD_DELIMITER: char = '\u{1}';
const DEFAULT_PORT: u16 = 21000;
const SHELL_NULL: &str = "NULL";

/// Connection settings parsed from `host=...;port=...;kerberos=true;ssl=false;user=...`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellSettings {
    pub host: String,
    pub port: u16,
    pub kerberos: bool,
    pub ssl: bool,
    pub user: Option<String>,
}

impl ShellSettings {
    pub fn parse(connection_string: &str) -> Result<Self> {
        let mut host = None;
        let mut port = DEFAULT_PORT;
        let mut kerberos = false;
        let mut ssl = false;
        let mut user = None;

        for pair in connection_string.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                HelperError::Config(format!("malformed connection string entry '{pair}'"))
            })?;
            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "host" => host = Some(value.to_string()),
                "port" => {
                    port = value
                        .parse()
                        .map_err(|_| HelperError::Config(format!("invalid port '{value}'")))?;
                }
                "kerberos" => kerberos = parse_flag(value)?,
                "ssl" => ssl = parse_flag(value)?,
                "user" | "uid" => user = Some(value.to_string()),
                other => debug!(key = other, "ignoring connection string entry"),
            }
        }

        let host = host.ok_or_else(|| HelperError::Config("connection string has no host".into()))?;
        Ok(Self { host, port, kerberos, ssl, user })
    }

    fn arguments(&self) -> Vec<String> {
        let mut args = vec![
            "-i".to_string(),
            format!("{}:{}", self.host, self.port),
            "-B".to_string(),
            "--quiet".to_string(),
            "--print_header".to_string(),
            format!("--output_delimiter={FIELD_DELIMITER}"),
        ];
        if self.kerberos {
            args.push("-k".to_string());
        }
        if self.ssl {
            args.push("--ssl".to_string());
        }
        if let Some(user) = &self.user {
            args.push("-u".to_string());
            args.push(user.clone());
        }
        args
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(HelperError::Config(format!("invalid flag value '{value}'"))),
    }
}

/// Maps shell failures onto the helper's error classes.
fn classify(output: &CommandOutput) -> HelperError {
    let message = output.stderr.trim().to_string();
    let lower = message.to_lowercase();
    if ["analysisexception", "parseexception", "syntax error"]
        .iter()
        .any(|marker| lower.contains(marker))
    {
        HelperError::Statement(message)
    } else if ["could not connect", "error connecting", "not connected"]
        .iter()
        .any(|marker| lower.contains(marker))
    {
        HelperError::Connection(message)
    } else {
        HelperError::Transient(message)
    }
}

/// Shell output carries no types: every field stays text, numbers are read
/// leniently where they are needed.
fn infer(field: &str) -> Value {
    if field == SHELL_NULL {
        Value::Null
    } else {
        Value::Text(field.to_string())
    }
}

fn parse_output(stdout: &str) -> VecCursor {
    let mut lines = stdout.lines().filter(|l| !l.is_empty());
    let Some(header) = lines.next() else {
        return VecCursor::empty();
    };
    let columns = header.split(FIELD_DELIMITER).map(str::to_string).collect();
    let rows = lines
        .map(|line| Row::new(line.split(FIELD_DELIMITER).map(infer).collect()))
        .collect();
    VecCursor::new(columns, rows)
}

pub struct ImpalaShellConnector {
    runner: Arc<dyn CommandRunner>,
}

impl ImpalaShellConnector {
    #[must_use]
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    #[must_use]
    pub fn local() -> Self {
        Self::new(Arc::new(LocalRunner))
    }
}

impl EngineConnector for ImpalaShellConnector {
    fn connect(&self, connection_string: &str) -> Result<Box<dyn EngineConnection>> {
        let settings = ShellSettings::parse(connection_string)?;
        let mut connection = ImpalaShellConnection {
            settings,
            runner: Arc::clone(&self.runner),
            preamble: Vec::new(),
        };
        connection
            .run("SELECT 1")
            .map_err(|e| HelperError::Connection(e.to_string()))?;
        Ok(Box::new(connection))
    }
}

pub struct ImpalaShellConnection {
    settings: ShellSettings,
    runner: Arc<dyn CommandRunner>,
    preamble: Vec<String>,
}

impl ImpalaShellConnection {
    fn run(&mut self, statement: &str) -> Result<CommandOutput> {
        let mut script = self.preamble.join(";\n");
        if !script.is_empty() {
            script.push_str(";\n");
        }
        script.push_str(statement);

        let mut args = self.settings.arguments();
        args.push("-q".to_string());
        args.push(script);
        let output = self.runner.run(SHELL, &args, None)?;
        if output.code != 0 {
            return Err(classify(&output));
        }
        Ok(output)
    }

    fn remember(&mut self, statement: &str) {
        let keyword = statement
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();
        match keyword.as_str() {
            "USE" => {
                self.preamble.retain(|s| !s.to_ascii_uppercase().starts_with("USE "));
                self.preamble.insert(0, statement.to_string());
            }
            "SET" => self.preamble.push(statement.to_string()),
            _ => {}
        }
    }
}

impl EngineConnection for ImpalaShellConnection {
    fn execute(&mut self, statement: &str) -> Result<Box<dyn Cursor>> {
        let statement = statement.trim().trim_end_matches(';');
        let output = self.run(statement)?;
        self.remember(statement);
        Ok(Box::new(parse_output(&output.stdout)))
    }

    fn close(&mut self) -> Result<()> {
        self.preamble.clear();
        Ok(())
    }
}
