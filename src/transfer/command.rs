//! Running external commands locally or on an edge node over ssh.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::core::{RemoteConfig, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Remote commands also fail on any stderr output, since ssh does not
    /// always forward the remote exit status faithfully.
    #[must_use]
    pub fn succeeded(&self, remote: bool) -> bool {
        self.code == 0 && (!remote || self.stderr.trim().is_empty())
    }
}

pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[String], input: Option<&str>) -> Result<CommandOutput>;
    fn is_remote(&self) -> bool;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LocalRunner;

impl CommandRunner for LocalRunner {
    fn run(&self, program: &str, args: &[String], input: Option<&str>) -> Result<CommandOutput> {
        debug!(program, ?args, "running local command");
        spawn(Command::new(program).args(args), input)
    }

    fn is_remote(&self) -> bool {
        false
    }
}

fn spawn(command: &mut Command, input: Option<&str>) -> Result<CommandOutput> {
    command
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = command.spawn()?;
    if let (Some(text), Some(mut stdin)) = (input, child.stdin.take()) {
        stdin.write_all(text.as_bytes())?;
    }
    let output = child.wait_with_output()?;
    Ok(CommandOutput {
        // killed by a signal
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    })
}

/// Where and how to reach the edge node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshTarget {
    pub host: String,
    pub user: Option<String>,
    pub port: u16,
    pub identity_file: Option<PathBuf>,
    /// Multiplexing socket of an open master connection, when there is one.
    pub control_path: Option<PathBuf>,
}

impl SshTarget {
    #[must_use]
    pub fn destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{user}@{}", self.host),
            None => self.host.clone(),
        }
    }

    /// Options shared by `ssh` and `scp`. `port_flag` differs between them (`-p` / `-P`).
    #[must_use]
    pub fn options(&self, port_flag: &str) -> Vec<String> {
        let mut args = vec![
            port_flag.to_string(),
            self.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ServerAliveInterval=30".to_string(),
        ];
        if let Some(key) = &self.identity_file {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        if let Some(socket) = &self.control_path {
            args.push("-o".to_string());
            args.push(format!("ControlPath={}", socket.display()));
        }
        args
    }
}

impl From<&RemoteConfig> for SshTarget {
    fn from(remote: &RemoteConfig) -> Self {
        Self {
            host: remote.host.clone(),
            user: remote.user.clone(),
            port: remote.port,
            identity_file: remote.identity_file.clone(),
            control_path: None,
        }
    }
}

/// Runs commands on the edge node through `ssh`.
#[derive(Debug, Clone)]
pub struct SshRunner {
    target: SshTarget,
}

impl SshRunner {
    #[must_use]
    pub const fn new(target: SshTarget) -> Self {
        Self { target }
    }
}

impl CommandRunner for SshRunner {
    fn run(&self, program: &str, args: &[String], input: Option<&str>) -> Result<CommandOutput> {
        let remote_command = std::iter::once(program.to_string())
            .chain(args.iter().map(|a| shell_quote(a)))
            .collect::<Vec<_>>()
            .join(" ");
        debug!(host = %self.target.host, command = %remote_command, "running remote command");

        let mut command = Command::new("ssh");
        command
            .args(self.target.options("-p"))
            .arg(self.target.destination())
            .arg(remote_command);
        spawn(&mut command, input)
    }

    fn is_remote(&self) -> bool {
        true
    }
}

/// Quotes one argument for a POSIX shell.
#[must_use]
pub fn shell_quote(arg: &str) -> String {
    let safe = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@,+%".contains(c));
    if safe {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("/user/hive/t"), "/user/hive/t");
        assert_eq!(shell_quote("my file"), "'my file'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote(""), "''");
    }

    #[test]
    fn test_remote_success_requires_clean_stderr() {
        let out = CommandOutput { code: 0, stdout: String::new(), stderr: "WARN".into() };
        assert!(out.succeeded(false));
        assert!(!out.succeeded(true));
    }

    #[test]
    fn test_ssh_options() {
        let target = SshTarget {
            host: "edge01".into(),
            user: Some("etl".into()),
            port: 2222,
            identity_file: Some(PathBuf::from("/home/etl/.ssh/id_rsa")),
            control_path: None,
        };
        assert_eq!(target.destination(), "etl@edge01");
        let opts = target.options("-P");
        assert_eq!(&opts[..2], ["-P", "2222"]);
        assert!(opts.contains(&"/home/etl/.ssh/id_rsa".to_string()));
    }

    #[test]
    fn test_local_runner_captures_output() {
        let out = LocalRunner.run("sh", &["-c".into(), "echo hi; echo oops >&2; exit 3".into()], None).unwrap();
        assert_eq!(out.code, 3);
        assert_eq!(out.stdout.trim(), "hi");
        assert_eq!(out.stderr.trim(), "oops");
    }

    #[test]
    fn test_local_runner_feeds_stdin() {
        let out = LocalRunner.run("cat", &[], Some("secret\n")).unwrap();
        assert_eq!(out.stdout, "secret\n");
    }
}
