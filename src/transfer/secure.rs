//! Secure-transfer hop between the edge node and this machine.
//!
//! `ScpClient` opens one ssh master connection and multiplexes every `scp`
//! and `ssh` call over its control socket; closing the master is the only
//! teardown and happens exactly once.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::command::{CommandRunner, LocalRunner, SshTarget, shell_quote};
use crate::core::{HelperError, RemoteConfig, Result};

/// Files at least this large get a raised rekey limit.
pub const LARGE_FILE_BYTES: u64 = 1 << 30;
/// `RekeyLimit` used for large files (2^40 bytes).
const LARGE_FILE_REKEY_LIMIT: &str = "1T";

pub trait SecureTransferClient {
    fn put(&self, local: &Path, remote: &str) -> Result<()>;
    fn get(&self, remote: &str, local: &Path) -> Result<()>;
    fn remove(&self, remote: &str) -> Result<()>;
    /// Releases the connection. Calling it again is a no-op.
    fn close(&mut self) -> Result<()>;
}

pub struct ScpClient {
    target: SshTarget,
    runner: Box<dyn CommandRunner>,
    open: bool,
}

impl ScpClient {
    /// Opens the ssh master connection to the edge node.
    pub fn connect(remote: &RemoteConfig) -> Result<Self> {
        Self::connect_with(remote, Box::new(LocalRunner))
    }

    pub fn connect_with(remote: &RemoteConfig, runner: Box<dyn CommandRunner>) -> Result<Self> {
        let mut target = SshTarget::from(remote);
        let socket = std::env::temp_dir().join(format!("impala-helper-{}.sock", Uuid::new_v4().simple()));
        target.control_path = Some(socket);

        let mut args = vec![
            "-o".to_string(),
            "ControlMaster=yes".to_string(),
            "-o".to_string(),
            "ControlPersist=yes".to_string(),
            "-fN".to_string(),
        ];
        args.extend(target.options("-p"));
        args.push(target.destination());

        let output = runner.run("ssh", &args, None)?;
        if output.code != 0 {
            return Err(HelperError::transfer(
                "ssh connect",
                format!("{}: {}", target.destination(), output.stderr.trim()),
            ));
        }
        info!(destination = %target.destination(), "secure transfer session opened");
        Ok(Self { target, runner, open: true })
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    #[must_use]
    pub fn control_path(&self) -> Option<&PathBuf> {
        self.target.control_path.as_ref()
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.open {
            Ok(())
        } else {
            Err(HelperError::transfer(operation, "secure transfer session is closed"))
        }
    }

    fn ssh(&self, operation: &str, remote_command: String) -> Result<String> {
        let mut args = self.target.options("-p");
        args.push(self.target.destination());
        args.push(remote_command);
        let output = self.runner.run("ssh", &args, None)?;
        if !output.succeeded(true) {
            return Err(HelperError::transfer(operation, output.stderr.trim()));
        }
        Ok(output.stdout)
    }

    fn remote_size(&self, remote: &str) -> Option<u64> {
        self.ssh("stat", format!("stat -c %s {}", shell_quote(remote)))
            .ok()
            .and_then(|out| out.trim().parse().ok())
    }

    fn scp(&self, operation: &str, from: String, to: String, size: Option<u64>) -> Result<()> {
        let mut args = self.target.options("-P");
        args.push("-q".to_string());
        // unknown size is treated as large
        if size.is_none_or(|bytes| bytes >= LARGE_FILE_BYTES) {
            args.push("-o".to_string());
            args.push(format!("RekeyLimit={LARGE_FILE_REKEY_LIMIT}"));
        }
        args.push(from.clone());
        args.push(to);

        let started = Instant::now();
        let output = self.runner.run("scp", &args, None)?;
        if output.code != 0 {
            return Err(HelperError::transfer(
                operation,
                format!("{from}: {}", output.stderr.trim()),
            ));
        }
        info!(operation, file = %from, elapsed_ms = started.elapsed().as_millis(), "transfer finished");
        Ok(())
    }
}

impl SecureTransferClient for ScpClient {
    fn put(&self, local: &Path, remote: &str) -> Result<()> {
        self.ensure_open("put")?;
        let size = std::fs::metadata(local)?.len();
        self.scp(
            "put",
            local.display().to_string(),
            format!("{}:{remote}", self.target.destination()),
            Some(size),
        )
    }

    fn get(&self, remote: &str, local: &Path) -> Result<()> {
        self.ensure_open("get")?;
        let size = self.remote_size(remote);
        self.scp(
            "get",
            format!("{}:{remote}", self.target.destination()),
            local.display().to_string(),
            size,
        )
    }

    fn remove(&self, remote: &str) -> Result<()> {
        self.ensure_open("remove")?;
        self.ssh("remove", format!("rm -f {}", shell_quote(remote)))?;
        debug!(file = remote, "remote file removed");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        let mut args = vec!["-O".to_string(), "exit".to_string()];
        args.extend(self.target.options("-p"));
        args.push(self.target.destination());
        let output = self.runner.run("ssh", &args, None)?;
        if output.code != 0 {
            return Err(HelperError::transfer("ssh close", output.stderr.trim()));
        }
        info!("secure transfer session closed");
        Ok(())
    }
}

impl Drop for ScpClient {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "failed to close secure transfer session");
        }
    }
}
