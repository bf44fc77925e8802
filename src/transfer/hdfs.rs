use std::path::Path;

use tracing::{debug, info};

use super::command::{CommandOutput, CommandRunner, LocalRunner, SshRunner, SshTarget};
use crate::core::{HelperError, RemoteConfig, Result};
use crate::parser::listing::{parse_listing, Listing};

/// Operations the helper needs from the distributed filesystem.
///
/// Paths on the "local" side are local to wherever the client runs its
/// commands: this machine, or the edge node when the client works over ssh.
pub trait DistributedFileClient {
    fn put(&self, local: &Path, remote: &str) -> Result<()>;
    fn get(&self, remote: &str, local: &Path) -> Result<()>;
    fn remove(&self, path: &str, recursive: bool, skip_trash: bool) -> Result<()>;
    fn make_directory(&self, path: &str) -> Result<()>;
    fn list_directory(&self, path: &str) -> Result<Listing>;
    /// Runs an arbitrary command on the filesystem host.
    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput>;
}

/// `hdfs dfs` driven through a [`CommandRunner`].
pub struct HdfsClient {
    runner: Box<dyn CommandRunner>,
}

impl HdfsClient {
    #[must_use]
    pub fn new(runner: Box<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    #[must_use]
    pub fn local() -> Self {
        info!("using local HDFS client");
        Self::new(Box::new(LocalRunner))
    }

    #[must_use]
    pub fn remote(remote: &RemoteConfig) -> Self {
        info!(host = %remote.host, "using remote HDFS client");
        Self::new(Box::new(SshRunner::new(SshTarget::from(remote))))
    }

    /// Obtains a Kerberos ticket; the password goes through stdin, never the command line.
    pub fn kinit(&self, user: &str, password: &str) -> Result<()> {
        // the realm keeps its case
        let principal = match user.split_once('@') {
            Some((name, realm)) => format!("{}@{realm}", name.to_lowercase()),
            None => user.to_lowercase(),
        };
        let output = self
            .runner
            .run("kinit", &[principal], Some(&format!("{password}\n")))?;
        // kinit prints its password prompt on stderr, so only the exit code counts here
        if output.code != 0 {
            return Err(HelperError::transfer("kinit", output.stderr.trim()));
        }
        info!(user, "kerberos ticket obtained");
        Ok(())
    }

    /// Requests a ticket when `remote` carries a Kerberos password. Returns
    /// whether `kinit` ran.
    pub fn login(&self, remote: &RemoteConfig) -> Result<bool> {
        let Some(password) = remote.kerberos_password.as_deref() else {
            return Ok(false);
        };
        let principal = remote
            .kerberos_principal
            .as_deref()
            .or(remote.user.as_deref())
            .ok_or_else(|| HelperError::Config("kerberos login needs kerberos_principal or user".into()))?;
        self.kinit(principal, password)?;
        Ok(true)
    }

    fn dfs(&self, operation: &str, args: Vec<String>) -> Result<String> {
        let mut full = vec!["dfs".to_string()];
        full.extend(args);
        let output = self.runner.run("hdfs", &full, None)?;
        if !output.succeeded(self.runner.is_remote()) {
            return Err(HelperError::transfer(
                format!("hdfs {operation}"),
                format!("exit code {}: {}", output.code, output.stderr.trim()),
            ));
        }
        debug!(operation, "hdfs command succeeded");
        Ok(output.stdout)
    }
}

impl DistributedFileClient for HdfsClient {
    fn put(&self, local: &Path, remote: &str) -> Result<()> {
        self.dfs("put", vec!["-put".into(), local.display().to_string(), remote.into()])
            .map(|_| ())
    }

    fn get(&self, remote: &str, local: &Path) -> Result<()> {
        self.dfs("get", vec!["-get".into(), remote.into(), local.display().to_string()])
            .map(|_| ())
    }

    fn remove(&self, path: &str, recursive: bool, skip_trash: bool) -> Result<()> {
        let mut args = vec!["-rm".to_string()];
        if recursive {
            args.push("-r".to_string());
        }
        if skip_trash {
            args.push("-skipTrash".to_string());
        }
        args.push(path.to_string());
        self.dfs("rm", args).map(|_| ())
    }

    fn make_directory(&self, path: &str) -> Result<()> {
        self.dfs("mkdir", vec!["-mkdir".into(), path.into()]).map(|_| ())
    }

    fn list_directory(&self, path: &str) -> Result<Listing> {
        let out = self.dfs("ls", vec!["-ls".into(), path.into()])?;
        Ok(parse_listing(&out))
    }

    fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
        self.runner.run(program, args, None)
    }
}
