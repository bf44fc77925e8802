use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::{HelperError, Result};

/// Largest staging file size the engine writes reliably, in GB.
pub const MAX_STAGING_FILE_SIZE_GB: u64 = 1;

const ENV_PREFIX: &str = "IMPALA_HELPER";
const CONFIG_FILE_NAME: &str = "impala-helper.toml";

/// Helper configuration.
///
/// Field aliases accept the camelCase keys of older configuration files
/// (`connStr`, `fetchSize`, `maxTries`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelperConfig {
    /// Engine connection string; the only required option.
    #[serde(alias = "connStr")]
    pub connection_string: String,
    #[serde(default, alias = "db")]
    pub database: Option<String>,
    #[serde(default = "default_refresh_secs", alias = "refresh")]
    pub refresh_secs: u64,
    #[serde(default = "default_fetch_size", alias = "fetchSize")]
    pub fetch_size: usize,
    #[serde(default = "default_max_retries", alias = "maxTries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_wait_secs", alias = "waitPeriod")]
    pub retry_wait_secs: u64,
    #[serde(default)]
    pub verbose: bool,
    /// Apply the catalog's mandatory `SET` options on every new session.
    #[serde(default, alias = "executeOptions")]
    pub session_options: bool,
    #[serde(default = "default_staging_file_size_gb", alias = "fileSizeBDF")]
    pub staging_file_size_gb: u64,
    /// Characters of each statement shown in logs.
    #[serde(default = "default_info_length", alias = "infoLeng")]
    pub info_length: usize,
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
    #[serde(default = "default_true")]
    pub decode_byte_literals: bool,
    /// Filesystem directory uploaded files go under; `/user/<user>` when unset.
    #[serde(default)]
    pub upload_root: Option<String>,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
}

/// Edge node reached over ssh: runs `hdfs dfs` and hosts the landing directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RemoteConfig {
    pub host: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    #[serde(default, alias = "private_key")]
    pub identity_file: Option<PathBuf>,
    #[serde(default = "default_landing_dir")]
    pub landing_dir: PathBuf,
    /// Principal for `kinit`; the ssh user when unset.
    #[serde(default)]
    pub kerberos_principal: Option<String>,
    /// A ticket is requested before any filesystem command when this is set.
    /// Best supplied through `IMPALA_HELPER_REMOTE__KERBEROS_PASSWORD`.
    #[serde(default, skip_serializing)]
    pub kerberos_password: Option<String>,
}

const fn default_refresh_secs() -> u64 {
    5 * 60
}

const fn default_fetch_size() -> usize {
    10_000
}

const fn default_max_retries() -> u32 {
    5
}

const fn default_retry_wait_secs() -> u64 {
    1
}

const fn default_staging_file_size_gb() -> u64 {
    1
}

const fn default_info_length() -> usize {
    50
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_landing_dir() -> PathBuf {
    PathBuf::from(".")
}

const fn default_ssh_port() -> u16 {
    22
}

const fn default_true() -> bool {
    true
}

impl HelperConfig {
    /// Minimal configuration with every optional value at its default.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            connection_string: connection_string.into(),
            database: None,
            refresh_secs: default_refresh_secs(),
            fetch_size: default_fetch_size(),
            max_retries: default_max_retries(),
            retry_wait_secs: default_retry_wait_secs(),
            verbose: false,
            session_options: false,
            staging_file_size_gb: default_staging_file_size_gb(),
            info_length: default_info_length(),
            work_dir: default_work_dir(),
            decode_byte_literals: true,
            upload_root: None,
            remote: None,
        }
    }

    /// Builds a configuration from a JSON object, the way callers hand over a
    /// dictionary of options.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(HelperError::Config(format!(
                "configuration must be a map of options, got: {value}"
            )));
        }
        let config: Self =
            serde_json::from_value(value).map_err(|e| HelperError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with priority: ENV > explicit file > user/local file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path.to_path_buf()));
        } else {
            let candidates = [
                dirs::config_dir().map(|d| d.join("impala-helper").join(CONFIG_FILE_NAME)),
                Some(PathBuf::from(CONFIG_FILE_NAME)),
            ];
            for candidate in candidates.into_iter().flatten() {
                if candidate.exists() {
                    builder = builder.add_source(File::from(candidate));
                    break;
                }
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connection_string.trim().is_empty() {
            return Err(HelperError::Config("connection_string must not be empty".into()));
        }
        if self.staging_file_size_gb > MAX_STAGING_FILE_SIZE_GB {
            return Err(HelperError::Config(format!(
                "staging_file_size_gb must be at most {MAX_STAGING_FILE_SIZE_GB} (files must stay under 2GB), got {}",
                self.staging_file_size_gb
            )));
        }
        if self.fetch_size == 0 {
            return Err(HelperError::Config("fetch_size must be positive".into()));
        }
        Ok(())
    }

    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    #[must_use]
    pub const fn retry_wait(&self) -> Duration {
        Duration::from_secs(self.retry_wait_secs)
    }

    /// Directory uploads land under: `upload_root`, else the home of the ssh
    /// user or of the local user.
    #[must_use]
    pub fn upload_root(&self) -> String {
        if let Some(root) = &self.upload_root {
            return root.trim_end_matches('/').to_string();
        }
        let user = self
            .remote
            .as_ref()
            .and_then(|r| r.user.clone())
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "impala".to_string());
        format!("/user/{}", user.trim().to_lowercase())
    }
}
