use thiserror::Error;

pub type Result<T> = std::result::Result<T, HelperError>;

#[derive(Error, Debug)]
pub enum HelperError {
    #[error("Configuration error: {0}")]
    Config(String),
    /// Malformed or semantically invalid SQL. Never retried.
    #[error("Statement error: {0}")]
    Statement(String),
    /// The session itself failed (connect, dropped socket). Retried on a fresh session.
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Transient error: {0}")]
    Transient(String),
    #[error("Transfer error during {operation}: {message}")]
    Transfer { operation: String, message: String },
    #[error("Template error: {0}")]
    Template(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HelperError {
    pub fn transfer(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transfer {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether the executor may try the statement again.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Connection(_))
    }

    /// Whether the session should be thrown away before the next attempt.
    #[must_use]
    pub const fn is_session_fault(&self) -> bool {
        matches!(self, Self::Connection(_))
    }

    /// Engine complaints about an object that is not there (drop of a missing table).
    #[must_use]
    pub fn is_missing_object(&self) -> bool {
        match self {
            Self::Statement(msg) | Self::Transient(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("does not exist")
                    || msg.contains("could not resolve table reference")
                    || msg.contains("table not found")
            }
            _ => false,
        }
    }
}

impl From<config::ConfigError> for HelperError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
