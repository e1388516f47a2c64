use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Everything that can go wrong while waiting on a future.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FutureError {
    #[error("timed out after {0:?} waiting for the result")]
    TimedOut(Duration),

    #[error("worker went away without delivering a result")]
    Disconnected,

    #[error("reader dropped the future before the result was delivered")]
    Abandoned,

    #[error("computation was cancelled")]
    Cancelled,

    #[error("computation ran past its deadline")]
    DeadlineExceeded,

    #[error("result was already taken")]
    Consumed,
}

impl FutureError {
    /// Timeouts abandon the wait only; the worker is still running.
    pub fn is_timeout(&self) -> bool {
        matches!(self, FutureError::TimedOut(_))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for field '{field}': {reason}")]
    Invalid { field: String, reason: String },
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
