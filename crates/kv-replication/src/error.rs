//! Error types for the replication and election manager.

use thiserror::Error;

pub type ReplicationResult<T> = Result<T, ReplicationError>;

#[derive(Error, Debug)]
pub enum ReplicationError {
    #[error("invalid replication configuration: {message}")]
    Configuration { message: String },

    #[error("peer request failed: {message}")]
    Network { message: String },
}

impl ReplicationError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        ReplicationError::Configuration {
            message: message.into(),
        }
    }

    pub fn network<S: Into<String>>(message: S) -> Self {
        ReplicationError::Network {
            message: message.into(),
        }
    }

    /// Network failures during heartbeat/vote/replicate dispatch are always
    /// swallowed by the caller (best-effort fan-out); this flags which
    /// errors are expected to be handled that way.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ReplicationError::Network { .. })
    }
}

impl From<reqwest::Error> for ReplicationError {
    fn from(err: reqwest::Error) -> Self {
        ReplicationError::network(err.to_string())
    }
}
