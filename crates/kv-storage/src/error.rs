//! Error types for WAL and snapshot operations.

use thiserror::Error;

/// Result type alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {message}")]
    Io { message: String },

    #[error("serialization error: {message}")]
    Serialization { message: String },

    #[error("storage corruption detected: {message}")]
    Corruption { message: String },
}

impl StorageError {
    pub fn io<S: Into<String>>(message: S) -> Self {
        StorageError::Io {
            message: message.into(),
        }
    }

    pub fn serialization<S: Into<String>>(message: S) -> Self {
        StorageError::Serialization {
            message: message.into(),
        }
    }

    pub fn corruption<S: Into<String>>(message: S) -> Self {
        StorageError::Corruption {
            message: message.into(),
        }
    }

    /// Whether retrying the same operation might succeed (transient I/O).
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageError::Io { .. })
    }

    /// Whether this indicates on-disk data is malformed, not a transient fault.
    pub fn is_corruption(&self) -> bool {
        matches!(self, StorageError::Corruption { .. })
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::serialization(err.to_string())
    }
}
