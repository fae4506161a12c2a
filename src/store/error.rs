//! Storage error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading or durably committing device configuration.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The state file exists but could not be read.
    #[error("Failed to read state file '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The durable write did not complete.
    #[error("Failed to write state file '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The stored document could not be decoded.
    #[error("Stored configuration is corrupt: {0}")]
    Corrupt(String),

    /// The document could not be encoded.
    #[error("Failed to encode configuration: {0}")]
    Encode(#[from] serde_json::Error),

    /// The backend refused the operation.
    #[error("Storage backend unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}
