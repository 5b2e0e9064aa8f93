//! Error types for client state queries and header assembly

use crate::codec::StateKind;
use thiserror::Error;

/// Boxed error returned by backend implementations
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for query operations
pub type Result<T> = std::result::Result<T, Error>;

/// Query error types
#[derive(Debug, Error)]
pub enum Error {
    /// Proven store read returned an empty value
    #[error("{kind} not found for client {client_id} (key: {key})")]
    NotFound {
        /// Which state family was queried
        kind: StateKind,
        /// Client identifier
        client_id: String,
        /// Store key that was read
        key: String,
    },

    /// Bytes could not be decoded as a known state type
    #[error("Decode error: {0}")]
    Decode(String),

    /// Backend or query service failure
    #[error("Backend call `{call}` failed ({context}): {source}")]
    Backend {
        /// Backend operation that failed
        call: &'static str,
        /// Identifier / height the call was issued for
        context: String,
        /// Underlying failure
        #[source]
        source: BoxError,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Account failed validation
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// Operation is not permitted on this value
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Wrap a backend failure with the call name and its context
    pub fn backend(call: &'static str, context: impl Into<String>, source: BoxError) -> Self {
        Error::Backend {
            call,
            context: context.into(),
            source,
        }
    }

    /// Whether this is a proven-read miss
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Whether this came from the backend
    pub fn is_backend(&self) -> bool {
        matches!(self, Error::Backend { .. })
    }

    /// Whether this is a decoding failure
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Decode(_))
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
