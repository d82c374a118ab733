//! Error types for cash

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for cash
#[derive(Error, Debug)]
pub enum CashError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to open command log {path:?}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine is not running")]
    EngineStopped,
}

/// Command stream parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("empty command")]
    EmptyCommand,

    #[error("invalid operation '{0}'")]
    UnknownOperation(String),

    #[error("message is not valid UTF-8")]
    InvalidUtf8,

    #[error("message exceeds {0} bytes")]
    MessageTooLarge(usize),
}

/// Kind of a failed request against the cache store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidRequest,
    KeyNotFound,
    KeyExpired,
    CompressionFailure,
}

impl ErrorKind {
    /// Wire name of this kind
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "invalid request",
            ErrorKind::KeyNotFound => "key does not exist",
            ErrorKind::KeyExpired => "expired key",
            ErrorKind::CompressionFailure => "compression failure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-level failure returned by the cache store.
///
/// These only ever terminate the one command that produced them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("ERROR '{kind}' MESSAGE '{message}'")]
pub struct CacheError {
    kind: ErrorKind,
    message: String,
}

impl CacheError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    pub fn key_not_found(key: &str) -> Self {
        Self::new(ErrorKind::KeyNotFound, format!("key '{key}' does not exist"))
    }

    pub fn key_expired(key: &str) -> Self {
        Self::new(ErrorKind::KeyExpired, format!("key '{key}' has expired"))
    }

    pub fn compression_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CompressionFailure, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub type Result<T> = std::result::Result<T, CashError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_error_display() {
        let err = CacheError::key_not_found("foo");
        assert_eq!(
            err.to_string(),
            "ERROR 'key does not exist' MESSAGE 'key 'foo' does not exist'"
        );
        assert_eq!(err.kind(), ErrorKind::KeyNotFound);

        let err = CacheError::invalid_request("missing parameter 'key'");
        assert_eq!(
            err.to_string(),
            "ERROR 'invalid request' MESSAGE 'missing parameter 'key''"
        );
    }

    #[test]
    fn test_protocol_error_display() {
        assert_eq!(
            ProtocolError::UnknownOperation("PUT".to_string()).to_string(),
            "invalid operation 'PUT'"
        );
        assert_eq!(
            ProtocolError::MessageTooLarge(1024).to_string(),
            "message exceeds 1024 bytes"
        );
    }
}
