//! Error types for the netspace registry
//!
//! Lookups that find nothing and registrations that conflict are ordinary
//! outcomes (`None` / `false`) and never appear here. This type carries the
//! things a caller cannot treat as control flow: malformed input, bad
//! configuration, and a broken store.

use thiserror::Error;

/// Unified error type for the registry
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Input Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Store Errors
    // =========================================================================
    #[error("Corrupt entry in store {store}: {key} - {reason}")]
    CorruptEntry {
        store: String,
        key: String,
        reason: String,
    },

    #[error("Store error: {0}")]
    Store(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Broad category of an error, used by callers to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller supplied something malformed; nothing was mutated
    Validation,
    /// The registry was built from an unusable configuration
    Configuration,
    /// The backing store failed; there is no recovery path
    Fatal,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Configuration(_) => ErrorKind::Configuration,
            Error::CorruptEntry { .. } | Error::Store(_) | Error::Json(_) | Error::Io(_) => {
                ErrorKind::Fatal
            }
        }
    }

    /// Check if this error comes from the store rather than the caller
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }

    pub(crate) fn corrupt(store: &str, key: &str, reason: impl ToString) -> Self {
        Error::CorruptEntry {
            store: store.to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type alias for the registry
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let err = Error::Validation("expected 7 fields".into());
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(!err.is_fatal());

        let err = Error::Configuration("empty store path".into());
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = Error::corrupt("node_geosub", "alpha", "missing field `host`");
        assert_eq!(err.kind(), ErrorKind::Fatal);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_io_is_fatal() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::Other, "disk gone").into();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("disk gone"));
    }
}
