//! Error types for the media library admin layer
//!
//! Provides structured error types for session lifecycle, daemon
//! communication, catalog access and resource operations.

use thiserror::Error;

/// Unified error type for the admin layer
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Session Errors
    // =========================================================================
    #[error("Session initialization failed: {0}")]
    Initialization(String),

    #[error("Session is closed")]
    SessionClosed,

    // =========================================================================
    // Resource Errors
    // =========================================================================
    #[error("Invalid resource identifier: {0}")]
    InvalidResource(String),

    #[error("Operation not supported: {0}")]
    UnsupportedOperation(String),

    #[error("Resource not found: {family}/{name}")]
    NotFound { family: String, name: String },

    // =========================================================================
    // Daemon Errors
    // =========================================================================
    /// The daemon accepted the request but reported a nonzero status.
    /// The code is preserved verbatim; downstream tooling keys off it.
    #[error("Daemon operation failed with status {code}: {context}")]
    OperationFailed { code: i32, context: String },

    /// Channel-level failure (timeout, disconnect), distinct from a
    /// daemon-reported failure. No assumption about partial effects.
    #[error("Daemon communication error: {0}")]
    Communication(String),

    // =========================================================================
    // Catalog Errors
    // =========================================================================
    #[error("Catalog store error: {0}")]
    Store(String),

    #[error("Invalid query pattern: {0}")]
    InvalidPattern(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Parse/IO Errors
    // =========================================================================
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code for the surrounding CLI.
    ///
    /// Convention: 0 is success, 65 (EX_DATAERR) for invalid input the
    /// admin layer rejected itself, 69 (EX_UNAVAILABLE) when the session
    /// could not be established, 74 (EX_IOERR) for channel failures, and
    /// the raw daemon status code for daemon-reported failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::UnsupportedOperation(_)
            | Error::InvalidResource(_)
            | Error::InvalidPattern(_)
            | Error::Configuration(_) => 65,

            Error::Initialization(_) | Error::SessionClosed => 69,

            Error::Communication(_) | Error::Io(_) => 74,

            Error::OperationFailed { code, .. } => *code,

            _ => 1,
        }
    }

    /// Check if this error is transient (a retry by the caller may help).
    /// The admin layer itself never retries.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Communication(_))
    }
}

/// Result type alias for the admin layer
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let err = Error::UnsupportedOperation("posix on tape".into());
        assert_eq!(err.exit_code(), 65);

        let err = Error::OperationFailed {
            code: 17,
            context: "device add".into(),
        };
        assert_eq!(err.exit_code(), 17);

        let err = Error::Communication("timed out".into());
        assert_eq!(err.exit_code(), 74);

        let err = Error::Initialization("daemon unreachable".into());
        assert_eq!(err.exit_code(), 69);
    }

    #[test]
    fn test_transient() {
        assert!(Error::Communication("reset".into()).is_transient());
        assert!(!Error::SessionClosed.is_transient());
        assert!(!Error::OperationFailed {
            code: 17,
            context: "x".into()
        }
        .is_transient());
    }
}
