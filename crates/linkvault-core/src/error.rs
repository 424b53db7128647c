//! Error types for linkvault.

use thiserror::Error;

/// Result type alias using linkvault's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for linkvault operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bundle not found
    #[error("Bundle not found: {0}")]
    BundleNotFound(uuid::Uuid),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Extension invocation failed
    #[error("Extension error: {0}")]
    Extension(String),

    /// Snapshot capture failed
    #[error("Snapshot error: {0}")]
    Snapshot(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("saved search".to_string());
        assert_eq!(err.to_string(), "Not found: saved search");
    }

    #[test]
    fn test_error_display_bundle_not_found() {
        let id = Uuid::nil();
        let err = Error::BundleNotFound(id);
        assert_eq!(err.to_string(), format!("Bundle not found: {}", id));
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("missing loader path".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing loader path");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("not a timestamp".to_string());
        assert_eq!(err.to_string(), "Invalid input: not a timestamp");
    }

    #[test]
    fn test_error_display_request() {
        let err = Error::Request("connection refused".to_string());
        assert_eq!(err.to_string(), "Request error: connection refused");
    }

    #[test]
    fn test_error_display_extension() {
        let err = Error::Extension("exit status 1".to_string());
        assert_eq!(err.to_string(), "Extension error: exit status 1");
    }

    #[test]
    fn test_error_display_snapshot() {
        let err = Error::Snapshot("single-file not installed".to_string());
        assert_eq!(
            err.to_string(),
            "Snapshot error: single-file not installed"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        match err {
            Error::Io(_) => {}
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
