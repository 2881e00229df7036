//! Error types for safescan.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using safescan's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for safescan operations.
#[derive(Error, Debug)]
pub enum Error {
    /// No candidate identifier could be found in a payload
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Suspicious file signature or oversized input (fatal to the job)
    #[error("Integrity check failed: {0}")]
    IntegrityCheckFailed(String),

    /// OCR/label/symbol boundary unreachable or erroring
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Soft or hard deadline exceeded
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Review item claimed by another reviewer, or job leased by another delivery
    #[error("Already claimed by {0}")]
    AlreadyClaimed(String),

    /// State-machine move not permitted from the current state
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Authenticated actor is not allowed to perform the action
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Verification session outlived its TTL
    #[error("Expired: {0}")]
    Expired(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fieldless mirror of [`Error`] carried inside result records.
///
/// Decoder and matcher outcomes are data, not `Err` values; this is what they
/// attach when something went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    MalformedPayload,
    IntegrityCheckFailed,
    ServiceUnavailable,
    Timeout,
    AlreadyClaimed,
    InvalidTransition,
    NotFound,
    InvalidInput,
    Forbidden,
    Expired,
    Serialization,
    Config,
    Request,
    Internal,
    Io,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MalformedPayload(_) => ErrorKind::MalformedPayload,
            Error::IntegrityCheckFailed(_) => ErrorKind::IntegrityCheckFailed,
            Error::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            Error::Timeout(_) => ErrorKind::Timeout,
            Error::AlreadyClaimed(_) => ErrorKind::AlreadyClaimed,
            Error::InvalidTransition(_) => ErrorKind::InvalidTransition,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Forbidden(_) => ErrorKind::Forbidden,
            Error::Expired(_) => ErrorKind::Expired,
            Error::Serialization(_) => ErrorKind::Serialization,
            Error::Config(_) => ErrorKind::Config,
            Error::Request(_) => ErrorKind::Request,
            Error::Internal(_) => ErrorKind::Internal,
            Error::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether queue redelivery may succeed where this attempt failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ServiceUnavailable(_) | Error::Request(_) | Error::Io(_)
        )
    }
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

    #[test]
    fn test_error_display_malformed_payload() {
        let err = Error::MalformedPayload("no product code".to_string());
        assert_eq!(err.to_string(), "Malformed payload: no product code");
    }

    #[test]
    fn test_error_display_integrity() {
        let err = Error::IntegrityCheckFailed("executable detected".to_string());
        assert_eq!(err.to_string(), "Integrity check failed: executable detected");
    }

    #[test]
    fn test_error_display_already_claimed() {
        let err = Error::AlreadyClaimed("reviewer-a".to_string());
        assert_eq!(err.to_string(), "Already claimed by reviewer-a");
    }

    #[test]
    fn test_error_display_invalid_transition() {
        let err = Error::InvalidTransition("completed -> processing".to_string());
        assert_eq!(err.to_string(), "Invalid transition: completed -> processing");
    }

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            Error::Timeout("hard deadline".into()).kind(),
            ErrorKind::Timeout
        );
        assert_eq!(
            Error::ServiceUnavailable("ocr down".into()).kind(),
            ErrorKind::ServiceUnavailable
        );
        assert_eq!(Error::Expired("session".into()).kind(), ErrorKind::Expired);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(Error::ServiceUnavailable("x".into()).is_retryable());
        assert!(Error::Request("x".into()).is_retryable());
        assert!(!Error::IntegrityCheckFailed("x".into()).is_retryable());
        assert!(!Error::Timeout("x".into()).is_retryable());
        assert!(!Error::InvalidTransition("x".into()).is_retryable());
    }

    #[test]
    fn test_error_kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::MalformedPayload).unwrap();
        assert_eq!(json, "\"malformed_payload\"");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => {
                assert!(!msg.is_empty());
            }
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err: Error = io_err.into();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(err.to_string().contains("access denied"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
