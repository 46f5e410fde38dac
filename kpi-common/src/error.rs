//! Common error types for the KPI service

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Common result type for KPI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the evaluation engine and its callers
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Ambiguous or missing source roles, conflicting frequency settings,
    /// unreadable configuration files
    #[error("Configuration error: {0}")]
    Config(String),

    /// Outbound source call failed (timeout, connection, non-success status)
    #[error("Transport error from source {source_id}: {message}")]
    Transport { source_id: String, message: String },

    /// Source answered with a body that is not a single number
    #[error("Source {source_id} did not return a numeric value: {body:?}")]
    InvalidSourceResponse { source_id: String, body: String },

    /// Denominator source resolved to zero
    #[error("Denominator returned 0")]
    DivisionByZero,

    /// Requested period intersects an existing period of the same indicator
    #[error("Period {period_start} - {period_end} overlaps with existing record")]
    OverlapViolation {
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
    },

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A due sweep is already running
    #[error("A due sweep is already in progress")]
    SweepInProgress,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Serializable error category reported by the sweep and execution logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    ConfigurationError,
    TransportError,
    InvalidSourceResponse,
    DivisionByZero,
    OverlapViolation,
    NotFound,
    InvalidInput,
    Internal,
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::ConfigurationError,
            Error::Transport { .. } => ErrorKind::TransportError,
            Error::InvalidSourceResponse { .. } => ErrorKind::InvalidSourceResponse,
            Error::DivisionByZero => ErrorKind::DivisionByZero,
            Error::OverlapViolation { .. } => ErrorKind::OverlapViolation,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::Database(_) | Error::Io(_) | Error::SweepInProgress | Error::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// True for failures of the source resolution step (logged, never retried in-cycle)
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Error::Transport { .. } | Error::InvalidSourceResponse { .. } | Error::DivisionByZero
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(Error::DivisionByZero.kind(), ErrorKind::DivisionByZero);
        assert_eq!(
            Error::Config("no DATA source".into()).kind(),
            ErrorKind::ConfigurationError
        );
        assert_eq!(Error::SweepInProgress.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::InvalidSourceResponse).unwrap();
        assert_eq!(json, "\"INVALID_SOURCE_RESPONSE\"");
    }

    #[test]
    fn test_resolution_failures() {
        assert!(Error::DivisionByZero.is_resolution_failure());
        assert!(Error::Transport {
            source_id: "s".into(),
            message: "timeout".into()
        }
        .is_resolution_failure());
        assert!(!Error::NotFound("x".into()).is_resolution_failure());
    }
}
