//! Error types for Gridpilot
//!
//! Centralized error handling using thiserror.
//!
//! Expected outcomes of the revision loop (code errors, missing artifacts,
//! exhausted budgets) are NOT errors; they live in [`crate::domain::outcome`]
//! and are absorbed by the state machine. This enum covers orchestrator
//! faults that abort a conversation or the process.

use thiserror::Error;

/// All error types that can occur in Gridpilot
#[derive(Debug, Error)]
pub enum GridpilotError {
    /// Reasoning oracle unreachable or timed out after its retry budget
    #[error("Oracle unavailable: {0}")]
    OracleUnavailable(String),

    /// Sandbox backend transport failure (connect refused, timeout, bad reply)
    #[error("Sandbox error: {0}")]
    Sandbox(String),

    /// Workbook probe produced unusable output
    #[error("Observation failed: {0}")]
    Observation(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Storage/persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration load or validation error
    #[error("Config error: {0}")]
    Config(String),

    /// Conversation cancelled by external shutdown
    #[error("Cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Gridpilot operations
pub type Result<T> = std::result::Result<T, GridpilotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oracle_unavailable_error() {
        let err = GridpilotError::OracleUnavailable("timed out after 3 attempts".to_string());
        assert_eq!(err.to_string(), "Oracle unavailable: timed out after 3 attempts");
    }

    #[test]
    fn test_sandbox_error() {
        let err = GridpilotError::Sandbox("connection refused".to_string());
        assert_eq!(err.to_string(), "Sandbox error: connection refused");
    }

    #[test]
    fn test_observation_error() {
        let err = GridpilotError::Observation("probe output missing structure markers".to_string());
        assert!(err.to_string().starts_with("Observation failed:"));
    }

    #[test]
    fn test_config_error() {
        let err = GridpilotError::Config("unknown field `modell`".to_string());
        assert_eq!(err.to_string(), "Config error: unknown field `modell`");
    }

    #[test]
    fn test_cancelled_error() {
        assert_eq!(GridpilotError::Cancelled.to_string(), "Cancelled");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GridpilotError = io_err.into();
        assert!(matches!(err, GridpilotError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: GridpilotError = json_err.into();
        assert!(matches!(err, GridpilotError::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(GridpilotError::InvalidState("test".to_string()))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
