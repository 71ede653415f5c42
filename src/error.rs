use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures raised by the timer, its store and the run management commands
#[derive(Debug, Error)]
pub enum TimerError {
    #[error("Didn't recognise action: {0}.")]
    UnrecognizedAction(String),

    #[error("Missing required value: {0}.")]
    MissingRequiredValue(String),

    #[error("Invalid operation: {0}.")]
    InvalidOperation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Tag recorded in the error log for each failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ErrorKind {
    UnrecognizedAction,
    MissingRequiredValue,
    InvalidOperation,
    Storage,
    Serialization,
}

impl TimerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TimerError::UnrecognizedAction(_) => ErrorKind::UnrecognizedAction,
            TimerError::MissingRequiredValue(_) => ErrorKind::MissingRequiredValue,
            TimerError::InvalidOperation(_) => ErrorKind::InvalidOperation,
            TimerError::Storage(_) => ErrorKind::Storage,
            TimerError::Serialization(_) => ErrorKind::Serialization,
        }
    }
}

/// One entry of the durable error log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub error_kind: String,
    pub message: String,
    pub stack_trace: String,
}

impl ErrorLogEntry {
    pub fn from_error(err: &TimerError) -> Self {
        Self {
            error_kind: err.kind().to_string(),
            message: err.to_string(),
            stack_trace: std::backtrace::Backtrace::capture().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            TimerError::UnrecognizedAction("jump".into()).to_string(),
            "Didn't recognise action: jump."
        );
        assert_eq!(
            TimerError::InvalidOperation("select run 4".into()).to_string(),
            "Invalid operation: select run 4."
        );
    }

    #[test]
    fn test_kind_display() {
        let err = TimerError::MissingRequiredValue("code".into());
        assert_eq!(err.kind(), ErrorKind::MissingRequiredValue);
        assert_eq!(err.kind().to_string(), "MissingRequiredValue");
    }

    #[test]
    fn test_log_entry_from_error() {
        let err = TimerError::UnrecognizedAction("jump".into());
        let entry = ErrorLogEntry::from_error(&err);
        assert_eq!(entry.error_kind, "UnrecognizedAction");
        assert_eq!(entry.message, "Didn't recognise action: jump.");
    }
}
