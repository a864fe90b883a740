//! Error types for the logging subsystem

use thiserror::Error;

/// Errors that can occur in the logging subsystem
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoggingError {
    /// A global subscriber is already installed, or installing one failed
    #[error("Failed to initialize logging: {0}")]
    InitializationFailed(String),

    /// Invalid configuration provided
    #[error("Invalid logging configuration: {0}")]
    InvalidConfiguration(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_error_display() {
        let err = LoggingError::InvalidConfiguration("level \"loud\"".to_string());
        assert_eq!(err.to_string(), "Invalid logging configuration: level \"loud\"");
    }
}
