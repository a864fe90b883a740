//! Store collaborator error types

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by the storage/network collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend is not reachable or not yet open
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Requested item does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// A replication request could not be dispatched
    #[error("Request failed: {0}")]
    Request(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::Unavailable("db closed".to_string());
        assert_eq!(err.to_string(), "Store unavailable: db closed");

        let err = StoreError::Request("no peers".to_string());
        assert!(err.to_string().contains("no peers"));
    }
}
