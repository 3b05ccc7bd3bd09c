//! Error types for the fraud detection engine

use thiserror::Error;

/// Failure at the persistence boundary.
#[derive(Debug, Clone, Error)]
#[error("store error: {0}")]
pub struct StoreError(pub String);

/// Errors surfaced by the engine to its callers.
///
/// "Not found" and validation failures are distinct variants so the outer
/// surface can map them to its own status codes. Absence of a record inside
/// the store layer is `Ok(None)`, never an error; these variants exist for
/// operations whose contract requires the record.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("user not found: {0}")]
    UserNotFound(String),

    #[error("transaction not found: {0}")]
    TransactionNotFound(String),

    #[error("alert not found: {0}")]
    AlertNotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("scoring pipeline failed: {0}")]
    Pipeline(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::UserNotFound("USR-MISSING1".to_string());
        assert_eq!(err.to_string(), "user not found: USR-MISSING1");

        let err = EngineError::Validation("device id is required".to_string());
        assert_eq!(err.to_string(), "invalid request: device id is required");

        let err = EngineError::from(StoreError("connection refused".to_string()));
        assert_eq!(err.to_string(), "store error: connection refused");
    }
}
