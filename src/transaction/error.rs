//! Transaction error types.

use thiserror::Error;

use crate::driver::DriverError;

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Errors that can occur during transaction operations.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// The driver failed a transaction command.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// A nested transaction was requested with savepoints disabled.
    #[error("nested transaction at depth {depth} requires savepoints, which are disabled")]
    UnsupportedNesting {
        /// Depth of the transaction that was already open.
        depth: usize,
    },

    /// Commit was requested with no transaction open.
    #[error("no active transaction")]
    NotActive,
}

impl TransactionError {
    /// Check if this error left the surrounding transaction untouched.
    pub fn is_unsupported_nesting(&self) -> bool {
        matches!(self, TransactionError::UnsupportedNesting { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransactionError::UnsupportedNesting { depth: 1 };
        assert!(err.is_unsupported_nesting());
        assert!(err.to_string().contains("depth 1"));

        let err = TransactionError::from(DriverError::Closed("connection"));
        assert!(!err.is_unsupported_nesting());
        assert_eq!(err.to_string(), "driver error: connection is closed");
    }
}
