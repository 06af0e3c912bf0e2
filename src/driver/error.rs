//! Driver error types.

use thiserror::Error;

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Errors raised by a driver binding.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The database rejected a statement or command.
    #[error("sql error ({code}): {message}")]
    Sql {
        /// Vendor error code, `-1` when the driver has none.
        code: i64,
        message: String,
    },

    /// The driver does not implement the requested capability.
    #[error("unsupported by driver: {0}")]
    Unsupported(String),

    /// The connection, statement or result set was already closed.
    #[error("{0} is closed")]
    Closed(&'static str),

    /// A parameter index or value could not be bound.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// A column index was out of range for the current row.
    #[error("column index {index} out of range (1..={count})")]
    ColumnOutOfRange { index: usize, count: usize },

    /// The result set is not positioned on a row.
    #[error("result set is not positioned on a row")]
    NoCurrentRow,
}

impl DriverError {
    /// Create an error for a capability the driver lacks.
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported(what.into())
    }

    /// Check if this error signals a missing driver capability.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, DriverError::Unsupported(_))
    }
}

impl From<rusqlite::Error> for DriverError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, message) => DriverError::Sql {
                code: code.extended_code as i64,
                message: message.unwrap_or_else(|| code.to_string()),
            },
            rusqlite::Error::InvalidParameterCount(given, expected) => {
                DriverError::InvalidParameter(format!(
                    "expected {} parameters, {} bound",
                    expected, given
                ))
            }
            other => DriverError::Sql {
                code: -1,
                message: other.to_string(),
            },
        }
    }
}
