//! Statement execution errors.

use thiserror::Error;

use crate::driver::DriverError;
use crate::sql::BuildError;
use crate::transaction::TransactionError;
use crate::types::CoercionError;

/// Result type for statement execution.
pub type ExecuteResult<T> = Result<T, ExecuteError>;

/// Statement execution errors.
#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("coercion error: {0}")]
    Coercion(#[from] CoercionError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<BuildError> for ExecuteError {
    fn from(e: BuildError) -> Self {
        match e {
            BuildError::InvalidArgument(reason) => ExecuteError::InvalidArgument(reason),
        }
    }
}

impl ExecuteError {
    /// Vendor error code, when the database rejected the statement.
    pub fn sql_code(&self) -> Option<i64> {
        match self {
            ExecuteError::Driver(DriverError::Sql { code, .. }) => Some(*code),
            _ => None,
        }
    }
}
