//! SQL building errors.

use thiserror::Error;

/// Result type for building operations.
pub type BuildResult<T> = Result<T, BuildError>;

/// SQL building errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl BuildError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        BuildError::InvalidArgument(reason.into())
    }
}
