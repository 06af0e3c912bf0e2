//! Coercion error types.

use thiserror::Error;

use crate::driver::DriverError;

/// Result type for coercion operations.
pub type CoercionResult<T> = Result<T, CoercionError>;

/// Errors converting between host values and SQL values.
#[derive(Debug, Error)]
pub enum CoercionError {
    /// No conversion exists between the two kinds of value.
    #[error("cannot convert {from} to {to}")]
    Unsupported { from: String, to: String },

    /// The value has the right kind but cannot be represented.
    #[error("invalid {type_name} value: {reason}")]
    InvalidValue { type_name: String, reason: String },

    /// Reading a result column failed.
    #[error("column {index} ({label}): {source}")]
    Column {
        index: usize,
        label: String,
        #[source]
        source: Box<CoercionError>,
    },

    /// The driver refused a bound value.
    #[error("bind error: {0}")]
    Bind(#[from] DriverError),

    /// JSON text could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoercionError {
    pub fn unsupported(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::Unsupported {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn invalid(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }
}
