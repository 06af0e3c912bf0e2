//! SQL-side values and bound parameters.

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

/// A value as exchanged with a driver.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(DateTime<Utc>),
}

impl SqlValue {
    /// Name of the value kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "NULL",
            SqlValue::Bool(_) => "BOOLEAN",
            SqlValue::Integer(_) => "INTEGER",
            SqlValue::Real(_) => "REAL",
            SqlValue::Text(_) => "TEXT",
            SqlValue::Blob(_) => "BLOB",
            SqlValue::Timestamp(_) => "TIMESTAMP",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Real(r) => write!(f, "{}", r),
            SqlValue::Text(s) => write!(f, "'{}'", s),
            SqlValue::Blob(b) => write!(f, "<{} bytes>", b.len()),
            SqlValue::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

/// A host value bound to a statement parameter.
///
/// `sql_type` names a coercion registered in the
/// [`TypeRegistry`](super::TypeRegistry); without one the default mapping for
/// the value's JSON kind is used.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    value: Value,
    sql_type: Option<String>,
}

impl Param {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            sql_type: None,
        }
    }

    /// A parameter converted through the coercion registered for `sql_type`.
    pub fn typed(sql_type: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            sql_type: Some(sql_type.into()),
        }
    }

    pub fn null() -> Self {
        Self::new(Value::Null)
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn sql_type(&self) -> Option<&str> {
        self.sql_type.as_deref()
    }
}

macro_rules! impl_param_from {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for Param {
                fn from(value: $t) -> Self {
                    Param::new(value)
                }
            }
        )*
    };
}

impl_param_from!(Value, bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, String, &str);

impl From<&Value> for Param {
    fn from(value: &Value) -> Self {
        Param::new(value.clone())
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_else(Param::null)
    }
}

/// Build a `Vec<Param>` from heterogeneous values.
///
/// ```
/// use sqlbridge::params;
///
/// let params = params![1, "alice", true];
/// assert_eq!(params.len(), 3);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::types::Param>::new()
    };
    ($($value:expr),+ $(,)?) => {
        ::std::vec![$($crate::types::Param::from($value)),+]
    };
}
