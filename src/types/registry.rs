//! Type coercion registry.
//!
//! Maps SQL type names to a pair of conversion functions: one reading a
//! column value into a host value, one turning a host value into a bindable
//! SQL value. New types are added with [`TypeRegistry::register`] when the
//! connection configuration is assembled; nothing here needs to change.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Number, Value};
use tracing::trace;

use super::error::{CoercionError, CoercionResult};
use super::value::{Param, SqlValue};
use crate::driver::{ColumnMeta, DriverStatement};

/// Converts a column value into a host value.
pub type ReadFn = Arc<dyn Fn(SqlValue, &ColumnMeta) -> CoercionResult<Value> + Send + Sync>;

/// Converts a host value into a bindable SQL value.
pub type WriteFn = Arc<dyn Fn(&Value) -> CoercionResult<SqlValue> + Send + Sync>;

/// A bidirectional conversion for one SQL type.
#[derive(Clone)]
pub struct Coercion {
    read: ReadFn,
    write: WriteFn,
}

impl Coercion {
    pub fn new<R, W>(read: R, write: W) -> Self
    where
        R: Fn(SqlValue, &ColumnMeta) -> CoercionResult<Value> + Send + Sync + 'static,
        W: Fn(&Value) -> CoercionResult<SqlValue> + Send + Sync + 'static,
    {
        Self {
            read: Arc::new(read),
            write: Arc::new(write),
        }
    }

    pub fn read(&self, value: SqlValue, meta: &ColumnMeta) -> CoercionResult<Value> {
        (self.read)(value, meta)
    }

    pub fn write(&self, value: &Value) -> CoercionResult<SqlValue> {
        (self.write)(value)
    }
}

impl fmt::Debug for Coercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coercion").finish_non_exhaustive()
    }
}

/// Registry of coercions keyed by normalized SQL type name.
#[derive(Clone)]
pub struct TypeRegistry {
    coercions: HashMap<String, Coercion>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// A registry with the built-in boolean, JSON and timestamp coercions.
    pub fn new() -> Self {
        let mut registry = Self::empty();

        let boolean = Coercion::new(read_bool, write_bool);
        registry.register("BOOLEAN", boolean.clone());
        registry.register("BOOL", boolean);

        let json = Coercion::new(read_json, write_json);
        registry.register("JSON", json.clone());
        registry.register("JSONB", json);

        let timestamp = Coercion::new(read_timestamp, write_timestamp);
        registry.register("TIMESTAMP", timestamp.clone());
        registry.register("DATETIME", timestamp);

        registry
    }

    /// A registry with no type-specific coercions.
    pub fn empty() -> Self {
        Self {
            coercions: HashMap::new(),
        }
    }

    /// Register a coercion, returning the one it replaces.
    pub fn register(&mut self, type_name: &str, coercion: Coercion) -> Option<Coercion> {
        self.coercions.insert(normalize_type_name(type_name), coercion)
    }

    /// Builder form of [`register`](Self::register).
    pub fn with(mut self, type_name: &str, coercion: Coercion) -> Self {
        self.register(type_name, coercion);
        self
    }

    pub fn lookup(&self, type_name: &str) -> Option<&Coercion> {
        self.coercions.get(&normalize_type_name(type_name))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.lookup(type_name).is_some()
    }

    /// Convert a parameter into a bindable SQL value.
    pub fn to_sql_value(&self, param: &Param) -> CoercionResult<SqlValue> {
        match param.sql_type().and_then(|name| self.lookup(name)) {
            Some(coercion) => coercion.write(param.value()),
            None => {
                if let Some(name) = param.sql_type() {
                    trace!(sql_type = name, "no coercion registered, using default mapping");
                }
                default_write(param.value())
            }
        }
    }

    /// Convert a parameter and bind it at a 1-based index.
    pub fn bind_parameter(
        &self,
        statement: &mut dyn DriverStatement,
        index: usize,
        param: &Param,
    ) -> CoercionResult<()> {
        let value = self.to_sql_value(param)?;
        statement.bind(index, value)?;
        Ok(())
    }

    /// Convert the value of a 1-based result column into a host value.
    pub fn from_sql_column(
        &self,
        value: SqlValue,
        meta: &ColumnMeta,
        index: usize,
    ) -> CoercionResult<Value> {
        let result = match meta.type_name.as_deref().and_then(|name| self.lookup(name)) {
            Some(coercion) => coercion.read(value, meta),
            None => default_read(value),
        };
        result.map_err(|e| CoercionError::Column {
            index,
            label: meta.label.clone(),
            source: Box::new(e),
        })
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.coercions.keys().collect();
        types.sort();
        f.debug_struct("TypeRegistry").field("types", &types).finish()
    }
}

/// Normalize a declared type name: upper-case, length/precision suffix removed.
///
/// `varchar(255)` becomes `VARCHAR`, `numeric (10, 2)` becomes `NUMERIC`.
pub fn normalize_type_name(name: &str) -> String {
    let base = match name.find('(') {
        Some(pos) => &name[..pos],
        None => name,
    };
    base.trim().to_uppercase()
}

// ==================== Default mapping ====================

/// Host value to SQL value when no coercion applies.
pub fn default_write(value: &Value) -> CoercionResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Bool(*b)),
        Value::Number(n) => number_to_sql(n),
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => Ok(SqlValue::Text(value.to_string())),
    }
}

/// SQL value to host value when no coercion applies.
pub fn default_read(value: SqlValue) -> CoercionResult<Value> {
    match value {
        SqlValue::Null => Ok(Value::Null),
        SqlValue::Bool(b) => Ok(Value::Bool(b)),
        SqlValue::Integer(i) => Ok(Value::from(i)),
        SqlValue::Real(r) => Number::from_f64(r)
            .map(Value::Number)
            .ok_or_else(|| CoercionError::invalid("REAL", format!("{} is not finite", r))),
        SqlValue::Text(s) => Ok(Value::String(s)),
        SqlValue::Blob(bytes) => Ok(Value::Array(bytes.into_iter().map(Value::from).collect())),
        SqlValue::Timestamp(ts) => Ok(Value::String(format_timestamp(&ts))),
    }
}

fn number_to_sql(n: &Number) -> CoercionResult<SqlValue> {
    if let Some(i) = n.as_i64() {
        Ok(SqlValue::Integer(i))
    } else if n.is_u64() {
        Err(CoercionError::invalid(
            "INTEGER",
            format!("{} does not fit in a signed 64-bit integer", n),
        ))
    } else {
        n.as_f64()
            .map(SqlValue::Real)
            .ok_or_else(|| CoercionError::invalid("REAL", n.to_string()))
    }
}

// ==================== Built-in coercions ====================

fn read_bool(value: SqlValue, _meta: &ColumnMeta) -> CoercionResult<Value> {
    match value {
        SqlValue::Null => Ok(Value::Null),
        SqlValue::Bool(b) => Ok(Value::Bool(b)),
        SqlValue::Integer(i) => Ok(Value::Bool(i != 0)),
        SqlValue::Text(s) => parse_bool(&s).map(Value::Bool),
        other => Err(CoercionError::unsupported(other.kind(), "BOOLEAN")),
    }
}

fn write_bool(value: &Value) -> CoercionResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::Bool(b) => Ok(SqlValue::Bool(*b)),
        Value::Number(n) => Ok(SqlValue::Bool(n.as_f64().is_some_and(|f| f != 0.0))),
        Value::String(s) => parse_bool(s).map(SqlValue::Bool),
        other => Err(CoercionError::unsupported(json_kind(other), "BOOLEAN")),
    }
}

fn parse_bool(s: &str) -> CoercionResult<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "0" => Ok(false),
        _ => Err(CoercionError::invalid("BOOLEAN", format!("'{}'", s))),
    }
}

fn read_json(value: SqlValue, _meta: &ColumnMeta) -> CoercionResult<Value> {
    match value {
        SqlValue::Text(s) => Ok(serde_json::from_str(&s)?),
        SqlValue::Blob(bytes) => Ok(serde_json::from_slice(&bytes)?),
        other => default_read(other),
    }
}

fn write_json(value: &Value) -> CoercionResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        other => Ok(SqlValue::Text(other.to_string())),
    }
}

fn read_timestamp(value: SqlValue, _meta: &ColumnMeta) -> CoercionResult<Value> {
    match value {
        SqlValue::Null => Ok(Value::Null),
        SqlValue::Timestamp(ts) => Ok(Value::String(format_timestamp(&ts))),
        SqlValue::Text(s) => parse_timestamp(&s).map(|ts| Value::String(format_timestamp(&ts))),
        SqlValue::Integer(secs) => {
            from_unix_seconds(secs).map(|ts| Value::String(format_timestamp(&ts)))
        }
        other => Err(CoercionError::unsupported(other.kind(), "TIMESTAMP")),
    }
}

fn write_timestamp(value: &Value) -> CoercionResult<SqlValue> {
    match value {
        Value::Null => Ok(SqlValue::Null),
        Value::String(s) => parse_timestamp(s).map(SqlValue::Timestamp),
        Value::Number(n) => match n.as_i64() {
            Some(secs) => from_unix_seconds(secs).map(SqlValue::Timestamp),
            None => Err(CoercionError::invalid("TIMESTAMP", n.to_string())),
        },
        other => Err(CoercionError::unsupported(json_kind(other), "TIMESTAMP")),
    }
}

/// Parse RFC 3339 or the common SQL `YYYY-MM-DD[ HH:MM:SS[.fff]]` forms as UTC.
pub fn parse_timestamp(s: &str) -> CoercionResult<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = date.and_hms_opt(0, 0, 0) {
            return Ok(naive.and_utc());
        }
    }
    Err(CoercionError::invalid("TIMESTAMP", format!("'{}'", s)))
}

fn from_unix_seconds(secs: i64) -> CoercionResult<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| CoercionError::invalid("TIMESTAMP", format!("{} is out of range", secs)))
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
