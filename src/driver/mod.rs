//! Driver binding contract.
//!
//! The rest of the crate talks to a database only through these traits. A
//! binding maps them onto a native client library; the crate ships one for
//! SQLite (see [`sqlite`]).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Driver                              │
//! │            (opens sessions from a DbSpec)                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                    ┌──────────────────┐
//!                    │ DriverConnection │  auto-commit, savepoints,
//!                    │                  │  commit / rollback
//!                    └──────────────────┘
//!                              │ prepare
//!                              ▼
//!                    ┌──────────────────┐
//!                    │ DriverStatement  │  bind, batch, execute,
//!                    │                  │  generated keys
//!                    └──────────────────┘
//!                              │ execute_query
//!                              ▼
//!                    ┌──────────────────┐
//!                    │ DriverResultSet  │  forward-only rows
//!                    └──────────────────┘
//! ```
//!
//! Column and parameter indexes are 1-based, as in most native SQL APIs.

mod error;
pub mod sqlite;

#[cfg(test)]
pub(crate) mod mock;

use std::time::Duration;

pub use error::{DriverError, DriverResult};

use crate::db::DbSpec;
use crate::transaction::IsolationLevel;
use crate::types::SqlValue;

/// Metadata for one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Column label as reported by the database.
    pub label: String,
    /// Declared SQL type name, when the database reports one.
    pub type_name: Option<String>,
}

impl ColumnMeta {
    pub fn new(label: impl Into<String>, type_name: Option<&str>) -> Self {
        Self {
            label: label.into(),
            type_name: type_name.map(str::to_string),
        }
    }
}

/// Options passed to the driver when a statement is prepared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareOptions {
    /// Ask the driver to keep generated keys for retrieval after execution.
    pub return_keys: bool,
    /// Upper bound on execution time.
    pub query_timeout: Option<Duration>,
    /// Maximum number of rows any result set of this statement yields.
    pub max_rows: Option<u64>,
    /// Fetch size hint.
    pub fetch_size: Option<u32>,
}

impl PrepareOptions {
    /// Options for a statement whose generated keys will be read.
    pub fn returning_keys() -> Self {
        Self {
            return_keys: true,
            ..Default::default()
        }
    }
}

/// A database driver: opens sessions.
pub trait Driver: Send + Sync {
    /// Vendor name this driver serves (e.g. `"sqlite"`).
    fn vendor(&self) -> &str;

    /// Open a new session.
    fn connect(&self, spec: &DbSpec) -> DriverResult<Box<dyn DriverConnection>>;
}

/// An open database session.
pub trait DriverConnection: Send {
    /// Prepare a statement.
    fn prepare(&mut self, sql: &str, options: &PrepareOptions)
        -> DriverResult<Box<dyn DriverStatement>>;

    /// Enable or disable auto-commit. Disabling it starts a driver transaction.
    fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()>;

    fn auto_commit(&self) -> bool;

    fn set_isolation(&mut self, level: IsolationLevel) -> DriverResult<()>;

    fn isolation(&self) -> IsolationLevel;

    fn set_read_only(&mut self, read_only: bool) -> DriverResult<()>;

    fn is_read_only(&self) -> bool;

    /// Switch the default schema. Most bindings do not support this.
    fn set_schema(&mut self, schema: &str) -> DriverResult<()> {
        Err(DriverError::unsupported(format!("set schema '{}'", schema)))
    }

    /// Create a named savepoint inside the current transaction.
    fn set_savepoint(&mut self, name: &str) -> DriverResult<()>;

    /// Release a savepoint, keeping its changes.
    fn release_savepoint(&mut self, name: &str) -> DriverResult<()>;

    /// Roll back to a savepoint, or the whole transaction when `None`.
    fn rollback(&mut self, savepoint: Option<&str>) -> DriverResult<()>;

    fn commit(&mut self) -> DriverResult<()>;

    /// Close the session. Closing twice is not an error.
    fn close(&mut self) -> DriverResult<()>;

    fn is_closed(&self) -> bool;
}

/// A prepared statement.
pub trait DriverStatement: Send {
    /// Bind a value to a 1-based parameter index.
    fn bind(&mut self, index: usize, value: SqlValue) -> DriverResult<()>;

    /// Add the currently bound parameters to the batch and clear them.
    fn add_batch(&mut self) -> DriverResult<()>;

    /// Execute a query, leaving its result set open.
    fn execute_query(&mut self) -> DriverResult<Box<dyn DriverResultSet>>;

    /// Execute a data-modifying statement, returning the affected row count.
    fn execute_update(&mut self) -> DriverResult<u64>;

    /// Execute every batched parameter group, returning one count per group.
    fn execute_batch(&mut self) -> DriverResult<Vec<u64>>;

    /// Keys generated by the last execution.
    ///
    /// Fails with [`DriverError::Unsupported`] when the driver cannot report
    /// them.
    fn generated_keys(&mut self) -> DriverResult<Box<dyn DriverResultSet>>;

    /// Release the statement. Closing twice is not an error.
    fn close(&mut self) -> DriverResult<()>;
}

/// A forward-only result set.
pub trait DriverResultSet: Send {
    fn columns(&self) -> &[ColumnMeta];

    /// Advance to the next row. Returns `false` once no rows remain.
    fn next(&mut self) -> DriverResult<bool>;

    /// Read a 1-based column of the current row.
    fn get(&mut self, index: usize) -> DriverResult<SqlValue>;

    /// Release the result set. Closing twice is not an error.
    fn close(&mut self) -> DriverResult<()>;
}
