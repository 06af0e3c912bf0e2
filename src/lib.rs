//! sqlbridge - a thin relational database access layer
//!
//! This crate wraps a native SQL driver with connection handling, statement
//! execution, lazy result cursors, type coercion between JSON host values
//! and SQL values, and scoped transactions that nest through savepoints.
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use sqlbridge::db::{Connection, DatabaseResult};
//! use sqlbridge::params;
//! use sqlbridge::sql::SqlOptions;
//!
//! let mut conn = Connection::open("sqlite::memory:").unwrap();
//! conn.execute("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)", &[]).unwrap();
//!
//! let result: DatabaseResult<()> = conn.atomic(|conn| {
//!     conn.insert("users", &json!({"name": "alice"}), &SqlOptions::default())?;
//!     conn.execute("UPDATE users SET name = ? WHERE id = ?", &params!["bob", 1])?;
//!     Ok(())
//! });
//! result.unwrap();
//!
//! let users = conn.fetch_records("SELECT * FROM users", &[]).unwrap();
//! assert_eq!(users[0]["name"], json!("bob"));
//! ```

pub mod cursor;
pub mod db;
pub mod driver;
pub mod executor;
pub mod sql;
pub mod transaction;
pub mod types;

pub use cursor::{Cursor, FetchOptions, Record, Row};
pub use db::{Connection, ConnectionConfig, Connector, DatabaseError, DatabaseResult, DbSpec};
pub use types::{Param, SqlValue, TypeRegistry};
