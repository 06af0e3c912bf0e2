//! Statement execution on a [`Connection`](crate::db::Connection).
//!
//! Every operation here prepares a statement, binds its parameters through
//! the connection's type registry, executes it and closes it again, on
//! success and on failure alike. Queries hand their result set to a
//! [`Cursor`](crate::cursor::Cursor).

mod dml;
mod error;
mod executor;
mod keys;
mod statement;

pub use error::{ExecuteError, ExecuteResult};
pub use keys::{GeneratedKeys, KeyOptions, ParamGroups, ResultSetFn, RowFn};
