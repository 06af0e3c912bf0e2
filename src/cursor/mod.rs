//! Lazy, forward-only result cursors.
//!
//! A [`Cursor`] wraps one open driver result set. It yields rows as either
//! records (label to value maps) or value vectors, converting each column
//! through the connection's type registry only when the row is produced.
//!
//! ```text
//!  DriverResultSet ──next/get──▶ Cursor ──TypeRegistry──▶ RowStream ──▶ Row
//! ```

mod row;
mod stream;

pub use row::{FetchOptions, Record, Row};
pub use stream::{Cursor, RowStream};
