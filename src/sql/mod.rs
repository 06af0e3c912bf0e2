//! SQL text building.
//!
//! No parsing happens here: statements are assembled from table names and
//! JSON objects, with `?` placeholders and parameters kept side by side in a
//! [`SqlVec`].

mod builder;
mod error;
mod naming;

pub use builder::{delete, insert, select_by_keys, update, SqlVec};
pub use error::{BuildError, BuildResult};
pub use naming::{identity, kebab_case, lower_case, snake_case, NamingFn, Quoting, SqlOptions};
