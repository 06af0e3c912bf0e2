//! Type coercion between host values and SQL values.
//!
//! Host values are `serde_json::Value`. Driver values are [`SqlValue`].
//! Conversions go through a [`TypeRegistry`] carried by each connection's
//! configuration, so every connection can extend or override the mapping.

mod error;
mod registry;
mod value;

pub use error::{CoercionError, CoercionResult};
pub use registry::{
    default_read, default_write, normalize_type_name, parse_timestamp, Coercion, ReadFn,
    TypeRegistry, WriteFn,
};
pub use value::{Param, SqlValue};
