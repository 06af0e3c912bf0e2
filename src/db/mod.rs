//! Connections and their configuration.
//!
//! A [`Connector`] turns a [`DbSpec`] into a [`Connection`] using the driver
//! registered for the spec's vendor. Every connection it opens shares one
//! [`ConnectionConfig`].

mod api;
mod config;
mod connection;
mod spec;

pub use api::{Connector, DatabaseError, DatabaseResult};
pub use config::{ConnectionConfig, StatementDefaults};
pub use connection::Connection;
pub use spec::DbSpec;
