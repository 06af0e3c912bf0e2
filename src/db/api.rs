//! Connector - opens connections from database specifications.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::config::ConnectionConfig;
use super::connection::Connection;
use super::spec::DbSpec;
use crate::driver::sqlite::SqliteDriver;
use crate::driver::{Driver, DriverConnection, DriverError, DriverResult};
use crate::executor::ExecuteError;
use crate::sql::BuildError;
use crate::transaction::TransactionError;
use crate::types::CoercionError;

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Database errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("cannot connect to {vendor}: {reason}")]
    Connection { vendor: String, reason: String },

    #[error("no driver registered for vendor '{0}'")]
    UnknownVendor(String),

    #[error("invalid database spec: {0}")]
    InvalidSpec(String),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("execution error: {0}")]
    Execute(#[from] ExecuteError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<CoercionError> for DatabaseError {
    fn from(e: CoercionError) -> Self {
        DatabaseError::Execute(e.into())
    }
}

impl From<BuildError> for DatabaseError {
    fn from(e: BuildError) -> Self {
        DatabaseError::Execute(e.into())
    }
}

/// Opens connections, choosing the driver by vendor.
///
/// The SQLite driver is registered out of the box.
#[derive(Clone)]
pub struct Connector {
    drivers: HashMap<String, Arc<dyn Driver>>,
    config: Arc<ConnectionConfig>,
}

impl Default for Connector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector {
    /// Create a connector with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ConnectionConfig::default())
    }

    /// Create a connector whose connections share `config`.
    pub fn with_config(config: ConnectionConfig) -> Self {
        let mut connector = Self {
            drivers: HashMap::new(),
            config: Arc::new(config),
        };
        connector.register(Arc::new(SqliteDriver));
        connector
    }

    /// Register a driver under its vendor name, replacing any previous one.
    pub fn register(&mut self, driver: Arc<dyn Driver>) -> &mut Self {
        self.drivers.insert(driver.vendor().to_ascii_lowercase(), driver);
        self
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_driver(mut self, driver: Arc<dyn Driver>) -> Self {
        self.register(driver);
        self
    }

    pub fn config(&self) -> &Arc<ConnectionConfig> {
        &self.config
    }

    /// Vendors with a registered driver, sorted.
    pub fn vendors(&self) -> Vec<&str> {
        let mut vendors: Vec<&str> = self.drivers.keys().map(String::as_str).collect();
        vendors.sort_unstable();
        vendors
    }

    /// Open a connection.
    ///
    /// Session options of the spec (read-only, isolation, schema) are
    /// applied before the connection is handed out; if one fails, the
    /// session is closed and the connection fails.
    pub fn connect(&self, spec: &DbSpec) -> DatabaseResult<Connection> {
        let vendor = spec.vendor.to_ascii_lowercase();
        let driver = self
            .drivers
            .get(&vendor)
            .ok_or_else(|| DatabaseError::UnknownVendor(spec.vendor.clone()))?;

        let connection_error = |err: DriverError| DatabaseError::Connection {
            vendor: vendor.clone(),
            reason: err.to_string(),
        };

        let mut session = driver.connect(spec).map_err(connection_error)?;
        if let Err(err) = apply_session_options(session.as_mut(), spec) {
            if let Err(close_err) = session.close() {
                warn!(vendor = %vendor, error = %close_err, "failed to close rejected session");
            }
            return Err(connection_error(err));
        }

        debug!(vendor = %vendor, name = %spec.name, "connected");
        Ok(Connection::from_driver(session, self.config.clone()))
    }

    /// Parse `url` as a [`DbSpec`] and open a connection.
    pub fn connect_url(&self, url: &str) -> DatabaseResult<Connection> {
        self.connect(&DbSpec::parse(url)?)
    }
}

fn apply_session_options(session: &mut dyn DriverConnection, spec: &DbSpec) -> DriverResult<()> {
    if spec.read_only {
        session.set_read_only(true)?;
    }
    if let Some(level) = spec.isolation {
        session.set_isolation(level)?;
    }
    if let Some(schema) = &spec.schema {
        session.set_schema(schema)?;
    }
    Ok(())
}

impl fmt::Debug for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("vendors", &self.vendors())
            .field("config", &self.config)
            .finish()
    }
}

impl Connection {
    /// Open a connection with a default [`Connector`].
    pub fn open(url: &str) -> DatabaseResult<Connection> {
        Connector::new().connect_url(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::mock::MockDriver;
    use crate::transaction::IsolationLevel;

    #[test]
    fn test_connect_sqlite_memory() {
        let connector = Connector::new();
        assert_eq!(connector.vendors(), ["sqlite"]);

        let mut conn = connector.connect_url("sqlite::memory:").unwrap();
        assert!(!conn.is_closed());
        conn.close().unwrap();
        assert!(conn.is_closed());
    }

    #[test]
    fn test_open_applies_read_only() {
        let conn = Connection::open("sqlite::memory:?read_only=true").unwrap();
        assert!(conn.is_read_only().unwrap());
    }

    #[test]
    fn test_unknown_vendor() {
        let err = Connector::new()
            .connect(&DbSpec::new("oracle", "xe"))
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UnknownVendor(v) if v == "oracle"));
    }

    #[test]
    fn test_rejected_session_option_is_connection_error() {
        // SQLite cannot switch the default schema
        let spec = DbSpec::sqlite_memory().schema("reporting");
        let err = Connector::new().connect(&spec).unwrap_err();
        assert!(matches!(err, DatabaseError::Connection { ref vendor, .. } if vendor == "sqlite"));
    }

    #[test]
    fn test_connect_failure_is_connection_error() {
        let spec = DbSpec::sqlite("/nonexistent-dir/sub/db.sqlite");
        let err = Connector::new().connect(&spec).unwrap_err();
        assert!(matches!(err, DatabaseError::Connection { .. }));
    }

    #[test]
    fn test_registered_driver_gets_spec_options() {
        let mock = MockDriver::new();
        let connector = Connector::new().with_driver(Arc::new(mock.clone()));
        let spec = DbSpec::new("mock", "db").isolation(IsolationLevel::Serializable);

        let conn = connector.connect(&spec).unwrap();
        assert_eq!(conn.isolation().unwrap(), IsolationLevel::Serializable);
        assert_eq!(mock.journal(), ["connect", "set_isolation(SERIALIZABLE)"]);
    }
}
