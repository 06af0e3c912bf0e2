//! Database connections.

use std::sync::Arc;

use tracing::{debug, warn};
use ulid::Ulid;

use super::api::DatabaseResult;
use super::config::ConnectionConfig;
use crate::driver::{DriverConnection, DriverError, DriverResult};
use crate::transaction::{self, IsolationLevel, TransactionContext, TransactionError, TxOptions};
use crate::types::TypeRegistry;

/// An open database session with its configuration and transaction state.
///
/// Statement execution lives in the `executor` module as further
/// `impl Connection` blocks.
pub struct Connection {
    id: String,
    driver: Option<Box<dyn DriverConnection>>,
    config: Arc<ConnectionConfig>,
    transaction: Option<TransactionContext>,
}

impl Connection {
    /// Wrap an open driver session.
    pub fn from_driver(driver: Box<dyn DriverConnection>, config: Arc<ConnectionConfig>) -> Self {
        let id = Ulid::new().to_string().to_lowercase();
        debug!(conn_id = %id, "connection opened");
        Self {
            id,
            driver: Some(driver),
            config,
            transaction: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &Arc<ConnectionConfig> {
        &self.config
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.config.registry
    }

    /// The driver session, unless the connection is closed.
    pub fn driver(&self) -> DriverResult<&(dyn DriverConnection + 'static)> {
        self.driver.as_deref().ok_or(DriverError::Closed("connection"))
    }

    /// The driver session, unless the connection is closed.
    pub fn driver_mut(&mut self) -> DriverResult<&mut (dyn DriverConnection + 'static)> {
        self.driver
            .as_deref_mut()
            .ok_or(DriverError::Closed("connection"))
    }

    pub fn is_closed(&self) -> bool {
        self.driver.as_ref().map_or(true, |d| d.is_closed())
    }

    /// Close the connection. Closing twice is not an error.
    ///
    /// An open transaction is rolled back first and the session settings it
    /// changed are put back before the driver session closes.
    pub fn close(&mut self) -> DatabaseResult<()> {
        let Some(mut driver) = self.driver.take() else {
            return Ok(());
        };
        if let Some(ctx) = self.transaction.take() {
            warn!(conn_id = %self.id, tx_id = ctx.id(), "closing connection with open transaction, rolling back");
            if let Err(err) = driver.rollback(None) {
                warn!(conn_id = %self.id, error = %err, "rollback on close failed");
            }
            if let Err(err) = ctx.saved_state().restore(driver.as_mut()) {
                warn!(conn_id = %self.id, error = %err, "restoring session state on close failed");
            }
        }
        driver.close()?;
        debug!(conn_id = %self.id, "connection closed");
        Ok(())
    }

    pub fn isolation(&self) -> DatabaseResult<IsolationLevel> {
        Ok(self.driver()?.isolation())
    }

    pub fn set_isolation(&mut self, level: IsolationLevel) -> DatabaseResult<()> {
        self.driver_mut()?.set_isolation(level)?;
        Ok(())
    }

    pub fn is_read_only(&self) -> DatabaseResult<bool> {
        Ok(self.driver()?.is_read_only())
    }

    pub fn set_read_only(&mut self, read_only: bool) -> DatabaseResult<()> {
        self.driver_mut()?.set_read_only(read_only)?;
        Ok(())
    }

    pub fn set_schema(&mut self, schema: &str) -> DatabaseResult<()> {
        self.driver_mut()?.set_schema(schema)?;
        Ok(())
    }

    // =========================================================================
    // Transaction state
    // =========================================================================

    pub fn transaction_context(&self) -> Option<&TransactionContext> {
        self.transaction.as_ref()
    }

    pub fn transaction_context_mut(&mut self) -> Option<&mut TransactionContext> {
        self.transaction.as_mut()
    }

    /// Attach the context of a transaction that has just begun.
    pub fn attach_transaction(&mut self, ctx: TransactionContext) {
        self.transaction = Some(ctx);
    }

    /// Detach the context of a transaction that is ending.
    pub fn detach_transaction(&mut self) -> Option<TransactionContext> {
        self.transaction.take()
    }

    pub fn in_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Nesting depth of the open transaction, 0 when none is open.
    pub fn transaction_depth(&self) -> usize {
        self.transaction.as_ref().map_or(0, TransactionContext::depth)
    }

    /// Run `f` in a transaction scope with default options.
    pub fn atomic<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E>,
        E: From<TransactionError>,
    {
        transaction::atomic(self, &TxOptions::default(), f)
    }

    /// Run `f` in a transaction scope.
    pub fn atomic_with<T, E, F>(&mut self, options: &TxOptions, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Connection) -> Result<T, E>,
        E: From<TransactionError>,
    {
        transaction::atomic(self, options, f)
    }

    /// Mark the open transaction rollback-only.
    pub fn set_rollback(&mut self) {
        transaction::set_rollback(self)
    }

    pub fn is_rollback_only(&self) -> bool {
        transaction::is_rollback_only(self)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(conn_id = %self.id, error = %err, "failed to close connection");
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .field("transaction_depth", &self.transaction_depth())
            .finish()
    }
}
