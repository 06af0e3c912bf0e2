//! Transaction strategies.
//!
//! A strategy decides what `begin`, `commit` and `rollback` mean for a
//! connection. [`SavepointStrategy`] is the default: the outermost scope
//! drives the driver transaction and nested scopes map to savepoints.
//! [`NoopStrategy`] is for drivers without transaction support.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use super::context::{savepoint_name, SessionState, TransactionContext};
use super::error::{TransactionError, TransactionResult};
use super::isolation::IsolationLevel;
use crate::db::Connection;
use crate::driver::DriverConnection;

/// Options for one transaction scope.
#[derive(Debug, Clone)]
pub struct TxOptions {
    /// Isolation level for the outermost scope. Ignored by nested scopes.
    pub isolation: Option<IsolationLevel>,
    /// Read-only mode for the outermost scope. Ignored by nested scopes.
    pub read_only: Option<bool>,
    /// Allow this scope to nest inside an open transaction via a savepoint.
    pub savepoints: bool,
    /// Strategy to use when no transaction is open yet.
    pub strategy: Option<Arc<dyn TransactionStrategy>>,
}

impl Default for TxOptions {
    fn default() -> Self {
        Self {
            isolation: None,
            read_only: None,
            savepoints: true,
            strategy: None,
        }
    }
}

impl TxOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn isolation(mut self, level: IsolationLevel) -> Self {
        self.isolation = Some(level);
        self
    }

    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = Some(value);
        self
    }

    pub fn savepoints(mut self, value: bool) -> Self {
        self.savepoints = value;
        self
    }

    pub fn strategy(mut self, strategy: Arc<dyn TransactionStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }
}

/// The begin/commit/rollback contract.
///
/// Implementations update the connection in place: its driver session and
/// its attached [`TransactionContext`].
pub trait TransactionStrategy: Send + Sync + fmt::Debug {
    fn begin(&self, conn: &mut Connection, options: &TxOptions) -> TransactionResult<()>;

    fn commit(&self, conn: &mut Connection, options: &TxOptions) -> TransactionResult<()>;

    fn rollback(&self, conn: &mut Connection, options: &TxOptions) -> TransactionResult<()>;
}

/// Driver transactions for the outermost scope, savepoints for nested ones.
#[derive(Debug, Default, Clone, Copy)]
pub struct SavepointStrategy;

impl TransactionStrategy for SavepointStrategy {
    fn begin(&self, conn: &mut Connection, options: &TxOptions) -> TransactionResult<()> {
        let depth = conn.transaction_depth();
        if depth > 0 {
            if !options.savepoints {
                return Err(TransactionError::UnsupportedNesting { depth });
            }
            let name = savepoint_name(depth + 1);
            conn.driver_mut()?.set_savepoint(&name)?;
            trace!(savepoint = %name, "savepoint set");
            if let Some(ctx) = conn.transaction_context_mut() {
                ctx.push_savepoint(name);
            }
            return Ok(());
        }

        let driver = conn.driver_mut()?;
        let saved = SessionState::capture(&*driver);
        if let Err(err) = open_transaction(driver, options, &saved) {
            if let Err(restore_err) = saved.restore(driver) {
                warn!(error = %restore_err, "failed to restore session after failed begin");
            }
            return Err(err.into());
        }

        let ctx = TransactionContext::new(Arc::new(*self), saved);
        debug!(tx_id = ctx.id(), "transaction started");
        conn.attach_transaction(ctx);
        Ok(())
    }

    fn commit(&self, conn: &mut Connection, _options: &TxOptions) -> TransactionResult<()> {
        match conn.transaction_depth() {
            0 => Err(TransactionError::NotActive),
            1 => {
                let Some(ctx) = conn.detach_transaction() else {
                    return Err(TransactionError::NotActive);
                };
                let driver = conn.driver_mut()?;
                let outcome = if ctx.is_rollback_only() {
                    debug!(tx_id = ctx.id(), "transaction marked rollback-only, rolling back");
                    driver.rollback(None)
                } else {
                    match driver.commit() {
                        Ok(()) => {
                            debug!(tx_id = ctx.id(), "transaction committed");
                            Ok(())
                        }
                        Err(err) => {
                            if let Err(rollback_err) = driver.rollback(None) {
                                warn!(tx_id = ctx.id(), error = %rollback_err, "rollback after failed commit failed");
                            }
                            Err(err)
                        }
                    }
                };
                let restored = ctx.saved_state().restore(driver);
                outcome?;
                restored?;
                Ok(())
            }
            _ => {
                let name = conn
                    .transaction_context_mut()
                    .and_then(TransactionContext::pop_savepoint);
                if let Some(name) = name {
                    conn.driver_mut()?.release_savepoint(&name)?;
                    trace!(savepoint = %name, "savepoint released");
                }
                Ok(())
            }
        }
    }

    fn rollback(&self, conn: &mut Connection, _options: &TxOptions) -> TransactionResult<()> {
        match conn.transaction_depth() {
            0 => {
                trace!("rollback requested with no open transaction");
                Ok(())
            }
            1 => {
                let Some(ctx) = conn.detach_transaction() else {
                    return Ok(());
                };
                let driver = conn.driver_mut()?;
                let outcome = driver.rollback(None);
                debug!(tx_id = ctx.id(), "transaction rolled back");
                let restored = ctx.saved_state().restore(driver);
                outcome?;
                restored?;
                Ok(())
            }
            _ => {
                let name = conn
                    .transaction_context_mut()
                    .and_then(TransactionContext::pop_savepoint);
                if let Some(name) = name {
                    let driver = conn.driver_mut()?;
                    driver.rollback(Some(&name))?;
                    driver.release_savepoint(&name)?;
                    trace!(savepoint = %name, "rolled back to savepoint");
                }
                Ok(())
            }
        }
    }
}

fn open_transaction(
    driver: &mut dyn DriverConnection,
    options: &TxOptions,
    saved: &SessionState,
) -> crate::driver::DriverResult<()> {
    if let Some(level) = options.isolation {
        if level != saved.isolation {
            driver.set_isolation(level)?;
        }
    }
    if let Some(read_only) = options.read_only {
        if read_only != saved.read_only {
            driver.set_read_only(read_only)?;
        }
    }
    driver.set_auto_commit(false)
}

/// Runs scopes without any transaction handling.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStrategy;

impl TransactionStrategy for NoopStrategy {
    fn begin(&self, _conn: &mut Connection, _options: &TxOptions) -> TransactionResult<()> {
        Ok(())
    }

    fn commit(&self, _conn: &mut Connection, _options: &TxOptions) -> TransactionResult<()> {
        Ok(())
    }

    fn rollback(&self, _conn: &mut Connection, _options: &TxOptions) -> TransactionResult<()> {
        Ok(())
    }
}
