//! Transaction scopes.
//!
//! [`atomic`] runs a closure inside a transaction scope on a connection:
//! the scope commits when the closure returns `Ok`, and rolls back when it
//! returns `Err` or panics. Scopes nest; how nesting maps onto the driver is
//! up to the [`TransactionStrategy`] in effect.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{trace, warn};

use super::error::TransactionError;
use super::strategy::{TransactionStrategy, TxOptions};
use crate::db::Connection;

/// Run `f` inside a transaction scope.
///
/// The strategy is taken from the open transaction if there is one, then
/// from `options`, then from the connection's configuration.
///
/// If `f` fails or panics, the scope is rolled back and the original error
/// (or panic) is passed on. A failure of that rollback is logged, not
/// returned.
pub fn atomic<T, E, F>(conn: &mut Connection, options: &TxOptions, f: F) -> Result<T, E>
where
    F: FnOnce(&mut Connection) -> Result<T, E>,
    E: From<TransactionError>,
{
    let strategy = resolve_strategy(conn, options);
    strategy.begin(conn, options)?;

    match panic::catch_unwind(AssertUnwindSafe(|| f(conn))) {
        Ok(Ok(value)) => {
            strategy.commit(conn, options)?;
            Ok(value)
        }
        Ok(Err(err)) => {
            if let Err(rollback_err) = strategy.rollback(conn, options) {
                warn!(error = %rollback_err, "rollback of failed transaction scope failed");
            }
            Err(err)
        }
        Err(payload) => {
            if let Err(rollback_err) = strategy.rollback(conn, options) {
                warn!(error = %rollback_err, "rollback of panicked transaction scope failed");
            }
            panic::resume_unwind(payload)
        }
    }
}

/// Mark the open transaction rollback-only.
///
/// Every enclosing scope still completes normally, but the outermost commit
/// becomes a rollback. Outside a transaction this does nothing.
pub fn set_rollback(conn: &mut Connection) {
    match conn.transaction_context_mut() {
        Some(ctx) => {
            trace!(tx_id = ctx.id(), "transaction marked rollback-only");
            ctx.set_rollback_only();
        }
        None => trace!("set_rollback outside a transaction ignored"),
    }
}

/// Check whether the open transaction is marked rollback-only.
pub fn is_rollback_only(conn: &Connection) -> bool {
    conn.transaction_context()
        .map(|ctx| ctx.is_rollback_only())
        .unwrap_or(false)
}

fn resolve_strategy(conn: &Connection, options: &TxOptions) -> Arc<dyn TransactionStrategy> {
    if let Some(ctx) = conn.transaction_context() {
        return ctx.strategy().clone();
    }
    options
        .strategy
        .clone()
        .unwrap_or_else(|| conn.config().strategy.clone())
}
