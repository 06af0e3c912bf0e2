//! Per-connection transaction context.
//!
//! One context is attached to a connection while its outermost transaction
//! is open. Nested scopes do not get their own context; they push a savepoint
//! onto the one that exists, so every scope of a logical transaction sees the
//! same rollback-only flag.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use ulid::Ulid;

use super::isolation::IsolationLevel;
use super::strategy::TransactionStrategy;
use crate::driver::{DriverConnection, DriverResult};

/// Savepoint name for a scope opened at `depth`.
pub fn savepoint_name(depth: usize) -> String {
    format!("sp_{}", depth)
}

/// Session settings captured when the outermost transaction begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionState {
    pub auto_commit: bool,
    pub isolation: IsolationLevel,
    pub read_only: bool,
}

impl SessionState {
    /// Read the current settings of a driver session.
    pub fn capture(driver: &dyn DriverConnection) -> Self {
        Self {
            auto_commit: driver.auto_commit(),
            isolation: driver.isolation(),
            read_only: driver.is_read_only(),
        }
    }

    /// Put back every setting that differs from the captured one.
    ///
    /// Auto-commit goes first so the driver is out of its transaction before
    /// isolation or read-only change.
    pub fn restore(&self, driver: &mut dyn DriverConnection) -> DriverResult<()> {
        if driver.auto_commit() != self.auto_commit {
            driver.set_auto_commit(self.auto_commit)?;
        }
        if driver.isolation() != self.isolation {
            driver.set_isolation(self.isolation)?;
        }
        if driver.is_read_only() != self.read_only {
            driver.set_read_only(self.read_only)?;
        }
        Ok(())
    }
}

/// State of an open transaction on one connection.
#[derive(Debug)]
pub struct TransactionContext {
    /// Unique transaction ID.
    tx_id: String,
    /// When the outermost scope began.
    started_at: DateTime<Utc>,
    /// Open savepoints, innermost last.
    savepoints: Vec<String>,
    /// Set by any scope that wants the whole transaction rolled back.
    rollback_only: bool,
    /// Strategy that opened the transaction; nested scopes reuse it.
    strategy: Arc<dyn TransactionStrategy>,
    /// Settings to restore when the outermost scope ends.
    saved: SessionState,
}

impl TransactionContext {
    pub fn new(strategy: Arc<dyn TransactionStrategy>, saved: SessionState) -> Self {
        Self {
            tx_id: Ulid::new().to_string().to_lowercase(),
            started_at: Utc::now(),
            savepoints: Vec::new(),
            rollback_only: false,
            strategy,
            saved,
        }
    }

    pub fn id(&self) -> &str {
        &self.tx_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Nesting depth: 1 for the outermost scope, plus one per savepoint.
    pub fn depth(&self) -> usize {
        1 + self.savepoints.len()
    }

    pub fn is_nested(&self) -> bool {
        !self.savepoints.is_empty()
    }

    pub fn savepoints(&self) -> &[String] {
        &self.savepoints
    }

    pub fn push_savepoint(&mut self, name: String) {
        self.savepoints.push(name);
    }

    pub fn pop_savepoint(&mut self) -> Option<String> {
        self.savepoints.pop()
    }

    /// Mark the transaction so that its outermost commit rolls back instead.
    pub fn set_rollback_only(&mut self) {
        self.rollback_only = true;
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only
    }

    pub fn strategy(&self) -> &Arc<dyn TransactionStrategy> {
        &self.strategy
    }

    pub fn saved_state(&self) -> SessionState {
        self.saved
    }
}
