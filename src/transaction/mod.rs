//! Transaction handling.
//!
//! Transactions are scoped: [`atomic`] (or [`Connection::atomic`]) opens a
//! scope, runs a closure, and commits or rolls back depending on its result.
//! The outermost scope on a connection drives the driver transaction; nested
//! scopes become savepoints. Any scope may mark the whole transaction
//! rollback-only with [`set_rollback`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         atomic()                            │
//! │     (begin, run closure, commit on Ok / rollback on Err)    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                   ┌─────────────────────┐
//!                   │ TransactionStrategy │  SavepointStrategy,
//!                   │                     │  NoopStrategy
//!                   └─────────────────────┘
//!                              │
//!        ┌─────────────────────┴─────────────────────┐
//!        ▼                                           ▼
//!  ┌────────────────────┐                  ┌──────────────────┐
//!  │ TransactionContext │                  │ DriverConnection │
//!  │ (depth, savepoints,│                  │ (auto-commit,    │
//!  │  rollback-only)    │                  │  savepoints)     │
//!  └────────────────────┘                  └──────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use sqlbridge::transaction::TransactionResult;
//!
//! let result: TransactionResult<()> = conn.atomic(|conn| {
//!     // Nested scope, becomes savepoint sp_2
//!     conn.atomic(|conn| {
//!         conn.set_rollback();
//!         Ok(())
//!     })
//! });
//! // The outermost commit turned into a rollback
//! ```
//!
//! [`Connection::atomic`]: crate::db::Connection::atomic

mod context;
mod error;
mod isolation;
mod manager;
mod strategy;

pub use context::{savepoint_name, SessionState, TransactionContext};
pub use error::{TransactionError, TransactionResult};
pub use isolation::IsolationLevel;
pub use manager::{atomic, is_rollback_only, set_rollback};
pub use strategy::{NoopStrategy, SavepointStrategy, TransactionStrategy, TxOptions};
