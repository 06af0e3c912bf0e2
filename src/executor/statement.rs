//! Prepared statement guard.

use std::ops::{Deref, DerefMut};

use tracing::warn;

use crate::driver::DriverStatement;

/// Closes the wrapped statement when dropped, on every exit path.
pub(crate) struct StatementGuard {
    statement: Option<Box<dyn DriverStatement>>,
}

impl StatementGuard {
    pub(crate) fn new(statement: Box<dyn DriverStatement>) -> Self {
        Self {
            statement: Some(statement),
        }
    }

    /// Hand the statement to a new owner, which becomes responsible for
    /// closing it.
    pub(crate) fn into_inner(mut self) -> Box<dyn DriverStatement> {
        match self.statement.take() {
            Some(statement) => statement,
            None => unreachable!("statement taken before into_inner"),
        }
    }
}

impl Deref for StatementGuard {
    type Target = dyn DriverStatement;

    fn deref(&self) -> &Self::Target {
        match &self.statement {
            Some(statement) => statement.as_ref(),
            None => unreachable!("statement taken before use"),
        }
    }
}

impl DerefMut for StatementGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        match &mut self.statement {
            Some(statement) => statement.as_mut(),
            None => unreachable!("statement taken before use"),
        }
    }
}

impl Drop for StatementGuard {
    fn drop(&mut self) {
        if let Some(mut statement) = self.statement.take() {
            if let Err(err) = statement.close() {
                warn!(error = %err, "failed to close statement");
            }
        }
    }
}
