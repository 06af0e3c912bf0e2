//! Connection configuration.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::driver::PrepareOptions;
use crate::sql::{self, NamingFn};
use crate::transaction::{SavepointStrategy, TransactionStrategy};
use crate::types::TypeRegistry;

/// Statement settings applied to every statement a connection prepares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementDefaults {
    /// Upper bound on statement execution time.
    pub query_timeout: Option<Duration>,
    /// Maximum number of rows read from any result set.
    pub max_rows: Option<u64>,
    /// Fetch size hint for the driver.
    pub fetch_size: Option<u32>,
}

/// Settings shared by every connection a [`Connector`](super::Connector)
/// opens.
#[derive(Clone)]
pub struct ConnectionConfig {
    /// Strategy for transaction scopes that do not name one.
    pub strategy: Arc<dyn TransactionStrategy>,
    /// Conversions between host values and SQL values.
    pub registry: Arc<TypeRegistry>,
    /// Turns column labels into record keys.
    pub identifiers: NamingFn,
    pub statement: StatementDefaults,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            strategy: Arc::new(SavepointStrategy),
            registry: Arc::new(TypeRegistry::new()),
            identifiers: sql::lower_case(),
            statement: StatementDefaults::default(),
        }
    }
}

impl ConnectionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default transaction strategy.
    pub fn strategy(mut self, strategy: Arc<dyn TransactionStrategy>) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set the type registry.
    pub fn registry(mut self, registry: TypeRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    /// Set the naming function for result labels.
    pub fn identifiers(mut self, naming: NamingFn) -> Self {
        self.identifiers = naming;
        self
    }

    pub fn query_timeout(mut self, timeout: Duration) -> Self {
        self.statement.query_timeout = Some(timeout);
        self
    }

    pub fn max_rows(mut self, max_rows: u64) -> Self {
        self.statement.max_rows = Some(max_rows);
        self
    }

    pub fn fetch_size(mut self, fetch_size: u32) -> Self {
        self.statement.fetch_size = Some(fetch_size);
        self
    }

    /// Driver options for a statement prepared under this configuration.
    pub fn prepare_options(&self, return_keys: bool) -> PrepareOptions {
        PrepareOptions {
            return_keys,
            query_timeout: self.statement.query_timeout,
            max_rows: self.statement.max_rows,
            fetch_size: self.statement.fetch_size,
        }
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("strategy", &self.strategy)
            .field("registry", &self.registry)
            .field("statement", &self.statement)
            .finish_non_exhaustive()
    }
}
