//! Identifier naming and quoting.
//!
//! A [`NamingFn`] maps one identifier to another. It is applied to result
//! column labels when rows are built, and to map keys when statements are
//! built from records.

use std::fmt;
use std::sync::Arc;

/// Function mapping an identifier to another identifier.
pub type NamingFn = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Leave identifiers unchanged.
pub fn identity() -> NamingFn {
    Arc::new(|s: &str| s.to_string())
}

/// Lower-case identifiers. The default for result labels.
pub fn lower_case() -> NamingFn {
    Arc::new(|s: &str| s.to_lowercase())
}

/// Replace `-` with `_`, e.g. `first-name` becomes `first_name`.
pub fn snake_case() -> NamingFn {
    Arc::new(|s: &str| s.replace('-', "_"))
}

/// Lower-case and replace `_` with `-`, e.g. `FIRST_NAME` becomes `first-name`.
pub fn kebab_case() -> NamingFn {
    Arc::new(|s: &str| s.to_lowercase().replace('_', "-"))
}

/// Identifier quoting style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quoting {
    /// No quoting.
    #[default]
    Plain,
    /// `"name"`
    Ansi,
    /// `` `name` ``
    Mysql,
    /// `[name]`
    SqlServer,
}

impl Quoting {
    /// Quote an identifier. Dotted names are quoted per part.
    pub fn quote(&self, ident: &str) -> String {
        ident
            .split('.')
            .map(|part| self.quote_part(part))
            .collect::<Vec<_>>()
            .join(".")
    }

    fn quote_part(&self, part: &str) -> String {
        match self {
            Quoting::Plain => part.to_string(),
            Quoting::Ansi => format!("\"{}\"", part.replace('"', "\"\"")),
            Quoting::Mysql => format!("`{}`", part.replace('`', "``")),
            Quoting::SqlServer => format!("[{}]", part.replace(']', "]]")),
        }
    }
}

/// Options for building statements from records.
#[derive(Clone)]
pub struct SqlOptions {
    /// How table and column names are quoted.
    pub quoting: Quoting,
    /// Applied to record keys before quoting.
    pub columns: NamingFn,
}

impl Default for SqlOptions {
    fn default() -> Self {
        Self {
            quoting: Quoting::Plain,
            columns: identity(),
        }
    }
}

impl SqlOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn quoting(mut self, quoting: Quoting) -> Self {
        self.quoting = quoting;
        self
    }

    pub fn columns(mut self, naming: NamingFn) -> Self {
        self.columns = naming;
        self
    }

    /// Name of a table as it appears in SQL.
    pub fn table(&self, name: &str) -> String {
        self.quoting.quote(name)
    }

    /// Name of a column as it appears in SQL.
    pub fn column(&self, key: &str) -> String {
        self.quoting.quote(&(self.columns)(key))
    }
}

impl fmt::Debug for SqlOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlOptions")
            .field("quoting", &self.quoting)
            .finish_non_exhaustive()
    }
}
