//! Row types produced by cursors.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

use crate::sql::NamingFn;

/// A row as a map of column label to value.
pub type Record = BTreeMap<String, Value>;

/// One element of a result sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    /// Column label to value.
    Record(Record),
    /// Values in column order (or the labels, for a header row).
    Values(Vec<Value>),
}

impl Row {
    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Row::Record(record) => Some(record),
            Row::Values(_) => None,
        }
    }

    pub fn into_record(self) -> Option<Record> {
        match self {
            Row::Record(record) => Some(record),
            Row::Values(_) => None,
        }
    }

    pub fn as_values(&self) -> Option<&[Value]> {
        match self {
            Row::Values(values) => Some(values),
            Row::Record(_) => None,
        }
    }

    pub fn into_values(self) -> Option<Vec<Value>> {
        match self {
            Row::Values(values) => Some(values),
            Row::Record(_) => None,
        }
    }

    /// Value of a column, by label for records or by position for values.
    pub fn get(&self, label: &str) -> Option<&Value> {
        match self {
            Row::Record(record) => record.get(label),
            Row::Values(values) => label.parse::<usize>().ok().and_then(|i| values.get(i)),
        }
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        match self {
            Row::Record(record) => record.len(),
            Row::Values(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Record> for Row {
    fn from(record: Record) -> Self {
        Row::Record(record)
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::Values(values)
    }
}

/// How a cursor shapes the rows it yields.
#[derive(Clone, Default)]
pub struct FetchOptions {
    /// Yield value vectors instead of records.
    pub as_rows: bool,
    /// With `as_rows`, yield the column labels first.
    pub header_row: bool,
    /// Naming function for labels. The connection default when unset.
    pub identifiers: Option<NamingFn>,
}

impl FetchOptions {
    /// Rows as records.
    pub fn records() -> Self {
        Self::default()
    }

    /// Rows as value vectors.
    pub fn rows() -> Self {
        Self {
            as_rows: true,
            ..Default::default()
        }
    }

    /// Prefix value vectors with a header row.
    pub fn with_header(mut self) -> Self {
        self.header_row = true;
        self
    }

    pub fn identifiers(mut self, naming: NamingFn) -> Self {
        self.identifiers = Some(naming);
        self
    }
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("as_rows", &self.as_rows)
            .field("header_row", &self.header_row)
            .field("identifiers", &self.identifiers.as_ref().map(|_| "custom"))
            .finish()
    }
}
