//! Forward-only cursor over a driver result set.

use std::iter::FusedIterator;
use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;
use tracing::{trace, warn};

use super::row::{FetchOptions, Record, Row};
use crate::db::{Connection, ConnectionConfig};
use crate::driver::{ColumnMeta, DriverResultSet, DriverStatement};
use crate::executor::ExecuteResult;
use crate::sql::NamingFn;
use crate::types::TypeRegistry;

/// A lazily read query result.
///
/// The cursor owns the open result set (and the statement that produced it,
/// when it was opened from one) and holds the connection's mutable borrow
/// until it is dropped. Rows are read from the driver only as the sequence
/// is advanced, and can be traversed once.
pub struct Cursor<'c> {
    config: Arc<ConnectionConfig>,
    result_set: Option<Box<dyn DriverResultSet>>,
    statement: Option<Box<dyn DriverStatement>>,
    columns: Vec<ColumnMeta>,
    /// Computed on first use, then fixed for this result set.
    labels: Option<Arc<[String]>>,
    /// Set once the header or any row has been produced.
    started: bool,
    exhausted: bool,
    closed: bool,
    _conn: PhantomData<&'c mut Connection>,
}

impl<'c> Cursor<'c> {
    /// Execute a prepared, bound query and keep its result set open.
    ///
    /// No row is read yet. The cursor takes ownership of the statement
    /// and closes it with the result set; if the query fails, the statement
    /// is closed right away.
    ///
    /// Whether the driver itself holds rows back is up to the binding. The
    /// SQLite binding materializes raw rows when the query executes, capped
    /// by [`PrepareOptions::max_rows`](crate::driver::PrepareOptions); only
    /// column coercion is deferred to traversal. Set `max_rows` on the
    /// connection's statement defaults to bound memory for large results.
    pub fn open(conn: &'c mut Connection, mut statement: Box<dyn DriverStatement>) -> ExecuteResult<Self> {
        match statement.execute_query() {
            Ok(result_set) => Ok(Self::new(conn, result_set, Some(statement))),
            Err(err) => {
                if let Err(close_err) = statement.close() {
                    warn!(error = %close_err, "failed to close statement after query error");
                }
                Err(err.into())
            }
        }
    }

    /// Wrap a result set whose statement is owned elsewhere.
    pub fn from_result_set(conn: &'c mut Connection, result_set: Box<dyn DriverResultSet>) -> Self {
        Self::new(conn, result_set, None)
    }

    fn new(
        conn: &'c mut Connection,
        result_set: Box<dyn DriverResultSet>,
        statement: Option<Box<dyn DriverStatement>>,
    ) -> Self {
        let columns = result_set.columns().to_vec();
        trace!(conn_id = conn.id(), columns = columns.len(), "cursor opened");
        Self {
            config: conn.config().clone(),
            result_set: Some(result_set),
            statement,
            columns,
            labels: None,
            started: false,
            exhausted: false,
            closed: false,
            _conn: PhantomData,
        }
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    /// Column labels after naming, as used for record keys.
    pub fn labels(&mut self) -> Arc<[String]> {
        self.labels_with(None)
    }

    fn labels_with(&mut self, naming: Option<&NamingFn>) -> Arc<[String]> {
        if let Some(labels) = &self.labels {
            return labels.clone();
        }
        let naming = naming.unwrap_or(&self.config.identifiers);
        let labels: Arc<[String]> = self.columns.iter().map(|c| naming(&c.label)).collect();
        self.labels = Some(labels.clone());
        labels
    }

    /// A lazy sequence over the remaining rows.
    ///
    /// Nothing is read until the sequence is advanced. A sequence taken
    /// after a partial traversal resumes where the last one stopped, without
    /// a second header. Once every row has been read, further sequences are
    /// empty.
    pub fn to_sequence(&mut self, options: &FetchOptions) -> RowStream<'_, 'c> {
        let labels = self.labels_with(options.identifiers.as_ref());
        let header_pending =
            options.as_rows && options.header_row && !self.started && !self.exhausted;
        RowStream {
            cursor: self,
            labels,
            as_rows: options.as_rows,
            header_pending,
        }
    }

    /// Read every remaining row.
    pub fn to_vec(&mut self, options: &FetchOptions) -> ExecuteResult<Vec<Row>> {
        self.to_sequence(options).collect()
    }

    /// Read every remaining row as a record.
    pub fn to_records(&mut self) -> ExecuteResult<Vec<Record>> {
        self.to_sequence(&FetchOptions::records())
            .filter_map(|row| match row {
                Ok(row) => row.into_record().map(Ok),
                Err(err) => Some(Err(err)),
            })
            .collect()
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the result set and the owned statement. Closing twice is not
    /// an error.
    pub fn close(&mut self) -> ExecuteResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.exhausted = true;

        let mut first_error = None;
        if let Some(mut result_set) = self.result_set.take() {
            if let Err(err) = result_set.close() {
                first_error = Some(err);
            }
        }
        if let Some(mut statement) = self.statement.take() {
            if let Err(err) = statement.close() {
                match first_error {
                    Some(_) => warn!(error = %err, "failed to close statement"),
                    None => first_error = Some(err),
                }
            }
        }
        trace!("cursor closed");

        match first_error {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    fn read_next(&mut self, labels: &[String], as_rows: bool) -> ExecuteResult<Option<Row>> {
        if self.exhausted {
            return Ok(None);
        }
        self.started = true;
        let outcome = match self.result_set.as_mut() {
            Some(result_set) => read_row(
                result_set.as_mut(),
                &self.columns,
                &self.config.registry,
                labels,
                as_rows,
            ),
            None => Ok(None),
        };
        // A failed read ends the sequence as well
        if !matches!(outcome, Ok(Some(_))) {
            self.exhausted = true;
            trace!("cursor exhausted");
        }
        outcome
    }
}

/// Advance the driver and read every column of the new row, in order.
fn read_row(
    result_set: &mut dyn DriverResultSet,
    columns: &[ColumnMeta],
    registry: &TypeRegistry,
    labels: &[String],
    as_rows: bool,
) -> ExecuteResult<Option<Row>> {
    if !result_set.next()? {
        return Ok(None);
    }

    let mut values = Vec::with_capacity(columns.len());
    for (i, meta) in columns.iter().enumerate() {
        let index = i + 1;
        let raw = result_set.get(index)?;
        values.push(registry.from_sql_column(raw, meta, index)?);
    }

    if as_rows {
        return Ok(Some(Row::Values(values)));
    }
    // Labels that collide after naming keep the last column's value
    let mut record = Record::new();
    for (label, value) in labels.iter().zip(values) {
        record.insert(label.clone(), value);
    }
    Ok(Some(Row::Record(record)))
}

impl Drop for Cursor<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close cursor");
        }
    }
}

/// Lazy sequence of rows from a [`Cursor`].
pub struct RowStream<'s, 'c> {
    cursor: &'s mut Cursor<'c>,
    labels: Arc<[String]>,
    as_rows: bool,
    header_pending: bool,
}

impl Iterator for RowStream<'_, '_> {
    type Item = ExecuteResult<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.header_pending {
            self.header_pending = false;
            self.cursor.started = true;
            let header = self.labels.iter().cloned().map(Value::String).collect();
            return Some(Ok(Row::Values(header)));
        }
        self.cursor.read_next(&self.labels, self.as_rows).transpose()
    }
}

impl FusedIterator for RowStream<'_, '_> {}
