//! Statement execution and fetching.

use tracing::debug;

use super::error::ExecuteResult;
use super::statement::StatementGuard;
use crate::cursor::{Cursor, FetchOptions, Record, Row};
use crate::db::Connection;
use crate::driver::DriverStatement;
use crate::sql::SqlVec;
use crate::types::Param;

impl Connection {
    /// Prepare a statement with this connection's statement defaults.
    pub(crate) fn prepare_statement(&mut self, sql: &str, return_keys: bool) -> ExecuteResult<StatementGuard> {
        let options = self.config().prepare_options(return_keys);
        debug!(conn_id = self.id(), sql, "prepare");
        let statement = self.driver_mut()?.prepare(sql, &options)?;
        Ok(StatementGuard::new(statement))
    }

    /// Bind parameters at indexes 1..=n through the type registry.
    pub(crate) fn bind_params(&self, statement: &mut dyn DriverStatement, params: &[Param]) -> ExecuteResult<()> {
        for (i, param) in params.iter().enumerate() {
            self.registry().bind_parameter(statement, i + 1, param)?;
        }
        Ok(())
    }

    /// Execute a data-modifying statement, returning the affected row count.
    pub fn execute(&mut self, sql: &str, params: &[Param]) -> ExecuteResult<u64> {
        let mut statement = self.prepare_statement(sql, false)?;
        self.bind_params(&mut *statement, params)?;
        Ok(statement.execute_update()?)
    }

    /// Execute a statement once per parameter group, as one batch.
    pub fn execute_batch(&mut self, sql: &str, groups: &[Vec<Param>]) -> ExecuteResult<Vec<u64>> {
        let mut statement = self.prepare_statement(sql, false)?;
        for group in groups {
            self.bind_params(&mut *statement, group)?;
            statement.add_batch()?;
        }
        Ok(statement.execute_batch()?)
    }

    pub fn execute_sqlvec(&mut self, sqlvec: &SqlVec) -> ExecuteResult<u64> {
        self.execute(&sqlvec.sql, &sqlvec.params)
    }

    /// Run a query and return a cursor over its rows.
    ///
    /// The cursor borrows the connection until it is dropped.
    pub fn fetch_lazy(&mut self, sql: &str, params: &[Param]) -> ExecuteResult<Cursor<'_>> {
        let mut statement = self.prepare_statement(sql, false)?;
        self.bind_params(&mut *statement, params)?;
        Cursor::open(self, statement.into_inner())
    }

    /// Run a query and read every row.
    pub fn fetch(&mut self, sql: &str, params: &[Param], options: &FetchOptions) -> ExecuteResult<Vec<Row>> {
        let mut cursor = self.fetch_lazy(sql, params)?;
        let rows = cursor.to_vec(options)?;
        cursor.close()?;
        Ok(rows)
    }

    /// Run a query and read every row as a record.
    pub fn fetch_records(&mut self, sql: &str, params: &[Param]) -> ExecuteResult<Vec<Record>> {
        let mut cursor = self.fetch_lazy(sql, params)?;
        let records = cursor.to_records()?;
        cursor.close()?;
        Ok(records)
    }

    /// Run a query and read its first row, if any.
    pub fn fetch_one(&mut self, sql: &str, params: &[Param]) -> ExecuteResult<Option<Record>> {
        let mut cursor = self.fetch_lazy(sql, params)?;
        let first = cursor
            .to_sequence(&FetchOptions::records())
            .next()
            .transpose()?
            .and_then(Row::into_record);
        cursor.close()?;
        Ok(first)
    }
}
