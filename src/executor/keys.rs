//! Execution returning generated keys.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use super::error::ExecuteResult;
use crate::cursor::{Cursor, FetchOptions, Row};
use crate::db::Connection;
use crate::types::Param;

/// Parameters for one execution, or for a batch of executions.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamGroups {
    Single(Vec<Param>),
    Multi(Vec<Vec<Param>>),
}

impl ParamGroups {
    pub fn is_multi(&self) -> bool {
        matches!(self, ParamGroups::Multi(_))
    }
}

impl From<Vec<Param>> for ParamGroups {
    fn from(params: Vec<Param>) -> Self {
        ParamGroups::Single(params)
    }
}

impl From<Vec<Vec<Param>>> for ParamGroups {
    fn from(groups: Vec<Vec<Param>>) -> Self {
        ParamGroups::Multi(groups)
    }
}

/// Transformation applied to each generated key row.
pub type RowFn = Arc<dyn Fn(Row) -> Row + Send + Sync>;

/// Reduction over the collected, transformed key rows.
pub type ResultSetFn = Arc<dyn Fn(Vec<Row>) -> Vec<Row> + Send + Sync>;

/// How generated keys are returned.
///
/// Neither function sees the affected-row counts returned when the driver
/// cannot report keys; those stay plain counts.
#[derive(Clone, Default)]
pub struct KeyOptions {
    /// Return key rows as value vectors, led by a header row.
    pub as_arrays: bool,
    /// Applied to every key row (never to the header).
    pub row_fn: Option<RowFn>,
    /// Applied once to all key rows after `row_fn`. Without one, the rows
    /// are returned as collected.
    pub result_set_fn: Option<ResultSetFn>,
}

impl KeyOptions {
    pub fn arrays() -> Self {
        Self {
            as_arrays: true,
            ..Default::default()
        }
    }

    pub fn row_fn(mut self, f: RowFn) -> Self {
        self.row_fn = Some(f);
        self
    }

    pub fn result_set_fn(mut self, f: ResultSetFn) -> Self {
        self.result_set_fn = Some(f);
        self
    }
}

impl fmt::Debug for KeyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyOptions")
            .field("as_arrays", &self.as_arrays)
            .field("row_fn", &self.row_fn.as_ref().map(|_| "custom"))
            .field("result_set_fn", &self.result_set_fn.as_ref().map(|_| "custom"))
            .finish()
    }
}

/// Outcome of [`Connection::execute_returning_keys`].
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedKeys {
    /// Generated key rows.
    Rows(Vec<Row>),
    /// Affected-row counts, when the driver cannot report generated keys.
    Counts(Vec<u64>),
}

impl GeneratedKeys {
    pub fn rows(&self) -> Option<&[Row]> {
        match self {
            GeneratedKeys::Rows(rows) => Some(rows),
            GeneratedKeys::Counts(_) => None,
        }
    }

    pub fn counts(&self) -> Option<&[u64]> {
        match self {
            GeneratedKeys::Counts(counts) => Some(counts),
            GeneratedKeys::Rows(_) => None,
        }
    }

    /// First value of the first key row.
    pub fn first_key(&self) -> Option<&Value> {
        let rows = self.rows()?;
        match rows.first()? {
            Row::Record(record) => record.values().next(),
            // In array mode the first row is the header
            Row::Values(_) => rows.get(1)?.as_values()?.first(),
        }
    }
}

impl Connection {
    /// Execute a data-modifying statement and return the keys it generated.
    ///
    /// A single parameter group yields the first key row (in array mode,
    /// the header and the first row); multiple groups run as a batch and
    /// yield every key row. Key rows go through `row_fn`, then the whole
    /// vector through `result_set_fn`. When the driver cannot report
    /// generated keys, the affected-row counts are returned instead.
    pub fn execute_returning_keys(
        &mut self,
        sql: &str,
        params: ParamGroups,
        options: &KeyOptions,
    ) -> ExecuteResult<GeneratedKeys> {
        let mut statement = self.prepare_statement(sql, true)?;
        let counts = match &params {
            ParamGroups::Single(group) => {
                self.bind_params(&mut *statement, group)?;
                vec![statement.execute_update()?]
            }
            ParamGroups::Multi(groups) => {
                for group in groups {
                    self.bind_params(&mut *statement, group)?;
                    statement.add_batch()?;
                }
                statement.execute_batch()?
            }
        };

        let keys = match statement.generated_keys() {
            Ok(keys) => keys,
            Err(err) if err.is_unsupported() => {
                debug!(error = %err, "generated keys unavailable, returning row counts");
                return Ok(GeneratedKeys::Counts(counts));
            }
            Err(err) => return Err(err.into()),
        };

        let fetch = FetchOptions {
            as_rows: options.as_arrays,
            header_row: options.as_arrays,
            identifiers: None,
        };
        let mut cursor = Cursor::from_result_set(self, keys);
        let rows = if params.is_multi() {
            cursor.to_vec(&fetch)?
        } else {
            let take = if options.as_arrays { 2 } else { 1 };
            cursor
                .to_sequence(&fetch)
                .take(take)
                .collect::<ExecuteResult<Vec<_>>>()?
        };
        cursor.close()?;

        let rows = match &options.row_fn {
            Some(f) => {
                let header = usize::from(options.as_arrays);
                rows.into_iter()
                    .enumerate()
                    .map(|(i, row)| if i < header { row } else { f(row) })
                    .collect()
            }
            None => rows,
        };
        let rows = match &options.result_set_fn {
            Some(f) => f(rows),
            None => rows,
        };
        Ok(GeneratedKeys::Rows(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ConnectionConfig;
    use crate::driver::mock::MockDriver;
    use crate::driver::sqlite::{SqliteConnection, GENERATED_KEY_LABEL};
    use crate::executor::ExecuteError;
    use crate::params;
    use serde_json::json;

    const INSERT: &str = "INSERT INTO t (v) VALUES (?)";

    fn mock(driver: &MockDriver) -> Connection {
        Connection::from_driver(driver.connection(), Arc::new(ConnectionConfig::default()))
    }

    fn sqlite() -> Connection {
        let native = SqliteConnection::open_in_memory().unwrap();
        let mut conn = Connection::from_driver(Box::new(native), Arc::new(ConnectionConfig::default()));
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, v TEXT)", &[])
            .unwrap();
        conn
    }

    #[test]
    fn test_single_returns_first_key_record() {
        let driver = MockDriver::new();
        let mut conn = mock(&driver);

        let keys = conn
            .execute_returning_keys(INSERT, params!["a"].into(), &KeyOptions::default())
            .unwrap();

        assert_eq!(keys.rows().map(<[Row]>::len), Some(1));
        assert_eq!(keys.first_key(), Some(&json!(1)));
        assert_eq!(driver.count("close_statement"), 1);
        assert_eq!(driver.count("close_result_set"), 1);
    }

    #[test]
    fn test_single_as_arrays_returns_header_and_row() {
        let driver = MockDriver::new();
        let mut conn = mock(&driver);

        let keys = conn
            .execute_returning_keys(INSERT, params!["a"].into(), &KeyOptions::arrays())
            .unwrap();

        assert_eq!(
            keys,
            GeneratedKeys::Rows(vec![
                Row::Values(vec![json!("id")]),
                Row::Values(vec![json!(1)]),
            ])
        );
        assert_eq!(keys.first_key(), Some(&json!(1)));
    }

    #[test]
    fn test_multi_returns_every_key() {
        let driver = MockDriver::new();
        let mut conn = mock(&driver);

        let groups = vec![params!["a"], params!["b"], params!["c"]];
        let keys = conn
            .execute_returning_keys(INSERT, groups.into(), &KeyOptions::default())
            .unwrap();

        let rows = keys.rows().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].get("id"), Some(&json!(3)));
        assert_eq!(driver.count("execute_batch(3)"), 1);
    }

    #[test]
    fn test_row_fn_applied_to_key_rows() {
        let driver = MockDriver::new();
        let mut conn = mock(&driver);

        let wrap: RowFn = Arc::new(|row: Row| match row {
            Row::Values(mut values) => {
                values.push(json!("seen"));
                Row::Values(values)
            }
            other => other,
        });
        let keys = conn
            .execute_returning_keys(INSERT, params!["a"].into(), &KeyOptions::arrays().row_fn(wrap))
            .unwrap();

        let rows = keys.rows().unwrap();
        assert_eq!(rows[0], Row::Values(vec![json!("id")]));
        assert_eq!(rows[1], Row::Values(vec![json!(1), json!("seen")]));
    }

    #[test]
    fn test_result_set_fn_reduces_transformed_rows() {
        let driver = MockDriver::new();
        let mut conn = mock(&driver);

        let double: RowFn = Arc::new(|row: Row| match row {
            Row::Record(mut record) => {
                if let Some(id) = record.get("id").and_then(Value::as_i64) {
                    record.insert("id".into(), json!(id * 10));
                }
                Row::Record(record)
            }
            other => other,
        });
        let last_only: ResultSetFn = Arc::new(|rows: Vec<Row>| -> Vec<Row> {
            rows.into_iter().rev().take(1).collect()
        });
        let options = KeyOptions::default().row_fn(double).result_set_fn(last_only);

        let groups = vec![params!["a"], params!["b"], params!["c"]];
        let keys = conn
            .execute_returning_keys(INSERT, groups.into(), &options)
            .unwrap();

        let rows = keys.rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("id"), Some(&json!(30)));
    }

    #[test]
    fn test_counts_bypass_row_functions() {
        let driver = MockDriver::without_generated_keys();
        let mut conn = mock(&driver);

        let options = KeyOptions::default()
            .row_fn(Arc::new(|_: Row| -> Row { panic!("row_fn called on counts") }))
            .result_set_fn(Arc::new(|_: Vec<Row>| -> Vec<Row> {
                panic!("result_set_fn called on counts")
            }));
        let keys = conn
            .execute_returning_keys(INSERT, params!["a"].into(), &options)
            .unwrap();
        assert_eq!(keys, GeneratedKeys::Counts(vec![1]));
    }

    #[test]
    fn test_sqlite_update_reports_no_keys() {
        let mut conn = sqlite();
        conn.execute_returning_keys(INSERT, params!["a"].into(), &KeyOptions::default())
            .unwrap();

        let keys = conn
            .execute_returning_keys("UPDATE t SET v = ?", params!["b"].into(), &KeyOptions::default())
            .unwrap();
        assert_eq!(keys, GeneratedKeys::Rows(vec![]));
        assert_eq!(keys.first_key(), None);
    }

    #[test]
    fn test_falls_back_to_counts() {
        let driver = MockDriver::without_generated_keys();
        let mut conn = mock(&driver);

        let keys = conn
            .execute_returning_keys(INSERT, params!["a"].into(), &KeyOptions::default())
            .unwrap();
        assert_eq!(keys, GeneratedKeys::Counts(vec![1]));

        let groups = vec![params!["a"], params!["b"]];
        let keys = conn
            .execute_returning_keys(INSERT, groups.into(), &KeyOptions::default())
            .unwrap();
        assert_eq!(keys, GeneratedKeys::Counts(vec![1, 1]));
        assert_eq!(driver.count("close_statement"), 2);
    }

    #[test]
    fn test_execution_error_closes_statement() {
        let driver = MockDriver::new().failing_on("INSERT");
        let mut conn = mock(&driver);

        let err = conn
            .execute_returning_keys(INSERT, params!["a"].into(), &KeyOptions::default())
            .unwrap_err();
        assert!(matches!(err, ExecuteError::Driver(_)));
        assert_eq!(driver.count("generated_keys"), 0);
        assert_eq!(driver.count("close_statement"), 1);
    }

    #[test]
    fn test_sqlite_generated_keys() {
        let mut conn = sqlite();

        let keys = conn
            .execute_returning_keys(INSERT, params!["a"].into(), &KeyOptions::default())
            .unwrap();
        assert_eq!(keys.rows().unwrap()[0].get(GENERATED_KEY_LABEL), Some(&json!(1)));

        let groups = vec![params!["b"], params!["c"]];
        let keys = conn
            .execute_returning_keys(INSERT, groups.into(), &KeyOptions::default())
            .unwrap();
        let ids: Vec<_> = keys
            .rows()
            .unwrap()
            .iter()
            .map(|row| row.get(GENERATED_KEY_LABEL).cloned())
            .collect();
        assert_eq!(ids, vec![Some(json!(2)), Some(json!(3))]);
    }
}
