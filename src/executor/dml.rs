//! Record-level insert, update, delete and lookup.

use serde_json::{Map, Value};

use super::error::{ExecuteError, ExecuteResult};
use super::keys::{GeneratedKeys, KeyOptions, ParamGroups};
use crate::cursor::Record;
use crate::db::Connection;
use crate::sql::{self, SqlOptions, SqlVec};

fn as_object<'v>(value: &'v Value, what: &str) -> ExecuteResult<&'v Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        ExecuteError::InvalidArgument(format!("{} must be a JSON object, got {}", what, value))
    })
}

impl Connection {
    /// Insert one record, returning its generated keys.
    pub fn insert(&mut self, table: &str, row: &Value, options: &SqlOptions) -> ExecuteResult<GeneratedKeys> {
        let statement = sql::insert(table, as_object(row, "row")?, options)?;
        self.execute_returning_keys(
            &statement.sql,
            ParamGroups::Single(statement.params),
            &KeyOptions::default(),
        )
    }

    /// Insert several records, one statement per record, in input order.
    ///
    /// Each statement is built from its own record's keys, so records may
    /// carry different columns. Every record is validated before anything
    /// runs.
    pub fn insert_multi(
        &mut self,
        table: &str,
        rows: &[Value],
        options: &SqlOptions,
    ) -> ExecuteResult<Vec<GeneratedKeys>> {
        let statements = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let row = as_object(row, &format!("row {}", i))?;
                Ok(sql::insert(table, row, options)?)
            })
            .collect::<ExecuteResult<Vec<SqlVec>>>()?;

        statements
            .into_iter()
            .map(|statement| {
                self.execute_returning_keys(
                    &statement.sql,
                    ParamGroups::Single(statement.params),
                    &KeyOptions::default(),
                )
            })
            .collect()
    }

    /// Update the rows matching every key of `where_`.
    pub fn update(&mut self, table: &str, set: &Value, where_: &Value, options: &SqlOptions) -> ExecuteResult<u64> {
        let statement = sql::update(
            table,
            as_object(set, "set")?,
            as_object(where_, "where")?,
            options,
        )?;
        self.execute_sqlvec(&statement)
    }

    /// Delete the rows matching every key of `where_`.
    pub fn delete(&mut self, table: &str, where_: &Value, options: &SqlOptions) -> ExecuteResult<u64> {
        let statement = sql::delete(table, as_object(where_, "where")?, options)?;
        self.execute_sqlvec(&statement)
    }

    /// Fetch the rows matching every key of `where_`.
    pub fn find_by_keys(&mut self, table: &str, where_: &Value, options: &SqlOptions) -> ExecuteResult<Vec<Record>> {
        let statement = sql::select_by_keys(table, as_object(where_, "where")?, options)?;
        self.fetch_records(&statement.sql, &statement.params)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::db::ConnectionConfig;
    use crate::driver::mock::MockDriver;
    use crate::driver::sqlite::SqliteConnection;

    fn setup() -> Connection {
        let native = SqliteConnection::open_in_memory().unwrap();
        let mut conn = Connection::from_driver(Box::new(native), Arc::new(ConnectionConfig::default()));
        conn.execute(
            "CREATE TABLE people (id INTEGER PRIMARY KEY, name TEXT, email TEXT, age INTEGER)",
            &[],
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_insert_multi_heterogeneous_rows() {
        let mut conn = setup();
        let rows = vec![
            json!({"name": "alice", "age": 30}),
            json!({"name": "bob", "email": "bob@example.com"}),
        ];

        let keys = conn.insert_multi("people", &rows, &SqlOptions::default()).unwrap();
        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].first_key(), Some(&json!(1)));
        assert_eq!(keys[1].first_key(), Some(&json!(2)));

        let bob = conn
            .find_by_keys("people", &json!({"name": "bob"}), &SqlOptions::default())
            .unwrap();
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0]["email"], json!("bob@example.com"));
        assert_eq!(bob[0]["age"], Value::Null);
    }

    #[test]
    fn test_insert_multi_runs_one_statement_per_row() {
        let driver = MockDriver::new();
        let mut conn = Connection::from_driver(driver.connection(), Arc::new(ConnectionConfig::default()));
        let rows = vec![json!({"id": 1, "v": "a"}), json!({"id": 2, "v": "b"})];

        let keys = conn.insert_multi("t", &rows, &SqlOptions::default()).unwrap();

        let insert = "INSERT INTO t (id, v) VALUES (?, ?)";
        let per_row = [
            format!("prepare({})", insert),
            format!("execute_update({})", insert),
            "generated_keys".to_string(),
            "close_result_set".to_string(),
            "close_statement".to_string(),
        ];
        let expected: Vec<String> = per_row.iter().chain(per_row.iter()).cloned().collect();
        assert_eq!(driver.journal(), expected);

        assert_eq!(keys.len(), 2);
        assert_eq!(keys[0].first_key(), Some(&json!(1)));
        assert_eq!(keys[1].first_key(), Some(&json!(2)));
    }

    #[test]
    fn test_insert_multi_rejects_non_object_before_running() {
        let driver = MockDriver::new();
        let mut conn = Connection::from_driver(driver.connection(), Arc::new(ConnectionConfig::default()));
        let rows = vec![json!({"name": "alice"}), json!(["not", "a", "map"])];

        let err = conn
            .insert_multi("people", &rows, &SqlOptions::default())
            .unwrap_err();
        assert!(matches!(err, ExecuteError::InvalidArgument(ref r) if r.contains("row 1")));
        assert!(driver.journal().is_empty());
    }

    #[test]
    fn test_insert_multi_empty_input() {
        let mut conn = setup();
        let keys = conn.insert_multi("people", &[], &SqlOptions::default()).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn test_update_and_delete() {
        let mut conn = setup();
        let options = SqlOptions::default();
        conn.insert("people", &json!({"name": "alice", "age": 30}), &options)
            .unwrap();
        conn.insert("people", &json!({"name": "bob", "age": 30}), &options)
            .unwrap();

        let updated = conn
            .update("people", &json!({"age": 31}), &json!({"name": "alice"}), &options)
            .unwrap();
        assert_eq!(updated, 1);

        let thirty = conn.find_by_keys("people", &json!({"age": 30}), &options).unwrap();
        assert_eq!(thirty.len(), 1);
        assert_eq!(thirty[0]["name"], json!("bob"));

        let deleted = conn.delete("people", &json!({"age": 31}), &options).unwrap();
        assert_eq!(deleted, 1);
    }

    #[test]
    fn test_empty_where_is_invalid() {
        let mut conn = setup();
        let err = conn
            .delete("people", &json!({}), &SqlOptions::default())
            .unwrap_err();
        assert!(matches!(err, ExecuteError::InvalidArgument(_)));
    }

    #[test]
    fn test_insert_inside_transaction_rolls_back() {
        let mut conn = setup();
        let options = SqlOptions::default();

        let result: ExecuteResult<()> = conn.atomic(|conn| {
            conn.insert("people", &json!({"name": "ghost"}), &options)?;
            Err(ExecuteError::InvalidArgument("abort".into()))
        });
        assert!(result.is_err());

        let ghosts = conn
            .find_by_keys("people", &json!({"name": "ghost"}), &options)
            .unwrap();
        assert!(ghosts.is_empty());
    }
}
