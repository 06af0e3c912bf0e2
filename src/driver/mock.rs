//! Scripted driver recording every call, for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use super::{
    ColumnMeta, Driver, DriverConnection, DriverError, DriverResult, DriverResultSet,
    DriverStatement, PrepareOptions,
};
use crate::db::DbSpec;
use crate::transaction::IsolationLevel;
use crate::types::SqlValue;

#[derive(Default)]
struct MockState {
    journal: Vec<String>,
    results: HashMap<String, (Vec<ColumnMeta>, Vec<Vec<SqlValue>>)>,
    keys_supported: bool,
    fail_fragment: Option<String>,
    column_reads: usize,
    next_key: i64,
}

impl MockState {
    fn record(&mut self, entry: impl Into<String>) {
        self.journal.push(entry.into());
    }
}

/// A driver whose calls are journaled and whose query results are scripted.
#[derive(Clone)]
pub(crate) struct MockDriver {
    state: Arc<Mutex<MockState>>,
}

impl MockDriver {
    pub(crate) fn new() -> Self {
        let state = MockState {
            keys_supported: true,
            next_key: 1,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// A driver that fails with `Unsupported` when generated keys are read.
    pub(crate) fn without_generated_keys() -> Self {
        let driver = Self::new();
        driver.state.lock().keys_supported = false;
        driver
    }

    /// Script the result of a query.
    pub(crate) fn with_result(
        self,
        sql: &str,
        columns: &[&str],
        rows: Vec<Vec<SqlValue>>,
    ) -> Self {
        let columns = columns.iter().map(|c| ColumnMeta::new(*c, None)).collect();
        self.state.lock().results.insert(sql.to_string(), (columns, rows));
        self
    }

    /// Make every execution whose SQL contains `fragment` fail.
    pub(crate) fn failing_on(self, fragment: &str) -> Self {
        self.state.lock().fail_fragment = Some(fragment.to_string());
        self
    }

    pub(crate) fn connection(&self) -> Box<dyn DriverConnection> {
        Box::new(MockConnection {
            state: self.state.clone(),
            auto_commit: true,
            isolation: IsolationLevel::ReadCommitted,
            read_only: false,
            closed: false,
        })
    }

    pub(crate) fn journal(&self) -> Vec<String> {
        self.state.lock().journal.clone()
    }

    /// Journal entries that change transaction state.
    pub(crate) fn tx_journal(&self) -> Vec<String> {
        self.journal()
            .into_iter()
            .filter(|e| {
                e.starts_with("set_auto_commit")
                    || e.starts_with("savepoint")
                    || e.starts_with("release")
                    || e.starts_with("rollback")
                    || e == "commit"
            })
            .collect()
    }

    pub(crate) fn count(&self, entry: &str) -> usize {
        self.state.lock().journal.iter().filter(|e| *e == entry).count()
    }

    pub(crate) fn column_reads(&self) -> usize {
        self.state.lock().column_reads
    }
}

impl Driver for MockDriver {
    fn vendor(&self) -> &str {
        "mock"
    }

    fn connect(&self, _spec: &DbSpec) -> DriverResult<Box<dyn DriverConnection>> {
        self.state.lock().record("connect");
        Ok(self.connection())
    }
}

struct MockConnection {
    state: Arc<Mutex<MockState>>,
    auto_commit: bool,
    isolation: IsolationLevel,
    read_only: bool,
    closed: bool,
}

impl MockConnection {
    fn record(&self, entry: impl Into<String>) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::Closed("connection"));
        }
        self.state.lock().record(entry);
        Ok(())
    }
}

impl DriverConnection for MockConnection {
    fn prepare(
        &mut self,
        sql: &str,
        options: &PrepareOptions,
    ) -> DriverResult<Box<dyn DriverStatement>> {
        self.record(format!("prepare({})", sql))?;
        Ok(Box::new(MockStatement {
            state: self.state.clone(),
            sql: sql.to_string(),
            options: options.clone(),
            bound: Vec::new(),
            batch: Vec::new(),
            executed_rows: 0,
        }))
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()> {
        self.record(format!("set_auto_commit({})", auto_commit))?;
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn set_isolation(&mut self, level: IsolationLevel) -> DriverResult<()> {
        self.record(format!("set_isolation({})", level))?;
        self.isolation = level;
        Ok(())
    }

    fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    fn set_read_only(&mut self, read_only: bool) -> DriverResult<()> {
        self.record(format!("set_read_only({})", read_only))?;
        self.read_only = read_only;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn set_savepoint(&mut self, name: &str) -> DriverResult<()> {
        self.record(format!("savepoint({})", name))
    }

    fn release_savepoint(&mut self, name: &str) -> DriverResult<()> {
        self.record(format!("release({})", name))
    }

    fn rollback(&mut self, savepoint: Option<&str>) -> DriverResult<()> {
        match savepoint {
            Some(name) => self.record(format!("rollback({})", name)),
            None => self.record("rollback"),
        }
    }

    fn commit(&mut self) -> DriverResult<()> {
        self.record("commit")
    }

    fn close(&mut self) -> DriverResult<()> {
        if !self.closed {
            self.state.lock().record("close");
            self.closed = true;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

struct MockStatement {
    state: Arc<Mutex<MockState>>,
    sql: String,
    options: PrepareOptions,
    bound: Vec<SqlValue>,
    batch: Vec<Vec<SqlValue>>,
    executed_rows: usize,
}

impl MockStatement {
    fn check_failure(&self) -> DriverResult<()> {
        let state = self.state.lock();
        match &state.fail_fragment {
            Some(fragment) if self.sql.contains(fragment.as_str()) => Err(DriverError::Sql {
                code: 1,
                message: format!("mock failure executing {}", self.sql),
            }),
            _ => Ok(()),
        }
    }
}

impl DriverStatement for MockStatement {
    fn bind(&mut self, index: usize, value: SqlValue) -> DriverResult<()> {
        if self.bound.len() < index {
            self.bound.resize(index, SqlValue::Null);
        }
        self.bound[index - 1] = value;
        Ok(())
    }

    fn add_batch(&mut self) -> DriverResult<()> {
        self.batch.push(std::mem::take(&mut self.bound));
        Ok(())
    }

    fn execute_query(&mut self) -> DriverResult<Box<dyn DriverResultSet>> {
        self.state.lock().record(format!("execute_query({})", self.sql));
        self.check_failure()?;
        let (columns, rows) = self
            .state
            .lock()
            .results
            .get(&self.sql)
            .cloned()
            .unwrap_or_default();
        Ok(Box::new(MockResultSet {
            state: self.state.clone(),
            columns,
            rows: rows.into(),
            current: None,
        }))
    }

    fn execute_update(&mut self) -> DriverResult<u64> {
        self.state.lock().record(format!("execute_update({})", self.sql));
        self.check_failure()?;
        self.executed_rows = 1;
        Ok(1)
    }

    fn execute_batch(&mut self) -> DriverResult<Vec<u64>> {
        let groups = std::mem::take(&mut self.batch);
        self.state.lock().record(format!("execute_batch({})", groups.len()));
        self.check_failure()?;
        self.executed_rows = groups.len();
        Ok(vec![1; groups.len()])
    }

    fn generated_keys(&mut self) -> DriverResult<Box<dyn DriverResultSet>> {
        let mut state = self.state.lock();
        state.record("generated_keys");
        if !state.keys_supported || !self.options.return_keys {
            return Err(DriverError::unsupported("generated keys"));
        }
        let mut rows = VecDeque::new();
        for _ in 0..self.executed_rows {
            rows.push_back(vec![SqlValue::Integer(state.next_key)]);
            state.next_key += 1;
        }
        Ok(Box::new(MockResultSet {
            state: self.state.clone(),
            columns: vec![ColumnMeta::new("ID", None)],
            rows,
            current: None,
        }))
    }

    fn close(&mut self) -> DriverResult<()> {
        self.state.lock().record("close_statement");
        Ok(())
    }
}

struct MockResultSet {
    state: Arc<Mutex<MockState>>,
    columns: Vec<ColumnMeta>,
    rows: VecDeque<Vec<SqlValue>>,
    current: Option<Vec<SqlValue>>,
}

impl DriverResultSet for MockResultSet {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn next(&mut self) -> DriverResult<bool> {
        self.current = self.rows.pop_front();
        Ok(self.current.is_some())
    }

    fn get(&mut self, index: usize) -> DriverResult<SqlValue> {
        self.state.lock().column_reads += 1;
        let row = self.current.as_ref().ok_or(DriverError::NoCurrentRow)?;
        row.get(index - 1)
            .cloned()
            .ok_or(DriverError::ColumnOutOfRange {
                index,
                count: row.len(),
            })
    }

    fn close(&mut self) -> DriverResult<()> {
        self.state.lock().record("close_result_set");
        Ok(())
    }
}
