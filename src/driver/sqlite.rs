//! SQLite binding built on rusqlite.
//!
//! The native handle is shared between a connection and the statements it
//! prepared, so a statement can execute without borrowing its connection.
//! Auto-commit follows the usual driver convention: turning it off issues
//! `BEGIN`, and `commit`/`rollback` immediately open the next transaction
//! until auto-commit is turned back on.
//!
//! Query results are read into memory when the query executes, up to
//! `max_rows` when it is set. Coercion of the buffered values still happens
//! row by row in the cursor.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::params_from_iter;
use rusqlite::types::Value as NativeValue;
use tracing::{debug, trace};

use super::{
    ColumnMeta, Driver, DriverConnection, DriverError, DriverResult, DriverResultSet,
    DriverStatement, PrepareOptions,
};
use crate::db::DbSpec;
use crate::transaction::IsolationLevel;
use crate::types::SqlValue;

/// Database name that selects a private in-memory database.
pub const MEMORY: &str = ":memory:";

/// Label of the generated-keys column.
pub const GENERATED_KEY_LABEL: &str = "last_insert_rowid()";

type Handle = Arc<Mutex<rusqlite::Connection>>;

/// Driver for the `sqlite` vendor.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDriver;

impl Driver for SqliteDriver {
    fn vendor(&self) -> &str {
        "sqlite"
    }

    fn connect(&self, spec: &DbSpec) -> DriverResult<Box<dyn DriverConnection>> {
        let conn = if spec.name.is_empty() || spec.name == MEMORY {
            SqliteConnection::open_in_memory()?
        } else {
            SqliteConnection::open(&spec.name)?
        };
        Ok(Box::new(conn))
    }
}

/// An open SQLite session.
pub struct SqliteConnection {
    handle: Option<Handle>,
    auto_commit: bool,
    isolation: IsolationLevel,
    read_only: bool,
}

impl SqliteConnection {
    pub fn open_in_memory() -> DriverResult<Self> {
        Ok(Self::from_native(rusqlite::Connection::open_in_memory()?))
    }

    pub fn open(path: impl AsRef<Path>) -> DriverResult<Self> {
        debug!(path = %path.as_ref().display(), "opening sqlite database");
        Ok(Self::from_native(rusqlite::Connection::open(path)?))
    }

    /// Wrap an already opened rusqlite connection.
    pub fn from_native(conn: rusqlite::Connection) -> Self {
        Self {
            handle: Some(Arc::new(Mutex::new(conn))),
            auto_commit: true,
            isolation: IsolationLevel::Serializable,
            read_only: false,
        }
    }

    fn handle(&self) -> DriverResult<&Handle> {
        self.handle.as_ref().ok_or(DriverError::Closed("connection"))
    }

    fn exec(&self, sql: &str) -> DriverResult<()> {
        trace!(sql, "sqlite command");
        self.handle()?.lock().execute_batch(sql)?;
        Ok(())
    }

    fn require_transaction(&self, op: &str) -> DriverResult<()> {
        if self.auto_commit {
            return Err(DriverError::Sql {
                code: -1,
                message: format!("cannot {} in auto-commit mode", op),
            });
        }
        Ok(())
    }
}

impl DriverConnection for SqliteConnection {
    fn prepare(
        &mut self,
        sql: &str,
        options: &PrepareOptions,
    ) -> DriverResult<Box<dyn DriverStatement>> {
        let handle = self.handle()?.clone();
        {
            let conn = handle.lock();
            if let Some(timeout) = options.query_timeout {
                conn.busy_timeout(timeout)?;
            }
            // Surface syntax errors at prepare time.
            conn.prepare_cached(sql)?;
        }
        Ok(Box::new(SqliteStatement {
            handle,
            sql: sql.to_string(),
            options: options.clone(),
            bound: Vec::new(),
            batch: Vec::new(),
            keys: Vec::new(),
            closed: false,
        }))
    }

    fn set_auto_commit(&mut self, auto_commit: bool) -> DriverResult<()> {
        if auto_commit == self.auto_commit {
            return Ok(());
        }
        self.exec(if auto_commit { "COMMIT" } else { "BEGIN" })?;
        self.auto_commit = auto_commit;
        Ok(())
    }

    fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    fn set_isolation(&mut self, level: IsolationLevel) -> DriverResult<()> {
        match level {
            IsolationLevel::ReadUncommitted => self.exec("PRAGMA read_uncommitted = 1")?,
            IsolationLevel::Serializable => self.exec("PRAGMA read_uncommitted = 0")?,
            other => {
                return Err(DriverError::unsupported(format!("isolation level {}", other)));
            }
        }
        self.isolation = level;
        Ok(())
    }

    fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    fn set_read_only(&mut self, read_only: bool) -> DriverResult<()> {
        self.exec(if read_only {
            "PRAGMA query_only = ON"
        } else {
            "PRAGMA query_only = OFF"
        })?;
        self.read_only = read_only;
        Ok(())
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn set_savepoint(&mut self, name: &str) -> DriverResult<()> {
        self.require_transaction("set a savepoint")?;
        self.exec(&format!("SAVEPOINT {}", quote_name(name)))
    }

    fn release_savepoint(&mut self, name: &str) -> DriverResult<()> {
        self.require_transaction("release a savepoint")?;
        self.exec(&format!("RELEASE SAVEPOINT {}", quote_name(name)))
    }

    fn rollback(&mut self, savepoint: Option<&str>) -> DriverResult<()> {
        self.require_transaction("roll back")?;
        match savepoint {
            Some(name) => self.exec(&format!("ROLLBACK TO SAVEPOINT {}", quote_name(name))),
            None => self.exec("ROLLBACK; BEGIN"),
        }
    }

    fn commit(&mut self) -> DriverResult<()> {
        self.require_transaction("commit")?;
        self.exec("COMMIT; BEGIN")
    }

    fn close(&mut self) -> DriverResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        // Statements still holding the handle keep the database open until
        // they are dropped; closing here only happens for the last owner.
        match Arc::try_unwrap(handle) {
            Ok(mutex) => mutex.into_inner().close().map_err(|(_, e)| e.into()),
            Err(_) => Ok(()),
        }
    }

    fn is_closed(&self) -> bool {
        self.handle.is_none()
    }
}

/// A prepared SQLite statement.
///
/// Parameters are held on the binding side and applied at execution, so a
/// statement can be re-executed with new bindings and batched.
pub struct SqliteStatement {
    handle: Handle,
    sql: String,
    options: PrepareOptions,
    bound: Vec<NativeValue>,
    batch: Vec<Vec<NativeValue>>,
    keys: Vec<i64>,
    closed: bool,
}

impl SqliteStatement {
    fn ensure_open(&self) -> DriverResult<()> {
        if self.closed {
            return Err(DriverError::Closed("statement"));
        }
        Ok(())
    }
}

impl DriverStatement for SqliteStatement {
    fn bind(&mut self, index: usize, value: SqlValue) -> DriverResult<()> {
        self.ensure_open()?;
        if index == 0 {
            return Err(DriverError::InvalidParameter(
                "parameter indexes start at 1".to_string(),
            ));
        }
        if self.bound.len() < index {
            self.bound.resize(index, NativeValue::Null);
        }
        self.bound[index - 1] = to_native(value);
        Ok(())
    }

    fn add_batch(&mut self) -> DriverResult<()> {
        self.ensure_open()?;
        self.batch.push(std::mem::take(&mut self.bound));
        Ok(())
    }

    fn execute_query(&mut self) -> DriverResult<Box<dyn DriverResultSet>> {
        self.ensure_open()?;
        let conn = self.handle.lock();
        let mut stmt = conn.prepare_cached(&self.sql)?;
        let columns: Vec<ColumnMeta> = stmt
            .columns()
            .iter()
            .map(|c| ColumnMeta::new(c.name(), c.decl_type()))
            .collect();

        let limit = self.options.max_rows.unwrap_or(u64::MAX);
        let mut buffered = VecDeque::new();
        let mut rows = stmt.query(params_from_iter(self.bound.iter()))?;
        while (buffered.len() as u64) < limit {
            let Some(row) = rows.next()? else {
                break;
            };
            let values = (0..columns.len())
                .map(|i| row.get::<_, NativeValue>(i))
                .collect::<Result<Vec<_>, _>>()?;
            buffered.push_back(values);
        }

        Ok(Box::new(SqliteResultSet::new(columns, buffered)))
    }

    fn execute_update(&mut self) -> DriverResult<u64> {
        self.ensure_open()?;
        let conn = self.handle.lock();
        let mut stmt = conn.prepare_cached(&self.sql)?;
        let before = conn.last_insert_rowid();
        let changed = stmt.execute(params_from_iter(self.bound.iter()))?;

        self.keys.clear();
        if self.options.return_keys {
            self.keys.extend(inserted_rowid(&conn, before, changed));
        }
        Ok(changed as u64)
    }

    fn execute_batch(&mut self) -> DriverResult<Vec<u64>> {
        self.ensure_open()?;
        let groups = std::mem::take(&mut self.batch);
        let conn = self.handle.lock();
        let mut stmt = conn.prepare_cached(&self.sql)?;

        self.keys.clear();
        let mut counts = Vec::with_capacity(groups.len());
        for group in &groups {
            let before = conn.last_insert_rowid();
            let changed = stmt.execute(params_from_iter(group.iter()))?;
            if self.options.return_keys {
                self.keys.extend(inserted_rowid(&conn, before, changed));
            }
            counts.push(changed as u64);
        }
        Ok(counts)
    }

    fn generated_keys(&mut self) -> DriverResult<Box<dyn DriverResultSet>> {
        self.ensure_open()?;
        if !self.options.return_keys {
            return Err(DriverError::unsupported(
                "generated keys were not requested when the statement was prepared",
            ));
        }
        let columns = vec![ColumnMeta::new(GENERATED_KEY_LABEL, Some("INTEGER"))];
        let rows = self
            .keys
            .iter()
            .map(|key| vec![NativeValue::Integer(*key)])
            .collect();
        Ok(Box::new(SqliteResultSet::new(columns, rows)))
    }

    fn close(&mut self) -> DriverResult<()> {
        self.closed = true;
        self.bound.clear();
        self.batch.clear();
        Ok(())
    }
}

/// Rows of one query, buffered by the binding.
pub struct SqliteResultSet {
    columns: Vec<ColumnMeta>,
    rows: VecDeque<Vec<NativeValue>>,
    current: Option<Vec<NativeValue>>,
    closed: bool,
}

impl SqliteResultSet {
    fn new(columns: Vec<ColumnMeta>, rows: VecDeque<Vec<NativeValue>>) -> Self {
        Self {
            columns,
            rows,
            current: None,
            closed: false,
        }
    }
}

impl DriverResultSet for SqliteResultSet {
    fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    fn next(&mut self) -> DriverResult<bool> {
        if self.closed {
            return Err(DriverError::Closed("result set"));
        }
        self.current = self.rows.pop_front();
        Ok(self.current.is_some())
    }

    fn get(&mut self, index: usize) -> DriverResult<SqlValue> {
        let row = self.current.as_ref().ok_or(DriverError::NoCurrentRow)?;
        if index == 0 || index > row.len() {
            return Err(DriverError::ColumnOutOfRange {
                index,
                count: row.len(),
            });
        }
        Ok(from_native(row[index - 1].clone()))
    }

    fn close(&mut self) -> DriverResult<()> {
        self.closed = true;
        self.rows.clear();
        self.current = None;
        Ok(())
    }
}

/// The rowid generated by the last execution, if it inserted a row.
///
/// UPDATE and DELETE leave `last_insert_rowid()` untouched, so a value
/// equal to the one read before executing is not a new key.
fn inserted_rowid(conn: &rusqlite::Connection, before: i64, changed: usize) -> Option<i64> {
    let after = conn.last_insert_rowid();
    (changed > 0 && after != before).then_some(after)
}

fn to_native(value: SqlValue) -> NativeValue {
    match value {
        SqlValue::Null => NativeValue::Null,
        SqlValue::Bool(b) => NativeValue::Integer(b as i64),
        SqlValue::Integer(i) => NativeValue::Integer(i),
        SqlValue::Real(r) => NativeValue::Real(r),
        SqlValue::Text(s) => NativeValue::Text(s),
        SqlValue::Blob(b) => NativeValue::Blob(b),
        SqlValue::Timestamp(ts) => NativeValue::Text(ts.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
    }
}

fn from_native(value: NativeValue) -> SqlValue {
    match value {
        NativeValue::Null => SqlValue::Null,
        NativeValue::Integer(i) => SqlValue::Integer(i),
        NativeValue::Real(r) => SqlValue::Real(r),
        NativeValue::Text(s) => SqlValue::Text(s),
        NativeValue::Blob(b) => SqlValue::Blob(b),
    }
}

fn quote_name(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
