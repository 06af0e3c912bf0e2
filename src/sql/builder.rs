//! Statements built from records.
//!
//! Each builder takes a table name and one or two JSON objects and returns
//! the SQL text with `?` placeholders plus its parameters in placeholder
//! order. Columns appear in the key order of the object.

use serde_json::{Map, Value};

use super::error::{BuildError, BuildResult};
use super::naming::SqlOptions;
use crate::types::Param;

/// SQL text with its ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlVec {
    pub sql: String,
    pub params: Vec<Param>,
}

impl SqlVec {
    pub fn new(sql: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

impl From<&str> for SqlVec {
    fn from(sql: &str) -> Self {
        Self::new(sql, Vec::new())
    }
}

impl From<String> for SqlVec {
    fn from(sql: String) -> Self {
        Self::new(sql, Vec::new())
    }
}

impl<S: Into<String>> From<(S, Vec<Param>)> for SqlVec {
    fn from((sql, params): (S, Vec<Param>)) -> Self {
        Self::new(sql, params)
    }
}

/// `INSERT INTO t (a, b) VALUES (?, ?)`
pub fn insert(table: &str, row: &Map<String, Value>, options: &SqlOptions) -> BuildResult<SqlVec> {
    check_table(table)?;
    if row.is_empty() {
        return Err(BuildError::invalid(format!(
            "cannot insert an empty row into {}",
            table
        )));
    }

    let columns: Vec<String> = row.keys().map(|k| options.column(k)).collect();
    let placeholders = vec!["?"; columns.len()];
    let params = row.values().map(|v| Param::from(v.clone())).collect();

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        options.table(table),
        columns.join(", "),
        placeholders.join(", ")
    );
    Ok(SqlVec::new(sql, params))
}

/// `UPDATE t SET a = ? WHERE b = ?`
pub fn update(
    table: &str,
    set: &Map<String, Value>,
    where_: &Map<String, Value>,
    options: &SqlOptions,
) -> BuildResult<SqlVec> {
    check_table(table)?;
    if set.is_empty() {
        return Err(BuildError::invalid(format!(
            "cannot update {} with an empty set of columns",
            table
        )));
    }

    let mut params = Vec::with_capacity(set.len() + where_.len());
    let assignments: Vec<String> = set
        .iter()
        .map(|(k, v)| {
            params.push(Param::from(v.clone()));
            format!("{} = ?", options.column(k))
        })
        .collect();
    let condition = where_clause(table, where_, options, &mut params)?;

    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        options.table(table),
        assignments.join(", "),
        condition
    );
    Ok(SqlVec::new(sql, params))
}

/// `DELETE FROM t WHERE a = ?`
pub fn delete(table: &str, where_: &Map<String, Value>, options: &SqlOptions) -> BuildResult<SqlVec> {
    check_table(table)?;
    let mut params = Vec::with_capacity(where_.len());
    let condition = where_clause(table, where_, options, &mut params)?;
    let sql = format!("DELETE FROM {} WHERE {}", options.table(table), condition);
    Ok(SqlVec::new(sql, params))
}

/// `SELECT * FROM t WHERE a = ?`
pub fn select_by_keys(
    table: &str,
    where_: &Map<String, Value>,
    options: &SqlOptions,
) -> BuildResult<SqlVec> {
    check_table(table)?;
    let mut params = Vec::with_capacity(where_.len());
    let condition = where_clause(table, where_, options, &mut params)?;
    let sql = format!("SELECT * FROM {} WHERE {}", options.table(table), condition);
    Ok(SqlVec::new(sql, params))
}

fn check_table(table: &str) -> BuildResult<()> {
    if table.trim().is_empty() {
        return Err(BuildError::invalid("table name is empty"));
    }
    Ok(())
}

/// Equality on every key, `IS NULL` for null values.
fn where_clause(
    table: &str,
    where_: &Map<String, Value>,
    options: &SqlOptions,
    params: &mut Vec<Param>,
) -> BuildResult<String> {
    if where_.is_empty() {
        return Err(BuildError::invalid(format!(
            "empty where clause for {}",
            table
        )));
    }

    let terms: Vec<String> = where_
        .iter()
        .map(|(k, v)| {
            let column = options.column(k);
            if v.is_null() {
                format!("{} IS NULL", column)
            } else {
                params.push(Param::from(v.clone()));
                format!("{} = ?", column)
            }
        })
        .collect();
    Ok(terms.join(" AND "))
}
