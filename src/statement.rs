//! Parameterized SQL statement construction.
//!
//! Converts field maps of loosely typed [`serde_json::Value`]s into
//! positional-placeholder statements plus storage-safe scalar arguments.
//! Values the SQLite binding layer cannot represent are dropped from the
//! statement and reported back to the caller instead of failing the write.

use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::SqliteArguments;
use sqlx::Sqlite;

/// A scalar argument SQLite can bind directly.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SqlArg {
    /// Bind this argument onto a sqlx query.
    pub fn bind_to<'q>(
        &self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        match self {
            SqlArg::Null => query.bind(None::<String>),
            SqlArg::Integer(v) => query.bind(*v),
            SqlArg::Real(v) => query.bind(*v),
            SqlArg::Text(v) => query.bind(v.clone()),
        }
    }
}

/// A built statement: positional-`?` SQL, its arguments, and the names of
/// any fields whose values could not be converted and were left out.
#[derive(Debug, Clone)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<SqlArg>,
    pub dropped: Vec<String>,
}

/// Column/argument lists produced from a field map, plus the dropped names.
#[derive(Debug, Clone)]
pub struct BoundFields {
    pub columns: Vec<String>,
    pub args: Vec<SqlArg>,
    pub dropped: Vec<String>,
}

/// Convert one value into a bindable scalar.
///
/// Strings and numbers pass through; booleans become 0/1; objects are
/// serialized to JSON text; null stays null. Arrays have no binding form in
/// SQLite and return `None`, which routes them to the dropped channel.
pub fn to_arg(value: &Value) -> Option<SqlArg> {
    match value {
        Value::Null => Some(SqlArg::Null),
        Value::Bool(b) => Some(SqlArg::Integer(i64::from(*b))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(SqlArg::Integer(i))
            } else {
                n.as_f64().map(SqlArg::Real)
            }
        }
        Value::String(s) => Some(SqlArg::Text(s.clone())),
        Value::Object(_) => serde_json::to_string(value).ok().map(SqlArg::Text),
        Value::Array(_) => None,
    }
}

/// Split a field map into bound columns/arguments and dropped names.
pub fn bind_fields(fields: &serde_json::Map<String, Value>) -> BoundFields {
    let mut columns = Vec::new();
    let mut args = Vec::new();
    let mut dropped = Vec::new();

    for (name, value) in fields {
        match to_arg(value) {
            Some(arg) => {
                columns.push(name.clone());
                args.push(arg);
            }
            None => dropped.push(name.clone()),
        }
    }

    BoundFields {
        columns,
        args,
        dropped,
    }
}

/// Build a full INSERT statement from a field map.
///
/// Invalid fields are excluded from the column list rather than failing the
/// whole statement; the caller decides how to react to `dropped`.
pub fn insert_into(table: &str, fields: &serde_json::Map<String, Value>) -> Statement {
    let bound = bind_fields(fields);
    let placeholders = vec!["?"; bound.columns.len()].join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        bound.columns.join(", "),
        placeholders
    );

    Statement {
        sql,
        args: bound.args,
        dropped: bound.dropped,
    }
}

/// Build a full UPDATE statement from a field map and a raw condition
/// clause. The condition is caller-supplied text; any `?` placeholders in
/// it are bound by appending to `args` after construction.
pub fn update(
    table: &str,
    fields: &serde_json::Map<String, Value>,
    where_clause: &str,
) -> Statement {
    let bound = bind_fields(fields);
    let assignments = bound
        .columns
        .iter()
        .map(|c| format!("{} = ?", c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("UPDATE {} SET {} WHERE {}", table, assignments, where_clause);

    Statement {
        sql,
        args: bound.args,
        dropped: bound.dropped,
    }
}

/// Interleave literal query fragments with values, producing a
/// positional-placeholder statement.
///
/// `fragments` must have exactly one more element than `values`. A value
/// that cannot be converted is dropped together with its placeholder and
/// reported by position.
pub fn format_query(fragments: &[&str], values: &[Value]) -> Statement {
    debug_assert_eq!(fragments.len(), values.len() + 1);

    let mut sql = String::new();
    let mut args = Vec::new();
    let mut dropped = Vec::new();

    for (i, fragment) in fragments.iter().enumerate() {
        sql.push_str(fragment);
        if let Some(value) = values.get(i) {
            match to_arg(value) {
                Some(arg) => {
                    sql.push('?');
                    args.push(arg);
                }
                None => dropped.push(format!("${}", i)),
            }
        }
    }

    Statement { sql, args, dropped }
}
