use std::borrow::Cow;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use regex::{Captures, Regex};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::config::{DatabaseBackend, DatabaseConfig};
use crate::query::{QueryFile, column_name};

/// Rows returned for one query, with columns in select order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    /// Unqualified column names.
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl ResultSet {
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedBackend {
    pub backend: &'static str,
}

impl Display for UnsupportedBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "the {} backend can't be queried in-process; export the tables to sqlite and set `type = sqlite`",
            self.backend
        )
    }
}

impl std::error::Error for UnsupportedBackend {}

pub fn open_read_only(path: &Path) -> Result<Connection> {
    Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open sqlite database: {}", path.display()))
}

pub fn execute_query_file(config: &DatabaseConfig, query: &QueryFile) -> Result<ResultSet> {
    match &config.backend {
        DatabaseBackend::Sqlite { db_path } => {
            let connection = open_read_only(db_path)?;
            execute_statement(&connection, &to_sqlite_dialect(&query.statement()))
        }
        DatabaseBackend::Mysql { .. } => Err(UnsupportedBackend {
            backend: config.backend.key(),
        }
        .into()),
    }
}

pub fn execute_statement(connection: &Connection, statement: &str) -> Result<ResultSet> {
    debug!(statement, "executing query");
    let mut prepared = connection
        .prepare(statement)
        .with_context(|| format!("failed to prepare query: {statement}"))?;
    let columns = prepared
        .column_names()
        .into_iter()
        .map(|name| column_name(name).to_string())
        .collect::<Vec<_>>();
    let width = columns.len();

    let rows = prepared
        .query_map([], |row| {
            let mut values = Vec::with_capacity(width);
            for index in 0..width {
                values.push(row.get::<usize, SqlValue>(index)?);
            }
            Ok(values)
        })
        .context("failed to execute query")?;

    let mut collected = Vec::new();
    for row in rows {
        collected.push(row.context("failed to decode query row")?);
    }
    debug!(rows = collected.len(), "query returned");

    Ok(ResultSet {
        columns,
        rows: collected,
    })
}

/// Generated statements quote study names with `"`, which sqlite may parse
/// as an identifier. Rewrites double-quoted literals to single-quoted ones;
/// single-quoted literals pass through untouched.
#[must_use]
pub fn to_sqlite_dialect(statement: &str) -> Cow<'_, str> {
    literal_regex().replace_all(statement, |captures: &Captures<'_>| {
        match captures.get(1) {
            Some(inner) => format!("'{}'", inner.as_str().replace('\'', "''")),
            None => captures[0].to_string(),
        }
    })
}

fn literal_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"'(?:[^']|'')*'|"([^"]*)""#).expect("sql literal regex should compile")
    })
}
