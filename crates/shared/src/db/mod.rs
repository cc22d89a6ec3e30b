mod schema;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, Statement};
use rusqlite::types::Value as SqlValue;

pub use schema::BUILTIN_SEED;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Handle on the SQLite database the exercises work against.
#[derive(Clone, Debug)]
pub struct Db {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

/// Column names plus raw values of a result set.
#[derive(Debug, Clone, PartialEq)]
pub struct Rows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// What a single statement produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The statement yields columns (`SELECT`, `WITH`, `PRAGMA`, `... RETURNING`).
    Rows(Rows),
    Affected(usize),
}

// Core DB methods
impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("Failed to open database {}", path.display()))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;

        tracing::debug!(path = %path.display(), "opened database");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| anyhow::anyhow!("Lock error: {}", e))
    }

    pub fn select(&self, sql: &str) -> Result<Rows> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        Ok(collect_rows(&mut stmt)?)
    }

    /// Runs one statement, reading rows back whenever it has result columns.
    pub fn run(&self, sql: &str) -> Result<Outcome> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;

        if stmt.column_count() > 0 {
            Ok(Outcome::Rows(collect_rows(&mut stmt)?))
        } else {
            Ok(Outcome::Affected(stmt.execute([])?))
        }
    }

    /// Runs every `;`-separated statement of `script` in one transaction.
    ///
    /// Returns the number of statements executed. Nothing is committed if any
    /// statement fails.
    pub fn execute_script(&self, script: &str) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut executed = 0;

        for statement in split_statements(script) {
            let preview: String = statement.chars().take(70).collect();
            tracing::info!("Executing SQL command: {}...", preview);
            tx.execute(statement, [])
                .with_context(|| format!("SQLite error in: {}", preview))?;
            executed += 1;
        }

        tx.commit()?;
        Ok(executed)
    }

    /// First `limit` rows of `table`.
    pub fn preview(&self, table: &str, limit: usize) -> Result<Rows> {
        if !IDENTIFIER.is_match(table) {
            anyhow::bail!("'{}' is not a valid table name", table);
        }
        self.select(&format!("SELECT * FROM {} LIMIT {}", table, limit))
    }
}

impl Rows {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// The single value of a one-row, one-column result.
    pub fn scalar(&self) -> Option<&SqlValue> {
        match self.rows.as_slice() {
            [row] if row.len() == 1 => row.first(),
            _ => None,
        }
    }

    /// Rows as `(a, 'b')` tuples joined by `, `.
    pub fn to_tuples(&self) -> String {
        self.rows
            .iter()
            .map(|row| {
                let cells: Vec<String> = row.iter().map(quoted).collect();
                format!("({})", cells.join(", "))
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn to_markdown(&self) -> String {
        let mut output = String::new();
        output.push_str(&format!("| {} |\n", self.columns.join(" | ")));
        output.push_str(&format!("|{}\n", "---|".repeat(self.columns.len())));
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(plain).collect();
            output.push_str(&format!("| {} |\n", cells.join(" | ")));
        }
        output
    }
}

fn collect_rows(stmt: &mut Statement<'_>) -> rusqlite::Result<Rows> {
    let columns: Vec<String> = stmt
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let width = columns.len();

    let rows = stmt
        .query_map([], |row| {
            (0..width)
                .map(|i| row.get::<_, SqlValue>(i))
                .collect::<rusqlite::Result<Vec<_>>>()
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(Rows { columns, rows })
}

/// Unquoted rendering of a value.
pub fn plain(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "NULL".to_string(),
        SqlValue::Integer(n) => n.to_string(),
        SqlValue::Real(f) => f.to_string(),
        SqlValue::Text(s) => s.clone(),
        SqlValue::Blob(b) => format!("<blob:{} bytes>", b.len()),
    }
}

fn quoted(value: &SqlValue) -> String {
    match value {
        SqlValue::Text(s) => format!("'{}'", s),
        other => plain(other),
    }
}

pub fn split_statements(script: &str) -> impl Iterator<Item = &str> {
    script.split(';').map(str::trim).filter(|s| !s.is_empty())
}
