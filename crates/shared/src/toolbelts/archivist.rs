// crates/shared/src/toolbelts/archivist.rs
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::db::{plain, Db, Outcome};
use crate::register_toolbelt;

pub const RESULT_FILE: &str = "db_result.txt";

static CODE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```sql|```").expect("fence pattern is valid"));
static SQL_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)SQL:\s*(SELECT.*)").expect("prefix pattern is valid"));

/// SQL access plus a small file area next to the database.
pub struct Archivist {
    db: Db,
    output_dir: PathBuf,
}

impl Archivist {
    pub fn new(db: Db, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            output_dir: output_dir.into(),
        }
    }
}

register_toolbelt! {
    Archivist {
        name: "Archivist",
        description: "Runs SQL against the exercise database and reads or writes result files",
        tools: {
            "run_sql" => run_sql {
                description: "Executes a SQL query and returns the results. Input should be a complete and valid SQL query string (e.g. 'SELECT * FROM users;').",
                params: ["query": "string" => "SQL query to execute"]
            },
            "write_query_result" => write_query_result {
                description: "Executes a SELECT query and writes the result to 'db_result.txt' in the output directory. The input MUST be the query prefixed with 'SQL:', e.g. 'SQL: SELECT COUNT(*) FROM users;'. Creates the file if it does not exist.",
                params: ["input": "string" => "'SQL:' followed by the SELECT query"]
            },
            "read_file" => read_file {
                description: "Reads the contents of a file in the output directory. Input should be the exact file name (e.g. 'db_result.txt').",
                params: ["file_name": "string" => "Name of the file to read"]
            },
        }
    }
}

impl Archivist {
    async fn run_sql(&self, args: &Value) -> Result<String> {
        let query = args["query"].as_str().unwrap_or("");
        if query.trim().is_empty() {
            return Ok("Error: query cannot be empty".to_string());
        }

        Ok(self.run_sql_text(query))
    }

    async fn write_query_result(&self, args: &Value) -> Result<String> {
        let input = args["input"].as_str().unwrap_or("");

        let Some(query) = extract_prefixed_query(input) else {
            return Ok("Error: Input to write_query_result must start with 'SQL:' followed by the query.".to_string());
        };

        let result = self.run_sql_text(query);
        match self.write_result_file(&format!("The result of the query is: {}", result)) {
            Ok(path) => Ok(format!(
                "Query result successfully written to {}. Result: {}",
                path.display(),
                result
            )),
            Err(e) => Ok(format!("Failed to write query result: {:#}", e)),
        }
    }

    async fn read_file(&self, args: &Value) -> Result<String> {
        let file_name = args["file_name"].as_str().unwrap_or("").trim();
        if file_name.is_empty() {
            return Ok("Error: file_name cannot be empty".to_string());
        }

        let Some(path) = self.resolve(file_name) else {
            return Ok(format!(
                "Error: '{}' must be a relative path inside the output directory.",
                file_name
            ));
        };

        if !path.exists() {
            return Ok(format!(
                "Error: The file '{}' does not exist at '{}'.",
                file_name,
                path.display()
            ));
        }

        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(contents),
            Err(e) => Ok(format!("Error reading file: {}", e)),
        }
    }

    /// Runs `query` and renders the outcome the way the agent sees it.
    pub fn run_sql_text(&self, query: &str) -> String {
        let query = clean_sql(query);

        match self.db.run(&query) {
            Ok(Outcome::Rows(rows)) if rows.is_empty() => {
                "No results found for the query.".to_string()
            }
            Ok(Outcome::Rows(rows)) => match rows.scalar() {
                Some(value) => plain(value),
                None => rows.to_tuples(),
            },
            Ok(Outcome::Affected(affected)) => format!(
                "Query executed successfully. Result: {} row(s) affected",
                affected
            ),
            Err(e) => format!("SQL execution error: {} for query: {}", e, query),
        }
    }

    /// Writes `contents` to the result file, creating the output directory first.
    pub fn write_result_file(&self, contents: &str) -> Result<PathBuf> {
        write_result(&self.output_dir, contents)
    }

    fn resolve(&self, file_name: &str) -> Option<PathBuf> {
        let relative = Path::new(file_name);
        let inside = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));

        inside.then(|| self.output_dir.join(relative))
    }
}

/// Writes `contents` to `db_result.txt` in `output_dir`, creating the directory first.
pub fn write_result(output_dir: &Path, contents: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Could not create {}", output_dir.display()))?;

    let path = output_dir.join(RESULT_FILE);
    std::fs::write(&path, contents)
        .with_context(|| format!("Could not write {}", path.display()))?;

    tracing::info!(path = %path.display(), "wrote query result");
    Ok(path)
}

/// Strips Markdown code fences and surrounding whitespace.
pub fn clean_sql(query: &str) -> String {
    CODE_FENCE.replace_all(query, "").trim().to_string()
}

/// The `SELECT ...` that follows an `SQL:` marker, if any.
pub fn extract_prefixed_query(input: &str) -> Option<&str> {
    SQL_PREFIX
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}
