//! Statement execution
//!
//! Runs sanitized statements against the live database, one at a time and
//! in the order received. Nothing raises past this boundary: every
//! database error is captured as a per-statement `Failed` outcome and the
//! batch continues. CREATE TABLE statements targeting an existing table
//! are skipped rather than executed, and simple string-literal equality
//! predicates are rewritten to compare case-insensitively so that
//! natural-language casing still matches stored data.

use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::types::ValueRef;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, warn};

lazy_static! {
    static ref CREATE_TABLE: Regex =
        Regex::new(r#"(?i)^\s*CREATE\s+TABLE\s+["'`]?(\w+)"#).unwrap();

    /// Only the simple `column = 'literal'` shape after WHERE is rewritten;
    /// anything more complex passes through untouched.
    static ref WHERE_STRING_EQUALITY: Regex =
        Regex::new(r"(?i)(WHERE\s+)(\w+)(\s*=\s*)'([^']*)'").unwrap();
}

/// Outcome of one statement. Execution never reports anything else.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum StatementOutcome {
    /// Statement produced a result set
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    /// Statement executed and the transaction was committed
    Committed,
    /// Statement was not executed (benign)
    Skipped(String),
    /// The database rejected the statement
    Failed(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementExecution {
    pub statement: String,
    pub outcome: StatementOutcome,
}

impl fmt::Display for StatementOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementOutcome::Rows { rows, .. } => {
                writeln!(f, "{} row(s):", rows.len())?;
                for row in rows {
                    writeln!(f, "  ({})", row.join(", "))?;
                }
                Ok(())
            }
            StatementOutcome::Committed => writeln!(f, "Statement executed successfully."),
            StatementOutcome::Skipped(reason) => writeln!(f, "Skipped: {}", reason),
            StatementOutcome::Failed(message) => writeln!(f, "Failed: {}", message),
        }
    }
}

pub struct SqlExecutor<'a> {
    conn: &'a Connection,
}

impl<'a> SqlExecutor<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Execute a batch of statements sequentially, reporting one outcome
    /// per statement. One bad statement never aborts the batch.
    pub fn execute_batch(&self, statements: &[String]) -> Vec<StatementExecution> {
        statements
            .iter()
            .map(|statement| StatementExecution {
                statement: statement.clone(),
                outcome: self.execute_one(statement),
            })
            .collect()
    }

    fn execute_one(&self, statement: &str) -> StatementOutcome {
        if let Some(table) = create_table_target(statement) {
            match self.table_exists(&table) {
                Ok(true) => {
                    info!(table = %table, "Table already exists, skipping CREATE TABLE");
                    return StatementOutcome::Skipped(format!(
                        "table '{}' already exists",
                        table
                    ));
                }
                Ok(false) => {}
                Err(e) => return StatementOutcome::Failed(e.to_string()),
            }
        }

        let statement = rewrite_case_insensitive(statement);

        if !statement.trim().ends_with(';') {
            return StatementOutcome::Skipped("missing statement terminator".to_string());
        }
        let statement = statement.trim();

        info!("Executing: {}", statement);
        match self.run(statement) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Statement failed: {}", e);
                StatementOutcome::Failed(e.to_string())
            }
        }
    }

    fn run(&self, statement: &str) -> rusqlite::Result<StatementOutcome> {
        let mut prepared = self.conn.prepare(statement)?;

        if prepared.column_count() == 0 {
            prepared.execute([])?;
            return Ok(StatementOutcome::Committed);
        }

        let columns: Vec<String> = prepared
            .column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();

        let mut rows = Vec::new();
        let mut result = prepared.query([])?;
        while let Some(row) = result.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for index in 0..columns.len() {
                values.push(render_value(row.get_ref(index)?));
            }
            rows.push(values);
        }

        Ok(StatementOutcome::Rows { columns, rows })
    }

    fn table_exists(&self, table: &str) -> rusqlite::Result<bool> {
        let mut stmt = self
            .conn
            .prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1")?;
        stmt.exists([table])
    }
}

/// Table name targeted by a CREATE TABLE statement, if any.
pub fn create_table_target(statement: &str) -> Option<String> {
    CREATE_TABLE
        .captures(statement)
        .map(|captures| captures[1].to_string())
}

/// Rewrite `WHERE column = 'literal'` to compare case-insensitively.
pub fn rewrite_case_insensitive(statement: &str) -> String {
    WHERE_STRING_EQUALITY
        .replace_all(statement, "${1}LOWER(${2})${3}LOWER('${4}')")
        .into_owned()
}

fn render_value(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(r) => r.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(_) => "[blob]".to_string(),
    }
}
