//! SQLite Engine - executes candidate SQL against Spider-style database files
//!
//! Databases live at `<database_dir>/<db_id>/<db_id>.sqlite`. Every call opens
//! its own read-only connection, which is released when it goes out of scope,
//! whichever path the call returns through. Every connection polls a shared
//! cancel flag, so `cancel` stops a statement from another thread mid-run.

use crate::error::{EvalError, Result};
use crate::execution::engine::SqlExecutor;
use crate::execution::result::{ExecutionOutcome, Row, Value};
use rusqlite::{params, Connection, OpenFlags};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// VM instructions between cancel-flag checks.
const CANCEL_CHECK_OPS: i32 = 1000;

pub struct SqliteExecutor {
    database_dir: PathBuf,
    cancelled: Arc<AtomicBool>,
}

impl SqliteExecutor {
    pub fn new(database_dir: impl Into<PathBuf>) -> Self {
        Self {
            database_dir: database_dir.into(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn database_path(&self, db_id: &str) -> PathBuf {
        self.database_dir.join(db_id).join(format!("{}.sqlite", db_id))
    }

    fn open(&self, db_id: &str) -> Result<Connection> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(EvalError::Execution("execution cancelled".to_string()));
        }
        let path = self.database_path(db_id);
        if !path.is_file() {
            return Err(EvalError::Execution(format!(
                "Database file does not exist: {}",
                path.display()
            )));
        }
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        let cancelled = Arc::clone(&self.cancelled);
        conn.progress_handler(
            CANCEL_CHECK_OPS,
            Some(move || cancelled.load(Ordering::Relaxed)),
        );
        Ok(conn)
    }

    fn run_query(&self, db_id: &str, sql: &str) -> Result<Vec<Row>> {
        if sql.trim().is_empty() {
            return Err(EvalError::Execution("empty SQL statement".to_string()));
        }

        let conn = self.open(db_id)?;
        let mut stmt = conn.prepare(sql)?;
        let column_count = stmt.column_count();
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                values.push(Value::from(row.get_ref(idx)?));
            }
            out.push(values);
        }
        Ok(out)
    }
}

impl SqlExecutor for SqliteExecutor {
    fn execute(&self, db_id: &str, sql: &str) -> ExecutionOutcome {
        match self.run_query(db_id, sql) {
            Ok(rows) => {
                debug!("{} returned {} rows", db_id, rows.len());
                ExecutionOutcome::Rows(rows)
            }
            Err(EvalError::Sqlite(e)) => ExecutionOutcome::Error(e.to_string()),
            Err(EvalError::Execution(msg)) => ExecutionOutcome::Error(msg),
            Err(e) => ExecutionOutcome::Error(e.to_string()),
        }
    }

    fn describe_schema(&self, db_id: &str) -> Result<String> {
        let conn = self
            .open(db_id)
            .map_err(|e| EvalError::Schema(format!("{}: {}", db_id, e)))?;
        render_schema(&conn)
    }

    fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            warn!("Cancelling running SQLite statements");
        }
    }
}

/// Render every user table as a block of columns, primary key and foreign keys.
fn render_schema(conn: &Connection) -> Result<String> {
    let tables: Vec<String> = {
        let mut stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%'",
        )?;
        let names = stmt.query_map([], |row| row.get(0))?;
        names.collect::<std::result::Result<_, _>>()?
    };

    let mut lines = Vec::new();
    for table in &tables {
        lines.push(format!("{}:", table));

        let mut stmt =
            conn.prepare("SELECT name, pk FROM pragma_table_info(?1) ORDER BY cid")?;
        let columns: Vec<(String, i64)> = stmt
            .query_map(params![table], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<_, _>>()?;

        let names: Vec<&str> = columns.iter().map(|(name, _)| name.as_str()).collect();
        lines.push(format!("  Columns: {}", names.join(", ")));

        let pks: Vec<&str> = columns
            .iter()
            .filter(|(_, pk)| *pk > 0)
            .map(|(name, _)| name.as_str())
            .collect();
        if !pks.is_empty() {
            lines.push(format!("  Primary Key: {}", pks.join(", ")));
        }

        let mut stmt = conn.prepare(
            "SELECT \"table\", \"from\", \"to\" FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )?;
        let fks: Vec<(String, String, Option<String>)> = stmt
            .query_map(params![table], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
            .collect::<std::result::Result<_, _>>()?;
        if !fks.is_empty() {
            lines.push("  Foreign Keys:".to_string());
            for (ref_table, from_col, to_col) in fks {
                match to_col {
                    Some(to_col) => {
                        lines.push(format!("    - {} → {}.{}", from_col, ref_table, to_col))
                    }
                    None => lines.push(format!("    - {} → {}", from_col, ref_table)),
                }
            }
        }
    }

    Ok(lines.join("\n"))
}
