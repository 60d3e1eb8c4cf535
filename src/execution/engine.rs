//! Executor Trait - contract between the pipeline and the SQL engine
//!
//! The pipeline treats the database as an opaque executor: it hands over a
//! database id and a statement and gets back rows or an error message.
//! Calls block; async callers go through `BlockingExecutor`.

use crate::error::Result;
use crate::execution::result::ExecutionOutcome;

pub trait SqlExecutor: Send + Sync {
    /// Run `sql` against database `db_id`. Problems of any kind, including a
    /// missing database, come back as `ExecutionOutcome::Error`.
    fn execute(&self, db_id: &str, sql: &str) -> ExecutionOutcome;

    /// Render the schema description (tables, columns, keys) for `db_id`.
    fn describe_schema(&self, db_id: &str) -> Result<String>;

    /// Abort statements that are running now and refuse any started later.
    fn cancel(&self) {}
}
