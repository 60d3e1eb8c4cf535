//! Runs executor calls on tokio's blocking pool so a long statement never
//! stalls the runtime, and a shutdown signal can still be observed.

use crate::error::{EvalError, Result};
use crate::execution::engine::SqlExecutor;
use std::sync::Arc;

#[derive(Clone)]
pub struct BlockingExecutor {
    inner: Arc<dyn SqlExecutor>,
}

impl BlockingExecutor {
    pub fn new(inner: Arc<dyn SqlExecutor>) -> Self {
        Self { inner }
    }

    /// Run `f` against the executor on a blocking thread. A panic inside `f`
    /// comes back as an error.
    pub async fn run<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&dyn SqlExecutor) -> T + Send + 'static,
        T: Send + 'static,
    {
        let executor = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || f(executor.as_ref()))
            .await
            .map_err(|e| EvalError::Execution(format!("executor task failed: {}", e)))
    }

    pub async fn describe_schema(&self, db_id: &str) -> Result<String> {
        let db_id = db_id.to_string();
        self.run(move |executor| executor.describe_schema(&db_id)).await?
    }

    /// Whether `sql` executes without error on its own.
    pub async fn is_valid(&self, db_id: &str, sql: &str) -> bool {
        let (db_id, sql) = (db_id.to_string(), sql.to_string());
        self.run(move |executor| executor.execute(&db_id, &sql).is_ok())
            .await
            .unwrap_or(false)
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ExecutionOutcome;

    struct PanickingExecutor;

    impl SqlExecutor for PanickingExecutor {
        fn execute(&self, _db_id: &str, _sql: &str) -> ExecutionOutcome {
            panic!("driver crashed");
        }

        fn describe_schema(&self, db_id: &str) -> Result<String> {
            Ok(format!("{}:\n  Columns: id", db_id))
        }
    }

    #[tokio::test]
    async fn test_blocking_calls_and_panics() {
        let executor = BlockingExecutor::new(Arc::new(PanickingExecutor));

        let schema = executor.describe_schema("pets_1").await.unwrap();
        assert_eq!(schema, "pets_1:\n  Columns: id");

        assert!(!executor.is_valid("pets_1", "SELECT 1").await);
        let err = executor.run(|e| e.execute("pets_1", "SELECT 1")).await;
        assert!(matches!(err, Err(EvalError::Execution(_))));
    }
}
