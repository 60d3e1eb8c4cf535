pub mod blocking;
pub mod engine;
pub mod result;
pub mod sqlite_engine;

pub use blocking::BlockingExecutor;
pub use engine::SqlExecutor;
pub use result::{ExecutionOutcome, Row, Value};
pub use sqlite_engine::SqliteExecutor;
