//! SQL-of-Thought evaluation pipeline
//!
//! Multi-agent NL2SQL evaluation over Spider-format datasets: schema linking,
//! decomposition, clause-aware planning, generation, a bounded correction
//! loop and execution-based scoring.

pub mod agent_prompts;
pub mod clauses;
pub mod comparator;
pub mod config;
pub mod dataset;
pub mod error;
pub mod execution;
pub mod execution_loop;
pub mod llm;
pub mod pipeline;
pub mod report;
pub mod sql_normalizer;

pub use config::EvalConfig;
pub use error::{EvalError, Result};
pub use pipeline::Pipeline;
