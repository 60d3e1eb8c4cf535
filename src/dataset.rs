//! Spider-format dataset loading

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// One evaluation unit. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub question: String,
    #[serde(rename = "query", alias = "gold_sql")]
    pub gold_sql: String,
    #[serde(alias = "database_id")]
    pub db_id: String,
}

impl Sample {
    pub fn new(question: impl Into<String>, gold_sql: impl Into<String>, db_id: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            gold_sql: gold_sql.into(),
            db_id: db_id.into(),
        }
    }
}

/// Load samples from a JSON array file, keeping at most `limit` of them.
pub fn load_samples(path: &Path, limit: Option<usize>) -> Result<Vec<Sample>> {
    if !path.is_file() {
        return Err(EvalError::Dataset(format!(
            "Spider data file not found: {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path)?;
    let mut samples: Vec<Sample> = serde_json::from_str(&content)
        .map_err(|e| EvalError::Dataset(format!("Failed to parse {}: {}", path.display(), e)))?;

    info!("Loaded {} samples from {}", samples.len(), path.display());

    if let Some(limit) = limit {
        samples.truncate(limit);
    }
    Ok(samples)
}
