//! Result Comparator
//!
//! Execution-based equivalence between a reference query and a candidate.
//! Cells are compared as text, and both column order and row order are
//! ignored. Row multiplicity still counts. Comparing as text means `1` and
//! `'1'` are equal, which is a known approximation.

use crate::execution::{BlockingExecutor, ExecutionOutcome, Row, SqlExecutor};
use crate::sql_normalizer::normalize;
use itertools::Itertools;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionComparison {
    pub equivalent: bool,
    /// Error raised by the candidate statement, if any.
    pub error: Option<String>,
    /// Error raised by the reference statement, if any.
    pub reference_error: Option<String>,
}

/// Canonical form of a result set: each row's cells as sorted text, rows sorted.
pub fn canonical_rows(rows: &[Row]) -> Vec<Vec<String>> {
    rows.iter()
        .map(|row| row.iter().map(|cell| cell.to_string()).sorted().collect::<Vec<_>>())
        .sorted()
        .collect()
}

pub fn rows_equivalent(a: &[Row], b: &[Row]) -> bool {
    a.len() == b.len() && canonical_rows(a) == canonical_rows(b)
}

/// Run `reference_sql` and `candidate_sql` against `db_id` and compare their results.
pub fn execution_equivalent(
    executor: &dyn SqlExecutor,
    db_id: &str,
    reference_sql: &str,
    candidate_sql: &str,
) -> ExecutionComparison {
    let reference = executor.execute(db_id, &normalize(reference_sql));
    let candidate = executor.execute(db_id, &normalize(candidate_sql));

    match (&reference, &candidate) {
        (ExecutionOutcome::Rows(expected), ExecutionOutcome::Rows(actual)) => {
            let equivalent = rows_equivalent(expected, actual);
            debug!(
                "Compared {} reference rows with {} candidate rows: {}",
                expected.len(),
                actual.len(),
                equivalent
            );
            ExecutionComparison {
                equivalent,
                error: None,
                reference_error: None,
            }
        }
        _ => ExecutionComparison {
            equivalent: false,
            error: candidate.error().map(str::to_string),
            reference_error: reference.error().map(str::to_string),
        },
    }
}

/// `execution_equivalent` on the blocking pool. A failed executor task counts
/// as a candidate error.
pub async fn compare(
    executor: &BlockingExecutor,
    db_id: &str,
    reference_sql: &str,
    candidate_sql: &str,
) -> ExecutionComparison {
    let (db_id, reference_sql, candidate_sql) =
        (db_id.to_string(), reference_sql.to_string(), candidate_sql.to_string());
    executor
        .run(move |e| execution_equivalent(e, &db_id, &reference_sql, &candidate_sql))
        .await
        .unwrap_or_else(|e| ExecutionComparison {
            equivalent: false,
            error: Some(e.to_string()),
            reference_error: None,
        })
}
